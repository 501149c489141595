//! Homography estimation (plane-induced projective transform).
//!
//! Implements the normalized Direct Linear Transform (DLT) and a robust
//! RANSAC wrapper. The homography `H` maps **source** points to
//! **destination** points: `x' ~ H x`. For stitching, the source is image 2
//! and the destination image 1.

use crate::math::{collinear, mat3_from_vector, normalize_points_2d, null_space};
use fusion_core::{
    ransac, to_homogeneous, Estimator, FusionError, Mat3, Pt2, RansacOptions, RansacResult,
};
use log::debug;
use nalgebra::DMatrix;
use rand::Rng;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum HomographyError {
    #[error("need at least 4 point correspondences, got {0}")]
    NotEnoughPoints(usize),
    #[error("source / destination counts differ: {0} vs {1}")]
    MismatchedLengths(usize, usize),
    #[error("degenerate point configuration")]
    DegenerateConfiguration,
    #[error("svd failed")]
    SvdFailed,
    #[error("no consensus: best model had {best} inliers of {total}, need {required}")]
    NoConsensus {
        best: usize,
        total: usize,
        required: usize,
    },
}

impl From<HomographyError> for FusionError {
    fn from(err: HomographyError) -> Self {
        match err {
            HomographyError::NotEnoughPoints(_)
            | HomographyError::MismatchedLengths(..)
            | HomographyError::NoConsensus { .. } => FusionError::Estimation(err.to_string()),
            HomographyError::DegenerateConfiguration | HomographyError::SvdFailed => {
                FusionError::NumericalDegeneracy(err.to_string())
            }
        }
    }
}

/// Normalized DLT for homographies.
#[derive(Debug, Clone, Copy)]
pub struct HomographySolver;

impl HomographySolver {
    /// Estimate `H` such that `dst ~ H src` using the normalized DLT.
    ///
    /// Hartley normalization is applied on both sides, `A h = 0` is solved by
    /// SVD and the result de-normalized as `T_dst^-1 H T_src`. The output is
    /// scaled so that `H[2,2] == 1` when possible.
    pub fn dlt(src: &[Pt2], dst: &[Pt2]) -> Result<Mat3, HomographyError> {
        let n = src.len();
        if dst.len() != n {
            return Err(HomographyError::MismatchedLengths(n, dst.len()));
        }
        if n < 4 {
            return Err(HomographyError::NotEnoughPoints(n));
        }

        let (src_n, t_src) =
            normalize_points_2d(src).ok_or(HomographyError::DegenerateConfiguration)?;
        let (dst_n, t_dst) =
            normalize_points_2d(dst).ok_or(HomographyError::DegenerateConfiguration)?;

        let mut a = DMatrix::<f64>::zeros(2 * n, 9);

        for (i, (ps, pd)) in src_n.iter().zip(dst_n.iter()).enumerate() {
            let x = ps.x;
            let y = ps.y;
            let u = pd.x;
            let v = pd.y;

            let r0 = 2 * i;
            let r1 = 2 * i + 1;

            a[(r0, 0)] = -x;
            a[(r0, 1)] = -y;
            a[(r0, 2)] = -1.0;
            a[(r0, 6)] = u * x;
            a[(r0, 7)] = u * y;
            a[(r0, 8)] = u;

            a[(r1, 3)] = -x;
            a[(r1, 4)] = -y;
            a[(r1, 5)] = -1.0;
            a[(r1, 6)] = v * x;
            a[(r1, 7)] = v * y;
            a[(r1, 8)] = v;
        }

        let ns = null_space(&a).ok_or(HomographyError::SvdFailed)?;
        let h_norm = mat3_from_vector(&ns.vector);

        let t_dst_inv = t_dst
            .try_inverse()
            .ok_or(HomographyError::DegenerateConfiguration)?;
        let mut h = t_dst_inv * h_norm * t_src;

        let scale = h[(2, 2)];
        if scale.abs() > f64::EPSILON {
            h /= scale;
        }
        if h.iter().any(|v| !v.is_finite()) {
            return Err(HomographyError::SvdFailed);
        }

        Ok(h)
    }
}

/// Forward transfer error `|H src - dst|` in destination pixels.
pub fn transfer_error(h: &Mat3, src: &Pt2, dst: &Pt2) -> f64 {
    let p = h * to_homogeneous(src);
    if p.z.abs() < 1e-12 {
        return f64::INFINITY;
    }
    let du = p.x / p.z - dst.x;
    let dv = p.y / p.z - dst.y;
    (du * du + dv * dv).sqrt()
}

#[derive(Debug, Clone, Copy)]
struct PointPair {
    src: Pt2,
    dst: Pt2,
}

struct HomographyEst;

impl HomographyEst {
    fn collect(data: &[PointPair], indices: &[usize]) -> (Vec<Pt2>, Vec<Pt2>) {
        indices
            .iter()
            .map(|&idx| (data[idx].src, data[idx].dst))
            .unzip()
    }
}

impl Estimator for HomographyEst {
    type Datum = PointPair;
    type Model = Mat3;

    const MIN_SAMPLES: usize = 4;

    fn fit(data: &[Self::Datum], sample_indices: &[usize]) -> Option<Self::Model> {
        let (src, dst) = Self::collect(data, sample_indices);
        HomographySolver::dlt(&src, &dst).ok()
    }

    fn residual(model: &Self::Model, datum: &Self::Datum) -> f64 {
        transfer_error(model, &datum.src, &datum.dst)
    }

    /// A minimal sample is degenerate when any three of its points are
    /// collinear in either image.
    fn is_degenerate(data: &[Self::Datum], sample_indices: &[usize]) -> bool {
        const TRIPLES: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];
        if sample_indices.len() < 4 {
            return true;
        }
        TRIPLES.iter().any(|t| {
            let [a, b, c] = t.map(|k| data[sample_indices[k]]);
            collinear(&a.src, &b.src, &c.src) || collinear(&a.dst, &b.dst, &c.dst)
        })
    }

    fn refit(data: &[Self::Datum], inliers: &[usize]) -> Option<Self::Model> {
        if inliers.len() < 4 {
            return None;
        }
        let (src, dst) = Self::collect(data, inliers);
        HomographySolver::dlt(&src, &dst).ok()
    }
}

/// Robust homography with its consensus set.
#[derive(Debug, Clone)]
pub struct HomographyEstimate {
    /// `dst ~ h * src`, scaled so `h[2,2] == 1` when possible.
    pub h: Mat3,
    /// Indices into the input pairs that agree with `h`.
    pub inliers: Vec<usize>,
    /// RMS transfer error over the inliers.
    pub inlier_rms: f64,
    /// RANSAC iterations performed.
    pub iters: usize,
    /// Best inlier count retained after each iteration.
    pub best_inlier_history: Vec<usize>,
}

/// RANSAC-robust homography estimation from matched point pairs.
#[derive(Debug, Clone, Default)]
pub struct HomographyEstimator {
    pub opts: RansacOptions,
}

impl HomographyEstimator {
    pub fn new(opts: RansacOptions) -> Self {
        Self { opts }
    }

    /// Estimate `H` with `dst ~ H src` from putative matches.
    ///
    /// Randomness is drawn from `rng` only; seed it for reproducible output.
    ///
    /// # Errors
    ///
    /// - `NotEnoughPoints` with fewer than 4 pairs,
    /// - `NoConsensus` if no candidate reaches `opts.min_inliers` (at least 4).
    pub fn estimate<R: Rng + ?Sized>(
        &self,
        src: &[Pt2],
        dst: &[Pt2],
        rng: &mut R,
    ) -> Result<HomographyEstimate, HomographyError> {
        let n = src.len();
        if dst.len() != n {
            return Err(HomographyError::MismatchedLengths(n, dst.len()));
        }
        if n < 4 {
            return Err(HomographyError::NotEnoughPoints(n));
        }

        let data: Vec<PointPair> = src
            .iter()
            .zip(dst.iter())
            .map(|(&src, &dst)| PointPair { src, dst })
            .collect();

        let mut opts = self.opts.clone();
        opts.min_inliers = opts.min_inliers.max(4);

        let res: RansacResult<Mat3> = ransac::<HomographyEst, R>(&data, &opts, rng);
        let RansacResult {
            success,
            model,
            inliers,
            inlier_rms,
            iters,
            best_inlier_history,
        } = res;

        match model {
            Some(h) if success => {
                debug!(
                    "homography: {} / {} inliers after {} iterations (rms {:.3} px)",
                    inliers.len(),
                    n,
                    iters,
                    inlier_rms
                );
                Ok(HomographyEstimate {
                    h,
                    inliers,
                    inlier_rms,
                    iters,
                    best_inlier_history,
                })
            }
            _ => Err(HomographyError::NoConsensus {
                best: inliers.len(),
                total: n,
                required: opts.min_inliers,
            }),
        }
    }
}
