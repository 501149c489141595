//! Closed-form distortion coefficient estimation from homography residuals.
//!
//! With intrinsics `K` and per-view homographies `H` computed from the raw
//! (distorted) pixels, the offset between each observed pixel and its
//! homography prediction, expressed in normalized coordinates, is modelled as
//! a linear function of the Brown-Conrady coefficients:
//!
//! ```text
//! n_obs - n_ideal ≈ n_ideal (k1 r² + k2 r⁴ + k3 r⁶) + tangential(p1, p2)
//! ```
//!
//! The overdetermined system is solved by SVD least squares. The result is an
//! initial guess for non-linear refinement.

use fusion_core::{BrownConrady5, FusionError, Mat3, Pt2, Real, Vec2, Vec3};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum DistortionFitError {
    #[error("need at least {0} points for distortion estimation, got {1}")]
    NotEnoughPoints(usize, usize),
    #[error("board / pixel counts differ: {0} vs {1}")]
    MismatchedLengths(usize, usize),
    #[error("svd failed during distortion estimation")]
    SvdFailed,
    #[error("intrinsics matrix is not invertible")]
    IntrinsicsNotInvertible,
    #[error("degenerate configuration: all points near the principal point")]
    DegenerateConfiguration,
}

impl From<DistortionFitError> for FusionError {
    fn from(err: DistortionFitError) -> Self {
        match err {
            DistortionFitError::NotEnoughPoints(..) | DistortionFitError::MismatchedLengths(..) => {
                FusionError::Estimation(err.to_string())
            }
            _ => FusionError::NumericalDegeneracy(err.to_string()),
        }
    }
}

/// Options controlling distortion parameter estimation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DistortionFitOptions {
    /// Fix `p1, p2` to zero.
    pub fix_tangential: bool,
    /// Fix `k3` to zero.
    pub fix_k3: bool,
    /// Undistortion iterations stored in the returned model.
    pub iters: u32,
}

impl Default for DistortionFitOptions {
    fn default() -> Self {
        Self {
            fix_tangential: false,
            fix_k3: true,
            iters: 8,
        }
    }
}

/// One view's homography and its planar correspondences.
#[derive(Debug, Clone)]
pub struct DistortionView {
    /// Board-to-pixel homography estimated from the distorted pixels.
    pub homography: Mat3,
    pub board_points: Vec<Pt2>,
    /// Observed (distorted) pixels.
    pub pixel_points: Vec<Pt2>,
}

impl DistortionView {
    pub fn new(
        homography: Mat3,
        board_points: Vec<Pt2>,
        pixel_points: Vec<Pt2>,
    ) -> Result<Self, DistortionFitError> {
        if board_points.len() != pixel_points.len() {
            return Err(DistortionFitError::MismatchedLengths(
                board_points.len(),
                pixel_points.len(),
            ));
        }
        Ok(Self {
            homography,
            board_points,
            pixel_points,
        })
    }
}

fn normalized(k_inv: &Mat3, px: &Pt2) -> Vec2 {
    let n = k_inv * Vec3::new(px.x, px.y, 1.0);
    Vec2::new(n.x / n.z, n.y / n.z)
}

/// Estimate Brown-Conrady distortion from multiple views with known intrinsics.
pub fn estimate_distortion_from_homographies(
    intrinsics: &Mat3,
    views: &[DistortionView],
    opts: DistortionFitOptions,
) -> Result<BrownConrady5<Real>, DistortionFitError> {
    let total_points: usize = views.iter().map(|v| v.board_points.len()).sum();

    let n_params = 2 + usize::from(!opts.fix_k3) + 2 * usize::from(!opts.fix_tangential);
    let min_points = n_params.div_ceil(2) + 2;
    if total_points < min_points {
        return Err(DistortionFitError::NotEnoughPoints(min_points, total_points));
    }

    let k_inv = intrinsics
        .try_inverse()
        .ok_or(DistortionFitError::IntrinsicsNotInvertible)?;

    let mut a = DMatrix::<Real>::zeros(2 * total_points, n_params);
    let mut b = DVector::<Real>::zeros(2 * total_points);
    let mut max_r2: Real = 0.0;

    let mut row = 0;
    for view in views {
        for (board_pt, pixel_obs) in view.board_points.iter().zip(&view.pixel_points) {
            let ideal_h = view.homography * Vec3::new(board_pt.x, board_pt.y, 1.0);
            let ideal = Pt2::new(ideal_h.x / ideal_h.z, ideal_h.y / ideal_h.z);

            let n_ideal = normalized(&k_inv, &ideal);
            let residual = normalized(&k_inv, pixel_obs) - n_ideal;

            let x = n_ideal.x;
            let y = n_ideal.y;
            let r2 = x * x + y * y;
            let r4 = r2 * r2;
            max_r2 = max_r2.max(r2);

            let mut col = 0;
            a[(row, col)] = x * r2;
            a[(row + 1, col)] = y * r2;
            col += 1;
            a[(row, col)] = x * r4;
            a[(row + 1, col)] = y * r4;
            col += 1;

            if !opts.fix_k3 {
                let r6 = r4 * r2;
                a[(row, col)] = x * r6;
                a[(row + 1, col)] = y * r6;
                col += 1;
            }

            if !opts.fix_tangential {
                a[(row, col)] = 2.0 * x * y;
                a[(row + 1, col)] = r2 + 2.0 * y * y;
                col += 1;
                a[(row, col)] = r2 + 2.0 * x * x;
                a[(row + 1, col)] = 2.0 * x * y;
            }

            b[row] = residual.x;
            b[row + 1] = residual.y;
            row += 2;
        }
    }

    if max_r2 < 1e-6 {
        return Err(DistortionFitError::DegenerateConfiguration);
    }

    let x = a
        .svd(true, true)
        .solve(&b, 1e-12)
        .map_err(|_| DistortionFitError::SvdFailed)?;

    let mut it = x.iter().copied();
    let mut next = || it.next().unwrap_or(0.0);
    let k1 = next();
    let k2 = next();
    let k3 = if opts.fix_k3 { 0.0 } else { next() };
    let (p1, p2) = if opts.fix_tangential {
        (0.0, 0.0)
    } else {
        let p1 = next();
        (p1, next())
    };

    Ok(BrownConrady5 {
        k1,
        k2,
        k3,
        p1,
        p2,
        iters: opts.iters,
    })
}
