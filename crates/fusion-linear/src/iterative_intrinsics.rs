//! Alternating intrinsics / distortion initialisation for planar targets.
//!
//! 1. Zhang's closed form on homographies of the raw (distorted) pixels.
//! 2. Repeat `iterations` times:
//!    a. fit distortion from homography residuals with the current `K`,
//!    b. undistort the observed pixels,
//!    c. re-estimate homographies and `K` from the undistorted pixels.
//!
//! The output seeds the non-linear refinement; it is not a final calibration.

use crate::{
    distortion_fit::{estimate_distortion_from_homographies, DistortionFitOptions, DistortionView},
    HomographySolver, ZhangInit,
};
use fusion_core::{
    BrownConrady5, CorrespondenceView, DistortionModel, FusionError, FxFyCxCySkew,
    IntrinsicsModel, Mat3, Pt2, Real,
};
use log::debug;

/// Options controlling iterative intrinsics estimation.
#[derive(Debug, Clone, Copy)]
pub struct IterativeIntrinsicsOptions {
    /// Distortion/K alternation rounds; 1-3 is typical.
    pub iterations: usize,
    pub distortion_opts: DistortionFitOptions,
    /// Force skew to zero after each intrinsics estimate.
    pub zero_skew: bool,
}

impl Default for IterativeIntrinsicsOptions {
    fn default() -> Self {
        Self {
            iterations: 2,
            distortion_opts: DistortionFitOptions::default(),
            zero_skew: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IterativeIntrinsicsResult {
    pub intrinsics: FxFyCxCySkew<Real>,
    pub distortion: BrownConrady5<Real>,
    /// Board-to-pixel homography per view, from the undistorted pixels.
    pub homographies: Vec<Mat3>,
}

fn homographies(board: &[Vec<Pt2>], pixels: &[Vec<Pt2>]) -> Result<Vec<Mat3>, FusionError> {
    board
        .iter()
        .zip(pixels)
        .map(|(b, p)| HomographySolver::dlt(b, p).map_err(FusionError::from))
        .collect()
}

fn zhang(hs: &[Mat3], zero_skew: bool) -> Result<FxFyCxCySkew<Real>, FusionError> {
    let mut k = ZhangInit::from_homographies(hs)?;
    if zero_skew {
        k.skew = 0.0;
    }
    Ok(k)
}

/// Estimate intrinsics and distortion by alternating closed-form steps.
///
/// # Errors
///
/// `Estimation` with fewer than 3 views; `NumericalDegeneracy` when a
/// homography, Zhang or distortion step is ill-conditioned.
pub fn estimate_intrinsics_iterative(
    views: &[CorrespondenceView],
    opts: IterativeIntrinsicsOptions,
) -> Result<IterativeIntrinsicsResult, FusionError> {
    if views.len() < 3 {
        return Err(FusionError::estimation(format!(
            "need at least 3 views, got {}",
            views.len()
        )));
    }

    let board: Vec<Vec<Pt2>> = views.iter().map(CorrespondenceView::planar_points).collect();
    let raw: Vec<Vec<Pt2>> = views.iter().map(|v| v.points_2d.clone()).collect();

    let raw_h = homographies(&board, &raw)?;
    let mut intrinsics = zhang(&raw_h, opts.zero_skew)?;
    let mut distortion = BrownConrady5::zero(opts.distortion_opts.iters);
    let mut hs = raw_h.clone();

    for iter in 0..opts.iterations {
        let dist_views = board
            .iter()
            .zip(&raw)
            .zip(&raw_h)
            .map(|((b, p), h)| DistortionView::new(*h, b.clone(), p.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        distortion = estimate_distortion_from_homographies(
            &intrinsics.k_matrix(),
            &dist_views,
            opts.distortion_opts,
        )?;

        let undistorted: Vec<Vec<Pt2>> = raw
            .iter()
            .map(|pixels| {
                pixels
                    .iter()
                    .map(|px| {
                        let n_d = intrinsics.from_pixel(&px.coords);
                        let n_u = distortion.undistort(&n_d);
                        Pt2::from(intrinsics.to_pixel(&n_u))
                    })
                    .collect()
            })
            .collect();

        hs = homographies(&board, &undistorted)?;
        intrinsics = zhang(&hs, opts.zero_skew)?;

        debug!(
            "init round {}: fx={:.2} fy={:.2} cx={:.2} cy={:.2} k1={:.4} k2={:.4}",
            iter + 1,
            intrinsics.fx,
            intrinsics.fy,
            intrinsics.cx,
            intrinsics.cy,
            distortion.k1,
            distortion.k2
        );
    }

    Ok(IterativeIntrinsicsResult {
        intrinsics,
        distortion,
        homographies: hs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fusion_core::{synthetic::planar, Camera};

    #[test]
    fn distortion_free_views_recover_k_exactly() {
        let k_gt = FxFyCxCySkew {
            fx: 820.0,
            fy: 800.0,
            cx: 330.0,
            cy: 250.0,
            skew: 0.0,
        };
        let cam = Camera::new(k_gt, BrownConrady5::zero(8));
        let board = planar::grid_points(8, 6, 0.03);
        let poses = planar::poses_tilted(6, 0.21, 0.15, 0.6, 0.35);
        let views = planar::project_views_all(&cam, &board, &poses).unwrap();

        let res = estimate_intrinsics_iterative(&views, IterativeIntrinsicsOptions::default())
            .unwrap();
        assert!((res.intrinsics.fx - k_gt.fx).abs() < 0.5, "{:?}", res.intrinsics);
        assert!((res.intrinsics.fy - k_gt.fy).abs() < 0.5);
        assert!((res.intrinsics.cx - k_gt.cx).abs() < 0.5);
        assert!((res.intrinsics.cy - k_gt.cy).abs() < 0.5);
        assert!(res.distortion.k1.abs() < 1e-3);
        assert_eq!(res.homographies.len(), 6);
    }

    #[test]
    fn too_few_views_is_an_estimation_error() {
        let err = estimate_intrinsics_iterative(&[], IterativeIntrinsicsOptions::default())
            .unwrap_err();
        assert!(matches!(err, FusionError::Estimation(_)));
    }
}
