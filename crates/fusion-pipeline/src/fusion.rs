//! Two-frame fusion: undistort, mask to the overlap, match, estimate the
//! right-to-left homography and stitch.
//!
//! Overlap borders come from an operator clicking a column in each frame.
//! The display side is outside this crate; it feeds its mouse events to
//! [`record_click`] with a [`BorderClick`] per frame.

use crate::calibration::CameraCalibration;
use crate::config::PipelineConfig;
use crate::stitch::ImageStitcher;
use fusion_core::{FusionError, Mat3};
use fusion_features::FeatureMatcher;
use fusion_linear::HomographyEstimator;
use image::{imageops, Rgb, RgbImage};
use log::info;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Mouse input relevant to border selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseEvent {
    LeftButtonDown { x: u32, y: u32 },
    Other,
}

/// Accumulates the column picked by the operator on one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BorderClick {
    pub border: Option<u32>,
}

/// Record the column of a left click; later clicks replace earlier ones.
pub fn record_click(state: &mut BorderClick, event: MouseEvent) {
    if let MouseEvent::LeftButtonDown { x, .. } = event {
        state.border = Some(x);
    }
}

/// Columns delimiting the overlap of the two frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlapBorders {
    /// Columns `< left` of the left frame are blanked.
    pub left: u32,
    /// Columns `>= right` of the right frame are blanked.
    pub right: u32,
}

impl OverlapBorders {
    /// Borders from two click accumulators; `None` unless both were clicked.
    pub fn from_clicks(left: &BorderClick, right: &BorderClick) -> Option<Self> {
        Some(Self {
            left: left.border?,
            right: right.border?,
        })
    }

    /// Masked copies of the left and right frames.
    pub fn apply(&self, left: &RgbImage, right: &RgbImage) -> (RgbImage, RgbImage) {
        let mut l = left.clone();
        let mut r = right.clone();
        blank_columns(&mut l, 0, self.left);
        blank_columns(&mut r, self.right, right.width());
        (l, r)
    }
}

fn blank_columns(img: &mut RgbImage, from: u32, to: u32) {
    let to = to.min(img.width());
    for y in 0..img.height() {
        for x in from..to {
            img.put_pixel(x, y, Rgb([0, 0, 0]));
        }
    }
}

/// Mosaic and the estimate behind it.
#[derive(Debug, Clone)]
pub struct FusionOutput {
    pub mosaic: RgbImage,
    /// Maps right-frame pixels into the left frame.
    pub homography: Mat3,
    pub matches: usize,
    pub inliers: usize,
}

/// Fuse a left and a right frame from two calibrated cameras.
///
/// Both frames are undistorted with their own calibration. Matching runs on
/// the masked frames when `borders` is given; the mosaic is built from the
/// unmasked undistorted frames.
///
/// # Errors
///
/// `Estimation` with fewer than 4 matches or without RANSAC consensus;
/// `NumericalDegeneracy` from undistortion or warping.
pub fn fuse_two_frames(
    left: &RgbImage,
    right: &RgbImage,
    left_calibration: &CameraCalibration,
    right_calibration: &CameraCalibration,
    borders: Option<OverlapBorders>,
    config: &PipelineConfig,
) -> Result<FusionOutput, FusionError> {
    let left = left_calibration.undistort(left)?;
    let right = right_calibration.undistort(right)?;

    let (left_masked, right_masked) = match borders {
        Some(b) => b.apply(&left, &right),
        None => (left.clone(), right.clone()),
    };
    let gray_left = imageops::grayscale(&left_masked);
    let gray_right = imageops::grayscale(&right_masked);

    let result = FeatureMatcher::new(config.matcher).match_images(&gray_left, &gray_right);
    let (pts_left, pts_right) = result.point_pairs();

    let mut rng = StdRng::seed_from_u64(config.ransac.seed);
    let estimate =
        HomographyEstimator::new(config.ransac.clone()).estimate(&pts_right, &pts_left, &mut rng)?;
    info!(
        "fusion: {} matches, {} inliers (rms {:.3} px)",
        result.matches.len(),
        estimate.inliers.len(),
        estimate.inlier_rms
    );

    let mosaic = ImageStitcher::new(config.stitch).stitch(&left, &right, &estimate.h)?;
    Ok(FusionOutput {
        mosaic,
        homography: estimate.h,
        matches: result.matches.len(),
        inliers: estimate.inliers.len(),
    })
}
