//! High-level entry crate for offline camera/LiDAR calibration and fusion.
//!
//! Three workflows share one set of camera models and estimators:
//! - intrinsic calibration of a camera from chessboard images
//!   ([`IntrinsicCalibrator`]),
//! - fusion of two overlapping frames into one mosaic ([`fuse_two_frames`]),
//! - a 3×4 projection from six labeled LiDAR/pixel pairs
//!   ([`ProjectionSolver`], [`projection`]).
//!
//! # Quick Start
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use camera_fusion::prelude::*;
//! use std::path::Path;
//!
//! let config = PipelineConfig::default();
//! let calibrator = IntrinsicCalibrator::new(config.calibration.clone());
//! let left_cal = calibrator.calibrate_dir(Path::new("calib/left"))?;
//! let right_cal = calibrator.calibrate_dir(Path::new("calib/right"))?;
//!
//! let left = camera_fusion::imgproc::io::load_rgb(Path::new("left.png"))?;
//! let right = camera_fusion::imgproc::io::load_rgb(Path::new("right.png"))?;
//! let out = fuse_two_frames(&left, &right, &left_cal, &right_cal, None, &config)?;
//! println!("{} inliers of {} matches", out.inliers, out.matches);
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`core`] - math types, camera models, errors, RANSAC
//! - [`linear`] - closed-form estimators (homography, Zhang, projection DLT)
//! - [`optim`] - non-linear least squares and the planar intrinsics problem
//! - [`imgproc`] - image buffers, chessboard detection, undistortion, warping
//! - [`features`] - keypoints, descriptors and matching
//! - [`synthetic`] - deterministic synthetic data for tests and demos

/// Core math types, camera models, errors and RANSAC primitives.
pub mod core {
    pub use fusion_core::*;
}

/// Closed-form estimators.
pub mod linear {
    pub use fusion_linear::*;
}

/// Non-linear least squares.
pub mod optim {
    pub use fusion_optim::*;
}

/// Image processing: I/O, detection, remapping and warping.
pub mod imgproc {
    pub use fusion_imgproc::*;
}

/// Keypoint detection, description and matching.
pub mod features {
    pub use fusion_features::*;
}

/// Deterministic synthetic data generation.
pub mod synthetic {
    pub use fusion_core::synthetic::*;
    pub use fusion_imgproc::synthetic::{random_texture, render_chessboard, textured_scene};
}

pub use fusion_pipeline::{config, fusion, json, projection};

// Workflows
pub use fusion_pipeline::{
    fuse_two_frames, BorderClick, CalibrationConfig, CameraCalibration, CorrespondenceSet,
    FusionOutput, ImageStitcher, IntrinsicCalibrator, MouseEvent, OverlapBorders, PipelineConfig,
    StitchConfig, ViewReport,
};

// Estimators and configuration
pub use fusion_features::{FeatureMatcher, MatcherConfig};
pub use fusion_linear::{HomographyEstimator, ProjectionMatrix, ProjectionSolver};

// Core types
pub use fusion_core::{
    BrownConrady5, Camera, CorrespondenceView, FusionError, FxFyCxCySkew, Iso3, Mat3, Mat34,
    PinholeCamera, Pt2, Pt3, RansacOptions, Real, ReprojectionStats, Vec2, Vec3,
};

/// Convenient re-exports for common use cases.
///
/// ```no_run
/// use camera_fusion::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        fuse_two_frames, CalibrationConfig, CameraCalibration, CorrespondenceSet, ImageStitcher,
        IntrinsicCalibrator, OverlapBorders, PipelineConfig,
    };

    pub use crate::{FeatureMatcher, HomographyEstimator, MatcherConfig, ProjectionMatrix, ProjectionSolver};

    pub use crate::{
        BrownConrady5, Camera, CorrespondenceView, FusionError, FxFyCxCySkew, Iso3, Mat3,
        PinholeCamera, Pt2, Pt3, RansacOptions, Real,
    };
}
