//! End-to-end workflows built on the fusion crates.
//!
//! - [`IntrinsicCalibrator`]: chessboard images to [`CameraCalibration`],
//! - [`ImageStitcher`] and [`fusion::fuse_two_frames`]: two undistorted
//!   frames to one mosaic,
//! - [`projection`]: correspondence files, projection DLT and overlays,
//! - [`PipelineConfig`]: JSON configuration for all of the above.

mod calibration;
pub mod config;
pub mod fusion;
pub mod json;
pub mod projection;
mod stitch;

pub use calibration::{CameraCalibration, IntrinsicCalibrator, ViewReport};
pub use config::{CalibrationConfig, PipelineConfig, StitchConfig};
pub use fusion::{fuse_two_frames, BorderClick, FusionOutput, MouseEvent, OverlapBorders};
pub use projection::CorrespondenceSet;
pub use stitch::ImageStitcher;
