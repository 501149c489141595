//! Image processing building blocks for calibration and stitching.
//!
//! Numeric work happens on [`ImageF32`] (single channel, row-major, values
//! in `[0, 255]`); colour images stay in `image` crate buffers and are only
//! resampled ([`remap`], [`warp`]).

pub mod chessboard;
pub mod draw;
pub mod filter;
pub mod harris;
mod image_f32;
pub mod io;
pub mod remap;
pub mod subpix;
pub mod synthetic;
pub mod warp;

pub use chessboard::{detect_chessboard, ChessboardParams};
pub use harris::{harris_corners, Corner, HarrisParams};
pub use image_f32::ImageF32;
pub use subpix::{refine_corners_subpix, SubPixCriteria};
