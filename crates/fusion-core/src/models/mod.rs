//! Camera model building blocks.
//!
//! A [`Camera`] composes two stages:
//!
//! 1. `DistortionModel`: apply radial/tangential distortion in normalized space.
//! 2. `IntrinsicsModel`: map normalized coordinates to pixels (K matrix).
//!
//! The pinhole projection `(X/Z, Y/Z)` comes first and is fixed.

mod camera;
mod distortion;
mod intrinsics;

pub use camera::*;
pub use distortion::*;
pub use intrinsics::*;
