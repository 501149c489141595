//! Closed-form (linear) solvers used to initialise and drive the fusion pipeline.
//!
//! - [`HomographySolver`] / [`HomographyEstimator`]: normalized DLT and its RANSAC wrapper,
//! - [`ZhangInit`]: intrinsics from plane homographies,
//! - [`distortion_fit`]: Brown-Conrady coefficients from homography residuals,
//! - [`PlanarPoseSolver`]: board pose from `K` and `H`,
//! - [`iterative_intrinsics`]: alternating intrinsics / distortion initialisation,
//! - [`ProjectionSolver`]: six-point 3-D to 2-D projection matrix DLT.

pub mod distortion_fit;
mod homography;
pub mod iterative_intrinsics;
pub mod math;
mod planar_pose;
mod projection;
mod zhang_intrinsics;

pub use homography::*;
pub use planar_pose::*;
pub use projection::*;
pub use zhang_intrinsics::*;
