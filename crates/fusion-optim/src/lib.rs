//! Non-linear optimization for calibration problems.
//!
//! Problems implement [`LeastSquaresModel`] on dense parameter / residual
//! vectors and are minimized by a [`Solver`]; [`backend_lm::LmBackend`] wraps
//! the `levenberg-marquardt` crate.

pub mod backend_lm;
pub mod planar_intrinsics;
mod problem;
pub mod robust;

pub use problem::*;
