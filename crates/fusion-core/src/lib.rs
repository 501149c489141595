//! Core math and geometry primitives for `camera-fusion`.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `Vec2`, `Pt3`, `Mat34`, ...),
//! - the pinhole camera model with Brown-Conrady distortion,
//! - the [`FusionError`] taxonomy shared by all crates,
//! - a generic RANSAC engine (`ransac`, [`Estimator`]) driven by a caller-owned RNG.
//!
//! Camera pipeline:
//! `pixel = K ∘ distortion ∘ pinhole(dir)`

/// Error taxonomy shared by the workspace.
pub mod error;
/// Linear algebra type aliases and helpers.
pub mod math;
/// Camera models and distortion utilities.
pub mod models;
/// Generic RANSAC engine and traits.
pub mod ransac;
/// Deterministic synthetic data for tests and demos.
pub mod synthetic;
mod types;

pub use error::*;
pub use math::*;
pub use models::*;
pub use ransac::*;
pub use types::*;
