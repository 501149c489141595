//! Deterministic synthetic data generation helpers.
//!
//! Planar target grids, simple pose generators and projection helpers that
//! produce [`crate::CorrespondenceView`] instances. Point ordering is stable
//! (raster, X fastest), matching the chessboard detector output.
//!
//! # Example
//!
//! ```
//! use fusion_core::{synthetic::planar, BrownConrady5, Camera, FxFyCxCySkew};
//!
//! let k = FxFyCxCySkew { fx: 800.0, fy: 800.0, cx: 640.0, cy: 360.0, skew: 0.0 };
//! let cam = Camera::new(k, BrownConrady5::zero(8));
//!
//! let board = planar::grid_points(6, 5, 0.04);
//! let poses = planar::poses_yaw_y_z(5, -0.3, 0.15, 0.5, 0.1);
//! let views = planar::project_views_all(&cam, &board, &poses).unwrap();
//! assert_eq!(views.len(), 5);
//! ```

pub mod planar;
