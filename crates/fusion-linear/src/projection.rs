//! Sensor-to-image projection matrix from six 3-D/2-D correspondences.
//!
//! Each correspondence `(X, Y, Z) -> (u, v)` contributes two rows
//!
//! ```text
//! [-X, -Y, -Z, -1,  0,  0,  0,  0, uX, uY, uZ, u]
//! [ 0,  0,  0,  0, -X, -Y, -Z, -1, vX, vY, vZ, v]
//! ```
//!
//! and `P` is the right singular vector of the smallest singular value of the
//! resulting 12x12 system, reshaped row-major to 3x4.

use crate::math::{mat34_from_vector, null_space};
use fusion_core::{
    to_homogeneous_3d, CorrespondenceView, FusionError, Mat34, Pt2, Pt3, Real,
};
use log::debug;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The DLT is defined for exactly this many correspondences.
pub const DLT_CORRESPONDENCES: usize = 6;

/// Relative size of the second-smallest singular value below which the
/// solution is not unique.
const NULL_SPACE_RATIO_EPS: Real = 1e-10;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("projection DLT needs exactly {expected} correspondences, got {got}")]
    CorrespondenceCount { expected: usize, got: usize },
    #[error("3D / 2D counts differ: {points} vs {pixels}")]
    MismatchedLengths { points: usize, pixels: usize },
    #[error("correspondences do not determine a unique projection (ratio {0:.3e})")]
    Degenerate(Real),
    #[error("svd failed")]
    SvdFailed,
    #[error("point projects to infinity (w = {0:.3e})")]
    PointAtInfinity(Real),
}

impl From<ProjectionError> for FusionError {
    fn from(err: ProjectionError) -> Self {
        match err {
            ProjectionError::CorrespondenceCount { .. } | ProjectionError::MismatchedLengths { .. } => {
                FusionError::Estimation(err.to_string())
            }
            _ => FusionError::NumericalDegeneracy(err.to_string()),
        }
    }
}

/// A 3x4 projection matrix, defined up to scale.
///
/// Serialized as three rows of four numbers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[[Real; 4]; 3]", into = "[[Real; 4]; 3]")]
pub struct ProjectionMatrix {
    p: Mat34,
}

impl From<[[Real; 4]; 3]> for ProjectionMatrix {
    fn from(rows: [[Real; 4]; 3]) -> Self {
        Self {
            p: Mat34::from_fn(|r, c| rows[r][c]),
        }
    }
}

impl From<ProjectionMatrix> for [[Real; 4]; 3] {
    fn from(m: ProjectionMatrix) -> Self {
        std::array::from_fn(|r| std::array::from_fn(|c| m.p[(r, c)]))
    }
}

impl ProjectionMatrix {
    pub fn new(p: Mat34) -> Self {
        Self { p }
    }

    pub fn matrix(&self) -> &Mat34 {
        &self.p
    }

    /// Project a sensor point: `[X, Y, Z, 1]`, multiply by `P`, divide by `w`.
    ///
    /// # Errors
    ///
    /// `PointAtInfinity` when `w` vanishes relative to the magnitudes involved.
    pub fn project(&self, point: &Pt3) -> Result<Pt2, ProjectionError> {
        let xh = to_homogeneous_3d(point);
        let uvw = self.p * xh;
        let eps = 1e-12 * self.p.row(2).norm() * xh.norm();
        if !uvw.z.is_finite() || uvw.z.abs() <= eps {
            return Err(ProjectionError::PointAtInfinity(uvw.z));
        }
        Ok(Pt2::new(uvw.x / uvw.z, uvw.y / uvw.z))
    }

    /// Projection truncated toward zero to integer pixel coordinates.
    pub fn project_to_pixel(&self, point: &Pt3) -> Result<(i64, i64), ProjectionError> {
        let p = self.project(point)?;
        Ok((p.x.trunc() as i64, p.y.trunc() as i64))
    }

    /// Per-point reprojection errors in pixels.
    pub fn reprojection_errors(&self, view: &CorrespondenceView) -> Result<Vec<Real>, ProjectionError> {
        view.iter()
            .map(|(p, px)| self.project(p).map(|q| (q - px).norm()))
            .collect()
    }
}

/// Direct Linear Transform for the sensor-to-image projection matrix.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionSolver;

impl ProjectionSolver {
    /// Solve `P` from exactly [`DLT_CORRESPONDENCES`] correspondences.
    ///
    /// # Errors
    ///
    /// - `CorrespondenceCount` for any other count (5 and 7 included),
    /// - `Degenerate` if the null space is not one-dimensional (e.g. coplanar points).
    pub fn dlt(points: &[Pt3], pixels: &[Pt2]) -> Result<ProjectionMatrix, ProjectionError> {
        if points.len() != pixels.len() {
            return Err(ProjectionError::MismatchedLengths {
                points: points.len(),
                pixels: pixels.len(),
            });
        }
        if points.len() != DLT_CORRESPONDENCES {
            return Err(ProjectionError::CorrespondenceCount {
                expected: DLT_CORRESPONDENCES,
                got: points.len(),
            });
        }

        let mut a = DMatrix::<Real>::zeros(2 * DLT_CORRESPONDENCES, 12);
        for (i, (pw, px)) in points.iter().zip(pixels).enumerate() {
            let (x, y, z) = (pw.x, pw.y, pw.z);
            let (u, v) = (px.x, px.y);
            let r0 = 2 * i;
            let r1 = 2 * i + 1;

            a[(r0, 0)] = -x;
            a[(r0, 1)] = -y;
            a[(r0, 2)] = -z;
            a[(r0, 3)] = -1.0;
            a[(r0, 8)] = u * x;
            a[(r0, 9)] = u * y;
            a[(r0, 10)] = u * z;
            a[(r0, 11)] = u;

            a[(r1, 4)] = -x;
            a[(r1, 5)] = -y;
            a[(r1, 6)] = -z;
            a[(r1, 7)] = -1.0;
            a[(r1, 8)] = v * x;
            a[(r1, 9)] = v * y;
            a[(r1, 10)] = v * z;
            a[(r1, 11)] = v;
        }

        let ns = null_space(&a).ok_or(ProjectionError::SvdFailed)?;
        let ratio = ns.second_smallest_ratio();
        if ratio < NULL_SPACE_RATIO_EPS {
            return Err(ProjectionError::Degenerate(ratio));
        }

        let p = mat34_from_vector(&ns.vector);
        debug!("projection DLT: second-smallest singular value ratio {ratio:.3e}");
        Ok(ProjectionMatrix { p })
    }

    pub fn from_view(view: &CorrespondenceView) -> Result<ProjectionMatrix, ProjectionError> {
        Self::dlt(&view.points_3d, &view.points_2d)
    }
}
