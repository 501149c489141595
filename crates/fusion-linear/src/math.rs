//! Numerical helpers shared by the linear solvers.
//!
//! - **Hartley normalization** for 2D points (conditioning of DLT systems),
//! - **null-space extraction** via SVD with explicit smallest-singular-value selection,
//! - reshaping helpers for vectors coming out of the SVD.

use fusion_core::{Mat3, Mat34, Pt2, Real};
use nalgebra::{DMatrix, DVector};

/// Hartley normalization for 2D points.
///
/// Centers points at the origin and scales so that the mean distance from
/// the origin is `√2`. Returns the normalized points and `T` such that
/// `p_norm = T * p_homogeneous`, or `None` if the input is empty or all
/// points coincide.
pub fn normalize_points_2d(points: &[Pt2]) -> Option<(Vec<Pt2>, Mat3)> {
    if points.is_empty() {
        return None;
    }

    let n = points.len() as Real;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    let cx = sx / n;
    let cy = sy / n;

    let mean_dist = points
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<Real>()
        / n;

    if mean_dist <= Real::EPSILON {
        return None;
    }

    let scale = std::f64::consts::SQRT_2 / mean_dist;
    let t = Mat3::new(
        scale,
        0.0,
        -scale * cx,
        0.0,
        scale,
        -scale * cy,
        0.0,
        0.0,
        1.0,
    );

    let norm = points
        .iter()
        .map(|p| Pt2::new((p.x - cx) * scale, (p.y - cy) * scale))
        .collect();

    Some((norm, t))
}

/// Solution of a homogeneous system `A x = 0`.
#[derive(Debug, Clone)]
pub struct NullSpace {
    /// Unit vector minimizing `|A x|`.
    pub vector: DVector<Real>,
    /// Singular values of `A`, descending.
    pub singular_values: Vec<Real>,
}

impl NullSpace {
    /// Ratio of the second-smallest to the largest singular value.
    ///
    /// Close to zero when the null space has more than one dimension.
    pub fn second_smallest_ratio(&self) -> Real {
        let n = self.singular_values.len();
        if n < 2 || self.singular_values[0] <= 0.0 {
            return 0.0;
        }
        self.singular_values[n - 2] / self.singular_values[0]
    }
}

/// Right singular vector of `a` for its smallest singular value.
///
/// Under-determined systems are zero-padded to square so that `V` is complete.
pub fn null_space(a: &DMatrix<Real>) -> Option<NullSpace> {
    let (rows, cols) = a.shape();
    let a_work = if rows < cols {
        let mut a_pad = DMatrix::<Real>::zeros(cols, cols);
        a_pad.view_mut((0, 0), (rows, cols)).copy_from(a);
        a_pad
    } else {
        a.clone()
    };

    let svd = a_work.svd(false, true);
    let v_t = svd.v_t?;
    let (min_idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|(_, x), (_, y)| x.total_cmp(y))?;

    let mut singular_values: Vec<Real> = svd.singular_values.iter().copied().collect();
    singular_values.sort_by(|x, y| y.total_cmp(x));

    let vector = v_t.row(min_idx).transpose();
    if vector.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some(NullSpace {
        vector,
        singular_values,
    })
}

/// Reshape a 9-vector row-major into a 3x3 matrix.
pub fn mat3_from_vector(v: &DVector<Real>) -> Mat3 {
    debug_assert_eq!(v.len(), 9);
    Mat3::from_fn(|r, c| v[3 * r + c])
}

/// Reshape a 12-vector row-major into a 3x4 matrix.
pub fn mat34_from_vector(v: &DVector<Real>) -> Mat34 {
    debug_assert_eq!(v.len(), 12);
    Mat34::from_fn(|r, c| v[4 * r + c])
}

/// Signed area (times two) of the triangle `a, b, c`.
pub fn triangle_area2(a: &Pt2, b: &Pt2, c: &Pt2) -> Real {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Largest `area / spread²` ratio still treated as collinear: roughly the
/// sine of the angle the third point subtends off the longest side.
const COLLINEAR_TOL: Real = 1e-3;

/// Whether three points are collinear relative to their spread.
///
/// Scale invariant: a point 0.5 px off a 1000 px baseline counts as
/// collinear, and so does the same triple scaled by any factor.
pub fn collinear(a: &Pt2, b: &Pt2, c: &Pt2) -> bool {
    let spread = (b - a)
        .norm_squared()
        .max((c - a).norm_squared())
        .max((c - b).norm_squared());
    if spread <= Real::EPSILON {
        return true;
    }
    triangle_area2(a, b, c).abs() <= COLLINEAR_TOL * spread
}
