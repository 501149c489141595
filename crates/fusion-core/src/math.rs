use nalgebra::{Isometry3, Matrix3, Matrix3x4, Point2, Point3, Vector2, Vector3, Vector4};

pub type Real = f64;

pub type Vec2 = Vector2<Real>;
pub type Vec3 = Vector3<Real>;
pub type Vec4 = Vector4<Real>;
pub type Pt2 = Point2<Real>;
pub type Pt3 = Point3<Real>;
pub type Mat3 = Matrix3<Real>;
pub type Mat34 = Matrix3x4<Real>;
pub type Iso3 = Isometry3<Real>;

pub fn to_homogeneous(p: &Pt2) -> Vec3 {
    Vec3::new(p.x, p.y, 1.0)
}

pub fn from_homogeneous(v: &Vec3) -> Pt2 {
    Pt2::new(v.x / v.z, v.y / v.z)
}

/// Dehomogenize, returning `None` when `|w|` is below `eps`.
pub fn try_from_homogeneous(v: &Vec3, eps: Real) -> Option<Pt2> {
    if v.z.abs() < eps || !v.z.is_finite() {
        return None;
    }
    Some(from_homogeneous(v))
}

pub fn to_homogeneous_3d(p: &Pt3) -> Vec4 {
    Vec4::new(p.x, p.y, p.z, 1.0)
}

/// Map `p` through a homography.
pub fn apply_homography(h: &Mat3, p: &Pt2) -> Pt2 {
    from_homogeneous(&(h * to_homogeneous(p)))
}

/// Cosine similarity of two matrices viewed as flat vectors.
///
/// Invariant under positive rescaling; `±1` for matrices equal up to scale.
pub fn matrix_cosine<const R: usize, const C: usize>(
    a: &nalgebra::SMatrix<Real, R, C>,
    b: &nalgebra::SMatrix<Real, R, C>,
) -> Real {
    let denom = a.norm() * b.norm();
    if denom <= Real::EPSILON {
        return 0.0;
    }
    a.dot(b) / denom
}

/// Frobenius distance between two homographies after scaling both to `H[2,2] = 1`.
///
/// Returns `None` if either matrix has a vanishing bottom-right entry.
pub fn homography_distance(a: &Mat3, b: &Mat3) -> Option<Real> {
    if a[(2, 2)].abs() < 1e-12 || b[(2, 2)].abs() < 1e-12 {
        return None;
    }
    let an = a / a[(2, 2)];
    let bn = b / b[(2, 2)];
    Some((an - bn).norm() / bn.norm())
}
