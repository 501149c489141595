use fusion_core::{FusionError, Iso3, Mat3, Real};
use nalgebra::{Matrix3, Rotation3, Translation3, UnitQuaternion, Vector3};

/// Linear pose initialisation from a homography and intrinsics.
///
/// Decomposes a plane-induced homography `H = λ K [r1 r2 t]` for a target on
/// `Z = 0` into a rotation and translation.
#[derive(Debug, Clone, Copy)]
pub struct PlanarPoseSolver;

impl PlanarPoseSolver {
    /// Decompose `H` (board -> image) into the pose `T_C_B` mapping board
    /// coordinates into the camera frame. The board is placed in front of
    /// the camera (`t.z > 0`).
    pub fn from_homography(kmtx: &Mat3, hmtx: &Mat3) -> Result<Iso3, FusionError> {
        let k_inv = kmtx
            .try_inverse()
            .ok_or_else(|| FusionError::degenerate("intrinsics matrix is not invertible"))?;

        let k_inv_h1 = k_inv * hmtx.column(0);
        let k_inv_h2 = k_inv * hmtx.column(1);
        let k_inv_h3 = k_inv * hmtx.column(2);

        let norm_avg = 0.5 * (k_inv_h1.norm() + k_inv_h2.norm());
        if norm_avg <= Real::EPSILON {
            return Err(FusionError::degenerate("homography has vanishing columns"));
        }
        let mut lambda = 1.0 / norm_avg;
        if k_inv_h3.z < 0.0 {
            lambda = -lambda;
        }

        let r1 = lambda * k_inv_h1;
        let r2 = lambda * k_inv_h2;
        let r3 = r1.cross(&r2);

        let mut r_mat = Matrix3::<Real>::zeros();
        r_mat.set_column(0, &r1);
        r_mat.set_column(1, &r2);
        r_mat.set_column(2, &r3);

        // Closest rotation in the Frobenius sense.
        let svd = r_mat.svd(true, true);
        let (Some(mut u), Some(v_t)) = (svd.u, svd.v_t) else {
            return Err(FusionError::degenerate("svd failed in pose decomposition"));
        };
        if (u * v_t).determinant() < 0.0 {
            u.column_mut(2).neg_mut();
        }
        let r_orth = u * v_t;

        let t: Vector3<Real> = lambda * k_inv_h3;
        let rot = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r_orth));
        Ok(Iso3::from_parts(Translation3::from(t), rot))
    }
}
