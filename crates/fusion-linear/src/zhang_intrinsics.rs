use crate::math::null_space;
use fusion_core::{FusionError, FxFyCxCySkew, Mat3, Real};
use nalgebra::{DMatrix, SVector};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IntrinsicsInitError {
    #[error("need at least 3 homographies for intrinsics estimation, got {0}")]
    NotEnoughHomographies(usize),
    #[error("svd failed")]
    SvdFailed,
    #[error("degenerate configuration in intrinsics estimation: {0}")]
    Degenerate(&'static str),
}

impl From<IntrinsicsInitError> for FusionError {
    fn from(err: IntrinsicsInitError) -> Self {
        match err {
            IntrinsicsInitError::NotEnoughHomographies(_) => FusionError::Estimation(err.to_string()),
            _ => FusionError::NumericalDegeneracy(err.to_string()),
        }
    }
}

/// Zhang's closed-form intrinsics from plane homographies.
#[derive(Debug, Clone, Copy)]
pub struct ZhangInit;

/// Build the 6-vector v_ij(H) of Zhang's method for columns `i`, `j`.
fn v_ij(hmtx: &Mat3, i: usize, j: usize) -> SVector<Real, 6> {
    let hi = hmtx.column(i);
    let hj = hmtx.column(j);

    SVector::<Real, 6>::from_row_slice(&[
        hi[0] * hj[0],
        hi[0] * hj[1] + hi[1] * hj[0],
        hi[1] * hj[1],
        hi[2] * hj[0] + hi[0] * hj[2],
        hi[2] * hj[1] + hi[1] * hj[2],
        hi[2] * hj[2],
    ])
}

impl ZhangInit {
    /// Estimate `K` from board-to-image homographies (no distortion model).
    ///
    /// Requires at least 3 homographies whose planes are not parallel.
    pub fn from_homographies(hmtxs: &[Mat3]) -> Result<FxFyCxCySkew<Real>, IntrinsicsInitError> {
        if hmtxs.len() < 3 {
            return Err(IntrinsicsInitError::NotEnoughHomographies(hmtxs.len()));
        }

        let m = hmtxs.len();
        let mut vmtx = DMatrix::<Real>::zeros(2 * m, 6);

        for (k, hmtx) in hmtxs.iter().enumerate() {
            let h = hmtx / hmtx.norm();
            let v11 = v_ij(&h, 0, 0);
            let v22 = v_ij(&h, 1, 1);
            let v12 = v_ij(&h, 0, 1);

            vmtx.row_mut(2 * k).copy_from(&v12.transpose());
            vmtx.row_mut(2 * k + 1).copy_from(&(v11 - v22).transpose());
        }

        let b = null_space(&vmtx)
            .ok_or(IntrinsicsInitError::SvdFailed)?
            .vector;

        let b11 = b[0];
        let b12 = b[1];
        let b22 = b[2];
        let b13 = b[3];
        let b23 = b[4];
        let b33 = b[5];

        // v0 = (B12 B13 - B11 B23) / (B11 B22 - B12^2)
        // λ  = B33 - (B13^2 + v0 (B12 B13 - B11 B23)) / B11
        // α  = sqrt(λ / B11), β = sqrt(λ B11 / (B11 B22 - B12^2))
        // γ  = -B12 α^2 β / λ, u0 = γ v0 / β - B13 α^2 / λ
        let denom = b11 * b22 - b12 * b12;
        let denom_norm = b11 * b11 + b22 * b22;
        if denom_norm <= 0.0 || denom.abs() / denom_norm <= 1e-12 {
            return Err(IntrinsicsInitError::Degenerate("B11 B22 - B12^2 vanishes"));
        }

        let v0 = (b12 * b13 - b11 * b23) / denom;
        let lambda = b33 - (b13 * b13 + v0 * (b12 * b13 - b11 * b23)) / b11;

        let alpha2 = lambda / b11;
        let beta2 = lambda * b11 / denom;
        if !(alpha2 > 0.0 && beta2 > 0.0) {
            return Err(IntrinsicsInitError::Degenerate("non-positive focal length"));
        }

        let alpha = alpha2.sqrt();
        let beta = beta2.sqrt();
        let gamma = -b12 * alpha * alpha * beta / lambda;
        let u0 = gamma * v0 / beta - b13 * alpha * alpha / lambda;

        Ok(FxFyCxCySkew {
            fx: alpha,
            fy: beta,
            cx: u0,
            cy: v0,
            skew: gamma,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Isometry3, Rotation3, Translation3, Vector3};

    fn make_k() -> FxFyCxCySkew<Real> {
        FxFyCxCySkew {
            fx: 900.0,
            fy: 880.0,
            cx: 640.0,
            cy: 360.0,
            skew: 0.0,
        }
    }

    fn synthetic_homography(kmtx: &Mat3, rot: Rotation3<Real>, t: Vector3<Real>) -> Mat3 {
        let iso = Isometry3::from_parts(Translation3::from(t), rot.into());
        let r_mat = iso.rotation.to_rotation_matrix();
        let r = r_mat.matrix();

        let mut hmtx = Mat3::zeros();
        hmtx.set_column(0, &(kmtx * r.column(0)));
        hmtx.set_column(1, &(kmtx * r.column(1)));
        hmtx.set_column(2, &(kmtx * t));
        hmtx
    }

    #[test]
    fn intrinsics_from_homographies_recovers_k() {
        let k_gt = make_k();
        let kmtx = k_gt.k_matrix();

        let hmts: Vec<Mat3> = vec![
            synthetic_homography(
                &kmtx,
                Rotation3::from_euler_angles(0.1, 0.0, 0.05),
                Vector3::new(0.1, -0.05, 1.0),
            ),
            synthetic_homography(
                &kmtx,
                Rotation3::from_euler_angles(-0.05, 0.15, -0.1),
                Vector3::new(-0.05, 0.1, 1.2),
            ),
            synthetic_homography(
                &kmtx,
                Rotation3::from_euler_angles(0.2, -0.1, 0.0),
                Vector3::new(0.0, 0.0, 0.9),
            ),
        ];

        // Sign and scale of each H are arbitrary.
        let hmts: Vec<Mat3> = hmts
            .iter()
            .enumerate()
            .map(|(i, h)| h * if i == 1 { -3.0 } else { 0.5 })
            .collect();

        let k = ZhangInit::from_homographies(&hmts).unwrap();

        assert!((k.fx - k_gt.fx).abs() < 1e-3, "fx {}", k.fx);
        assert!((k.fy - k_gt.fy).abs() < 1e-3, "fy {}", k.fy);
        assert!((k.cx - k_gt.cx).abs() < 1e-3, "cx {}", k.cx);
        assert!((k.cy - k_gt.cy).abs() < 1e-3, "cy {}", k.cy);
        assert!(k.skew.abs() < 1e-6, "skew not ~0: {}", k.skew);
    }

    #[test]
    fn two_homographies_are_rejected() {
        let h = make_k().k_matrix();
        assert_eq!(
            ZhangInit::from_homographies(&[h, h]),
            Err(IntrinsicsInitError::NotEnoughHomographies(2))
        );
    }
}
