use nalgebra::{Point3, RealField, Vector2, Vector3};
use serde::{Deserialize, Serialize};

use super::{BrownConrady5, DistortionModel, FxFyCxCySkew, IntrinsicsModel};

#[derive(Clone, Copy, Debug)]
pub struct Ray<S: RealField + Copy> {
    pub dir: Vector3<S>,
}

/// Pinhole camera with a distortion stage.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Camera<S, D>
where
    S: RealField + Copy,
    D: DistortionModel<S>,
{
    pub k: FxFyCxCySkew<S>,
    pub dist: D,
}

/// The camera model produced by intrinsic calibration.
pub type PinholeCamera = Camera<f64, BrownConrady5<f64>>;

impl<S, D> Camera<S, D>
where
    S: RealField + Copy,
    D: DistortionModel<S>,
{
    pub fn new(k: FxFyCxCySkew<S>, dist: D) -> Self {
        Self { k, dist }
    }

    pub fn project_point_c(&self, p_c: &Vector3<S>) -> Option<Vector2<S>> {
        if p_c.z <= S::zero() {
            return None;
        }
        let n_u = Vector2::new(p_c.x / p_c.z, p_c.y / p_c.z);
        let n_d = self.dist.distort(&n_u);
        Some(self.k.to_pixel(&n_d))
    }

    pub fn project_point(&self, p_c: &Point3<S>) -> Option<Vector2<S>> {
        self.project_point_c(&p_c.coords)
    }

    /// Undistorted normalized coordinates of a pixel.
    pub fn normalize_pixel(&self, px: &Vector2<S>) -> Vector2<S> {
        let n_d = self.k.from_pixel(px);
        self.dist.undistort(&n_d)
    }

    pub fn backproject_pixel(&self, px: &Vector2<S>) -> Ray<S> {
        let n_u = self.normalize_pixel(px);
        let dir = Vector3::new(n_u.x, n_u.y, S::one());
        let dir = dir / dir.norm();
        Ray { dir }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backproject_then_project_is_identity() {
        let cam = Camera::new(
            FxFyCxCySkew {
                fx: 800.0,
                fy: 810.0,
                cx: 320.0,
                cy: 240.0,
                skew: 0.0,
            },
            BrownConrady5 {
                k1: -0.15,
                k2: 0.02,
                k3: 0.0,
                p1: 0.0005,
                p2: 0.0,
                iters: 20,
            },
        );
        let px = Vector2::new(600.0, 80.0);
        let ray = cam.backproject_pixel(&px);
        let px2 = cam.project_point_c(&(ray.dir * 2.5)).unwrap();
        assert!((px2 - px).norm() < 1e-6, "{px2:?}");
    }

    #[test]
    fn points_behind_camera_do_not_project() {
        let cam = Camera::new(
            FxFyCxCySkew {
                fx: 500.0,
                fy: 500.0,
                cx: 0.0,
                cy: 0.0,
                skew: 0.0,
            },
            crate::NoDistortion,
        );
        assert!(cam.project_point(&Point3::new(0.0, 0.0, -1.0)).is_none());
    }
}
