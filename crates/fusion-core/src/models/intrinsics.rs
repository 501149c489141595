use nalgebra::{Matrix3, RealField, Vector2};
use serde::{Deserialize, Serialize};

/// Intrinsics that map normalized image coordinates to pixel coordinates.
pub trait IntrinsicsModel<S: RealField + Copy> {
    /// Convert normalized coordinates into pixel coordinates.
    fn to_pixel(&self, normalized: &Vector2<S>) -> Vector2<S>;
    /// Convert pixel coordinates into normalized coordinates.
    fn from_pixel(&self, pixel: &Vector2<S>) -> Vector2<S>;
}

/// Standard pinhole intrinsics with optional skew.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FxFyCxCySkew<S: RealField + Copy> {
    /// Focal length in pixels along X.
    pub fx: S,
    /// Focal length in pixels along Y.
    pub fy: S,
    /// Principal point X coordinate in pixels.
    pub cx: S,
    /// Principal point Y coordinate in pixels.
    pub cy: S,
    /// Skew term (typically 0).
    pub skew: S,
}

impl<S: RealField + Copy> FxFyCxCySkew<S> {
    /// Return the 3x3 camera intrinsics matrix K.
    pub fn k_matrix(&self) -> Matrix3<S> {
        Matrix3::new(
            self.fx,
            self.skew,
            self.cx,
            S::zero(),
            self.fy,
            self.cy,
            S::zero(),
            S::zero(),
            S::one(),
        )
    }

    /// Read intrinsics back from an upper-triangular K (scaled so `K[2,2] = 1`).
    pub fn from_k_matrix(k: &Matrix3<S>) -> Self {
        let s = k[(2, 2)];
        Self {
            fx: k[(0, 0)] / s,
            fy: k[(1, 1)] / s,
            cx: k[(0, 2)] / s,
            cy: k[(1, 2)] / s,
            skew: k[(0, 1)] / s,
        }
    }
}

impl<S: RealField + Copy> IntrinsicsModel<S> for FxFyCxCySkew<S> {
    fn to_pixel(&self, normalized: &Vector2<S>) -> Vector2<S> {
        let u = self.fx * normalized.x + self.skew * normalized.y + self.cx;
        let v = self.fy * normalized.y + self.cy;
        Vector2::new(u, v)
    }

    fn from_pixel(&self, pixel: &Vector2<S>) -> Vector2<S> {
        let sy = (pixel.y - self.cy) / self.fy;
        let sx = (pixel.x - self.cx - self.skew * sy) / self.fx;
        Vector2::new(sx, sy)
    }
}
