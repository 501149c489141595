//! Iterative sub-pixel corner refinement.
//!
//! At the true corner `q` every image gradient `g(p)` in the window is
//! orthogonal to `p - q`; each iteration solves the weighted normal
//! equations `Σ w g gᵀ · q = Σ w g gᵀ · p` for `q`.

use crate::filter::{sobel, Grad};
use crate::ImageF32;
use fusion_core::{Pt2, Real};
use serde::{Deserialize, Serialize};

/// Window and termination criteria.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubPixCriteria {
    /// Half window size; the search window is `(2 * half_window + 1)²`.
    pub half_window: usize,
    pub max_iters: usize,
    /// Stop once the update is below this many pixels.
    pub epsilon: Real,
}

impl Default for SubPixCriteria {
    fn default() -> Self {
        Self {
            half_window: 5,
            max_iters: 30,
            epsilon: 0.001,
        }
    }
}

/// Refine `corners` in place.
///
/// A corner that would move further than the half window from its start is
/// left unchanged.
pub fn refine_corners_subpix(img: &ImageF32, corners: &mut [Pt2], criteria: &SubPixCriteria) {
    if img.w < 3 || img.h < 3 || criteria.half_window == 0 {
        return;
    }
    let grad = sobel(img);
    for corner in corners.iter_mut() {
        *corner = refine_one(&grad, *corner, criteria);
    }
}

fn refine_one(grad: &Grad, start: Pt2, criteria: &SubPixCriteria) -> Pt2 {
    let hw = criteria.half_window as i32;
    let inv_w2 = 1.0 / (hw * hw) as Real;
    let mut q = start;

    for _ in 0..criteria.max_iters {
        let (mut a, mut b, mut c, mut bb1, mut bb2) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for dy in -hw..=hw {
            for dx in -hw..=hw {
                let px = q.x + dx as Real;
                let py = q.y + dy as Real;
                let (Some(gx), Some(gy)) = (
                    grad.gx.sample(px as f32, py as f32),
                    grad.gy.sample(px as f32, py as f32),
                ) else {
                    continue;
                };
                let (gx, gy) = (gx as Real, gy as Real);
                let w = (-((dx * dx + dy * dy) as Real) * inv_w2).exp();
                let gxx = gx * gx * w;
                let gxy = gx * gy * w;
                let gyy = gy * gy * w;
                a += gxx;
                b += gxy;
                c += gyy;
                bb1 += gxx * px + gxy * py;
                bb2 += gxy * px + gyy * py;
            }
        }
        let det = a * c - b * b;
        if det.abs() <= Real::EPSILON * (a * c).abs().max(1.0) {
            break;
        }
        let next = Pt2::new((c * bb1 - b * bb2) / det, (a * bb2 - b * bb1) / det);
        let moved = (next - q).norm();
        q = next;
        if moved < criteria.epsilon {
            break;
        }
    }

    if (q - start).norm() > hw as Real || !q.x.is_finite() || !q.y.is_finite() {
        start
    } else {
        q
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chessboard::ChessboardPattern;
    use crate::synthetic::render_chessboard;
    use fusion_core::{BrownConrady5, Camera, FxFyCxCySkew, Iso3};
    use nalgebra::{Translation3, UnitQuaternion, Vector3};

    #[test]
    fn converges_to_rendered_corner() {
        let cam = Camera::new(
            FxFyCxCySkew {
                fx: 500.0,
                fy: 500.0,
                cx: 160.0,
                cy: 120.0,
                skew: 0.0,
            },
            BrownConrady5::zero(8),
        );
        let pattern = ChessboardPattern {
            cols: 3,
            rows: 3,
            square_size: 0.04,
        };
        let rot = UnitQuaternion::from_scaled_axis(Vector3::new(0.1, 0.2, 0.3));
        let pose = Iso3::from_parts(
            Translation3::from(Vector3::new(0.0, 0.0, 0.5) - rot * Vector3::new(0.04, 0.04, 0.0)),
            rot,
        );
        let img = ImageF32::from_gray(&render_chessboard(&cam, &pose, &pattern, 320, 240));

        let truth: Vec<Pt2> = pattern
            .object_points()
            .iter()
            .map(|p| Pt2::from(cam.project_point(&pose.transform_point(p)).unwrap()))
            .collect();
        let mut corners: Vec<Pt2> = truth
            .iter()
            .map(|p| Pt2::new(p.x.round() + 0.4, p.y.round() - 0.3))
            .collect();
        refine_corners_subpix(&img, &mut corners, &SubPixCriteria::default());

        for (c, t) in corners.iter().zip(&truth) {
            assert!((c - t).norm() < 0.1, "{c:?} vs {t:?}");
        }
    }

    #[test]
    fn flat_region_leaves_corner_untouched() {
        let img = ImageF32::new(32, 32);
        let mut corners = vec![Pt2::new(16.2, 15.7)];
        refine_corners_subpix(&img, &mut corners, &SubPixCriteria::default());
        assert_eq!(corners[0], Pt2::new(16.2, 15.7));
    }
}
