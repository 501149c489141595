//! Synthetic planar target helpers.

use crate::{models::DistortionModel, Camera, CorrespondenceView, Iso3, Pt2, Pt3, Real};
use anyhow::Result;
use nalgebra::{Translation3, UnitQuaternion, Vector3};

/// Generate a planar grid of 3D points (Z=0) with `nx * ny` points.
///
/// Points are ordered row-major (X fastest): `(x = 0..nx-1, y = 0..ny-1)`.
pub fn grid_points(nx: usize, ny: usize, spacing: Real) -> Vec<Pt3> {
    let mut points = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            points.push(Pt3::new(i as Real * spacing, j as Real * spacing, 0.0));
        }
    }
    points
}

/// Generate `n_views` poses with a yaw rotation around +Y and a Z translation ramp.
pub fn poses_yaw_y_z(
    n_views: usize,
    yaw_start_rad: Real,
    yaw_step_rad: Real,
    z_start: Real,
    z_step: Real,
) -> Vec<Iso3> {
    (0..n_views)
        .map(|view_idx| {
            let yaw = yaw_start_rad + yaw_step_rad * view_idx as Real;
            let rotation = UnitQuaternion::from_scaled_axis(Vector3::y() * yaw);
            let translation = Vector3::new(0.0, 0.0, z_start + z_step * view_idx as Real);
            Iso3::from_parts(Translation3::from(translation), rotation)
        })
        .collect()
}

/// Poses that look at the center of a `width x height` board from `distance`,
/// tilting alternately about X and Y so that no two views share a rotation axis.
///
/// The board center lands on the optical axis; `tilt_rad` is the tilt magnitude.
pub fn poses_tilted(
    n_views: usize,
    board_width: Real,
    board_height: Real,
    distance: Real,
    tilt_rad: Real,
) -> Vec<Iso3> {
    let center = Vector3::new(board_width * 0.5, board_height * 0.5, 0.0);
    (0..n_views)
        .map(|i| {
            let phase = i as Real * std::f64::consts::TAU / n_views.max(1) as Real;
            let axis = Vector3::new(phase.cos(), phase.sin(), 0.0);
            let tilt = tilt_rad * (0.6 + 0.4 * ((i % 3) as Real / 2.0));
            let roll = 0.08 * ((i % 4) as Real - 1.5);
            let rotation = UnitQuaternion::from_scaled_axis(axis * tilt)
                * UnitQuaternion::from_scaled_axis(Vector3::z() * roll);
            let t = Vector3::new(0.0, 0.0, distance * (1.0 + 0.05 * (i % 2) as Real))
                - rotation * center;
            Iso3::from_parts(Translation3::from(t), rotation)
        })
        .collect()
}

/// Project a planar target into the camera, requiring every point to be projectable.
///
/// `cam_from_target` must map target-frame points into the camera frame.
pub fn project_view_all<D>(
    camera: &Camera<Real, D>,
    cam_from_target: &Iso3,
    target_points: &[Pt3],
) -> Result<CorrespondenceView>
where
    D: DistortionModel<Real>,
{
    let mut pixels = Vec::with_capacity(target_points.len());
    for (idx, pw) in target_points.iter().enumerate() {
        let pc = cam_from_target.transform_point(pw);
        let Some(uv) = camera.project_point(&pc) else {
            anyhow::bail!("point {idx} not projectable (z={:.6})", pc.z);
        };
        pixels.push(Pt2::from(uv));
    }

    CorrespondenceView::new(target_points.to_vec(), pixels)
}

/// Project multiple views, requiring every point to be projectable in every view.
pub fn project_views_all<D>(
    camera: &Camera<Real, D>,
    target_points: &[Pt3],
    cam_from_target: &[Iso3],
) -> Result<Vec<CorrespondenceView>>
where
    D: DistortionModel<Real>,
{
    cam_from_target
        .iter()
        .map(|pose| project_view_all(camera, pose, target_points))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FxFyCxCySkew, NoDistortion};

    #[test]
    fn grid_points_order_is_stable() {
        let pts = grid_points(2, 3, 0.5);
        assert_eq!(pts.len(), 6);
        assert_eq!(pts[0], Pt3::new(0.0, 0.0, 0.0));
        assert_eq!(pts[1], Pt3::new(0.5, 0.0, 0.0));
        assert_eq!(pts[2], Pt3::new(0.0, 0.5, 0.0));
    }

    #[test]
    fn tilted_poses_center_the_board() {
        let k = FxFyCxCySkew {
            fx: 600.0,
            fy: 600.0,
            cx: 320.0,
            cy: 240.0,
            skew: 0.0,
        };
        let cam = Camera::new(k, NoDistortion);
        let poses = poses_tilted(6, 0.3, 0.2, 1.0, 0.3);
        for pose in &poses {
            let c = pose.transform_point(&Pt3::new(0.15, 0.1, 0.0));
            let px = cam.project_point(&c).unwrap();
            assert!((px.x - 320.0).abs() < 1e-9 && (px.y - 240.0).abs() < 1e-9);
        }
    }

    #[test]
    fn project_view_all_rejects_points_behind_camera() {
        let k = FxFyCxCySkew {
            fx: 800.0,
            fy: 800.0,
            cx: 640.0,
            cy: 360.0,
            skew: 0.0,
        };
        let cam = Camera::new(k, NoDistortion);
        let pose = Iso3::translation(0.0, 0.0, -1.0);
        assert!(project_view_all(&cam, &pose, &grid_points(2, 2, 0.1)).is_err());
    }
}
