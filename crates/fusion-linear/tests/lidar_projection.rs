use fusion_core::{CorrespondenceView, FxFyCxCySkew, Iso3, Mat34, Pt2, Pt3};
use fusion_linear::{ProjectionMatrix, ProjectionSolver};
use nalgebra::{Translation3, UnitQuaternion, Vector3};

/// LiDAR-to-mosaic projection `K [R | t]` of a forward-looking rig.
fn rig_projection() -> ProjectionMatrix {
    let k = FxFyCxCySkew {
        fx: 910.0,
        fy: 905.0,
        cx: 960.0,
        cy: 540.0,
        skew: 0.0,
    }
    .k_matrix();
    // LiDAR x forward, y left, z up -> camera x right, y down, z forward.
    let axes = nalgebra::Rotation3::from_matrix_unchecked(nalgebra::Matrix3::new(
        0.0, -1.0, 0.0, //
        0.0, 0.0, -1.0, //
        1.0, 0.0, 0.0,
    ));
    let cam_from_lidar = Iso3::from_parts(
        Translation3::new(0.05, -0.3, 0.1),
        UnitQuaternion::from_scaled_axis(Vector3::new(0.01, -0.02, 0.015))
            * UnitQuaternion::from_rotation_matrix(&axes),
    );
    let rt = cam_from_lidar.to_homogeneous();
    let p: Mat34 = k * rt.fixed_view::<3, 4>(0, 0);
    ProjectionMatrix::new(p)
}

#[test]
fn held_out_lidar_point_agrees_between_true_and_solved_projection() {
    let truth = rig_projection();
    let lidar = vec![
        Pt3::new(8.0, 1.5, -0.8),
        Pt3::new(12.0, -2.0, 0.5),
        Pt3::new(6.5, 0.3, 1.2),
        Pt3::new(15.0, 3.5, -1.0),
        Pt3::new(9.0, -3.0, -0.2),
        Pt3::new(20.0, 0.0, 2.0),
    ];
    let pixels: Vec<Pt2> = lidar.iter().map(|p| truth.project(p).unwrap()).collect();
    let view = CorrespondenceView::new(lidar, pixels).unwrap();

    let solved = ProjectionSolver::from_view(&view).unwrap();

    let held_out = Pt3::new(10.0, -1.0, 0.3);
    let expected = truth.project(&held_out).unwrap();
    let got = solved.project(&held_out).unwrap();
    assert!((expected - got).norm() < 1e-4, "{expected} vs {got}");
    assert_eq!(
        truth.project_to_pixel(&held_out).unwrap(),
        solved.project_to_pixel(&held_out).unwrap()
    );

    let errors = solved.reprojection_errors(&view).unwrap();
    assert!(errors.iter().all(|e| *e < 1e-6));
}
