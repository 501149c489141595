//! Linear initialisation followed by LM refinement on synthetic chessboard views.
//!
//! Validates that:
//! 1. the iterative closed-form init lands close enough for LM,
//! 2. joint refinement recovers intrinsics and radial distortion,
//! 3. an outlier corner is down-weighted by the Huber kernel.

use fusion_core::{synthetic::planar, BrownConrady5, Camera, FxFyCxCySkew, Pt2, Real};
use fusion_linear::{
    iterative_intrinsics::{estimate_intrinsics_iterative, IterativeIntrinsicsOptions},
    PlanarPoseSolver,
};
use fusion_optim::{
    backend_lm::LmBackend,
    planar_intrinsics::{refine_planar_intrinsics, DistortionMask, PlanarIntrinsicsProblem},
    robust::RobustKernel,
    SolveOptions,
};

fn ground_truth() -> Camera<Real, BrownConrady5<Real>> {
    let k = FxFyCxCySkew {
        fx: 800.0,
        fy: 780.0,
        cx: 640.0,
        cy: 360.0,
        skew: 0.0,
    };
    let dist = BrownConrady5 {
        k1: -0.2,
        k2: 0.05,
        k3: 0.0,
        p1: 0.0,
        p2: 0.0,
        iters: 8,
    };
    Camera::new(k, dist)
}

fn init_and_refine(
    views: Vec<fusion_core::CorrespondenceView>,
    kernel: RobustKernel,
) -> fusion_optim::planar_intrinsics::PlanarIntrinsicsEstimate {
    let init = estimate_intrinsics_iterative(&views, IterativeIntrinsicsOptions::default())
        .expect("linear init");
    let k = init.intrinsics.k_matrix();
    let poses: Vec<_> = init
        .homographies
        .iter()
        .map(|h| PlanarPoseSolver::from_homography(&k, h).expect("pose init"))
        .collect();

    let problem = PlanarIntrinsicsProblem::new(views)
        .expect("problem")
        .with_kernel(kernel)
        .with_mask(DistortionMask {
            fix_k3: true,
            fix_tangential: true,
        });
    let init_cam = Camera::new(init.intrinsics, init.distortion);
    refine_planar_intrinsics(&LmBackend, problem, &init_cam, &poses, &SolveOptions::default())
        .expect("refinement")
}

#[test]
fn init_then_refine_recovers_camera() {
    let cam_gt = ground_truth();
    let board = planar::grid_points(9, 6, 0.03);
    let poses_gt = planar::poses_tilted(8, 0.24, 0.15, 0.55, 0.35);
    let views = planar::project_views_all(&cam_gt, &board, &poses_gt).unwrap();

    let est = init_and_refine(views, RobustKernel::None);

    assert!((est.camera.k.fx - 800.0).abs() < 0.5, "{:?}", est.camera.k);
    assert!((est.camera.k.fy - 780.0).abs() < 0.5);
    assert!((est.camera.k.cx - 640.0).abs() < 0.5);
    assert!((est.camera.k.cy - 360.0).abs() < 0.5);
    assert!((est.camera.dist.k1 + 0.2).abs() < 0.01, "{:?}", est.camera.dist);
    assert!(est.rms < 1e-3, "rms {}", est.rms);
    assert_eq!(est.poses.len(), 8);
    for (p, gt) in est.poses.iter().zip(&poses_gt) {
        assert!((p.translation.vector - gt.translation.vector).norm() < 1e-3);
    }
}

#[test]
fn huber_kernel_tolerates_a_displaced_corner() {
    let cam_gt = ground_truth();
    let board = planar::grid_points(9, 6, 0.03);
    let poses_gt = planar::poses_tilted(8, 0.24, 0.15, 0.55, 0.35);
    let mut views = planar::project_views_all(&cam_gt, &board, &poses_gt).unwrap();
    let px = views[2].points_2d[10];
    views[2].points_2d[10] = Pt2::new(px.x + 15.0, px.y - 10.0);

    let est = init_and_refine(views, RobustKernel::Huber { delta: 1.0 });

    assert!((est.camera.k.fx - 800.0).abs() < 2.0, "{:?}", est.camera.k);
    assert!((est.camera.k.cy - 360.0).abs() < 2.0);
    assert!(est.per_view[2].max > 10.0);
    assert!(est.per_view[0].rms < 0.2);
}
