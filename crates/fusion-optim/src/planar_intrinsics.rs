//! Joint refinement of intrinsics, distortion and per-view board poses.
//!
//! Parameter layout:
//! `[fx, fy, cx, cy, <free distortion coefficients>, (ω, t) per view]`
//! where the free distortion coefficients are the unmasked entries of
//! `k1, k2, p1, p2, k3` (in that order) and each pose is an axis-angle
//! rotation followed by a translation. Skew is held at zero.

use crate::{robust::RobustKernel, LeastSquaresModel, RefinementReport, SolveOptions, Solver};
use fusion_core::{
    BrownConrady5, Camera, CorrespondenceView, FusionError, FxFyCxCySkew, Iso3, PinholeCamera,
    Real, ReprojectionStats,
};
use log::debug;
use nalgebra::{DMatrix, DVector, Translation3, UnitQuaternion, Vector2, Vector3};
use serde::{Deserialize, Serialize};

const POSE_DIM: usize = 6;
const INTRINSICS_DIM: usize = 4;

/// Which distortion coefficients are optimized; masked ones stay at their initial value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistortionMask {
    pub fix_k3: bool,
    pub fix_tangential: bool,
}

impl DistortionMask {
    /// Free flags in `[k1, k2, p1, p2, k3]` order.
    fn free(&self) -> [bool; 5] {
        [
            true,
            true,
            !self.fix_tangential,
            !self.fix_tangential,
            !self.fix_k3,
        ]
    }

    fn num_free(&self) -> usize {
        self.free().iter().filter(|f| **f).count()
    }
}

/// Non-linear refinement problem for planar intrinsics and per-view poses.
#[derive(Debug, Clone)]
pub struct PlanarIntrinsicsProblem {
    views: Vec<CorrespondenceView>,
    kernel: RobustKernel,
    mask: DistortionMask,
    /// Values of masked distortion coefficients, `[k1, k2, p1, p2, k3]`.
    fixed_distortion: [Real; 5],
    undistort_iters: u32,
}

impl PlanarIntrinsicsProblem {
    /// # Errors
    ///
    /// `Estimation` if there are no views or a view has fewer than 4 points.
    pub fn new(views: Vec<CorrespondenceView>) -> Result<Self, FusionError> {
        if views.is_empty() {
            return Err(FusionError::estimation("need at least one view for calibration"));
        }
        if let Some((i, v)) = views.iter().enumerate().find(|(_, v)| v.len() < 4) {
            return Err(FusionError::estimation(format!(
                "view {i} has too few points ({} < 4)",
                v.len()
            )));
        }
        Ok(Self {
            views,
            kernel: RobustKernel::None,
            mask: DistortionMask::default(),
            fixed_distortion: [0.0; 5],
            undistort_iters: 8,
        })
    }

    pub fn with_kernel(mut self, kernel: RobustKernel) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn with_mask(mut self, mask: DistortionMask) -> Self {
        self.mask = mask;
        self
    }

    pub fn num_views(&self) -> usize {
        self.views.len()
    }

    pub fn views(&self) -> &[CorrespondenceView] {
        &self.views
    }

    fn pose_offset(&self) -> usize {
        INTRINSICS_DIM + self.mask.num_free()
    }

    /// Pack the initial camera and poses; also records masked coefficient values.
    pub fn pack_initial_params(
        &mut self,
        camera: &PinholeCamera,
        poses: &[Iso3],
    ) -> Result<DVector<Real>, FusionError> {
        if poses.len() != self.num_views() {
            return Err(FusionError::estimation(format!(
                "{} poses for {} views",
                poses.len(),
                self.num_views()
            )));
        }
        self.fixed_distortion = camera.dist.coeffs();
        self.undistort_iters = camera.dist.iters;

        let mut x = DVector::zeros(self.num_params());
        x[0] = camera.k.fx;
        x[1] = camera.k.fy;
        x[2] = camera.k.cx;
        x[3] = camera.k.cy;

        let mut idx = INTRINSICS_DIM;
        for (coeff, free) in camera.dist.coeffs().iter().zip(self.mask.free()) {
            if free {
                x[idx] = *coeff;
                idx += 1;
            }
        }

        for (i, pose) in poses.iter().enumerate() {
            let base = self.pose_offset() + POSE_DIM * i;
            let w = pose.rotation.scaled_axis();
            let t = pose.translation.vector;
            x.rows_mut(base, 3).copy_from(&w);
            x.rows_mut(base + 3, 3).copy_from(&t);
        }
        Ok(x)
    }

    fn decode_camera(&self, x: &DVector<Real>) -> PinholeCamera {
        let k = FxFyCxCySkew {
            fx: x[0],
            fy: x[1],
            cx: x[2],
            cy: x[3],
            skew: 0.0,
        };
        let mut coeffs = self.fixed_distortion;
        let mut idx = INTRINSICS_DIM;
        for (c, free) in coeffs.iter_mut().zip(self.mask.free()) {
            if free {
                *c = x[idx];
                idx += 1;
            }
        }
        Camera::new(k, BrownConrady5::from_coeffs(coeffs, self.undistort_iters))
    }

    fn decode_pose(&self, x: &DVector<Real>, view: usize) -> Iso3 {
        let base = self.pose_offset() + POSE_DIM * view;
        let w = Vector3::new(x[base], x[base + 1], x[base + 2]);
        let t = Vector3::new(x[base + 3], x[base + 4], x[base + 5]);
        Iso3::from_parts(Translation3::from(t), UnitQuaternion::from_scaled_axis(w))
    }

    /// Decode a parameter vector into camera and board poses.
    pub fn decode_params(&self, x: &DVector<Real>) -> (PinholeCamera, Vec<Iso3>) {
        let camera = self.decode_camera(x);
        let poses = (0..self.num_views())
            .map(|i| self.decode_pose(x, i))
            .collect();
        (camera, poses)
    }

    fn view_residuals(camera: &PinholeCamera, pose: &Iso3, view: &CorrespondenceView, out: &mut [Real]) {
        for (j, (pw, meas)) in view.iter().enumerate() {
            let pc = pose.transform_point(pw);
            // Behind-camera points get a large constant residual.
            let proj = camera
                .project_point(&pc)
                .unwrap_or_else(|| Vector2::new(1e6, 1e6));
            out[2 * j] = proj.x - meas.x;
            out[2 * j + 1] = proj.y - meas.y;
        }
    }

    fn row_offsets(&self) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(self.views.len() + 1);
        let mut acc = 0;
        offsets.push(0);
        for v in &self.views {
            acc += 2 * v.len();
            offsets.push(acc);
        }
        offsets
    }
}

impl LeastSquaresModel for PlanarIntrinsicsProblem {
    fn num_params(&self) -> usize {
        self.pose_offset() + POSE_DIM * self.num_views()
    }

    fn num_residuals(&self) -> usize {
        self.views.iter().map(|v| 2 * v.len()).sum()
    }

    fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
        let camera = self.decode_camera(x);
        let offsets = self.row_offsets();
        let mut r = DVector::zeros(self.num_residuals());
        for (i, view) in self.views.iter().enumerate() {
            let pose = self.decode_pose(x, i);
            Self::view_residuals(
                &camera,
                &pose,
                view,
                &mut r.as_mut_slice()[offsets[i]..offsets[i + 1]],
            );
        }
        r
    }

    /// Central differences; pose columns only touch their own view's rows.
    fn jacobian(&self, x: &DVector<Real>) -> DMatrix<Real> {
        let m = self.num_residuals();
        let n = x.len();
        let offsets = self.row_offsets();
        let mut j = DMatrix::zeros(m, n);
        let step = |v: Real| 1e-6 * v.abs().max(1.0);

        for k in 0..self.pose_offset() {
            let h = step(x[k]);
            let mut xp = x.clone();
            let mut xm = x.clone();
            xp[k] += h;
            xm[k] -= h;
            let diff = (self.residuals(&xp) - self.residuals(&xm)) / (2.0 * h);
            j.set_column(k, &diff);
        }

        let camera = self.decode_camera(x);
        for (i, view) in self.views.iter().enumerate() {
            let rows = offsets[i + 1] - offsets[i];
            let mut rp = vec![0.0; rows];
            let mut rm = vec![0.0; rows];
            for d in 0..POSE_DIM {
                let k = self.pose_offset() + POSE_DIM * i + d;
                let h = step(x[k]);
                let mut xp = x.clone();
                let mut xm = x.clone();
                xp[k] += h;
                xm[k] -= h;
                Self::view_residuals(&camera, &self.decode_pose(&xp, i), view, &mut rp);
                Self::view_residuals(&camera, &self.decode_pose(&xm, i), view, &mut rm);
                for (row, (a, b)) in rp.iter().zip(&rm).enumerate() {
                    j[(offsets[i] + row, k)] = (a - b) / (2.0 * h);
                }
            }
        }
        j
    }

    fn kernel(&self) -> RobustKernel {
        self.kernel
    }

    /// One `(du, dv)` pair per observed corner.
    fn block_size(&self) -> usize {
        2
    }
}

/// Refined camera, poses and residual statistics.
#[derive(Debug, Clone)]
pub struct PlanarIntrinsicsEstimate {
    pub camera: PinholeCamera,
    /// Board-to-camera pose per view.
    pub poses: Vec<Iso3>,
    pub per_view: Vec<ReprojectionStats>,
    /// RMS over all points of all views.
    pub rms: Real,
    pub report: RefinementReport,
}

/// Per-view reprojection statistics of `camera` and `poses`.
pub fn reprojection_stats(
    camera: &PinholeCamera,
    poses: &[Iso3],
    views: &[CorrespondenceView],
) -> Vec<ReprojectionStats> {
    views
        .iter()
        .zip(poses)
        .map(|(view, pose)| {
            let errors: Vec<Real> = view
                .iter()
                .map(|(pw, px)| match camera.project_point(&pose.transform_point(pw)) {
                    Some(p) => (p - px.coords).norm(),
                    None => Real::INFINITY,
                })
                .collect();
            ReprojectionStats::from_errors(&errors)
        })
        .collect()
}

/// Refine camera intrinsics, distortion and per-view poses from an initial guess.
pub fn refine_planar_intrinsics<S: Solver>(
    solver: &S,
    mut problem: PlanarIntrinsicsProblem,
    init_camera: &PinholeCamera,
    init_poses: &[Iso3],
    opts: &SolveOptions,
) -> Result<PlanarIntrinsicsEstimate, FusionError> {
    let x0 = problem.pack_initial_params(init_camera, init_poses)?;
    let (x_opt, report) = solver.minimize(&problem, x0, opts);
    if x_opt.iter().any(|v| !v.is_finite()) {
        return Err(FusionError::degenerate("refinement diverged"));
    }

    let (camera, poses) = problem.decode_params(&x_opt);
    let per_view = reprojection_stats(&camera, &poses, problem.views());
    let rms = ReprojectionStats::combine(&per_view).rms;
    debug!(
        "planar refinement: rms {:.4} px over {} views, {:?} after {} evaluations",
        rms,
        per_view.len(),
        report.termination,
        report.evaluations
    );

    Ok(PlanarIntrinsicsEstimate {
        camera,
        poses,
        per_view,
        rms,
        report,
    })
}
