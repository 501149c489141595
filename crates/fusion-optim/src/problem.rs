//! Least-squares models, solver options and the refinement report.
//!
//! A model exposes raw residuals grouped in fixed-size blocks (two rows per
//! observed pixel for reprojection problems). Robust weighting is applied
//! per block: every row of a block is scaled by `sqrt(w)` with `w` taken
//! from the kernel at the block's squared norm.

use crate::robust::RobustKernel;
use fusion_core::Real;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

pub trait LeastSquaresModel {
    fn num_params(&self) -> usize;
    fn num_residuals(&self) -> usize;

    /// Raw residuals at `x`, before robust weighting.
    fn residuals(&self, x: &DVector<Real>) -> DVector<Real>;
    /// Jacobian of [`residuals`](Self::residuals).
    fn jacobian(&self, x: &DVector<Real>) -> DMatrix<Real>;

    fn kernel(&self) -> RobustKernel {
        RobustKernel::None
    }

    /// Residual rows sharing one robust weight.
    fn block_size(&self) -> usize {
        1
    }
}

/// `sqrt(w)` per residual row.
pub fn robust_row_scales<M: LeastSquaresModel + ?Sized>(model: &M, r: &DVector<Real>) -> DVector<Real> {
    let kernel = model.kernel();
    let mut scales = DVector::from_element(r.len(), 1.0);
    if kernel == RobustKernel::None {
        return scales;
    }
    let block = model.block_size().max(1);
    for start in (0..r.len()).step_by(block) {
        let end = (start + block).min(r.len());
        let r2 = r.rows(start, end - start).norm_squared();
        let s = kernel.rho_and_weight(r2).1.sqrt();
        scales.rows_mut(start, end - start).fill(s);
    }
    scales
}

/// Robustly weighted residuals, as seen by the solver.
pub fn weighted_residuals<M: LeastSquaresModel + ?Sized>(model: &M, x: &DVector<Real>) -> DVector<Real> {
    let r = model.residuals(x);
    let scales = robust_row_scales(model, &r);
    r.component_mul(&scales)
}

/// Jacobian rows scaled like [`weighted_residuals`]; the weights themselves
/// are not differentiated.
pub fn weighted_jacobian<M: LeastSquaresModel + ?Sized>(model: &M, x: &DVector<Real>) -> DMatrix<Real> {
    let scales = robust_row_scales(model, &model.residuals(x));
    let mut j = model.jacobian(x);
    for (mut row, s) in j.row_iter_mut().zip(scales.iter()) {
        if *s != 1.0 {
            row.scale_mut(*s);
        }
    }
    j
}

/// `0.5 * |r|²` of the weighted residuals.
pub fn weighted_cost<M: LeastSquaresModel + ?Sized>(model: &M, x: &DVector<Real>) -> Real {
    0.5 * weighted_residuals(model, x).norm_squared()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolveOptions {
    /// Iteration budget; the LM backend caps residual evaluations at
    /// `max_iters * (n + 1)`.
    pub max_iters: usize,
    /// Relative tolerance on the cost reduction.
    pub ftol: Real,
    pub gtol: Real,
    /// Relative tolerance on the parameter step.
    pub xtol: Real,
    /// Log the report at `info` instead of `debug`.
    pub verbose: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_iters: 100,
            ftol: 1e-12,
            gtol: 1e-12,
            xtol: 1e-12,
            verbose: false,
        }
    }
}

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// A tolerance was met or the residuals vanished.
    Converged,
    /// The evaluation budget ran out first.
    BudgetExhausted,
    /// Non-finite residuals or Jacobian, or an ill-posed problem.
    Failed,
}

/// Outcome of one refinement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementReport {
    /// Residual evaluations performed.
    pub evaluations: usize,
    /// Weighted `0.5 * |r|²` at the initial guess.
    pub initial_cost: Real,
    /// Weighted `0.5 * |r|²` at the solution.
    pub final_cost: Real,
    pub termination: Termination,
}

impl RefinementReport {
    pub fn converged(&self) -> bool {
        self.termination == Termination::Converged
    }

    /// Fraction of the initial cost removed, in `[0, 1]` for a descent.
    pub fn cost_reduction(&self) -> Real {
        if self.initial_cost <= 0.0 {
            return 0.0;
        }
        1.0 - self.final_cost / self.initial_cost
    }
}

/// Minimizes a [`LeastSquaresModel`] from an initial guess.
pub trait Solver {
    fn minimize<M: LeastSquaresModel>(
        &self,
        model: &M,
        x0: DVector<Real>,
        opts: &SolveOptions,
    ) -> (DVector<Real>, RefinementReport);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two pixel residuals `x - target_i`, each a 2-row block.
    struct Offsets {
        targets: Vec<[Real; 2]>,
        kernel: RobustKernel,
    }

    impl LeastSquaresModel for Offsets {
        fn num_params(&self) -> usize {
            2
        }

        fn num_residuals(&self) -> usize {
            2 * self.targets.len()
        }

        fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
            DVector::from_iterator(
                self.num_residuals(),
                self.targets.iter().flat_map(|t| [x[0] - t[0], x[1] - t[1]]),
            )
        }

        fn jacobian(&self, _x: &DVector<Real>) -> DMatrix<Real> {
            DMatrix::from_fn(self.num_residuals(), 2, |r, c| if r % 2 == c { 1.0 } else { 0.0 })
        }

        fn kernel(&self) -> RobustKernel {
            self.kernel
        }

        fn block_size(&self) -> usize {
            2
        }
    }

    #[test]
    fn huber_weight_is_shared_by_both_rows_of_a_point() {
        let model = Offsets {
            targets: vec![[0.0, 0.0], [3.0, 4.0]],
            kernel: RobustKernel::Huber { delta: 1.0 },
        };
        let x = DVector::from_vec(vec![0.0, 0.0]);
        let r = model.residuals(&x);
        let scales = robust_row_scales(&model, &r);
        assert_eq!(scales[0], 1.0);
        assert_eq!(scales[1], 1.0);
        // |r| = 5 > delta: w = 1/5 on both rows of the second point.
        let s = (0.2 as Real).sqrt();
        assert!((scales[2] - s).abs() < 1e-12 && (scales[3] - s).abs() < 1e-12);

        let rw = weighted_residuals(&model, &x);
        let j = weighted_jacobian(&model, &x);
        assert!((rw[3] + 4.0 * s).abs() < 1e-12);
        assert!((j[(3, 1)] - s).abs() < 1e-12);
        assert_eq!(j[(1, 1)], 1.0);
        assert!((weighted_cost(&model, &x) - 0.5 * 25.0 * 0.2).abs() < 1e-12);
    }

    #[test]
    fn plain_l2_leaves_rows_unscaled() {
        let model = Offsets {
            targets: vec![[1.0, 2.0]],
            kernel: RobustKernel::None,
        };
        let x = DVector::from_vec(vec![4.0, 6.0]);
        assert_eq!(weighted_cost(&model, &x), 12.5);
    }

    #[test]
    fn cost_reduction_of_a_report() {
        let report = RefinementReport {
            evaluations: 7,
            initial_cost: 8.0,
            final_cost: 2.0,
            termination: Termination::Converged,
        };
        assert!(report.converged());
        assert_eq!(report.cost_reduction(), 0.75);
    }
}
