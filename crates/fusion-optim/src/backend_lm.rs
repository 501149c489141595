use crate::problem::{
    weighted_cost, weighted_jacobian, weighted_residuals, LeastSquaresModel, RefinementReport,
    SolveOptions, Solver, Termination,
};
use fusion_core::Real;
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt, TerminationReason};
use log::{debug, info};
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn};

struct LmWrapper<'a, M: LeastSquaresModel> {
    model: &'a M,
    params: DVector<Real>,
}

impl<M: LeastSquaresModel> LeastSquaresProblem<Real, Dyn, Dyn> for LmWrapper<'_, M> {
    type ResidualStorage = Owned<Real, Dyn>;
    type JacobianStorage = Owned<Real, Dyn, Dyn>;
    type ParameterStorage = Owned<Real, Dyn>;

    fn set_params(&mut self, x: &DVector<Real>) {
        self.params.clone_from(x);
    }

    fn params(&self) -> DVector<Real> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<Real>> {
        let r = weighted_residuals(self.model, &self.params);
        r.iter().all(|v| v.is_finite()).then_some(r)
    }

    fn jacobian(&self) -> Option<DMatrix<Real>> {
        let j = weighted_jacobian(self.model, &self.params);
        j.iter().all(|v| v.is_finite()).then_some(j)
    }
}

fn termination(reason: &TerminationReason) -> Termination {
    if reason.was_successful() {
        Termination::Converged
    } else if matches!(reason, TerminationReason::LostPatience) {
        Termination::BudgetExhausted
    } else {
        Termination::Failed
    }
}

/// Dense Levenberg-Marquardt backend (MINPACK port).
#[derive(Debug, Default, Clone)]
pub struct LmBackend;

impl Solver for LmBackend {
    fn minimize<M: LeastSquaresModel>(
        &self,
        model: &M,
        x0: DVector<Real>,
        opts: &SolveOptions,
    ) -> (DVector<Real>, RefinementReport) {
        let lm = LevenbergMarquardt::new()
            .with_ftol(opts.ftol)
            .with_xtol(opts.xtol)
            .with_gtol(opts.gtol)
            .with_patience(opts.max_iters.max(1));

        let initial_cost = weighted_cost(model, &x0);
        let wrapper = LmWrapper {
            model,
            params: x0,
        };
        let (wrapper, lm_report) = lm.minimize(wrapper);

        let report = RefinementReport {
            evaluations: lm_report.number_of_evaluations,
            initial_cost,
            final_cost: lm_report.objective_function,
            termination: termination(&lm_report.termination),
        };
        if opts.verbose {
            info!("lm: {report:?} ({:?})", lm_report.termination);
        } else {
            debug!("lm: {report:?} ({:?})", lm_report.termination);
        }

        (wrapper.params(), report)
    }
}

#[cfg(test)]
mod tests {
    use super::LmBackend;
    use crate::problem::{LeastSquaresModel, SolveOptions, Solver, Termination};
    use fusion_core::Real;
    use nalgebra::{DMatrix, DVector};

    /// Fit `y = a * exp(b * t)`.
    struct ExpFit {
        t: Vec<Real>,
        y: Vec<Real>,
    }

    impl LeastSquaresModel for ExpFit {
        fn num_params(&self) -> usize {
            2
        }

        fn num_residuals(&self) -> usize {
            self.t.len()
        }

        fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
            DVector::from_iterator(
                self.t.len(),
                self.t
                    .iter()
                    .zip(&self.y)
                    .map(|(t, y)| x[0] * (x[1] * t).exp() - y),
            )
        }

        fn jacobian(&self, x: &DVector<Real>) -> DMatrix<Real> {
            DMatrix::from_fn(self.t.len(), 2, |i, c| {
                let e = (x[1] * self.t[i]).exp();
                if c == 0 {
                    e
                } else {
                    x[0] * self.t[i] * e
                }
            })
        }
    }

    #[test]
    fn lm_backend_fits_exponential() {
        let t: Vec<Real> = (0..20).map(|i| i as Real * 0.1).collect();
        let y = t.iter().map(|t| 2.5 * (-1.3 * t).exp()).collect();
        let problem = ExpFit { t, y };

        let (x, report) = LmBackend.minimize(
            &problem,
            DVector::from_vec(vec![1.0, 0.0]),
            &SolveOptions::default(),
        );

        assert!((x[0] - 2.5).abs() < 1e-8, "a = {}", x[0]);
        assert!((x[1] + 1.3).abs() < 1e-8, "b = {}", x[1]);
        assert!(report.final_cost < 1e-16, "{report:?}");
        assert!(report.converged(), "{report:?}");
        assert!(report.evaluations > 0);
        assert!(report.initial_cost > report.final_cost);
    }

    #[test]
    fn tiny_budget_reports_exhaustion() {
        let t: Vec<Real> = (0..20).map(|i| i as Real * 0.1).collect();
        let y = t.iter().map(|t| 2.5 * (-1.3 * t).exp()).collect();
        let problem = ExpFit { t, y };

        let (_, report) = LmBackend.minimize(
            &problem,
            DVector::from_vec(vec![1.0, 0.0]),
            &SolveOptions {
                max_iters: 1,
                ..SolveOptions::default()
            },
        );
        assert_eq!(report.termination, Termination::BudgetExhausted, "{report:?}");
        assert!(!report.converged());
    }
}
