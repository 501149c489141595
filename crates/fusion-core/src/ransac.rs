//! Generic, model-agnostic RANSAC implementation.
//!
//! Implement [`Estimator`] for your model and call [`ransac`] with a slice of
//! input data, some [`RansacOptions`] and a random-number generator owned by
//! the caller. Seeding that generator makes a run reproducible.
//!
//! When consensus is not found, [`ransac`] returns a [`RansacResult`] with
//! `success == false` and `model == None`.

use log::debug;
use rand::prelude::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Configuration parameters for the generic RANSAC engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacOptions {
    /// Maximum number of RANSAC iterations.
    pub max_iters: usize,
    /// Inlier residual threshold.
    pub thresh: f64,
    /// Minimum number of inliers required to accept a model.
    pub min_inliers: usize,
    /// Desired confidence level in `[0, 1]`; `0` disables early termination.
    pub confidence: f64,
    /// Seed used by pipelines to build the generator handed to [`ransac`].
    pub seed: u64,
    /// If `true`, refit the best model on all of its inliers after sampling.
    pub refit_on_inliers: bool,
}

impl Default for RansacOptions {
    fn default() -> Self {
        Self {
            max_iters: 2000,
            thresh: 3.0,
            min_inliers: 8,
            confidence: 0.999,
            seed: 1_234_567,
            refit_on_inliers: true,
        }
    }
}

/// Output of a RANSAC run.
///
/// Check the [`success`](Self::success) flag before using the model.
#[derive(Debug, Clone)]
pub struct RansacResult<M> {
    /// Whether a consensus set satisfying the options was found.
    pub success: bool,
    /// Best model found (if any).
    pub model: Option<M>,
    /// Indices of inlier data points, ascending.
    pub inliers: Vec<usize>,
    /// Root-mean-square residual over inliers.
    pub inlier_rms: f64,
    /// Number of iterations actually performed.
    pub iters: usize,
    /// Best inlier count retained after each iteration.
    pub best_inlier_history: Vec<usize>,
}

impl<M> Default for RansacResult<M> {
    fn default() -> Self {
        Self {
            success: false,
            model: None,
            inliers: Vec::new(),
            inlier_rms: f64::INFINITY,
            iters: 0,
            best_inlier_history: Vec::new(),
        }
    }
}

/// Generic estimator for RANSAC-like methods.
pub trait Estimator {
    type Datum;
    type Model;

    /// Minimal number of samples needed to estimate a model.
    const MIN_SAMPLES: usize;

    /// Fit a model from a subset of data indices.
    ///
    /// Return `None` if the subset is degenerate or fitting fails.
    fn fit(data: &[Self::Datum], sample_indices: &[usize]) -> Option<Self::Model>;

    /// Non-negative residual for one datum, in the units of `opts.thresh`.
    fn residual(model: &Self::Model, datum: &Self::Datum) -> f64;

    /// Optional degeneracy check on the sample subset.
    fn is_degenerate(_data: &[Self::Datum], _sample_indices: &[usize]) -> bool {
        false
    }

    /// Optional refit on the full inlier set.
    fn refit(_data: &[Self::Datum], _inliers: &[usize]) -> Option<Self::Model> {
        None
    }
}

fn rms(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return f64::INFINITY;
    }
    let ss: f64 = vals.iter().map(|&v| v * v).sum();
    (ss / (vals.len() as f64)).sqrt()
}

/// Dynamic iteration bound from the current inlier ratio.
fn calculate_iterations(
    confidence: f64,
    inlier_ratio: f64,
    min_samples: usize,
    iters_so_far: usize,
    max_iters: usize,
) -> usize {
    if confidence <= 0.0 || inlier_ratio <= 0.0 {
        return max_iters;
    }

    let p = confidence.min(1.0 - 1e-12);
    let w = inlier_ratio;
    let m = min_samples as f64;

    let denom = (1.0 - w.powf(m)).max(1e-12).ln();
    if denom >= 0.0 {
        return max_iters;
    }

    let n_iter = ((1.0 - p).ln() / denom).ceil() as usize;
    n_iter.clamp(iters_so_far, max_iters)
}

fn score<E: Estimator>(
    data: &[E::Datum],
    model: &E::Model,
    thresh: f64,
    inliers: &mut Vec<usize>,
    residuals: &mut Vec<f64>,
) {
    inliers.clear();
    residuals.clear();
    for (i, datum) in data.iter().enumerate() {
        let r = E::residual(model, datum);
        if r <= thresh {
            inliers.push(i);
            residuals.push(r);
        }
    }
}

/// Run a generic RANSAC loop for a given [`Estimator`] implementation.
///
/// Only a strictly larger inlier count replaces the best candidate, so ties
/// keep the earliest trial. The retained count never decreases; the per
/// iteration trace is exposed in [`RansacResult::best_inlier_history`].
pub fn ransac<E, R>(data: &[E::Datum], opts: &RansacOptions, rng: &mut R) -> RansacResult<E::Model>
where
    E: Estimator,
    R: Rng + ?Sized,
{
    let mut best: RansacResult<E::Model> = RansacResult::default();

    if data.len() < E::MIN_SAMPLES {
        return best;
    }

    let all_indices: Vec<usize> = (0..data.len()).collect();
    let mut sample_idxs = vec![0usize; E::MIN_SAMPLES];

    let mut dynamic_max_iters = opts.max_iters;

    let mut inliers = Vec::<usize>::with_capacity(data.len());
    let mut inlier_residuals = Vec::<f64>::with_capacity(data.len());
    let mut best_residuals = Vec::<f64>::new();

    let mut num_iters = 0;
    while num_iters < dynamic_max_iters {
        num_iters += 1;
        all_indices
            .as_slice()
            .choose_multiple(rng, E::MIN_SAMPLES)
            .enumerate()
            .for_each(|(k, &idx)| sample_idxs[k] = idx);

        let candidate = if E::is_degenerate(data, &sample_idxs) {
            None
        } else {
            E::fit(data, &sample_idxs)
        };

        if let Some(model) = candidate {
            score::<E>(data, &model, opts.thresh, &mut inliers, &mut inlier_residuals);

            if inliers.len() >= opts.min_inliers && inliers.len() > best.inliers.len() {
                best.success = true;
                best.model = Some(model);
                best.inliers.clone_from(&inliers);
                best_residuals.clone_from(&inlier_residuals);
                best.inlier_rms = rms(&best_residuals);

                let inlier_ratio = best.inliers.len() as f64 / data.len() as f64;
                dynamic_max_iters = calculate_iterations(
                    opts.confidence,
                    inlier_ratio,
                    E::MIN_SAMPLES,
                    num_iters,
                    opts.max_iters,
                );
            }
        }

        best.best_inlier_history.push(best.inliers.len());
    }
    best.iters = num_iters;

    if best.success && opts.refit_on_inliers {
        if let Some(refined) = E::refit(data, &best.inliers) {
            score::<E>(
                data,
                &refined,
                opts.thresh,
                &mut inliers,
                &mut inlier_residuals,
            );
            if inliers.len() >= best.inliers.len() {
                best.model = Some(refined);
                best.inliers.clone_from(&inliers);
                best.inlier_rms = rms(&inlier_residuals);
            }
        }
    }

    debug!(
        "ransac: {} iterations, {} / {} inliers, rms {:.4}",
        best.iters,
        best.inliers.len(),
        data.len(),
        best.inlier_rms
    );

    best
}
