//! P10/P90 intervals from the local linearisation or a residual bootstrap.

use std::collections::BTreeMap;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use statrs::distribution::{ContinuousCDF, StudentsT};
use tracing::{debug, instrument};
use welltest_model::AnalyticalModel;
use welltest_model::param::{INITIAL_PRESSURE, INITIAL_PRESSURE_INDEX};

use crate::error::FitError;
use crate::lm::{LmOutcome, LmSettings, StopReason, levenberg_marquardt};
use crate::objective::Objective;
use crate::result::ConfidenceInterval;

/// Upper quantile of the two-sided 80% interval.
const UPPER_QUANTILE: f64 = 0.9;

fn ordered(a: f64, b: f64) -> ConfidenceInterval {
    ConfidenceInterval {
        p10: a.min(b),
        p90: a.max(b),
    }
}

fn student_quantile(dof: usize) -> f64 {
    StudentsT::new(0.0, 1.0, dof.max(1) as f64)
        .map(|t| t.inverse_cdf(UPPER_QUANTILE))
        .unwrap_or(1.2816)
}

/// Linearised intervals: `θ ± t₀.₉ σ` with `σ² = diag(s² (JᵀWJ)⁻¹)` in the
/// optimiser's coordinates, mapped back to physical values.
///
/// Parameters whose covariance is singular or non-finite get their full
/// physical bounds.
pub(crate) fn sensitivity_intervals(
    objective: &Objective,
    outcome: &LmOutcome,
    params: &[f64],
) -> Result<BTreeMap<&'static str, ConfidenceInterval>, FitError> {
    let specs = objective.free_specs();
    let n = outcome.residuals.len();
    let dof = n.saturating_sub(specs.len()).max(1);
    let s2 = outcome.residuals.norm_squared() / dof as f64;
    let t = student_quantile(dof);
    let jtj = outcome.jacobian.transpose() * &outcome.jacobian;
    let covariance = jtj.try_inverse();

    let mut intervals = BTreeMap::new();
    for (i, spec) in specs.iter().enumerate() {
        let sigma = covariance.as_ref().map(|c| (s2 * c[(i, i)]).sqrt());
        let interval = match sigma {
            Some(sigma) if sigma.is_finite() => {
                let centre = outcome.theta[i];
                ordered(
                    spec.from_internal(centre - t * sigma),
                    spec.from_internal(centre + t * sigma),
                )
            }
            _ => ConfidenceInterval {
                p10: spec.lower,
                p90: spec.upper,
            },
        };
        intervals.insert(spec.name, interval);
    }

    let (pi, se) = objective.initial_pressure(params)?;
    let pi_t = student_quantile(objective.n_points().saturating_sub(1));
    intervals.insert(
        INITIAL_PRESSURE.name,
        ordered(pi - pi_t * se, pi + pi_t * se),
    );
    Ok(intervals)
}

/// Percentile with linear interpolation between order statistics.
pub(crate) fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Residual-bootstrap intervals and the number of refits they were built from.
///
/// Each resample draws fitted-point indices with replacement, adds the
/// paired ln-derivative and ln-ΔP residuals at those indices to the fitted
/// curves, and refits from the best estimate. Per-resample generators are
/// seeded from one master generator so results do not depend on the thread
/// count.
///
/// Refits share the deadline in `settings`: none starts after it has passed
/// and a refit cut short by it is discarded. The map is empty when no refit
/// finished.
#[instrument(skip_all, fields(resamples = resamples, seed = seed))]
pub(crate) fn bootstrap_intervals(
    objective: &Objective,
    outcome: &LmOutcome,
    params: &[f64],
    resamples: usize,
    seed: u64,
    settings: LmSettings,
) -> Result<(BTreeMap<&'static str, ConfidenceInterval>, usize), FitError> {
    let curves = objective.curves(params)?;
    let residual_der = objective.derivative_residuals(&curves);
    let residual_dp = objective.delta_p_residuals(&curves);
    let (obs_der, obs_dp) = objective.observations();
    let model_der: Vec<f64> = obs_der.iter().zip(&residual_der).map(|(o, e)| o - e).collect();
    let model_dp: Vec<f64> = obs_dp.iter().zip(&residual_dp).map(|(o, e)| o - e).collect();
    let n = model_der.len();
    let (lower, upper) = objective.bounds();

    let mut master_rng = ChaCha8Rng::seed_from_u64(seed);
    let seeds: Vec<u64> = (0..resamples).map(|_| master_rng.r#gen()).collect();

    let estimates: Vec<Vec<f64>> = seeds
        .into_par_iter()
        .filter_map(|seed| {
            if settings.expired() {
                return None;
            }
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut der = Vec::with_capacity(n);
            let mut dp = Vec::with_capacity(n);
            for i in 0..n {
                let j = rng.gen_range(0..n);
                der.push(model_der[i] + residual_der[j]);
                dp.push(model_dp[i] + residual_dp[j]);
            }
            let resampled = objective.with_observations(der, dp);
            let refit = levenberg_marquardt(
                |theta| resampled.residuals(theta),
                outcome.theta.clone(),
                &lower,
                &upper,
                settings,
            )
            .ok()
            .filter(|refit| refit.stop != StopReason::TimeBudget)?;
            let mut full = resampled.params(&refit.theta);
            full[INITIAL_PRESSURE_INDEX] = resampled.initial_pressure(&full).ok()?.0;
            Some(full)
        })
        .collect();
    let completed = estimates.len();
    debug!(completed, "bootstrap refits finished");
    if completed == 0 {
        return Ok((BTreeMap::new(), 0));
    }

    let specs = objective.model().param_specs();
    let mut intervals = BTreeMap::new();
    for (k, spec) in specs.iter().enumerate() {
        let mut values: Vec<f64> = estimates
            .iter()
            .map(|e| e[k])
            .filter(|v| v.is_finite())
            .collect();
        let interval = if values.is_empty() {
            ConfidenceInterval {
                p10: spec.lower,
                p90: spec.upper,
            }
        } else {
            values.sort_by(f64::total_cmp);
            ConfidenceInterval {
                p10: percentile(&values, 0.1),
                p90: percentile(&values, UPPER_QUANTILE),
            }
        };
        intervals.insert(spec.name, interval);
    }
    Ok((intervals, completed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_interpolates_linearly() {
        let v: Vec<f64> = (0..=10).map(f64::from).collect();
        assert!((percentile(&v, 0.1) - 1.0).abs() < 1e-12);
        assert!((percentile(&v, 0.9) - 9.0).abs() < 1e-12);
        assert!((percentile(&[1.0, 2.0], 0.5) - 1.5).abs() < 1e-12);
        assert_eq!(percentile(&[7.0], 0.9), 7.0);
    }

    #[test]
    fn student_quantile_approaches_normal() {
        assert!((student_quantile(10_000) - 1.2816).abs() < 1e-3);
        // t_{0.9, 5} = 1.4759.
        assert!((student_quantile(5) - 1.4759).abs() < 1e-3);
    }

    #[test]
    fn ordered_swaps_reversed_bounds() {
        let ci = ordered(3.0, 1.0);
        assert_eq!((ci.p10, ci.p90), (1.0, 3.0));
    }
}
