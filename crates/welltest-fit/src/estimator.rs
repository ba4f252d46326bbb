//! Fit one reservoir model to the diagnostics of a flow period.

use std::collections::BTreeMap;
use std::time::Instant;

use tracing::{info, instrument, warn};
use welltest_diag::{DiagnosticSeries, FlowRegime, RegimeLabel};
use welltest_model::param::{INITIAL_PRESSURE_INDEX, KH_INDEX};
use welltest_model::{AnalyticalModel, ReservoirModel};
use welltest_series::TestConfiguration;

use crate::boundary::boundary_distance;
use crate::config::{ConfidenceMethod, FitConfig};
use crate::confidence::{bootstrap_intervals, sensitivity_intervals};
use crate::error::FitError;
use crate::guess::initial_guess;
use crate::lm::{LmSettings, StopReason, levenberg_marquardt};
use crate::objective::Objective;
use crate::result::{FitResult, FitWarning, ModelFitSeries};

/// Regimes that contradict the signature of `model`.
fn mismatches(model: ReservoirModel, regimes: &[FlowRegime]) -> Vec<FitWarning> {
    let has = |label: RegimeLabel| regimes.iter().any(|r| r.label == label);
    let mut warnings = Vec::new();
    let mut mismatch = |reason: &str| {
        warnings.push(FitWarning::ModelMismatch {
            model,
            reason: reason.to_owned(),
        });
    };
    if model.has_boundary() && !has(RegimeLabel::BoundaryDominated) {
        mismatch("no boundary-dominated regime was classified");
    }
    if has(RegimeLabel::PseudoSteadyState) {
        mismatch("late unit slope indicates a closed reservoir");
    }
    if model == ReservoirModel::HomogeneousWbsSkin && has(RegimeLabel::BoundaryDominated) {
        mismatch("a boundary-dominated regime was classified");
    }
    warnings
}

/// Fit `model` to `diagnostics` by bounded Levenberg–Marquardt.
///
/// Residuals are `ln(observed) − ln(model)` for the smoothed derivative and,
/// when enabled, for ΔP, weighted so every log-decade of elapsed time counts
/// equally. The model derivative is taken on the observed axis with the
/// observed smoothing. The initial pressure is solved in closed form after
/// the iterated parameters converge, since ΔP does not depend on it.
///
/// Running out of iterations or time, or failing to improve on the initial
/// guess, still returns the best iterate with `converged = false` and a
/// [`FitWarning::NonConvergence`]. The time budget covers the whole call,
/// bootstrap refits included; a bootstrap cut short adds a
/// [`FitWarning::BootstrapTruncated`]. Regimes that contradict the model add
/// a [`FitWarning::ModelMismatch`].
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`FitError::InvalidConfiguration`] | `config` fails validation |
/// | [`FitError::InsufficientData`] | Fewer usable points than free parameters + 1 |
/// | [`FitError::UnknownParameter`] | An initial guess names a parameter the model lacks |
/// | [`FitError::Model`] | The model cannot be evaluated at the initial guess |
#[instrument(skip_all, fields(model = model.name(), n_points = diagnostics.len()))]
pub fn fit(
    diagnostics: &DiagnosticSeries,
    regimes: &[FlowRegime],
    model: ReservoirModel,
    test: &TestConfiguration,
    config: &FitConfig,
) -> Result<FitResult, FitError> {
    let started = Instant::now();
    config.validate()?;
    let objective = Objective::new(diagnostics, model, test, config)?;
    let guess = initial_guess(diagnostics, regimes, model, test, config)?;
    let (lower, upper) = objective.bounds();
    let settings = LmSettings {
        max_iterations: config.max_iterations,
        deadline: config.time_budget.and_then(|budget| started.checked_add(budget)),
    };

    let outcome = levenberg_marquardt(
        |theta| objective.residuals(theta),
        objective.to_internal(&guess),
        &lower,
        &upper,
        settings,
    )?;

    let specs = model.param_specs();
    let mut params = objective.params(&outcome.theta);
    let (pi, _) = objective.initial_pressure(&params)?;
    params[INITIAL_PRESSURE_INDEX] = specs[INITIAL_PRESSURE_INDEX].clamp(pi);

    let curves = objective.curves(&params)?;
    let rmse = objective.rmse(&curves);
    let converged = outcome.stop == StopReason::Converged;

    let mut warnings = Vec::new();
    if !converged {
        warnings.push(FitWarning::NonConvergence {
            reason: outcome.stop,
            iterations: outcome.iterations,
            rmse,
        });
    }

    let confidence_intervals = match config.confidence {
        ConfidenceMethod::Sensitivity => sensitivity_intervals(&objective, &outcome, &params)?,
        ConfidenceMethod::Bootstrap { seed, .. } => {
            let requested = config.resamples();
            let (intervals, completed) =
                bootstrap_intervals(&objective, &outcome, &params, requested, seed, settings)?;
            if completed < requested && settings.expired() {
                warnings.push(FitWarning::BootstrapTruncated {
                    completed,
                    requested,
                });
            }
            if completed == 0 {
                sensitivity_intervals(&objective, &outcome, &params)?
            } else {
                intervals
            }
        }
    };

    let boundary_distance = if model.has_boundary() {
        boundary_distance(params[KH_INDEX], diagnostics, regimes, test)
    } else {
        None
    };

    warnings.extend(mismatches(model, regimes));
    for w in &warnings {
        warn!(warning = %w, "fit warning");
    }

    let parameters: BTreeMap<&'static str, f64> =
        specs.iter().map(|s| s.name).zip(params.iter().copied()).collect();
    info!(
        iterations = outcome.iterations,
        converged,
        rmse,
        kh = params[KH_INDEX],
        fit_delta_p = objective.fit_delta_p(),
        "model fitted"
    );

    Ok(FitResult {
        model,
        parameters,
        confidence_intervals,
        rmse,
        model_fit_series: ModelFitSeries {
            elapsed: diagnostics.elapsed().to_vec(),
            delta_p: curves.delta_p,
            derivative: curves.derivative,
        },
        boundary_distance,
        iterations: outcome.iterations,
        converged,
        warnings,
    })
}
