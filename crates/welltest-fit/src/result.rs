//! Result types for model fitting.

use std::collections::BTreeMap;
use std::fmt;

use welltest_model::ReservoirModel;

use crate::lm::StopReason;

/// P10/P90 bounds of one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceInterval {
    /// 10th percentile.
    pub p10: f64,
    /// 90th percentile.
    pub p90: f64,
}

/// Model curves at the diagnostic points of the analysed period.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFitSeries {
    /// Elapsed time since the period start, hours.
    pub elapsed: Vec<f64>,
    /// Model pressure change, psi.
    pub delta_p: Vec<f64>,
    /// Model Bourdet derivative on the observed axis and smoothing, psi.
    pub derivative: Vec<f64>,
}

/// Non-fatal findings attached to a [`FitResult`].
#[derive(Debug, Clone, PartialEq)]
pub enum FitWarning {
    /// The optimiser stopped before converging; parameters are the best iterate.
    NonConvergence {
        /// Why the optimiser stopped.
        reason: StopReason,
        /// Iterations performed.
        iterations: usize,
        /// RMSE of the returned iterate.
        rmse: f64,
    },
    /// The time budget ran out before every bootstrap refit finished; the
    /// intervals come from the refits that did, or from the linearisation
    /// when none did.
    BootstrapTruncated {
        /// Refits that finished.
        completed: usize,
        /// Refits requested.
        requested: usize,
    },
    /// The classified regimes contradict the model's signature.
    ModelMismatch {
        /// Fitted model.
        model: ReservoirModel,
        /// Which regime conflicts.
        reason: String,
    },
}

impl fmt::Display for FitWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonConvergence {
                reason,
                iterations,
                rmse,
            } => write!(
                f,
                "fit did not converge ({reason}) after {iterations} iterations, rmse {rmse:.4}"
            ),
            Self::BootstrapTruncated {
                completed,
                requested,
            } => write!(
                f,
                "time budget exhausted after {completed} of {requested} bootstrap refits"
            ),
            Self::ModelMismatch { model, reason } => {
                write!(f, "{model} does not match the diagnostics: {reason}")
            }
        }
    }
}

/// Outcome of fitting one reservoir model.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    /// Fitted model.
    pub model: ReservoirModel,
    /// Parameter values by name.
    pub parameters: BTreeMap<&'static str, f64>,
    /// P10/P90 intervals by parameter name.
    pub confidence_intervals: BTreeMap<&'static str, ConfidenceInterval>,
    /// RMS of `ln(observed derivative) − ln(model derivative)` over fitted points.
    pub rmse: f64,
    /// Model curves over the analysed period.
    pub model_fit_series: ModelFitSeries,
    /// Distance to the boundary from the diffusivity relation, ft.
    pub boundary_distance: Option<f64>,
    /// Optimiser iterations performed.
    pub iterations: usize,
    /// Whether the optimiser converged.
    pub converged: bool,
    /// Non-fatal findings.
    pub warnings: Vec<FitWarning>,
}

impl FitResult {
    /// Value of the parameter called `name`.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<f64> {
        self.parameters.get(name).copied()
    }

    /// Confidence interval of the parameter called `name`.
    #[must_use]
    pub fn interval(&self, name: &str) -> Option<ConfidenceInterval> {
        self.confidence_intervals.get(name).copied()
    }

    /// Whether a [`FitWarning::ModelMismatch`] was raised.
    #[must_use]
    pub fn has_model_mismatch(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, FitWarning::ModelMismatch { .. }))
    }
}
