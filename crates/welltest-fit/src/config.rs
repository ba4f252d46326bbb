//! Configuration builder for the parameter estimator.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::FitError;

/// Largest number of bootstrap resamples ever run.
pub const MAX_BOOTSTRAP_RESAMPLES: usize = 1000;

/// How P10/P90 confidence intervals are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfidenceMethod {
    /// Linearised covariance `s² (JᵀWJ)⁻¹` with a Student-t quantile.
    #[default]
    Sensitivity,
    /// Residual bootstrap with parallel refits.
    Bootstrap {
        /// Number of resamples, capped at [`MAX_BOOTSTRAP_RESAMPLES`].
        resamples: usize,
        /// Master seed for the per-resample generators.
        seed: u64,
    },
}

impl ConfidenceMethod {
    /// Bootstrap with the default 200 resamples and seed 42.
    #[must_use]
    pub fn bootstrap() -> Self {
        Self::Bootstrap {
            resamples: 200,
            seed: 42,
        }
    }
}

/// Configuration for [`fit`](crate::fit).
///
/// Construct via [`FitConfig::new`], then chain `with_*` methods to override defaults.
///
/// # Defaults
///
/// | Parameter        | Default                         |
/// |------------------|---------------------------------|
/// | `max_iterations` | 100                             |
/// | `time_budget`    | none                            |
/// | `fit_delta_p`    | true                            |
/// | `confidence`     | `ConfidenceMethod::Sensitivity` |
/// | `window`         | whole period                    |
/// | `initial_guesses`| none (seeded from diagnostics)  |
#[derive(Debug, Clone, PartialEq)]
pub struct FitConfig {
    pub(crate) max_iterations: usize,
    pub(crate) time_budget: Option<Duration>,
    pub(crate) fit_delta_p: bool,
    pub(crate) confidence: ConfidenceMethod,
    pub(crate) window: Option<(f64, f64)>,
    pub(crate) initial_guesses: BTreeMap<String, f64>,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl FitConfig {
    /// Create a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_iterations: 100,
            time_budget: None,
            fit_delta_p: true,
            confidence: ConfidenceMethod::Sensitivity,
            window: None,
            initial_guesses: BTreeMap::new(),
        }
    }

    /// Set the Levenberg–Marquardt iteration limit.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Stop after this much wall-clock time and keep the best iterate.
    ///
    /// The budget covers the whole call: bootstrap refits share the same
    /// deadline and stop once it passes.
    #[must_use]
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    /// Include `ln ΔP` residuals next to the derivative residuals.
    #[must_use]
    pub fn with_fit_delta_p(mut self, fit_delta_p: bool) -> Self {
        self.fit_delta_p = fit_delta_p;
        self
    }

    /// Set the confidence-interval method.
    #[must_use]
    pub fn with_confidence(mut self, confidence: ConfidenceMethod) -> Self {
        self.confidence = confidence;
        self
    }

    /// Fit only points with elapsed time in `[start, end]` hours.
    #[must_use]
    pub fn with_window(mut self, start: f64, end: f64) -> Self {
        self.window = Some((start, end));
        self
    }

    /// Override the initial value of one parameter.
    #[must_use]
    pub fn with_initial_guess(mut self, name: impl Into<String>, value: f64) -> Self {
        self.initial_guesses.insert(name.into(), value);
        self
    }

    /// Return the iteration limit.
    #[must_use]
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Return the wall-clock budget, if any.
    #[must_use]
    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget
    }

    /// Whether ΔP residuals are fitted.
    #[must_use]
    pub fn fit_delta_p(&self) -> bool {
        self.fit_delta_p
    }

    /// Return the confidence-interval method.
    #[must_use]
    pub fn confidence(&self) -> ConfidenceMethod {
        self.confidence
    }

    /// Return the fit window, if any.
    #[must_use]
    pub fn window(&self) -> Option<(f64, f64)> {
        self.window
    }

    /// Return the initial-guess overrides.
    #[must_use]
    pub fn initial_guesses(&self) -> &BTreeMap<String, f64> {
        &self.initial_guesses
    }

    /// Number of bootstrap resamples that will actually run.
    pub(crate) fn resamples(&self) -> usize {
        match self.confidence {
            ConfidenceMethod::Sensitivity => 0,
            ConfidenceMethod::Bootstrap { resamples, .. } => {
                resamples.min(MAX_BOOTSTRAP_RESAMPLES)
            }
        }
    }

    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`FitError::InvalidConfiguration`] | Zero iterations, zero resamples, a bad window or a non-finite guess |
    pub(crate) fn validate(&self) -> Result<(), FitError> {
        if self.max_iterations == 0 {
            return Err(FitError::InvalidConfiguration {
                field: "max_iterations",
                value: 0.0,
                reason: "must be at least 1".into(),
            });
        }
        if let ConfidenceMethod::Bootstrap { resamples: 0, .. } = self.confidence {
            return Err(FitError::InvalidConfiguration {
                field: "resamples",
                value: 0.0,
                reason: "bootstrap needs at least one resample".into(),
            });
        }
        if let Some((start, end)) = self.window
            && !(start.is_finite() && end.is_finite() && start < end)
        {
            return Err(FitError::InvalidConfiguration {
                field: "window",
                value: start,
                reason: format!("window [{start}, {end}] is empty or not finite"),
            });
        }
        if let Some((name, &value)) = self.initial_guesses.iter().find(|(_, v)| !v.is_finite()) {
            return Err(FitError::InvalidConfiguration {
                field: "initial_guesses",
                value,
                reason: format!("initial guess for {name} is not finite"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = FitConfig::new();
        assert_eq!(c.max_iterations(), 100);
        assert!(c.fit_delta_p());
        assert_eq!(c.confidence(), ConfidenceMethod::Sensitivity);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn resamples_are_capped() {
        let c = FitConfig::new().with_confidence(ConfidenceMethod::Bootstrap {
            resamples: 5000,
            seed: 1,
        });
        assert_eq!(c.resamples(), MAX_BOOTSTRAP_RESAMPLES);
        assert_eq!(FitConfig::new().with_confidence(ConfidenceMethod::bootstrap()).resamples(), 200);
    }

    #[test]
    fn invalid_settings_rejected() {
        assert!(FitConfig::new().with_max_iterations(0).validate().is_err());
        assert!(FitConfig::new().with_window(10.0, 1.0).validate().is_err());
        assert!(FitConfig::new().with_window(f64::NAN, 1.0).validate().is_err());
        assert!(FitConfig::new().with_window(0.1, 10.0).validate().is_ok());
        assert!(
            FitConfig::new()
                .with_initial_guess("kh", f64::NAN)
                .validate()
                .is_err()
        );
        assert!(
            FitConfig::new()
                .with_confidence(ConfidenceMethod::Bootstrap { resamples: 0, seed: 1 })
                .validate()
                .is_err()
        );
    }
}
