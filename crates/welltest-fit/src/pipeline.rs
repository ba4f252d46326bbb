//! One call from raw samples to diagnostics, regimes and a fitted model.

use tracing::{debug, info, instrument};
use welltest_diag::{
    ClassifierConfig, DerivativeConfig, DiagnosticError, DiagnosticSeries, FlowRegime,
    RegimeLabel, SemilogAnalysis, TimeTransform, classify, diagnose, horner_time, mdh_time,
    semilog_analysis, superposition_time,
};
use welltest_model::ReservoirModel;
use welltest_series::{NormalizeConfig, NormalizedSeries, Sample, TestConfiguration, normalize};

use crate::config::FitConfig;
use crate::error::FitError;
use crate::estimator::fit;
use crate::result::FitResult;

/// Settings for every stage of [`analyze`].
///
/// # Defaults
///
/// | Stage       | Default                    |
/// |-------------|----------------------------|
/// | `normalize` | `NormalizeConfig::new()`   |
/// | `derivative`| `DerivativeConfig::new()`  |
/// | `classifier`| `ClassifierConfig::new()`  |
/// | `model`     | none (no fit)              |
/// | `fit`       | `FitConfig::new()`         |
#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    pub(crate) normalize: NormalizeConfig,
    pub(crate) derivative: DerivativeConfig,
    pub(crate) classifier: ClassifierConfig,
    pub(crate) model: Option<ReservoirModel>,
    pub(crate) fit: FitConfig,
}

impl AnalysisOptions {
    /// Create options with default settings and no model fit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the normalizer configuration.
    #[must_use]
    pub fn with_normalize(mut self, normalize: NormalizeConfig) -> Self {
        self.normalize = normalize;
        self
    }

    /// Set the derivative configuration.
    #[must_use]
    pub fn with_derivative(mut self, derivative: DerivativeConfig) -> Self {
        self.derivative = derivative;
        self
    }

    /// Set the regime classifier configuration.
    #[must_use]
    pub fn with_classifier(mut self, classifier: ClassifierConfig) -> Self {
        self.classifier = classifier;
        self
    }

    /// Fit `model` after classification.
    #[must_use]
    pub fn with_model(mut self, model: ReservoirModel) -> Self {
        self.model = Some(model);
        self
    }

    /// Set the estimator configuration.
    #[must_use]
    pub fn with_fit(mut self, fit: FitConfig) -> Self {
        self.fit = fit;
        self
    }

    /// Return the model to fit, if any.
    #[must_use]
    pub fn model(&self) -> Option<ReservoirModel> {
        self.model
    }

    /// Return the estimator configuration.
    #[must_use]
    pub fn fit(&self) -> &FitConfig {
        &self.fit
    }
}

/// Everything [`analyze`] produced.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Normalized samples and rate periods.
    pub series: NormalizedSeries,
    /// Derivative and ΔP over the analysed period.
    pub diagnostics: DiagnosticSeries,
    /// Horner time, or `None` when the period is not a shut-in after flow.
    pub horner: Option<TimeTransform>,
    /// MDH time.
    pub mdh: TimeTransform,
    /// Superposition time.
    pub superposition: TimeTransform,
    /// Flow regimes covering the analysed period.
    pub regimes: Vec<FlowRegime>,
    /// Semilog line over the first radial-flow regime, when there is one.
    pub semilog: Option<SemilogAnalysis>,
    /// Fitted model, when one was requested.
    pub fit: Option<FitResult>,
}

/// Normalize, differentiate, transform, classify and optionally fit.
///
/// For gas wells the downstream stages run on the normalized
/// pseudo-variables with the liquid form of `test`.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`FitError::Series`] | Normalization fails |
/// | [`FitError::Diagnostic`] | Derivative, MDH, superposition or classification fails |
/// | any [`fit`] error | A model was requested and fitting fails |
#[instrument(skip_all, fields(n_samples = samples.len(), model = ?options.model))]
pub fn analyze(
    samples: &[Sample],
    test: &TestConfiguration,
    options: &AnalysisOptions,
) -> Result<Analysis, FitError> {
    let series = normalize(samples, test, &options.normalize)?;
    let test = if series.is_pseudo() {
        test.as_liquid()
    } else {
        test.clone()
    };

    let diagnostics = diagnose(&series, &options.derivative)?;
    let period = diagnostics.period();
    let horner = match horner_time(&series, period) {
        Ok(h) => Some(h),
        Err(DiagnosticError::InapplicableTransform { reason, .. }) => {
            debug!(%reason, "horner time skipped");
            None
        }
        Err(e) => return Err(e.into()),
    };
    let mdh = mdh_time(&series, period)?;
    let superposition = superposition_time(&series, period)?;
    let regimes = classify(&diagnostics, &options.classifier)?;
    let semilog = regimes
        .iter()
        .find(|r| r.label == RegimeLabel::RadialFlow)
        .and_then(|r| semilog_analysis(&diagnostics, r, &test).ok());

    let fit = options
        .model
        .map(|model| fit(&diagnostics, &regimes, model, &test, &options.fit))
        .transpose()?;

    info!(
        period,
        n_regimes = regimes.len(),
        has_semilog = semilog.is_some(),
        fitted = fit.is_some(),
        "analysis complete"
    );
    Ok(Analysis {
        series,
        diagnostics,
        horner,
        mdh,
        superposition,
        regimes,
        semilog,
        fit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> TestConfiguration {
        TestConfiguration::builder()
            .with_viscosity(1.0)
            .with_total_compressibility(1e-5)
            .with_formation_volume_factor(1.2)
            .with_porosity(0.2)
            .with_thickness(50.0)
            .with_wellbore_radius(0.3)
            .with_initial_pressure(5000.0)
            .build()
            .unwrap()
    }

    fn drawdown() -> Vec<Sample> {
        (0..40)
            .map(|i| {
                let t = 0.01 * 10f64.powf(i as f64 / 10.0);
                Sample::new(t, 5000.0 - 20.0 * (1.0 + t / 0.05).ln(), 500.0)
            })
            .collect()
    }

    #[test]
    fn drawdown_has_no_horner_and_no_fit_by_default() {
        let analysis = analyze(&drawdown(), &test_config(), &AnalysisOptions::new()).unwrap();
        assert!(analysis.horner.is_none());
        assert!(analysis.fit.is_none());
        assert_eq!(analysis.mdh.values.len(), analysis.diagnostics.len());
        assert!(!analysis.regimes.is_empty());
    }

    #[test]
    fn options_builder_records_model() {
        let options = AnalysisOptions::new().with_model(ReservoirModel::LinearBoundary);
        assert_eq!(options.model(), Some(ReservoirModel::LinearBoundary));
        assert_eq!(options.fit().max_iterations(), 100);
    }
}
