//! Weighted log-space residuals between observed and model diagnostics.

use welltest_diag::{DiagnosticSeries, bourdet_derivative};
use welltest_model::param::INITIAL_PRESSURE_INDEX;
use welltest_model::{AnalyticalModel, ParamScale, ParamSpec, ReservoirModel, superposed_drop};
use welltest_series::{RateStep, TestConfiguration};

use crate::config::FitConfig;
use crate::error::FitError;

/// Floor applied before taking logarithms of model curves.
const LOG_FLOOR: f64 = 1e-300;

fn safe_ln(x: f64) -> f64 {
    x.max(LOG_FLOOR).ln()
}

/// Per-point weights proportional to the span of log time each point covers,
/// so every log-decade carries the same total weight however densely it is
/// sampled. Normalised to a mean of one.
///
/// Interior points cover half the gap to each neighbour, end points the
/// whole gap to their one neighbour, so geometric sampling weighs every
/// point equally.
pub(crate) fn log_spacing_weights(elapsed: &[f64]) -> Vec<f64> {
    let n = elapsed.len();
    if n < 2 {
        return vec![1.0; n];
    }
    let x: Vec<f64> = elapsed.iter().map(|t| t.ln()).collect();
    let spans: Vec<f64> = (0..n)
        .map(|i| match i {
            0 => x[1] - x[0],
            i if i == n - 1 => x[i] - x[i - 1],
            i => 0.5 * (x[i + 1] - x[i - 1]),
        })
        .collect();
    let total: f64 = spans.iter().sum();
    if !(total.is_finite() && total > 0.0) {
        return vec![1.0; n];
    }
    spans.iter().map(|s| s * n as f64 / total).collect()
}

/// Model ΔP and Bourdet derivative at every diagnostic point.
#[derive(Debug, Clone)]
pub(crate) struct Curves {
    pub(crate) delta_p: Vec<f64>,
    pub(crate) derivative: Vec<f64>,
}

/// Everything one residual evaluation needs, detached from the borrowed
/// diagnostics so that bootstrap refits can run on other threads.
#[derive(Debug, Clone)]
pub(crate) struct Objective {
    model: ReservoirModel,
    test: TestConfiguration,
    /// Full parameter vector; free entries are overwritten per evaluation.
    template: Vec<f64>,
    free: Vec<usize>,
    times: Vec<f64>,
    axis: Vec<f64>,
    pressure: Vec<f64>,
    smoothing: f64,
    history: Vec<RateStep>,
    period_start: f64,
    orientation: f64,
    fit_delta_p: bool,
    /// Indices of fitted points.
    points: Vec<usize>,
    sqrt_weights: Vec<f64>,
    ln_derivative: Vec<f64>,
    ln_delta_p: Vec<f64>,
}

impl Objective {
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`FitError::InsufficientData`] | Fewer usable points than free parameters + 1 |
    pub(crate) fn new(
        diagnostics: &DiagnosticSeries,
        model: ReservoirModel,
        test: &TestConfiguration,
        config: &FitConfig,
    ) -> Result<Self, FitError> {
        let specs = model.param_specs();
        let free: Vec<usize> = specs
            .iter()
            .enumerate()
            .filter(|(_, s)| s.scale != ParamScale::Offset)
            .map(|(i, _)| i)
            .collect();

        let elapsed = diagnostics.elapsed();
        let derivative = diagnostics.smoothed_derivative();
        let delta_p = diagnostics.delta_p();
        let in_window = |t: f64| config.window.is_none_or(|(start, end)| t >= start && t <= end);
        let points: Vec<usize> = (0..diagnostics.len())
            .filter(|&i| derivative[i] > 0.0 && delta_p[i] > 0.0 && in_window(elapsed[i]))
            .collect();
        let needed = free.len() + 1;
        if points.len() < needed {
            return Err(FitError::InsufficientData {
                needed,
                got: points.len(),
            });
        }

        let fitted_elapsed: Vec<f64> = points.iter().map(|&i| elapsed[i]).collect();
        let sqrt_weights = log_spacing_weights(&fitted_elapsed).iter().map(|w| w.sqrt()).collect();

        let mut template: Vec<f64> = specs.iter().map(|s| s.lower).collect();
        template[INITIAL_PRESSURE_INDEX] =
            specs[INITIAL_PRESSURE_INDEX].clamp(diagnostics.reference_pressure());

        Ok(Self {
            model,
            test: test.clone(),
            template,
            free,
            times: diagnostics.time().to_vec(),
            axis: diagnostics.axis().to_vec(),
            pressure: diagnostics.pressure().to_vec(),
            smoothing: diagnostics.smoothing(),
            history: diagnostics.rate_history().to_vec(),
            period_start: diagnostics.period_start(),
            orientation: diagnostics.orientation(),
            fit_delta_p: config.fit_delta_p,
            ln_derivative: points.iter().map(|&i| derivative[i].ln()).collect(),
            ln_delta_p: points.iter().map(|&i| delta_p[i].ln()).collect(),
            points,
            sqrt_weights,
        })
    }

    pub(crate) fn model(&self) -> ReservoirModel {
        self.model
    }

    pub(crate) fn n_points(&self) -> usize {
        self.points.len()
    }

    pub(crate) fn fit_delta_p(&self) -> bool {
        self.fit_delta_p
    }

    /// Specs of the iterated parameters, in optimiser order.
    pub(crate) fn free_specs(&self) -> Vec<ParamSpec> {
        let specs = self.model.param_specs();
        self.free.iter().map(|&i| specs[i]).collect()
    }

    /// Box bounds in optimiser coordinates.
    pub(crate) fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        self.free_specs()
            .iter()
            .map(|s| (s.to_internal(s.lower), s.to_internal(s.upper)))
            .unzip()
    }

    /// Optimiser coordinates of a full parameter vector.
    pub(crate) fn to_internal(&self, params: &[f64]) -> Vec<f64> {
        let specs = self.model.param_specs();
        self.free.iter().map(|&i| specs[i].to_internal(params[i])).collect()
    }

    /// Full parameter vector for optimiser coordinates `theta`.
    pub(crate) fn params(&self, theta: &[f64]) -> Vec<f64> {
        let specs = self.model.param_specs();
        let mut params = self.template.clone();
        for (&i, &x) in self.free.iter().zip(theta) {
            params[i] = specs[i].from_internal(x);
        }
        params
    }

    /// Model curves relative to the model pressure at the period start, so
    /// the initial pressure cancels.
    pub(crate) fn curves(&self, params: &[f64]) -> Result<Curves, FitError> {
        let drop = superposed_drop(&self.model, params, &self.test, &self.history, &self.times)?;
        let reference = superposed_drop(
            &self.model,
            params,
            &self.test,
            &self.history,
            &[self.period_start],
        )?[0];
        let delta_p: Vec<f64> = drop.iter().map(|d| self.orientation * (d - reference)).collect();
        let derivative = bourdet_derivative(&self.axis, &delta_p, self.smoothing);
        Ok(Curves {
            delta_p,
            derivative,
        })
    }

    /// Unweighted `ln(observed) − ln(model)` of the derivative at fitted points.
    pub(crate) fn derivative_residuals(&self, curves: &Curves) -> Vec<f64> {
        self.points
            .iter()
            .zip(&self.ln_derivative)
            .map(|(&i, obs)| obs - safe_ln(curves.derivative[i]))
            .collect()
    }

    /// Unweighted `ln(observed) − ln(model)` of ΔP at fitted points.
    pub(crate) fn delta_p_residuals(&self, curves: &Curves) -> Vec<f64> {
        self.points
            .iter()
            .zip(&self.ln_delta_p)
            .map(|(&i, obs)| obs - safe_ln(curves.delta_p[i]))
            .collect()
    }

    /// Weighted residual vector: derivative residuals, then ΔP residuals
    /// when enabled.
    pub(crate) fn weighted(&self, curves: &Curves) -> Vec<f64> {
        let mut r: Vec<f64> = self
            .derivative_residuals(curves)
            .iter()
            .zip(&self.sqrt_weights)
            .map(|(e, w)| e * w)
            .collect();
        if self.fit_delta_p {
            r.extend(
                self.delta_p_residuals(curves)
                    .iter()
                    .zip(&self.sqrt_weights)
                    .map(|(e, w)| e * w),
            );
        }
        r
    }

    /// Weighted residuals at optimiser coordinates `theta`.
    pub(crate) fn residuals(&self, theta: &[f64]) -> Result<Vec<f64>, FitError> {
        let curves = self.curves(&self.params(theta))?;
        Ok(self.weighted(&curves))
    }

    /// RMS of the unweighted derivative residuals.
    pub(crate) fn rmse(&self, curves: &Curves) -> f64 {
        let r = self.derivative_residuals(curves);
        (r.iter().map(|e| e * e).sum::<f64>() / r.len() as f64).sqrt()
    }

    /// Least-squares initial pressure `mean(p_obs + Σ Δq_k Δp_u(t − t_k))`
    /// and its standard error.
    pub(crate) fn initial_pressure(&self, params: &[f64]) -> Result<(f64, f64), FitError> {
        let drop = superposed_drop(&self.model, params, &self.test, &self.history, &self.times)?;
        let estimates: Vec<f64> = self.pressure.iter().zip(&drop).map(|(p, d)| p + d).collect();
        let n = estimates.len() as f64;
        let mean = estimates.iter().sum::<f64>() / n;
        let variance = if estimates.len() > 1 {
            estimates.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
        } else {
            0.0
        };
        Ok((mean, (variance / n).sqrt()))
    }

    /// Copy with replaced log observations at the fitted points.
    pub(crate) fn with_observations(&self, ln_derivative: Vec<f64>, ln_delta_p: Vec<f64>) -> Self {
        Self {
            ln_derivative,
            ln_delta_p,
            ..self.clone()
        }
    }

    /// Log observations at the fitted points.
    pub(crate) fn observations(&self) -> (&[f64], &[f64]) {
        (&self.ln_derivative, &self.ln_delta_p)
    }
}
