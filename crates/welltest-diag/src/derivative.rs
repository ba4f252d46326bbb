//! Bourdet logarithmic derivative and the diagnostic series built around it.

use tracing::{debug, info, instrument};
use welltest_series::{FlowKind, NormalizedSeries, RateStep};

use crate::error::DiagnosticError;
use crate::transform::{agarwal_time, period_samples, superposition_value};

/// Largest accepted smoothing level, in axis units.
pub const MAX_SMOOTHING: f64 = 0.5;

/// Absolute slack on the window comparison, so points exactly `L` apart qualify.
const WINDOW_EPS: f64 = 1e-12;

/// Requested derivative axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DerivativeAxis {
    /// Superposition time when earlier rate periods exist, log time otherwise.
    #[default]
    Auto,
    /// Natural log of elapsed time in the analysed period.
    LogTime,
    /// Superposition function over the rate history.
    Superposition,
}

/// Axis actually used by a [`DiagnosticSeries`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisKind {
    /// `ln Δt`.
    LogTime,
    /// `Σ (Δq_k/Δq_n) ln(t − t_{k−1})`.
    Superposition,
}

/// Settings for [`diagnose`].
///
/// # Defaults
///
/// | Parameter   | Default        |
/// |-------------|----------------|
/// | `smoothing` | 0.1            |
/// | `period`    | last period    |
/// | `axis`      | `Auto`         |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivativeConfig {
    pub(crate) smoothing: f64,
    pub(crate) period: Option<usize>,
    pub(crate) axis: DerivativeAxis,
}

impl Default for DerivativeConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DerivativeConfig {
    /// Create a config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            smoothing: 0.1,
            period: None,
            axis: DerivativeAxis::Auto,
        }
    }

    /// Set the Bourdet smoothing level `L`.
    #[must_use]
    pub fn with_smoothing(mut self, smoothing: f64) -> Self {
        self.smoothing = smoothing;
        self
    }

    /// Analyse the given rate period instead of the last one.
    #[must_use]
    pub fn with_period(mut self, period: usize) -> Self {
        self.period = Some(period);
        self
    }

    /// Set the derivative axis.
    #[must_use]
    pub fn with_axis(mut self, axis: DerivativeAxis) -> Self {
        self.axis = axis;
        self
    }

    /// Return the smoothing level.
    #[must_use]
    pub fn smoothing(&self) -> f64 {
        self.smoothing
    }

    /// Return the requested period, `None` meaning the last one.
    #[must_use]
    pub fn period(&self) -> Option<usize> {
        self.period
    }

    /// Return the requested axis.
    #[must_use]
    pub fn axis(&self) -> DerivativeAxis {
        self.axis
    }
}

/// Pressure change and its log-derivative over one flow period.
///
/// All arrays are parallel and hold only samples with `Δt > 0`.
/// `derivative` is the unsmoothed (`L = 0`) Bourdet derivative,
/// `smoothed_derivative` the one at the stored smoothing level.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticSeries {
    pub(crate) elapsed: Vec<f64>,
    pub(crate) time: Vec<f64>,
    pub(crate) axis: Vec<f64>,
    pub(crate) pressure: Vec<f64>,
    pub(crate) delta_p: Vec<f64>,
    pub(crate) derivative: Vec<f64>,
    pub(crate) smoothed_derivative: Vec<f64>,
    pub(crate) smoothing: f64,
    pub(crate) axis_kind: AxisKind,
    pub(crate) reference_pressure: f64,
    pub(crate) period: usize,
    pub(crate) rate_change: f64,
    pub(crate) rate_history: Vec<RateStep>,
    pub(crate) producing_time: Option<f64>,
}

impl DiagnosticSeries {
    /// Elapsed time since the period start, hours.
    #[must_use]
    pub fn elapsed(&self) -> &[f64] {
        &self.elapsed
    }

    /// Time since test start, hours.
    #[must_use]
    pub fn time(&self) -> &[f64] {
        &self.time
    }

    /// Derivative axis values.
    #[must_use]
    pub fn axis(&self) -> &[f64] {
        &self.axis
    }

    /// Measured pressure, psi.
    #[must_use]
    pub fn pressure(&self) -> &[f64] {
        &self.pressure
    }

    /// `|p − p_ref|`, psi.
    #[must_use]
    pub fn delta_p(&self) -> &[f64] {
        &self.delta_p
    }

    /// Unsmoothed Bourdet derivative, psi.
    #[must_use]
    pub fn derivative(&self) -> &[f64] {
        &self.derivative
    }

    /// Bourdet derivative at [`smoothing`](Self::smoothing), psi.
    #[must_use]
    pub fn smoothed_derivative(&self) -> &[f64] {
        &self.smoothed_derivative
    }

    /// Smoothing level `L` of `smoothed_derivative`.
    #[must_use]
    pub fn smoothing(&self) -> f64 {
        self.smoothing
    }

    /// Axis used for differentiation.
    #[must_use]
    pub fn axis_kind(&self) -> AxisKind {
        self.axis_kind
    }

    /// Reference pressure of the analysed period, psi.
    #[must_use]
    pub fn reference_pressure(&self) -> f64 {
        self.reference_pressure
    }

    /// Index of the analysed rate period.
    #[must_use]
    pub fn period(&self) -> usize {
        self.period
    }

    /// Rate change that opened the analysed period.
    #[must_use]
    pub fn rate_change(&self) -> f64 {
        self.rate_change
    }

    /// Rate changes from test start up to and including the analysed period.
    #[must_use]
    pub fn rate_history(&self) -> &[RateStep] {
        &self.rate_history
    }

    /// Equivalent producing time before a shut-in period, hours.
    #[must_use]
    pub fn producing_time(&self) -> Option<f64> {
        self.producing_time
    }

    /// Start time of the analysed period, hours.
    #[must_use]
    pub fn period_start(&self) -> f64 {
        self.rate_history
            .last()
            .map_or(0.0, |step| step.start)
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elapsed.len()
    }

    /// Always false for a series built by [`diagnose`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elapsed.is_empty()
    }

    /// Sign of the rate change: `+1` when pressure falls over the period,
    /// `-1` when it rises.
    #[must_use]
    pub fn orientation(&self) -> f64 {
        if self.rate_change >= 0.0 { 1.0 } else { -1.0 }
    }

    /// Equivalent time at each point: Agarwal time for a shut-in after flow,
    /// `exp(axis)` for superposition, elapsed time otherwise.
    #[must_use]
    pub fn equivalent_time(&self) -> Vec<f64> {
        match (self.producing_time, self.axis_kind) {
            (Some(tp), _) => self.elapsed.iter().map(|&dt| agarwal_time(tp, dt)).collect(),
            (None, AxisKind::Superposition) => self.axis.iter().map(|x| x.exp()).collect(),
            (None, AxisKind::LogTime) => self.elapsed.clone(),
        }
    }
}

// ── bourdet_derivative ────────────────────────────────────────────────────────

/// Bourdet derivative `dy/dx` with smoothing window `smoothing` in x units.
///
/// For each point the left neighbour is the nearest point at least
/// `smoothing` before it and the right neighbour the nearest point at least
/// `smoothing` after it; the derivative is the distance-weighted mean of the
/// two slopes:
///
/// ```text
/// d = (Δx_R · m_L + Δx_L · m_R) / (Δx_L + Δx_R)
/// ```
///
/// With `smoothing = 0` the neighbours are the adjacent points. When no
/// full window exists on one side the one-sided slope is used; when neither
/// side has one, the adjacent points are used. `x` must be strictly
/// increasing and as long as `y`.
#[must_use]
pub fn bourdet_derivative(x: &[f64], y: &[f64], smoothing: f64) -> Vec<f64> {
    let n = x.len().min(y.len());
    if n < 2 {
        return vec![0.0; n];
    }

    let mut out = Vec::with_capacity(n);
    // left: count of points with x_j <= x_i - L; right: first k with x_k >= x_i + L.
    let mut left = 0usize;
    let mut right = 0usize;
    for i in 0..n {
        let (j, k) = if smoothing <= 0.0 {
            (i.checked_sub(1), (i + 1 < n).then_some(i + 1))
        } else {
            while left < n && x[left] <= x[i] - smoothing + WINDOW_EPS {
                left += 1;
            }
            if right <= i {
                right = i + 1;
            }
            while right < n && x[right] < x[i] + smoothing - WINDOW_EPS {
                right += 1;
            }
            let j = left.checked_sub(1).filter(|&j| j < i);
            let k = (right < n).then_some(right);
            if j.is_none() && k.is_none() {
                (i.checked_sub(1), (i + 1 < n).then_some(i + 1))
            } else {
                (j, k)
            }
        };

        let value = match (j, k) {
            (Some(j), Some(k)) => {
                let dl = x[i] - x[j];
                let dr = x[k] - x[i];
                let ml = (y[i] - y[j]) / dl;
                let mr = (y[k] - y[i]) / dr;
                (dr * ml + dl * mr) / (dl + dr)
            }
            (None, Some(k)) => (y[k] - y[i]) / (x[k] - x[i]),
            (Some(j), None) => (y[i] - y[j]) / (x[i] - x[j]),
            (None, None) => 0.0,
        };
        out.push(value);
    }
    out
}

fn validate_smoothing(level: f64) -> Result<(), DiagnosticError> {
    if !level.is_finite() || !(0.0..=MAX_SMOOTHING).contains(&level) {
        return Err(DiagnosticError::InvalidSmoothing { level });
    }
    Ok(())
}

// ── diagnose ──────────────────────────────────────────────────────────────────

/// Build the diagnostic series of one flow period.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`DiagnosticError::InvalidSmoothing`] | Smoothing outside `[0, 0.5]` |
/// | [`DiagnosticError::InvalidPeriod`] | Requested period does not exist |
/// | [`DiagnosticError::InapplicableTransform`] | Explicit superposition axis is not monotonic |
/// | [`DiagnosticError::InsufficientData`] | Fewer than 3 points with `Δt > 0` |
#[instrument(skip_all, fields(smoothing = config.smoothing, n = series.len()))]
pub fn diagnose(
    series: &NormalizedSeries,
    config: &DerivativeConfig,
) -> Result<DiagnosticSeries, DiagnosticError> {
    validate_smoothing(config.smoothing)?;

    let n_periods = series.periods().len();
    let period = config.period.unwrap_or(n_periods - 1);
    if period >= n_periods {
        return Err(DiagnosticError::InvalidPeriod { period, n_periods });
    }

    let view = period_samples(series, period);
    if view.elapsed.len() < 3 {
        return Err(DiagnosticError::InsufficientData {
            context: "derivative",
            needed: 3,
            got: view.elapsed.len(),
        });
    }

    let rate_history = series.rate_history(period);
    let rate_change = series.rate_change(period);

    let log_axis = || view.elapsed.iter().map(|dt| dt.ln()).collect::<Vec<f64>>();
    let superposition_axis = || -> Option<Vec<f64>> {
        let values: Vec<f64> = view
            .time
            .iter()
            .map(|&t| superposition_value(t, &rate_history, rate_change))
            .collect();
        let monotonic = values.iter().all(|v| v.is_finite())
            && values.windows(2).all(|w| w[1] > w[0]);
        monotonic.then_some(values)
    };

    let (axis_kind, axis) = match config.axis {
        DerivativeAxis::LogTime => (AxisKind::LogTime, log_axis()),
        DerivativeAxis::Superposition => match superposition_axis() {
            Some(values) => (AxisKind::Superposition, values),
            None => {
                return Err(DiagnosticError::InapplicableTransform {
                    transform: "superposition",
                    reason: "superposition time is not strictly increasing over the period"
                        .to_string(),
                });
            }
        },
        DerivativeAxis::Auto if period == 0 => (AxisKind::LogTime, log_axis()),
        DerivativeAxis::Auto => match superposition_axis() {
            Some(values) => (AxisKind::Superposition, values),
            None => {
                debug!("superposition time not monotonic, falling back to log time");
                (AxisKind::LogTime, log_axis())
            }
        },
    };

    let reference_pressure = series.reference_pressure(period);
    let delta_p: Vec<f64> = view
        .pressure
        .iter()
        .map(|p| (p - reference_pressure).abs())
        .collect();
    let derivative = bourdet_derivative(&axis, &delta_p, 0.0);
    let smoothed_derivative = bourdet_derivative(&axis, &delta_p, config.smoothing);

    let producing_time = match series.periods()[period].kind() {
        FlowKind::ShutIn => series.producing_time_before(period),
        FlowKind::Flowing => None,
    };

    info!(
        period,
        n_points = axis.len(),
        axis = ?axis_kind,
        reference_pressure,
        "diagnostic series built"
    );

    Ok(DiagnosticSeries {
        elapsed: view.elapsed,
        time: view.time,
        axis,
        pressure: view.pressure,
        delta_p,
        derivative,
        smoothed_derivative,
        smoothing: config.smoothing,
        axis_kind,
        reference_pressure,
        period,
        rate_change,
        rate_history,
        producing_time,
    })
}

/// Recompute the smoothed derivative at a new smoothing level.
///
/// Pure function of `(series, smoothing)`; the input data are not re-read.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`DiagnosticError::InvalidSmoothing`] | Smoothing outside `[0, 0.5]` |
/// | [`DiagnosticError::InsufficientData`] | Fewer than 3 points |
pub fn recompute_derivative(
    series: &DiagnosticSeries,
    smoothing: f64,
) -> Result<DiagnosticSeries, DiagnosticError> {
    validate_smoothing(smoothing)?;
    if series.len() < 3 {
        return Err(DiagnosticError::InsufficientData {
            context: "derivative",
            needed: 3,
            got: series.len(),
        });
    }
    let smoothed_derivative = bourdet_derivative(&series.axis, &series.delta_p, smoothing);
    debug!(smoothing, "derivative recomputed");
    Ok(DiagnosticSeries {
        smoothed_derivative,
        smoothing,
        ..series.clone()
    })
}

#[cfg(test)]
mod tests {
    use welltest_series::{NormalizeConfig, Sample, TestConfiguration, normalize};

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

    /// Semilog drawdown: Δp = 20 ln t + 100.
    fn semilog_drawdown() -> NormalizedSeries {
        let raw: Vec<Sample> = (0..30)
            .map(|i| {
                let t = 0.01 * 10f64.powf(i as f64 / 6.0);
                Sample::new(t, 5000.0 - (20.0 * t.ln() + 100.0), 500.0)
            })
            .collect();
        normalize(&raw, &test_config(), &NormalizeConfig::new()).unwrap()
    }

    #[test]
    fn zero_smoothing_is_three_point_central_difference() {
        let x = [0.0, 0.3, 1.0, 1.2, 2.0];
        let y = [1.0, 2.0, 2.5, 4.0, 4.1];
        let d = bourdet_derivative(&x, &y, 0.0);
        for i in 1..4 {
            let dl = x[i] - x[i - 1];
            let dr = x[i + 1] - x[i];
            let ml = (y[i] - y[i - 1]) / dl;
            let mr = (y[i + 1] - y[i]) / dr;
            let expected = (dr * ml + dl * mr) / (dl + dr);
            assert!((d[i] - expected).abs() < 1e-12);
        }
        assert!((d[0] - (y[1] - y[0]) / (x[1] - x[0])).abs() < 1e-12);
        assert!((d[4] - (y[4] - y[3]) / (x[4] - x[3])).abs() < 1e-12);
    }

    #[test]
    fn linear_function_has_constant_derivative_at_any_smoothing() {
        let x: Vec<f64> = (0..40).map(|i| i as f64 * 0.07).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 * v + 1.0).collect();
        for l in [0.0, 0.1, 0.3, 0.5] {
            for d in bourdet_derivative(&x, &y, l) {
                assert!((d - 3.0).abs() < 1e-9, "L = {l}: {d}");
            }
        }
    }

    #[test]
    fn window_picks_points_at_least_l_away() {
        let x = [0.0, 0.05, 0.1, 0.2, 0.3];
        let y = [0.0, 1.0, 1.0, 5.0, 5.0];
        // At i = 2 with L = 0.1: left j = 0, right k = 3.
        let d = bourdet_derivative(&x, &y, 0.1);
        let ml = (1.0 - 0.0) / 0.1;
        let mr = (5.0 - 1.0) / 0.1;
        assert!((d[2] - (0.1 * ml + 0.1 * mr) / 0.2).abs() < 1e-9);
    }

    #[test]
    fn semilog_drawdown_has_flat_derivative() {
        let diag = diagnose(&semilog_drawdown(), &DerivativeConfig::new()).unwrap();
        assert_eq!(diag.axis_kind(), AxisKind::LogTime);
        assert_eq!(diag.len(), 30);
        for d in diag.smoothed_derivative() {
            assert!((d - 20.0).abs() < 1e-9, "{d}");
        }
        assert_eq!(diag.orientation(), 1.0);
    }

    #[test]
    fn recompute_changes_only_smoothing() {
        let diag = diagnose(&semilog_drawdown(), &DerivativeConfig::new()).unwrap();
        let again = recompute_derivative(&diag, 0.3).unwrap();
        assert_eq!(again.smoothing(), 0.3);
        assert_eq!(again.delta_p(), diag.delta_p());
        assert_eq!(again.derivative(), diag.derivative());
    }

    #[test]
    fn invalid_smoothing_rejected() {
        let diag = diagnose(&semilog_drawdown(), &DerivativeConfig::new()).unwrap();
        assert!(matches!(
            recompute_derivative(&diag, 0.6),
            Err(DiagnosticError::InvalidSmoothing { .. })
        ));
        assert!(matches!(
            diagnose(&semilog_drawdown(), &DerivativeConfig::new().with_smoothing(-0.1)),
            Err(DiagnosticError::InvalidSmoothing { .. })
        ));
    }

    #[test]
    fn missing_period_rejected() {
        let err = diagnose(&semilog_drawdown(), &DerivativeConfig::new().with_period(3)).unwrap_err();
        assert!(matches!(err, DiagnosticError::InvalidPeriod { period: 3, n_periods: 1 }));
    }

    #[test]
    fn buildup_uses_superposition_axis() {
        let mut raw = Vec::new();
        for i in 0..10 {
            raw.push(Sample::new(0.1 + i as f64, 4800.0 - i as f64, 500.0));
        }
        for i in 0..10 {
            raw.push(Sample::new(10.0 + 0.5 * i as f64, 4790.0 + 2.0 * i as f64, 0.0));
        }
        let series = normalize(&raw, &test_config(), &NormalizeConfig::new()).unwrap();
        let diag = diagnose(&series, &DerivativeConfig::new()).unwrap();
        assert_eq!(diag.period(), 1);
        assert_eq!(diag.axis_kind(), AxisKind::Superposition);
        assert_eq!(diag.len(), 9);
        assert_eq!(diag.reference_pressure(), 4790.0);
        assert_eq!(diag.orientation(), -1.0);
        assert!(diag.producing_time().is_some());
        for w in diag.axis().windows(2) {
            assert!(w[1] > w[0]);
        }
    }
}
