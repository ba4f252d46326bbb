//! Alternate time axes: Horner, MDH, superposition and equivalent time.

use welltest_series::{FlowKind, NormalizedSeries, RateStep};

use crate::error::DiagnosticError;

/// Which transform produced a [`TimeTransform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    /// `(t_p + Δt)/Δt`.
    Horner,
    /// `Δt`.
    Mdh,
    /// `Σ (Δq_k/Δq_n) ln(t − t_{k−1})`.
    Superposition,
    /// Agarwal equivalent time, or `exp(superposition)` while flowing.
    Equivalent,
}

/// A time axis over the samples of one flow period (those with `Δt > 0`).
#[derive(Debug, Clone, PartialEq)]
pub struct TimeTransform {
    /// Transform that produced `values`.
    pub kind: TransformKind,
    /// Analysed period index.
    pub period: usize,
    /// Elapsed time since the period start, hours.
    pub elapsed: Vec<f64>,
    /// Transformed time at each sample.
    pub values: Vec<f64>,
    /// Pressure at each sample, psi.
    pub pressure: Vec<f64>,
}

/// Samples of one period with positive elapsed time.
pub(crate) struct PeriodSamples {
    pub(crate) elapsed: Vec<f64>,
    pub(crate) time: Vec<f64>,
    pub(crate) pressure: Vec<f64>,
}

pub(crate) fn period_samples(series: &NormalizedSeries, period: usize) -> PeriodSamples {
    let p = &series.periods()[period];
    let mut out = PeriodSamples {
        elapsed: Vec::with_capacity(p.len()),
        time: Vec::with_capacity(p.len()),
        pressure: Vec::with_capacity(p.len()),
    };
    for s in &series.samples()[p.first_index..p.end_index] {
        let dt = s.time - p.start;
        if dt > 0.0 {
            out.elapsed.push(dt);
            out.time.push(s.time);
            out.pressure.push(s.pressure);
        }
    }
    out
}

/// Superposition function at time `t` for a rate history ending with a
/// change of `rate_change`.
pub(crate) fn superposition_value(t: f64, history: &[RateStep], rate_change: f64) -> f64 {
    history
        .iter()
        .filter(|step| step.rate_change != 0.0)
        .map(|step| step.rate_change / rate_change * (t - step.start).ln())
        .sum()
}

/// Agarwal equivalent time `t_p Δt / (t_p + Δt)`.
#[must_use]
pub fn agarwal_time(producing_time: f64, elapsed: f64) -> f64 {
    producing_time * elapsed / (producing_time + elapsed)
}

fn check_period(series: &NormalizedSeries, period: usize) -> Result<(), DiagnosticError> {
    let n_periods = series.periods().len();
    if period >= n_periods {
        return Err(DiagnosticError::InvalidPeriod { period, n_periods });
    }
    Ok(())
}

fn require_points(samples: &PeriodSamples, context: &'static str) -> Result<(), DiagnosticError> {
    if samples.elapsed.is_empty() {
        return Err(DiagnosticError::InsufficientData {
            context,
            needed: 1,
            got: 0,
        });
    }
    Ok(())
}

/// Producing time before a shut-in period, or why there is none.
fn shut_in_producing_time(
    series: &NormalizedSeries,
    period: usize,
    transform: &'static str,
) -> Result<f64, DiagnosticError> {
    if series.periods()[period].kind() != FlowKind::ShutIn {
        return Err(DiagnosticError::InapplicableTransform {
            transform,
            reason: format!("period {period} is a flowing period, not a shut-in"),
        });
    }
    series
        .producing_time_before(period)
        .ok_or_else(|| DiagnosticError::InapplicableTransform {
            transform,
            reason: format!("no flowing period precedes shut-in period {period}"),
        })
}

/// Horner time `(t_p + Δt)/Δt` over a shut-in period.
///
/// `t_p` is cumulative production divided by the last rate before shut-in.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`DiagnosticError::InvalidPeriod`] | Period does not exist |
/// | [`DiagnosticError::InapplicableTransform`] | Period is flowing, or no flow precedes it |
/// | [`DiagnosticError::InsufficientData`] | No sample with `Δt > 0` |
pub fn horner_time(series: &NormalizedSeries, period: usize) -> Result<TimeTransform, DiagnosticError> {
    check_period(series, period)?;
    let tp = shut_in_producing_time(series, period, "horner")?;
    let samples = period_samples(series, period);
    require_points(&samples, "horner")?;
    let values = samples.elapsed.iter().map(|&dt| (tp + dt) / dt).collect();
    Ok(TimeTransform {
        kind: TransformKind::Horner,
        period,
        elapsed: samples.elapsed,
        values,
        pressure: samples.pressure,
    })
}

/// MDH time: elapsed time in the period (equal to `t` for the first drawdown).
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`DiagnosticError::InvalidPeriod`] | Period does not exist |
/// | [`DiagnosticError::InsufficientData`] | No sample with `Δt > 0` |
pub fn mdh_time(series: &NormalizedSeries, period: usize) -> Result<TimeTransform, DiagnosticError> {
    check_period(series, period)?;
    let samples = period_samples(series, period);
    require_points(&samples, "mdh")?;
    Ok(TimeTransform {
        kind: TransformKind::Mdh,
        period,
        values: samples.elapsed.clone(),
        elapsed: samples.elapsed,
        pressure: samples.pressure,
    })
}

/// Superposition time over the rate history up to `period`.
///
/// Rate changes are normalised by the analysed period's rate change, so a
/// single-rate test gives `ln t`.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`DiagnosticError::InvalidPeriod`] | Period does not exist |
/// | [`DiagnosticError::InsufficientData`] | No sample with `Δt > 0` |
pub fn superposition_time(
    series: &NormalizedSeries,
    period: usize,
) -> Result<TimeTransform, DiagnosticError> {
    check_period(series, period)?;
    let samples = period_samples(series, period);
    require_points(&samples, "superposition")?;
    let history = series.rate_history(period);
    let rate_change = series.rate_change(period);
    let values = samples
        .time
        .iter()
        .map(|&t| superposition_value(t, &history, rate_change))
        .collect();
    Ok(TimeTransform {
        kind: TransformKind::Superposition,
        period,
        elapsed: samples.elapsed,
        values,
        pressure: samples.pressure,
    })
}

/// Equivalent time: Agarwal time for a shut-in after flow, otherwise
/// `exp(superposition time)`.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`DiagnosticError::InvalidPeriod`] | Period does not exist |
/// | [`DiagnosticError::InapplicableTransform`] | Shut-in period with no preceding flow |
/// | [`DiagnosticError::InsufficientData`] | No sample with `Δt > 0` |
pub fn equivalent_time(
    series: &NormalizedSeries,
    period: usize,
) -> Result<TimeTransform, DiagnosticError> {
    check_period(series, period)?;
    if series.periods()[period].kind() == FlowKind::ShutIn {
        let tp = shut_in_producing_time(series, period, "equivalent")?;
        let samples = period_samples(series, period);
        require_points(&samples, "equivalent")?;
        let values = samples.elapsed.iter().map(|&dt| agarwal_time(tp, dt)).collect();
        return Ok(TimeTransform {
            kind: TransformKind::Equivalent,
            period,
            elapsed: samples.elapsed,
            values,
            pressure: samples.pressure,
        });
    }
    let superposition = superposition_time(series, period)?;
    Ok(TimeTransform {
        kind: TransformKind::Equivalent,
        values: superposition.values.iter().map(|x| x.exp()).collect(),
        ..superposition
    })
}
