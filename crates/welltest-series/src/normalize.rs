//! Time-series normalizer: validation, ordering, static-period removal,
//! gas substitution and rate-period split.

use tracing::{debug, info, instrument};

use crate::config::{NormalizeConfig, TestConfiguration};
use crate::error::SeriesError;
use crate::period::{RatePeriod, RateStep, split_periods};
use crate::pvt::GasPvt;
use crate::sample::Sample;

/// Cleaned samples plus their rate history.
///
/// Times are strictly increasing, every pressure is positive and finite.
/// When `pseudo` is set, pressures and times hold normalized
/// pseudo-pressure and pseudo-time.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSeries {
    samples: Vec<Sample>,
    periods: Vec<RatePeriod>,
    initial_pressure: f64,
    time_shift: f64,
    pseudo: bool,
}

impl NormalizedSeries {
    /// All samples in time order.
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Constant-rate periods in time order.
    #[must_use]
    pub fn periods(&self) -> &[RatePeriod] {
        &self.periods
    }

    /// Reference pressure of the first period, psi.
    #[must_use]
    pub fn initial_pressure(&self) -> f64 {
        self.initial_pressure
    }

    /// Hours subtracted from the raw time stamps so flow starts at t = 0.
    #[must_use]
    pub fn time_shift(&self) -> f64 {
        self.time_shift
    }

    /// True if pseudo-pressure and pseudo-time were substituted.
    #[must_use]
    pub fn is_pseudo(&self) -> bool {
        self.pseudo
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false for a series returned by [`normalize`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample times, hours.
    #[must_use]
    pub fn times(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.time).collect()
    }

    /// Sample pressures, psi.
    #[must_use]
    pub fn pressures(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.pressure).collect()
    }

    /// Index of the last period.
    #[must_use]
    pub fn last_period_index(&self) -> usize {
        self.periods.len() - 1
    }

    /// Reference pressure of a period: the initial pressure for the first
    /// period, the pressure of its first sample otherwise.
    #[must_use]
    pub fn reference_pressure(&self, period: usize) -> f64 {
        if period == 0 {
            self.initial_pressure
        } else {
            self.samples[self.periods[period].first_index].pressure
        }
    }

    /// Rate change that opened `period` (`q_k − q_{k−1}`, with `q_{−1} = 0`).
    #[must_use]
    pub fn rate_change(&self, period: usize) -> f64 {
        let previous = if period == 0 {
            0.0
        } else {
            self.periods[period - 1].rate
        };
        self.periods[period].rate - previous
    }

    /// Rate changes from test start up to and including `period`.
    #[must_use]
    pub fn rate_history(&self, period: usize) -> Vec<RateStep> {
        (0..=period.min(self.periods.len().saturating_sub(1)))
            .map(|k| RateStep {
                start: self.periods[k].start,
                rate_change: self.rate_change(k),
            })
            .collect()
    }

    /// Equivalent producing time before `period`: cumulative production
    /// divided by the last non-zero rate, hours.
    ///
    /// Returns `None` when no flowing period precedes `period`.
    #[must_use]
    pub fn producing_time_before(&self, period: usize) -> Option<f64> {
        let previous = &self.periods[..period];
        let last_rate = previous.iter().rev().map(|p| p.rate).find(|&q| q != 0.0)?;
        let cumulative: f64 = previous.iter().map(|p| p.rate * p.duration()).sum();
        let tp = cumulative / last_rate;
        (tp > 0.0).then_some(tp)
    }
}

/// Normalize raw samples into a [`NormalizedSeries`].
///
/// Steps, in order: drop invalid rows, sort (stable) and merge duplicate
/// time stamps keeping the last, strip the leading zero-rate period (its last
/// pressure becomes the initial pressure and time is shifted so flow starts at
/// t = 0), substitute gas pseudo-variables, split into rate periods.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`SeriesError::InvalidSeries`] | No sample has a positive pressure |
/// | [`SeriesError::InvalidSeries`] | Every rate is zero |
/// | [`SeriesError::InvalidSeries`] | Fewer than `min_samples` samples remain |
/// | [`SeriesError::InvalidSeries`] | No initial pressure can be resolved |
/// | [`SeriesError::InvalidConfiguration`] | `config` settings out of range |
#[instrument(skip_all, fields(n_raw = raw.len(), gas = test.is_gas_well()))]
pub fn normalize(
    raw: &[Sample],
    test: &TestConfiguration,
    config: &NormalizeConfig,
) -> Result<NormalizedSeries, SeriesError> {
    config.validate()?;

    // --- Validate rows ---
    let mut samples: Vec<Sample> = raw.iter().copied().filter(Sample::is_valid).collect();
    let dropped = raw.len() - samples.len();
    if dropped > 0 {
        debug!(dropped, "dropped invalid samples");
    }
    if samples.is_empty() {
        return Err(SeriesError::series(
            "pressure",
            "no sample has a finite positive pressure",
        ));
    }
    let max_rate = samples.iter().map(|s| s.rate.abs()).fold(0.0, f64::max);
    if max_rate == 0.0 {
        return Err(SeriesError::series("rate", "every rate is zero"));
    }
    // Rates within tolerance of zero are shut-in.
    for s in &mut samples {
        if s.rate.abs() <= config.rate_tolerance * max_rate {
            s.rate = 0.0;
        }
    }

    // --- Order and deduplicate ---
    samples.sort_by(|a, b| a.time.total_cmp(&b.time));
    let mut deduped: Vec<Sample> = Vec::with_capacity(samples.len());
    for s in samples {
        match deduped.last_mut() {
            Some(last) if last.time == s.time => *last = s,
            _ => deduped.push(s),
        }
    }
    let merged = raw.len() - dropped - deduped.len();
    if merged > 0 {
        debug!(merged, "merged duplicate time stamps");
    }

    // --- Static pre-test period ---
    let n_static = deduped.iter().take_while(|s| s.rate == 0.0).count();
    let mut static_pressure = None;
    let mut time_shift = 0.0;
    if n_static > 0 {
        static_pressure = Some(deduped[n_static - 1].pressure);
        deduped.drain(..n_static);
        time_shift = deduped[0].time;
        for s in &mut deduped {
            s.time -= time_shift;
        }
        debug!(n_static, time_shift, "removed static pre-test samples");
    }

    if deduped.len() < config.min_samples {
        return Err(SeriesError::series(
            "samples",
            format!(
                "{} valid samples remain, need at least {}",
                deduped.len(),
                config.min_samples
            ),
        ));
    }

    let initial_pressure = static_pressure
        .or_else(|| (deduped[0].time == 0.0).then_some(deduped[0].pressure))
        .or(test.initial_pressure())
        .ok_or_else(|| {
            SeriesError::series(
                "pressure",
                "no static pressure, no sample at t = 0 and no initial pressure estimate",
            )
        })?;

    // --- Gas pseudo-variables ---
    let pseudo = match test.gas() {
        Some(gas) => {
            let pvt = GasPvt::new(gas);
            let times: Vec<f64> = deduped.iter().map(|s| s.time).collect();
            let pressures: Vec<f64> = deduped.iter().map(|s| s.pressure).collect();
            let pp = pvt.normalized_pseudo_pressure(initial_pressure, &pressures);
            let ta = pvt.normalized_pseudo_time(
                initial_pressure,
                test.total_compressibility(),
                &times,
                &pressures,
            );
            for ((s, p), t) in deduped.iter_mut().zip(pp).zip(ta) {
                s.pressure = p;
                s.time = t;
            }
            debug!("substituted normalized pseudo-pressure and pseudo-time");
            true
        }
        None => false,
    };

    // --- Rate periods ---
    let times: Vec<f64> = deduped.iter().map(|s| s.time).collect();
    let rates: Vec<f64> = deduped.iter().map(|s| s.rate).collect();
    let periods = split_periods(&times, &rates, config.rate_tolerance);

    info!(
        n_samples = deduped.len(),
        n_periods = periods.len(),
        initial_pressure,
        pseudo,
        "series normalized"
    );

    Ok(NormalizedSeries {
        samples: deduped,
        periods,
        initial_pressure,
        time_shift,
        pseudo,
    })
}
