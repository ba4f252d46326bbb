//! Constant-rate periods of a test.

/// Whether a period produces/injects or has the well shut in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    /// Non-zero surface rate (drawdown or injection).
    Flowing,
    /// Zero surface rate (buildup or falloff).
    ShutIn,
}

/// One entry of a rate history: a rate change at a given time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateStep {
    /// Time at which the rate changed, hours.
    pub start: f64,
    /// `q_k − q_{k−1}`.
    pub rate_change: f64,
}

/// A contiguous interval of constant rate.
///
/// Samples `first_index..end_index` of the owning
/// [`NormalizedSeries`](crate::NormalizedSeries) belong to this period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatePeriod {
    /// Period start time, hours.
    pub start: f64,
    /// Period end time (start of the next period, or the last sample), hours.
    pub end: f64,
    /// Mean rate over the period.
    pub rate: f64,
    /// Index of the first sample in the period.
    pub first_index: usize,
    /// One past the index of the last sample in the period.
    pub end_index: usize,
}

impl RatePeriod {
    /// Flowing or shut-in.
    #[must_use]
    pub fn kind(&self) -> FlowKind {
        if self.rate == 0.0 {
            FlowKind::ShutIn
        } else {
            FlowKind::Flowing
        }
    }

    /// Period length, hours.
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Number of samples in the period.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end_index - self.first_index
    }

    /// True if the period holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end_index == self.first_index
    }
}

/// Split snapped rates into periods.
///
/// A new period opens whenever a rate departs from the running mean of the
/// current period by more than `tolerance` (relative). The first period
/// starts at t = 0; later periods start at their first sample.
pub(crate) fn split_periods(times: &[f64], rates: &[f64], tolerance: f64) -> Vec<RatePeriod> {
    let mut periods = Vec::new();
    if times.is_empty() {
        return periods;
    }

    let mut first = 0;
    let mut sum = rates[0];
    for i in 1..rates.len() {
        let mean = sum / (i - first) as f64;
        let q = rates[i];
        let scale = mean.abs().max(q.abs());
        if (q - mean).abs() > tolerance * scale {
            periods.push(RatePeriod {
                start: if first == 0 { 0.0 } else { times[first] },
                end: times[i],
                rate: mean,
                first_index: first,
                end_index: i,
            });
            first = i;
            sum = q;
        } else {
            sum += q;
        }
    }
    let mean = sum / (rates.len() - first) as f64;
    periods.push(RatePeriod {
        start: if first == 0 { 0.0 } else { times[first] },
        end: times[times.len() - 1],
        rate: mean,
        first_index: first,
        end_index: rates.len(),
    });
    periods
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_rate_is_one_period() {
        let times = [0.0, 1.0, 2.0, 3.0];
        let rates = [100.0, 100.5, 99.8, 100.2];
        let periods = split_periods(&times, &rates, 0.01);
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].start, 0.0);
        assert_eq!(periods[0].end, 3.0);
        assert_eq!(periods[0].len(), 4);
        assert_eq!(periods[0].kind(), FlowKind::Flowing);
    }

    #[test]
    fn drawdown_then_buildup() {
        let times = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let rates = [500.0, 500.0, 500.0, 0.0, 0.0, 0.0];
        let periods = split_periods(&times, &rates, 0.01);
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0].end_index, 3);
        assert_eq!(periods[1].start, 3.0);
        assert_eq!(periods[1].first_index, 3);
        assert_eq!(periods[1].kind(), FlowKind::ShutIn);
        assert!((periods[0].duration() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn first_period_starts_at_zero_even_without_sample() {
        let times = [0.5, 1.0, 2.0];
        let rates = [10.0, 10.0, 10.0];
        let periods = split_periods(&times, &rates, 0.01);
        assert_eq!(periods[0].start, 0.0);
    }
}
