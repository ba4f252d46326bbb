//! Distance to a boundary from the time the derivative leaves radial flow.

use welltest_diag::{DiagnosticSeries, FlowRegime, RegimeLabel};
use welltest_series::TestConfiguration;
use welltest_series::units::INVESTIGATION;

use crate::guess::median;

/// Ratio to the radial derivative level that marks the boundary departure.
const DEPARTURE_RATIO: f64 = 1.1;

/// Radius of investigation `sqrt(0.000264 k t / (φ μ c_t))` in ft at `time` hours.
#[must_use]
pub fn investigation_radius(kh: f64, test: &TestConfiguration, time: f64) -> f64 {
    let k = kh / test.thickness();
    (INVESTIGATION * k * time / test.storativity_viscosity()).sqrt()
}

fn find_regime(regimes: &[FlowRegime], label: RegimeLabel) -> Option<&FlowRegime> {
    regimes.iter().find(|r| r.label == label)
}

/// Equivalent time at which the response first feels a boundary.
///
/// The first point after radial flow starts where two consecutive smoothed
/// derivative values exceed 1.1 times the radial level. Falls back to the
/// start of the first boundary-dominated regime.
pub(crate) fn boundary_time(diagnostics: &DiagnosticSeries, regimes: &[FlowRegime]) -> Option<f64> {
    let boundary = find_regime(regimes, RegimeLabel::BoundaryDominated)?;
    let te = diagnostics.equivalent_time();
    let derivative = diagnostics.smoothed_derivative();

    if let Some(radial) = find_regime(regimes, RegimeLabel::RadialFlow) {
        let end = radial.end_index.min(derivative.len());
        let mut level: Vec<f64> = derivative[radial.first_index.min(end)..end]
            .iter()
            .copied()
            .filter(|d| *d > 0.0)
            .collect();
        if let Some(level) = median(&mut level) {
            let threshold = DEPARTURE_RATIO * level;
            let departure = (radial.first_index..derivative.len().saturating_sub(1))
                .find(|&i| derivative[i] > threshold && derivative[i + 1] > threshold);
            if let Some(i) = departure {
                return Some(te[i]);
            }
        }
    }
    te.get(boundary.first_index).copied()
}

/// Distance to the boundary, or `None` without a boundary-dominated regime.
#[must_use]
pub fn boundary_distance(
    kh: f64,
    diagnostics: &DiagnosticSeries,
    regimes: &[FlowRegime],
    test: &TestConfiguration,
) -> Option<f64> {
    boundary_time(diagnostics, regimes).map(|t| investigation_radius(kh, test, t))
}
