//! Initial parameter values seeded from the diagnostics.

use tracing::debug;
use welltest_diag::{DiagnosticSeries, FlowRegime, RegimeLabel, semilog_analysis};
use welltest_model::param::{
    ANISOTROPY, DISTANCE, INITIAL_PRESSURE_INDEX, KH_INDEX, LAMBDA, LENGTH, OMEGA, SKIN_INDEX,
    STORAGE_INDEX, param_index,
};
use welltest_model::{AnalyticalModel, ReservoirModel};
use welltest_series::TestConfiguration;
use welltest_series::units::{
    DIMENSIONLESS_PRESSURE, DIMENSIONLESS_TIME, HOURS_PER_DAY, RADIAL_FLOW_OFFSET,
};

use crate::boundary::{boundary_time, investigation_radius};
use crate::config::FitConfig;
use crate::error::FitError;

/// Median of the finite values, reordering the slice.
pub(crate) fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        0.5 * (values[mid - 1] + values[mid])
    } else {
        values[mid]
    })
}

fn dimensionless_time(kh: f64, test: &TestConfiguration, time: f64) -> f64 {
    let rw = test.wellbore_radius();
    DIMENSIONLESS_TIME * kh / test.thickness() * time / (test.storativity_viscosity() * rw * rw)
}

/// kh and skin from the derivative level over the last log-decade.
fn late_level_guess(diagnostics: &DiagnosticSeries, test: &TestConfiguration) -> Option<(f64, f64)> {
    let elapsed = diagnostics.elapsed();
    let last = diagnostics.len().checked_sub(1)?;
    let cutoff = elapsed[last] / 10.0;
    let mut late: Vec<f64> = elapsed
        .iter()
        .zip(diagnostics.smoothed_derivative())
        .filter(|(t, d)| **t >= cutoff && **d > 0.0)
        .map(|(_, d)| *d)
        .collect();
    let level = median(&mut late)?;
    let rate = diagnostics.rate_change().abs();
    let kh = 0.5 * DIMENSIONLESS_PRESSURE * rate * test.formation_volume_factor() * test.viscosity()
        / level;
    let te = diagnostics.equivalent_time()[last];
    let skin = 0.5
        * (diagnostics.delta_p()[last] / level
            - dimensionless_time(kh, test, te).ln()
            - RADIAL_FLOW_OFFSET);
    Some((kh, skin))
}

/// Storage from `C = |Δq| B Δt / (24 ΔP)` on the unit-slope points.
fn storage_guess(diagnostics: &DiagnosticSeries, regimes: &[FlowRegime], test: &TestConfiguration) -> f64 {
    let rate = diagnostics.rate_change().abs() * test.formation_volume_factor();
    let elapsed = diagnostics.elapsed();
    let delta_p = diagnostics.delta_p();
    let storage = |i: usize| rate * elapsed[i] / (HOURS_PER_DAY * delta_p[i]);
    let mut values: Vec<f64> = regimes
        .iter()
        .filter(|r| r.label == RegimeLabel::WellboreStorage)
        .flat_map(|r| r.first_index..r.end_index.min(diagnostics.len()))
        .filter(|&i| delta_p[i] > 0.0)
        .map(storage)
        .collect();
    median(&mut values)
        .or_else(|| (0..diagnostics.len()).find(|&i| delta_p[i] > 0.0).map(storage))
        .unwrap_or(0.01)
}

/// Full parameter vector to start the optimiser from, clamped into bounds.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`FitError::UnknownParameter`] | An override names a parameter the model lacks |
pub(crate) fn initial_guess(
    diagnostics: &DiagnosticSeries,
    regimes: &[FlowRegime],
    model: ReservoirModel,
    test: &TestConfiguration,
    config: &FitConfig,
) -> Result<Vec<f64>, FitError> {
    let specs = model.param_specs();
    let radial = regimes.iter().find(|r| r.label == RegimeLabel::RadialFlow);
    let line = radial
        .and_then(|r| semilog_analysis(diagnostics, r, test).ok())
        .filter(|l| l.kh.is_finite() && l.skin.is_finite())
        .map(|l| (l.kh, l.skin));
    let (kh, skin) = line
        .or_else(|| late_level_guess(diagnostics, test))
        .unwrap_or((100.0, 0.0));

    let mut params = vec![0.0; specs.len()];
    params[KH_INDEX] = kh;
    params[SKIN_INDEX] = skin;
    params[STORAGE_INDEX] = storage_guess(diagnostics, regimes, test);
    params[INITIAL_PRESSURE_INDEX] = diagnostics.reference_pressure();

    for (i, spec) in specs.iter().enumerate().skip(INITIAL_PRESSURE_INDEX + 1) {
        params[i] = match spec.name {
            name if name == OMEGA.name => 0.1,
            name if name == LAMBDA.name => {
                let derivative = diagnostics.smoothed_derivative();
                let valley = (0..derivative.len())
                    .filter(|&j| derivative[j] > 0.0)
                    .min_by(|&a, &b| derivative[a].total_cmp(&derivative[b]));
                let omega: f64 = 0.1;
                valley.map_or(1e-6, |j| {
                    let td = dimensionless_time(kh, test, diagnostics.equivalent_time()[j]);
                    omega * (1.0 / omega).ln() / td
                })
            }
            name if name == LENGTH.name => 20.0 * test.thickness(),
            name if name == ANISOTROPY.name => 0.1,
            name if name == DISTANCE.name => {
                let time = boundary_time(diagnostics, regimes)
                    .or_else(|| diagnostics.equivalent_time().last().copied())
                    .unwrap_or(1.0);
                investigation_radius(kh, test, time)
            }
            _ => spec.lower,
        };
    }

    for (name, &value) in config.initial_guesses() {
        let i = param_index(specs, name).ok_or_else(|| FitError::UnknownParameter {
            model: model.name(),
            name: name.clone(),
        })?;
        params[i] = value;
    }

    for (value, spec) in params.iter_mut().zip(specs) {
        *value = spec.clamp(if value.is_finite() { *value } else { spec.lower });
    }
    debug!(model = model.name(), ?params, "initial guess");
    Ok(params)
}
