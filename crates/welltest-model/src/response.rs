//! Wellbore storage and skin wrapper, Stehfest inversion to field units and
//! superposition over a rate history.

use tracing::{debug, instrument};
use welltest_series::units::{
    DIMENSIONLESS_PRESSURE, DIMENSIONLESS_STORAGE, DIMENSIONLESS_TIME, effective_wellbore,
};
use welltest_series::{RateStep, TestConfiguration};

use crate::error::ModelError;
use crate::model::{AnalyticalModel, DimensionlessFrame};
use crate::param::{INITIAL_PRESSURE_INDEX, KH_INDEX, SKIN_INDEX, STORAGE_INDEX, check_params};
use crate::stehfest::stehfest_invert;

/// Pressure change and its log-time derivative at a set of times.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    /// Pressure change, psi.
    pub delta_p: Vec<f64>,
    /// `dΔp / d ln t`, psi.
    pub derivative: Vec<f64>,
}

/// Add wellbore storage `C_D` and skin `S` to a reservoir kernel value:
/// `(s p̄ + S) / (s [1 + C_D s (s p̄ + S)])`.
#[must_use]
pub fn storage_skin(kernel: f64, s: f64, storage: f64, skin: f64) -> f64 {
    let face = s * kernel + skin;
    face / (s * (1.0 + storage * s * face))
}

/// Response to a unit rate (1 STB/D or 1 Mscf/D) starting at `t = 0`.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`ModelError::ParameterCount`] | `params` does not match the model |
/// | [`ModelError::OutOfBounds`] | A parameter is outside its bounds |
/// | [`ModelError::InvalidTime`] | A time is not positive and finite |
/// | [`ModelError::NonFiniteResponse`] | The inversion diverged |
pub fn unit_response<M: AnalyticalModel + ?Sized>(
    model: &M,
    params: &[f64],
    config: &TestConfiguration,
    times: &[f64],
) -> Result<ModelResponse, ModelError> {
    check_params(model.name(), model.param_specs(), params)?;
    if let Some(&time) = times.iter().find(|t| !(t.is_finite() && **t > 0.0)) {
        return Err(ModelError::InvalidTime { time });
    }

    let kh = params[KH_INDEX];
    let h = config.thickness();
    let (rw, skin) = effective_wellbore(config.wellbore_radius(), params[SKIN_INDEX]);
    let time_scale =
        DIMENSIONLESS_TIME * (kh / h) / (config.storativity_viscosity() * rw * rw);
    let storage = DIMENSIONLESS_STORAGE * params[STORAGE_INDEX]
        / (config.porosity() * config.total_compressibility() * h * rw * rw);
    let pressure_scale =
        DIMENSIONLESS_PRESSURE * config.formation_volume_factor() * config.viscosity() / kh;

    let max_time = times.iter().copied().fold(0.0, f64::max).max(f64::MIN_POSITIVE);
    let frame = DimensionlessFrame {
        wellbore_radius: rw,
        thickness: h,
        max_time: time_scale * max_time,
    };
    let kernel = model.kernel(params, &frame);

    let mut delta_p = Vec::with_capacity(times.len());
    let mut derivative = Vec::with_capacity(times.len());
    for &t in times {
        let (pd, dpd) = stehfest_invert(|s| storage_skin(kernel(s), s, storage, skin), time_scale * t);
        if !(pd.is_finite() && dpd.is_finite()) {
            return Err(ModelError::NonFiniteResponse {
                model: model.name(),
                time: t,
            });
        }
        delta_p.push(pressure_scale * pd);
        derivative.push(pressure_scale * dpd);
    }
    Ok(ModelResponse {
        delta_p,
        derivative,
    })
}

/// Pressure drop and derivative of a constant-rate drawdown at `rate`.
///
/// # Errors
///
/// As [`unit_response`].
#[instrument(skip_all, fields(model = model.name(), n = times.len()))]
pub fn pressure_derivative<M: AnalyticalModel + ?Sized>(
    model: &M,
    params: &[f64],
    config: &TestConfiguration,
    rate: f64,
    times: &[f64],
) -> Result<ModelResponse, ModelError> {
    let mut response = unit_response(model, params, config, times)?;
    for v in response.delta_p.iter_mut().chain(response.derivative.iter_mut()) {
        *v *= rate;
    }
    debug!(rate, "drawdown response evaluated");
    Ok(response)
}

/// Superposed pressure drop `Σ Δq_k Δp_u(t − t_k)` over the steps that
/// started before each time.
///
/// # Errors
///
/// As [`unit_response`].
pub fn superposed_drop<M: AnalyticalModel + ?Sized>(
    model: &M,
    params: &[f64],
    config: &TestConfiguration,
    history: &[RateStep],
    times: &[f64],
) -> Result<Vec<f64>, ModelError> {
    let mut drop = vec![0.0; times.len()];
    for step in history.iter().filter(|step| step.rate_change != 0.0) {
        let (indices, elapsed): (Vec<usize>, Vec<f64>) = times
            .iter()
            .enumerate()
            .filter(|(_, t)| **t > step.start)
            .map(|(i, t)| (i, t - step.start))
            .unzip();
        if elapsed.is_empty() {
            continue;
        }
        let unit = unit_response(model, params, config, &elapsed)?;
        for (i, dp) in indices.into_iter().zip(unit.delta_p) {
            drop[i] += step.rate_change * dp;
        }
    }
    Ok(drop)
}

/// Bottom-hole pressure `Pi − Σ Δq_k Δp_u(t − t_k)`.
///
/// # Errors
///
/// As [`unit_response`].
#[instrument(skip_all, fields(model = model.name(), steps = history.len(), n = times.len()))]
pub fn superposed_pressure<M: AnalyticalModel + ?Sized>(
    model: &M,
    params: &[f64],
    config: &TestConfiguration,
    history: &[RateStep],
    times: &[f64],
) -> Result<Vec<f64>, ModelError> {
    check_params(model.name(), model.param_specs(), params)?;
    let pi = params[INITIAL_PRESSURE_INDEX];
    let drop = superposed_drop(model, params, config, history, times)?;
    Ok(drop.into_iter().map(|d| pi - d).collect())
}

#[cfg(test)]
mod tests {
    use welltest_series::units::HOURS_PER_DAY;

    use super::*;
    use crate::model::ReservoirModel;

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

    const PARAMS: [f64; 4] = [500.0, 2.0, 0.01, 5000.0];

    #[test]
    fn homogeneous_scenario_reference_values() {
        let model = ReservoirModel::HomogeneousWbsSkin;
        let r = pressure_derivative(&model, &PARAMS, &test_config(), 500.0, &[100.0]).unwrap();
        assert!((r.delta_p[0] - 1609.13).abs() < 0.5, "Δp = {}", r.delta_p[0]);
        // Radial-flow level 70.6 q B μ / kh, slightly above at 100 h.
        let level = 70.6 * 500.0 * 1.2 / 500.0;
        assert!(((r.derivative[0] - level) / level).abs() < 0.02, "d = {}", r.derivative[0]);
    }

    #[test]
    fn early_time_follows_storage_line() {
        // Δp = q B t / (24 C) while storage dominates.
        let model = ReservoirModel::HomogeneousWbsSkin;
        let params = [500.0, 0.0, 1.0, 5000.0];
        let t = 1e-4;
        let r = pressure_derivative(&model, &params, &test_config(), 500.0, &[t]).unwrap();
        let expected = 500.0 * 1.2 * t / (HOURS_PER_DAY * 1.0);
        assert!(((r.delta_p[0] - expected) / expected).abs() < 0.01);
        assert!(((r.derivative[0] - expected) / expected).abs() < 0.02);
    }

    #[test]
    fn negative_skin_lowers_pressure_drop() {
        let model = ReservoirModel::HomogeneousWbsSkin;
        let times = [1.0, 10.0, 100.0];
        let zero = unit_response(&model, &[500.0, 0.0, 0.01, 5000.0], &test_config(), &times).unwrap();
        let stimulated =
            unit_response(&model, &[500.0, -3.0, 0.01, 5000.0], &test_config(), &times).unwrap();
        for (a, b) in stimulated.delta_p.iter().zip(&zero.delta_p) {
            assert!(a.is_finite() && a < b);
        }
    }

    #[test]
    fn single_step_superposition_is_drawdown() {
        let model = ReservoirModel::HomogeneousWbsSkin;
        let times = [0.5, 5.0, 50.0];
        let history = [RateStep {
            start: 0.0,
            rate_change: 500.0,
        }];
        let p = superposed_pressure(&model, &PARAMS, &test_config(), &history, &times).unwrap();
        let r = pressure_derivative(&model, &PARAMS, &test_config(), 500.0, &times).unwrap();
        for (p, dp) in p.iter().zip(&r.delta_p) {
            assert!((p - (5000.0 - dp)).abs() < 1e-9);
        }
    }

    #[test]
    fn buildup_superposes_shifted_responses() {
        let model = ReservoirModel::HomogeneousWbsSkin;
        let history = [
            RateStep {
                start: 0.0,
                rate_change: 500.0,
            },
            RateStep {
                start: 20.0,
                rate_change: -500.0,
            },
        ];
        let p = superposed_pressure(&model, &PARAMS, &test_config(), &history, &[10.0, 30.0])
            .unwrap();
        let unit = unit_response(&model, &PARAMS, &test_config(), &[10.0, 30.0]).unwrap();
        assert!((p[0] - (5000.0 - 500.0 * unit.delta_p[0])).abs() < 1e-9);
        let expected = 5000.0 - 500.0 * (unit.delta_p[1] - unit.delta_p[0]);
        assert!((p[1] - expected).abs() < 1e-9);
    }

    #[test]
    fn rejects_bad_inputs() {
        let model = ReservoirModel::HomogeneousWbsSkin;
        assert!(matches!(
            unit_response(&model, &PARAMS, &test_config(), &[0.0]),
            Err(ModelError::InvalidTime { .. })
        ));
        assert!(matches!(
            unit_response(&model, &PARAMS[..3], &test_config(), &[1.0]),
            Err(ModelError::ParameterCount { .. })
        ));
        assert!(unit_response(&model, &PARAMS, &test_config(), &[]).unwrap().delta_p.is_empty());
    }

    #[test]
    fn every_model_evaluates() {
        let times = [0.01, 1.0, 100.0];
        for model in ReservoirModel::ALL {
            let mut params = vec![500.0, 2.0, 0.01, 5000.0];
            params.extend(match model {
                ReservoirModel::HomogeneousWbsSkin => vec![],
                ReservoirModel::DualPorosityPss | ReservoirModel::NaturallyFracturedVertical => {
                    vec![0.1, 1e-6]
                }
                ReservoirModel::HorizontalWell => vec![1000.0, 0.1],
                ReservoirModel::LinearBoundary => vec![300.0],
            });
            let r = pressure_derivative(&model, &params, &test_config(), 500.0, &times).unwrap();
            assert!(r.delta_p.windows(2).all(|w| w[1] > w[0]), "{model}");
            assert!(r.derivative.iter().all(|d| *d > 0.0), "{model}");
        }
    }
}
