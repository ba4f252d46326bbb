//! Semilog straight-line analysis of the radial-flow regime.

use tracing::{debug, instrument};
use welltest_series::TestConfiguration;
use welltest_series::units::{DIMENSIONLESS_PRESSURE, DIMENSIONLESS_TIME, RADIAL_FLOW_OFFSET};

use crate::derivative::DiagnosticSeries;
use crate::error::DiagnosticError;
use crate::regime::FlowRegime;

/// Result of a semilog line `ΔP = m · ln(t_e) + b` fitted over a regime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SemilogAnalysis {
    /// Slope per natural-log unit of equivalent time, psi.
    pub slope: f64,
    /// ΔP on the line at an equivalent time of 1 h, psi.
    pub intercept: f64,
    /// Coefficient of determination of the line.
    pub r_squared: f64,
    /// Permeability-thickness from the slope, mD·ft.
    pub kh: f64,
    /// Skin from the 1-hour intercept.
    pub skin: f64,
    /// Extrapolated pressure `p*` (shut-in periods only), psi.
    pub extrapolated_pressure: Option<f64>,
}

/// Fit the semilog straight line over `regime` and derive kh, skin and `p*`.
///
/// `kh = 141.2 |Δq| B μ / (2m)` and
/// `S = ½ [b/m − ln(0.0002637 k / (φ μ c_t r_w²)) − 0.80907]`.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`DiagnosticError::InsufficientData`] | Fewer than 2 points in the regime |
/// | [`DiagnosticError::InapplicableTransform`] | The line has a non-positive slope |
#[instrument(skip_all, fields(start = regime.start, end = regime.end))]
pub fn semilog_analysis(
    series: &DiagnosticSeries,
    regime: &FlowRegime,
    config: &TestConfiguration,
) -> Result<SemilogAnalysis, DiagnosticError> {
    let end = regime.end_index.min(series.len());
    let first = regime.first_index.min(end);
    let n = end - first;
    if n < 2 {
        return Err(DiagnosticError::InsufficientData {
            context: "semilog analysis",
            needed: 2,
            got: n,
        });
    }

    let te = series.equivalent_time();
    let x: Vec<f64> = te[first..end].iter().map(|t| t.ln()).collect();
    let y = &series.delta_p()[first..end];

    let mx = x.iter().sum::<f64>() / n as f64;
    let my = y.iter().sum::<f64>() / n as f64;
    let sxx: f64 = x.iter().map(|v| (v - mx).powi(2)).sum();
    let sxy: f64 = x.iter().zip(y).map(|(a, b)| (a - mx) * (b - my)).sum();
    let syy: f64 = y.iter().map(|v| (v - my).powi(2)).sum();
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    if slope.is_nan() || slope <= 0.0 {
        return Err(DiagnosticError::InapplicableTransform {
            transform: "semilog",
            reason: format!("semilog slope {slope} is not positive"),
        });
    }
    let intercept = my - slope * mx;
    let r_squared = if syy > 0.0 { sxy * sxy / (sxx * syy) } else { 1.0 };

    let rate = series.rate_change().abs();
    let kh = DIMENSIONLESS_PRESSURE * rate * config.formation_volume_factor() * config.viscosity()
        / (2.0 * slope);
    let k = kh / config.thickness();
    let rw = config.wellbore_radius();
    let skin = 0.5
        * (intercept / slope
            - (DIMENSIONLESS_TIME * k / (config.storativity_viscosity() * rw * rw)).ln()
            - RADIAL_FLOW_OFFSET);

    // p* = line extrapolated to t_e → t_p, oriented back to pressure.
    let extrapolated_pressure = series.producing_time().map(|tp| {
        series.reference_pressure() - series.orientation() * (slope * tp.ln() + intercept)
    });

    debug!(slope, kh, skin, r_squared, "semilog line fitted");
    Ok(SemilogAnalysis {
        slope,
        intercept,
        r_squared,
        kh,
        skin,
        extrapolated_pressure,
    })
}

#[cfg(test)]
mod tests {
    use welltest_series::{NormalizeConfig, Sample, normalize};

    use super::*;
    use crate::derivative::{DerivativeConfig, diagnose};
    use crate::regime::RegimeLabel;

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

    fn whole(series: &DiagnosticSeries) -> FlowRegime {
        FlowRegime {
            label: RegimeLabel::RadialFlow,
            start: series.elapsed()[0],
            end: series.elapsed()[series.len() - 1],
            confidence: 1.0,
            first_index: 0,
            end_index: series.len(),
            mean_slope: Some(0.0),
        }
    }

    /// Δp from the radial-flow approximation for kh, skin at 500 STB/D.
    fn radial_dp(kh: f64, skin: f64, t: f64) -> f64 {
        let k = kh / 50.0;
        let td = DIMENSIONLESS_TIME * k * t / (0.2 * 1.0 * 1e-5 * 0.09);
        DIMENSIONLESS_PRESSURE * 500.0 * 1.2 * 1.0 / kh * (0.5 * (td.ln() + RADIAL_FLOW_OFFSET) + skin)
    }

    #[test]
    fn recovers_kh_and_skin_from_radial_line() {
        let raw: Vec<Sample> = (0..20)
            .map(|i| {
                let t = 10f64.powf(i as f64 / 10.0);
                Sample::new(t, 5000.0 - radial_dp(500.0, 2.0, t), 500.0)
            })
            .collect();
        let series = normalize(&raw, &test_config(), &NormalizeConfig::new()).unwrap();
        let diag = diagnose(&series, &DerivativeConfig::new()).unwrap();
        let line = semilog_analysis(&diag, &whole(&diag), &test_config()).unwrap();
        assert!((line.kh - 500.0).abs() < 1e-6, "kh = {}", line.kh);
        assert!((line.skin - 2.0).abs() < 1e-6, "skin = {}", line.skin);
        assert!((line.r_squared - 1.0).abs() < 1e-12);
        assert!(line.extrapolated_pressure.is_none());
    }

    #[test]
    fn buildup_extrapolates_to_initial_pressure() {
        // Infinite-acting buildup: p_ws = p_i − m ln((t_p + Δt)/Δt).
        let pi = 5000.0;
        let m = 20.0;
        let tp = 50.0;
        let mut raw = Vec::new();
        for i in 0..10 {
            let t = 5.0 * (i + 1) as f64 - 4.0;
            raw.push(Sample::new(t, 4500.0 - i as f64, 300.0));
        }
        raw.push(Sample::new(tp, 4400.0, 0.0));
        for i in 1..=20 {
            let dt = 0.5 * i as f64;
            raw.push(Sample::new(tp + dt, pi - m * ((tp + dt) / dt).ln(), 0.0));
        }
        let series = normalize(&raw, &test_config(), &NormalizeConfig::new()).unwrap();
        let diag = diagnose(&series, &DerivativeConfig::new()).unwrap();
        let line = semilog_analysis(&diag, &whole(&diag), &test_config()).unwrap();
        let p_star = line.extrapolated_pressure.unwrap();
        assert!((p_star - pi).abs() < 1e-6, "p* = {p_star}");
        assert!((line.slope - m).abs() < 1e-9);
    }

    #[test]
    fn too_short_regime_is_rejected() {
        let raw: Vec<Sample> = (1..=6)
            .map(|i| Sample::new(i as f64, 4900.0 - i as f64, 100.0))
            .collect();
        let series = normalize(&raw, &test_config(), &NormalizeConfig::new()).unwrap();
        let diag = diagnose(&series, &DerivativeConfig::new()).unwrap();
        let regime = FlowRegime {
            end_index: 1,
            ..whole(&diag)
        };
        assert!(matches!(
            semilog_analysis(&diag, &regime, &test_config()),
            Err(DiagnosticError::InsufficientData { .. })
        ));
    }
}
