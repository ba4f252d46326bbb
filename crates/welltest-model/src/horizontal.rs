//! Horizontal well: uniform-flux line source at mid-height of a slab with
//! sealing top and bottom.
//!
//! The log-derivative of the dimensionless pressure is a product of
//! instantaneous source functions in the time domain. It is transformed to
//! Laplace space by trapezoid quadrature on a `ln τ` grid, so the shared
//! storage and skin wrapper applies unchanged.

use std::f64::consts::PI;

use statrs::function::erf::erf;

use crate::model::{AnalyticalModel, DimensionlessFrame, LaplaceKernel};
use crate::param::{ANISOTROPY, INITIAL_PRESSURE, KH, LENGTH, ParamSpec, SKIN, STORAGE};

static SPECS: [ParamSpec; 6] = [KH, SKIN, STORAGE, INITIAL_PRESSURE, LENGTH, ANISOTROPY];

const LENGTH_INDEX: usize = 4;
const ANISOTROPY_INDEX: usize = 5;

/// First quadrature node, dimensionless time.
const TAU_MIN: f64 = 0.002;
/// The grid extends to `TAU_SPAN / s_min`.
const TAU_SPAN: f64 = 50.0;
/// Grid spacing in `ln τ`.
const LOG_STEP: f64 = 0.1;
/// Quadrature stops once `s·τ` exceeds this.
const EXP_CUTOFF: f64 = 60.0;
/// Image wells on each side of the slab.
const IMAGES: i32 = 4;
/// Below this `a·τ/h_D²` the image sum converges faster than the Fourier series.
const IMAGE_REGIME: f64 = 0.25;

/// Horizontal well: `{kh, skin, C, Pi, length, anisotropy}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HorizontalWell;

impl AnalyticalModel for HorizontalWell {
    fn name(&self) -> &'static str {
        "horizontal"
    }

    fn param_specs(&self) -> &'static [ParamSpec] {
        &SPECS
    }

    fn kernel(&self, params: &[f64], frame: &DimensionlessFrame) -> LaplaceKernel {
        let rw = frame.wellbore_radius;
        let table = SourceTable::new(
            params[LENGTH_INDEX] / rw,
            frame.thickness / rw,
            params[ANISOTROPY_INDEX],
            frame.max_time,
        );
        Box::new(move |s| table.transform(s))
    }
}

/// Vertical source function: slab of height `h_D`, source and observation at
/// mid-height, vertical diffusivity ratio `a`.
fn vertical_source(tau: f64, hd: f64, a: f64) -> f64 {
    let u = a * tau / (hd * hd);
    if u < IMAGE_REGIME {
        let denom = 4.0 * a * tau;
        let sum: f64 = (-IMAGES..=IMAGES)
            .map(|m| {
                let m = f64::from(m);
                let direct = 2.0 * m * hd;
                let mirrored = (2.0 * m - 1.0) * hd;
                (-direct * direct / denom).exp() + (-mirrored * mirrored / denom).exp()
            })
            .sum();
        sum / (PI * denom).sqrt()
    } else {
        let series: f64 = (1..=IMAGES)
            .map(|j| {
                let j = f64::from(j);
                2.0 * (-4.0 * j * j * PI * PI * u).exp()
            })
            .sum();
        (1.0 + series) / hd
    }
}

/// `d p_D / d ln τ` of the uniform-flux line source of length `L_D`.
fn log_derivative(tau: f64, ld: f64, hd: f64, a: f64) -> f64 {
    let along = erf(ld / (4.0 * tau.sqrt()));
    let across = (-1.0 / (4.0 * tau)).exp() / (4.0 * PI * tau).sqrt();
    0.5 * tau * (4.0 * PI * hd / ld) * along * across * vertical_source(tau, hd, a)
}

/// Tabulated log-derivative on a `ln τ` grid, ready for Laplace quadrature.
struct SourceTable {
    taus: Vec<f64>,
    values: Vec<f64>,
}

impl SourceTable {
    fn new(ld: f64, hd: f64, a: f64, max_time: f64) -> Self {
        let s_min = std::f64::consts::LN_2 / max_time;
        let lower = TAU_MIN.ln();
        let upper = (TAU_SPAN / s_min).ln().max(lower + LOG_STEP);
        let n = ((upper - lower) / LOG_STEP) as usize + 2;
        let taus: Vec<f64> = (0..n).map(|i| (lower + i as f64 * LOG_STEP).exp()).collect();
        let values = taus.iter().map(|&tau| log_derivative(tau, ld, hd, a)).collect();
        Self { taus, values }
    }

    /// `p̄_D(s) = (1/s) ∫ e^{−sτ} p_D'(τ) d ln τ`.
    fn transform(&self, s: f64) -> f64 {
        let mut total = 0.0;
        for (i, (&tau, &value)) in self.taus.iter().zip(&self.values).enumerate() {
            let exponent = s * tau;
            if exponent > EXP_CUTOFF {
                break;
            }
            let weight = if i == 0 { 0.5 } else { 1.0 };
            total += weight * (-exponent).exp() * value;
        }
        total * LOG_STEP / s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stehfest::stehfest_invert;

    /// L = 1000 ft, h = 50 ft, r_w = 0.3 ft, kv/kh = 0.1.
    fn setup(max_time: f64) -> (LaplaceKernel, f64, f64) {
        let frame = DimensionlessFrame {
            wellbore_radius: 0.3,
            thickness: 50.0,
            max_time,
        };
        let kernel = HorizontalWell.kernel(&[500.0, 0.0, 0.01, 5000.0, 1000.0, 0.1], &frame);
        (kernel, 1000.0 / 0.3, 50.0 / 0.3)
    }

    #[test]
    fn early_vertical_radial_flow_level() {
        // d p_D / d ln t_D = (h/L) / (2 √a) during early radial flow in the vertical plane.
        let (kernel, _, _) = setup(1.46e7);
        let expected = 0.5 * (50.0 / 1000.0) / 0.1f64.sqrt();
        for td in [146.0, 1460.0] {
            let (_, d) = stehfest_invert(&kernel, td);
            assert!((d - expected).abs() < 0.002, "t_D = {td}: {d} vs {expected}");
        }
    }

    #[test]
    fn late_pseudo_radial_flow_tends_to_half() {
        let (kernel, _, _) = setup(1.46e7);
        let (_, d) = stehfest_invert(&kernel, 1.46e7);
        assert!((d - 0.5).abs() < 0.02, "late derivative {d}");
    }

    #[test]
    fn laplace_quadrature_matches_direct_evaluation() {
        let (kernel, ld, hd) = setup(1.46e7);
        for td in [1e3, 1e5, 1e6] {
            let (_, d) = stehfest_invert(&kernel, td);
            let direct = log_derivative(td, ld, hd, 0.1);
            assert!((d - direct).abs() < 1e-3, "t_D = {td}: {d} vs {direct}");
        }
    }

    #[test]
    fn vertical_source_branches_agree() {
        let hd = 50.0 / 0.3;
        let tau = IMAGE_REGIME * hd * hd / 0.1;
        let a = vertical_source(tau * (1.0 - 1e-9), hd, 0.1);
        let b = vertical_source(tau, hd, 0.1);
        assert!(((a - b) / b).abs() < 1e-6, "{a} vs {b}");
    }
}
