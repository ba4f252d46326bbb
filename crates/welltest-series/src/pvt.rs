//! Real-gas PVT and the pseudo-variable adapter.
//!
//! Correlations: Sutton pseudo-criticals, Dranchuk–Abou-Kassem z-factor,
//! Lee–Gonzalez–Eakin viscosity. Pressures in psia, temperature in °R
//! internally.

use crate::config::GasProperties;

const RANKINE_OFFSET: f64 = 459.67;
const AIR_MOLECULAR_WEIGHT: f64 = 28.97;

/// Dranchuk–Abou-Kassem coefficients A1..A11.
const DAK: [f64; 11] = [
    0.3265, -1.0700, -0.5339, 0.01569, -0.05165, 0.5475, -0.7361, 0.1844, 0.1056, 0.6134,
    0.7210,
];

/// Intervals of the pseudo-pressure integration grid.
const PSEUDO_PRESSURE_STEPS: usize = 400;

/// Gas property correlations for one gas composition and temperature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasPvt {
    specific_gravity: f64,
    temperature_r: f64,
    pseudo_critical_pressure: f64,
    pseudo_critical_temperature: f64,
}

impl GasPvt {
    /// Build the correlations for the given gas.
    #[must_use]
    pub fn new(gas: &GasProperties) -> Self {
        let sg = gas.specific_gravity;
        Self {
            specific_gravity: sg,
            temperature_r: gas.temperature_f + RANKINE_OFFSET,
            pseudo_critical_pressure: 756.8 - 131.0 * sg - 3.6 * sg * sg,
            pseudo_critical_temperature: 169.2 + 349.5 * sg - 74.0 * sg * sg,
        }
    }

    /// Gas deviation factor z at pressure `p` (psia).
    #[must_use]
    pub fn z_factor(&self, p: f64) -> f64 {
        let ppr = p / self.pseudo_critical_pressure;
        let tpr = self.temperature_r / self.pseudo_critical_temperature;
        dak_z(ppr, tpr)
    }

    /// Gas viscosity (cP) at pressure `p`.
    #[must_use]
    pub fn viscosity(&self, p: f64) -> f64 {
        let m = AIR_MOLECULAR_WEIGHT * self.specific_gravity;
        let t = self.temperature_r;
        let density = 0.001_493_5 * p * m / (self.z_factor(p) * t);
        let k = (9.4 + 0.02 * m) * t.powf(1.5) / (209.0 + 19.0 * m + t);
        let x = 3.5 + 986.0 / t + 0.01 * m;
        let y = 2.4 - 0.2 * x;
        1e-4 * k * (x * density.powf(y)).exp()
    }

    /// Isothermal gas compressibility `c_g = 1/p − (1/z)·dz/dp`, 1/psi.
    #[must_use]
    pub fn compressibility(&self, p: f64) -> f64 {
        let h = 1e-3 * p;
        let dz = (self.z_factor(p + h) - self.z_factor(p - h)) / (2.0 * h);
        1.0 / p - dz / self.z_factor(p)
    }

    /// Normalized pseudo-pressure of each pressure, relative to `p_ref`.
    ///
    /// `p_p = p_ref + (μz/p)_ref ∫_{p_ref}^{p} p/(μz) dp`, so `p_p(p_ref) = p_ref`
    /// and the mapping is strictly increasing.
    #[must_use]
    pub fn normalized_pseudo_pressure(&self, p_ref: f64, pressures: &[f64]) -> Vec<f64> {
        let lo = pressures.iter().copied().fold(p_ref, f64::min);
        let hi = pressures.iter().copied().fold(p_ref, f64::max);
        if hi <= lo {
            return pressures.to_vec();
        }

        let step = (hi - lo) / PSEUDO_PRESSURE_STEPS as f64;
        let integrand = |p: f64| p / (self.viscosity(p) * self.z_factor(p));
        let grid: Vec<f64> = (0..=PSEUDO_PRESSURE_STEPS)
            .map(|i| lo + step * i as f64)
            .collect();
        let mut cumulative = Vec::with_capacity(grid.len());
        cumulative.push(0.0);
        let mut previous = integrand(grid[0]);
        for &p in &grid[1..] {
            let current = integrand(p);
            let last = cumulative[cumulative.len() - 1];
            cumulative.push(last + 0.5 * step * (previous + current));
            previous = current;
        }

        let at = |p: f64| -> f64 {
            let pos = ((p - lo) / step).clamp(0.0, PSEUDO_PRESSURE_STEPS as f64);
            let i = (pos.floor() as usize).min(PSEUDO_PRESSURE_STEPS - 1);
            let frac = pos - i as f64;
            cumulative[i] + frac * (cumulative[i + 1] - cumulative[i])
        };

        let m_ref = at(p_ref);
        let scale = self.viscosity(p_ref) * self.z_factor(p_ref) / p_ref;
        pressures
            .iter()
            .map(|&p| p_ref + scale * (at(p) - m_ref))
            .collect()
    }

    /// Normalized pseudo-time at each sample.
    ///
    /// `t_a = (μ c_t)_ref ∫ dt / (μ c_t)`, integrated by trapezoid over the
    /// sample pressures. Total compressibility follows the change of gas
    /// compressibility away from the reference pressure.
    #[must_use]
    pub fn normalized_pseudo_time(
        &self,
        p_ref: f64,
        total_compressibility: f64,
        times: &[f64],
        pressures: &[f64],
    ) -> Vec<f64> {
        let cg_ref = self.compressibility(p_ref);
        let floor = 0.1 * total_compressibility;
        let mu_ct = |p: f64| {
            let ct = (total_compressibility + self.compressibility(p) - cg_ref).max(floor);
            self.viscosity(p) * ct
        };
        let reference = self.viscosity(p_ref) * total_compressibility;

        let mut out = Vec::with_capacity(times.len());
        let Some(&first) = times.first() else {
            return out;
        };
        out.push(first);
        let mut previous = reference / mu_ct(pressures[0]);
        for i in 1..times.len() {
            let current = reference / mu_ct(pressures[i]);
            let last = out[i - 1];
            out.push(last + 0.5 * (times[i] - times[i - 1]) * (previous + current));
            previous = current;
        }
        out
    }
}

/// z-factor by bisection on the reduced density.
fn dak_z(ppr: f64, tpr: f64) -> f64 {
    if ppr <= 0.0 {
        return 1.0;
    }
    let residual = |rho: f64| dak_z_of_density(rho, tpr) - 0.27 * ppr / (rho * tpr);
    let (mut lo, mut hi) = (1e-10, 3.0);
    for _ in 0..100 {
        let mid = 0.5 * (lo + hi);
        if residual(mid) > 0.0 {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    dak_z_of_density(0.5 * (lo + hi), tpr)
}

fn dak_z_of_density(rho: f64, tr: f64) -> f64 {
    let a = &DAK;
    let rho2 = rho * rho;
    1.0 + (a[0] + a[1] / tr + a[2] / tr.powi(3) + a[3] / tr.powi(4) + a[4] / tr.powi(5)) * rho
        + (a[5] + a[6] / tr + a[7] / (tr * tr)) * rho2
        - a[8] * (a[6] / tr + a[7] / (tr * tr)) * rho.powi(5)
        + a[9] * (1.0 + a[10] * rho2) * (rho2 / tr.powi(3)) * (-a[10] * rho2).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pvt() -> GasPvt {
        GasPvt::new(&GasProperties {
            specific_gravity: 0.65,
            temperature_f: 200.0,
        })
    }

    #[test]
    fn z_factor_matches_standing_katz() {
        assert!((dak_z(2.0, 1.5) - 0.8215).abs() < 2e-3);
        assert!((dak_z(0.01, 1.5) - 1.0).abs() < 2e-3);
        assert!((dak_z(5.0, 1.3) - 0.7267).abs() < 2e-3);
    }

    #[test]
    fn viscosity_in_expected_range() {
        let mu = pvt().viscosity(3000.0);
        assert!((mu - 0.01936).abs() < 5e-4, "mu = {mu}");
        assert!(pvt().viscosity(100.0) < mu);
    }

    #[test]
    fn pseudo_pressure_identity_at_reference() {
        let pressures = [1000.0, 2500.0, 3000.0, 4000.0];
        let pp = pvt().normalized_pseudo_pressure(3000.0, &pressures);
        assert!((pp[2] - 3000.0).abs() < 1e-9);
    }

    #[test]
    fn pseudo_pressure_is_monotonic() {
        let pressures: Vec<f64> = (1..50).map(|i| 100.0 * i as f64).collect();
        let pp = pvt().normalized_pseudo_pressure(4000.0, &pressures);
        for w in pp.windows(2) {
            assert!(w[1] > w[0], "{} !< {}", w[0], w[1]);
        }
    }

    #[test]
    fn pseudo_time_equals_time_at_reference_pressure() {
        let times = [0.0, 1.0, 2.0, 5.0];
        let pressures = [3000.0; 4];
        let ta = pvt().normalized_pseudo_time(3000.0, 1e-4, &times, &pressures);
        for (a, b) in ta.iter().zip(&times) {
            assert!((a - b).abs() < 1e-9);
        }
    }
}
