//! Naturally fractured (double-porosity) reservoirs.
//!
//! Both models replace `s` in the homogeneous solution by `s·f(s)`; they
//! differ in how the matrix feeds the fissures.

use crate::homogeneous::radial_kernel;
use crate::model::{AnalyticalModel, DimensionlessFrame, LaplaceKernel};
use crate::param::{INITIAL_PRESSURE, KH, LAMBDA, OMEGA, ParamSpec, SKIN, STORAGE};

static SPECS: [ParamSpec; 6] = [KH, SKIN, STORAGE, INITIAL_PRESSURE, OMEGA, LAMBDA];

const OMEGA_INDEX: usize = 4;
const LAMBDA_INDEX: usize = 5;

/// Warren–Root pseudo-steady-state interporosity flow:
/// `{kh, skin, C, Pi, omega, lambda}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DualPorosityPss;

/// Transient (slab matrix) interporosity flow:
/// `{kh, skin, C, Pi, omega, lambda}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NaturallyFracturedVertical;

/// `f(s) = (ω(1−ω)s + λ) / ((1−ω)s + λ)`.
pub(crate) fn pseudo_steady_state(s: f64, omega: f64, lambda: f64) -> f64 {
    (omega * (1.0 - omega) * s + lambda) / ((1.0 - omega) * s + lambda)
}

/// `f(s) = ω + √(λ(1−ω)/(3s)) · tanh(√(3(1−ω)s/λ))`.
pub(crate) fn transient_slab(s: f64, omega: f64, lambda: f64) -> f64 {
    let inner = (3.0 * (1.0 - omega) * s / lambda).sqrt();
    omega + (lambda * (1.0 - omega) / (3.0 * s)).sqrt() * inner.tanh()
}

fn omega_lambda(params: &[f64]) -> (f64, f64) {
    (params[OMEGA_INDEX], params[LAMBDA_INDEX])
}

impl AnalyticalModel for DualPorosityPss {
    fn name(&self) -> &'static str {
        "dual_porosity_pss"
    }

    fn param_specs(&self) -> &'static [ParamSpec] {
        &SPECS
    }

    fn kernel(&self, params: &[f64], _frame: &DimensionlessFrame) -> LaplaceKernel {
        let (omega, lambda) = omega_lambda(params);
        Box::new(move |s| radial_kernel(s, pseudo_steady_state(s, omega, lambda)))
    }
}

impl AnalyticalModel for NaturallyFracturedVertical {
    fn name(&self) -> &'static str {
        "naturally_fractured"
    }

    fn param_specs(&self) -> &'static [ParamSpec] {
        &SPECS
    }

    fn kernel(&self, params: &[f64], _frame: &DimensionlessFrame) -> LaplaceKernel {
        let (omega, lambda) = omega_lambda(params);
        Box::new(move |s| radial_kernel(s, transient_slab(s, omega, lambda)))
    }
}
