//! Vertical well in an infinite homogeneous reservoir.

use crate::bessel::scaled_k0_k1;
use crate::model::{AnalyticalModel, DimensionlessFrame, LaplaceKernel};
use crate::param::{INITIAL_PRESSURE, KH, ParamSpec, SKIN, STORAGE};

static SPECS: [ParamSpec; 4] = [KH, SKIN, STORAGE, INITIAL_PRESSURE];

/// Homogeneous reservoir with wellbore storage and skin: `{kh, skin, C, Pi}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HomogeneousWbsSkin;

impl AnalyticalModel for HomogeneousWbsSkin {
    fn name(&self) -> &'static str {
        "homogeneous"
    }

    fn param_specs(&self) -> &'static [ParamSpec] {
        &SPECS
    }

    fn kernel(&self, _params: &[f64], _frame: &DimensionlessFrame) -> LaplaceKernel {
        Box::new(|s| radial_kernel(s, 1.0))
    }
}

/// Line-source solution at `r_D = 1` with storativity function `f(s)`:
/// `K0(x) / (s x K1(x))`, `x = √(s f)`.
pub(crate) fn radial_kernel(s: f64, storativity: f64) -> f64 {
    let x = (s * storativity).sqrt();
    let (k0, k1) = scaled_k0_k1(x);
    k0 / (s * x * k1)
}
