//! Homogeneous reservoir bounded by one sealing fault.

use crate::bessel::scaled_k0_k1;
use crate::model::{AnalyticalModel, DimensionlessFrame, LaplaceKernel};
use crate::param::{DISTANCE, INITIAL_PRESSURE, KH, ParamSpec, SKIN, STORAGE};

static SPECS: [ParamSpec; 5] = [KH, SKIN, STORAGE, INITIAL_PRESSURE, DISTANCE];

const DISTANCE_INDEX: usize = 4;

/// Sealing fault at distance `d`: `{kh, skin, C, Pi, distance}`.
///
/// The fault is an image well at `2d`, so the late derivative doubles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinearBoundary;

impl AnalyticalModel for LinearBoundary {
    fn name(&self) -> &'static str {
        "linear_boundary"
    }

    fn param_specs(&self) -> &'static [ParamSpec] {
        &SPECS
    }

    fn kernel(&self, params: &[f64], frame: &DimensionlessFrame) -> LaplaceKernel {
        let distance = params[DISTANCE_INDEX] / frame.wellbore_radius;
        Box::new(move |s| image_kernel(s, distance))
    }

    fn has_boundary(&self) -> bool {
        true
    }
}

/// `[K0(√s) + K0(2d√s)] / (s √s K1(√s))` with scaled Bessel functions.
fn image_kernel(s: f64, distance: f64) -> f64 {
    let root = s.sqrt();
    let (k0, k1) = scaled_k0_k1(root);
    let (image, _) = scaled_k0_k1(2.0 * distance * root);
    (k0 + image * (-(2.0 * distance - 1.0) * root).exp()) / (s * root * k1)
}
