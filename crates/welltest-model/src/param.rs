//! Parameter definitions shared by the reservoir models.

use crate::error::ModelError;

/// Scale in which the optimiser moves a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamScale {
    /// Optimised as `ln(value)`.
    Log,
    /// Optimised as-is.
    Linear,
    /// Additive offset solved in closed form, never iterated.
    Offset,
}

/// Name, unit, physical bounds and optimisation scale of one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    /// Parameter name used in results and initial-guess maps.
    pub name: &'static str,
    /// Unit label.
    pub unit: &'static str,
    /// Inclusive lower bound.
    pub lower: f64,
    /// Inclusive upper bound.
    pub upper: f64,
    /// Optimisation scale.
    pub scale: ParamScale,
}

impl ParamSpec {
    /// Whether `value` is finite and inside the bounds.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.lower && value <= self.upper
    }

    /// Clamp `value` into the bounds.
    #[must_use]
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.lower, self.upper)
    }

    /// Map a physical value to the optimiser's coordinate.
    #[must_use]
    pub fn to_internal(&self, value: f64) -> f64 {
        match self.scale {
            ParamScale::Log => value.ln(),
            ParamScale::Linear | ParamScale::Offset => value,
        }
    }

    /// Map an optimiser coordinate back to a clamped physical value.
    #[must_use]
    pub fn from_internal(&self, x: f64) -> f64 {
        let value = match self.scale {
            ParamScale::Log => x.exp(),
            ParamScale::Linear | ParamScale::Offset => x,
        };
        self.clamp(value)
    }
}

// ── Parameter table ───────────────────────────────────────────────────────────

/// Permeability-thickness.
pub const KH: ParamSpec = ParamSpec {
    name: "kh",
    unit: "mD.ft",
    lower: 0.01,
    upper: 1e6,
    scale: ParamScale::Log,
};

/// Mechanical skin.
pub const SKIN: ParamSpec = ParamSpec {
    name: "skin",
    unit: "",
    lower: -5.0,
    upper: 100.0,
    scale: ParamScale::Linear,
};

/// Wellbore storage coefficient.
pub const STORAGE: ParamSpec = ParamSpec {
    name: "C",
    unit: "bbl/psi",
    lower: 1e-6,
    upper: 10.0,
    scale: ParamScale::Log,
};

/// Initial reservoir pressure.
pub const INITIAL_PRESSURE: ParamSpec = ParamSpec {
    name: "Pi",
    unit: "psi",
    lower: 1.0,
    upper: 20_000.0,
    scale: ParamScale::Offset,
};

/// Fracture storativity ratio.
pub const OMEGA: ParamSpec = ParamSpec {
    name: "omega",
    unit: "",
    lower: 1e-4,
    upper: 0.999,
    scale: ParamScale::Log,
};

/// Interporosity flow coefficient.
pub const LAMBDA: ParamSpec = ParamSpec {
    name: "lambda",
    unit: "",
    lower: 1e-10,
    upper: 1e-2,
    scale: ParamScale::Log,
};

/// Effective horizontal drain length.
pub const LENGTH: ParamSpec = ParamSpec {
    name: "length",
    unit: "ft",
    lower: 10.0,
    upper: 20_000.0,
    scale: ParamScale::Log,
};

/// Vertical to horizontal permeability ratio `kv/kh`.
pub const ANISOTROPY: ParamSpec = ParamSpec {
    name: "anisotropy",
    unit: "",
    lower: 1e-4,
    upper: 10.0,
    scale: ParamScale::Log,
};

/// Distance from the well to a sealing fault.
pub const DISTANCE: ParamSpec = ParamSpec {
    name: "distance",
    unit: "ft",
    lower: 5.0,
    upper: 1e5,
    scale: ParamScale::Log,
};

/// Position of `kh` in every parameter vector.
pub const KH_INDEX: usize = 0;
/// Position of skin in every parameter vector.
pub const SKIN_INDEX: usize = 1;
/// Position of the storage coefficient in every parameter vector.
pub const STORAGE_INDEX: usize = 2;
/// Position of the initial pressure in every parameter vector.
pub const INITIAL_PRESSURE_INDEX: usize = 3;

/// Index of the parameter called `name` in `specs`.
#[must_use]
pub fn param_index(specs: &[ParamSpec], name: &str) -> Option<usize> {
    specs.iter().position(|spec| spec.name == name)
}

/// Check that `params` matches `specs` in length and bounds.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`ModelError::ParameterCount`] | Lengths differ |
/// | [`ModelError::OutOfBounds`] | A value is non-finite or outside its bounds |
pub fn check_params(
    model: &'static str,
    specs: &[ParamSpec],
    params: &[f64],
) -> Result<(), ModelError> {
    if specs.len() != params.len() {
        return Err(ModelError::ParameterCount {
            model,
            expected: specs.len(),
            got: params.len(),
        });
    }
    for (spec, &value) in specs.iter().zip(params) {
        if !spec.contains(value) {
            return Err(ModelError::OutOfBounds {
                name: spec.name,
                value,
                lower: spec.lower,
                upper: spec.upper,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_scale_round_trips_and_clamps() {
        let x = KH.to_internal(500.0);
        assert!((x - 500f64.ln()).abs() < 1e-15);
        assert!((KH.from_internal(x) - 500.0).abs() < 1e-9);
        assert_eq!(KH.from_internal(100.0), KH.upper);
        assert_eq!(SKIN.from_internal(-50.0), SKIN.lower);
    }

    #[test]
    fn check_params_reports_offender() {
        let specs = [KH, SKIN, STORAGE, INITIAL_PRESSURE];
        assert!(check_params("m", &specs, &[500.0, 2.0, 0.01, 5000.0]).is_ok());
        assert!(matches!(
            check_params("m", &specs, &[500.0, 2.0]),
            Err(ModelError::ParameterCount { expected: 4, got: 2, .. })
        ));
        assert!(matches!(
            check_params("m", &specs, &[500.0, -9.0, 0.01, 5000.0]),
            Err(ModelError::OutOfBounds { name: "skin", .. })
        ));
        assert!(matches!(
            check_params("m", &specs, &[f64::NAN, 2.0, 0.01, 5000.0]),
            Err(ModelError::OutOfBounds { name: "kh", .. })
        ));
    }

    #[test]
    fn index_lookup() {
        let specs = [KH, SKIN, STORAGE, INITIAL_PRESSURE, DISTANCE];
        assert_eq!(param_index(&specs, "distance"), Some(4));
        assert_eq!(param_index(&specs, "C"), Some(STORAGE_INDEX));
        assert_eq!(param_index(&specs, "omega"), None);
    }
}
