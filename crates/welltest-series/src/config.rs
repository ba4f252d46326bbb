//! Test configuration and normalizer settings.

use crate::error::SeriesError;

/// Gas properties needed for pseudo-pressure and pseudo-time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasProperties {
    /// Gas specific gravity (air = 1).
    pub specific_gravity: f64,
    /// Reservoir temperature, °F.
    pub temperature_f: f64,
}

/// Fluid and rock properties of a well test. Immutable once built.
///
/// Construct via [`TestConfiguration::builder`]; every field except the
/// initial-pressure estimate and the gas properties is required.
#[derive(Debug, Clone, PartialEq)]
pub struct TestConfiguration {
    viscosity: f64,
    total_compressibility: f64,
    formation_volume_factor: f64,
    porosity: f64,
    thickness: f64,
    wellbore_radius: f64,
    initial_pressure: Option<f64>,
    gas: Option<GasProperties>,
}

impl TestConfiguration {
    /// Start a new builder with no fields set.
    #[must_use]
    pub fn builder() -> TestConfigurationBuilder {
        TestConfigurationBuilder::default()
    }

    /// Fluid viscosity μ, cP.
    #[must_use]
    pub fn viscosity(&self) -> f64 {
        self.viscosity
    }

    /// Total compressibility c_t, 1/psi.
    #[must_use]
    pub fn total_compressibility(&self) -> f64 {
        self.total_compressibility
    }

    /// Formation volume factor B, rb/STB (rb/Mscf for gas).
    #[must_use]
    pub fn formation_volume_factor(&self) -> f64 {
        self.formation_volume_factor
    }

    /// Porosity φ, fraction.
    #[must_use]
    pub fn porosity(&self) -> f64 {
        self.porosity
    }

    /// Net pay thickness h, ft.
    #[must_use]
    pub fn thickness(&self) -> f64 {
        self.thickness
    }

    /// Wellbore radius r_w, ft.
    #[must_use]
    pub fn wellbore_radius(&self) -> f64 {
        self.wellbore_radius
    }

    /// Initial reservoir pressure estimate, psi.
    #[must_use]
    pub fn initial_pressure(&self) -> Option<f64> {
        self.initial_pressure
    }

    /// Gas properties, present only for gas wells.
    #[must_use]
    pub fn gas(&self) -> Option<&GasProperties> {
        self.gas.as_ref()
    }

    /// True when pseudo-pressure and pseudo-time substitution applies.
    #[must_use]
    pub fn is_gas_well(&self) -> bool {
        self.gas.is_some()
    }

    /// Hydraulic diffusivity group `φ μ c_t`.
    #[must_use]
    pub fn storativity_viscosity(&self) -> f64 {
        self.porosity * self.viscosity * self.total_compressibility
    }

    /// Copy of this configuration with the gas flag cleared.
    ///
    /// Once pressures and times have been replaced by their normalized
    /// pseudo-variables, the liquid equations apply unchanged.
    #[must_use]
    pub fn as_liquid(&self) -> Self {
        Self {
            gas: None,
            ..self.clone()
        }
    }
}

/// Validating builder for [`TestConfiguration`].
#[derive(Debug, Clone, Default)]
pub struct TestConfigurationBuilder {
    viscosity: Option<f64>,
    total_compressibility: Option<f64>,
    formation_volume_factor: Option<f64>,
    porosity: Option<f64>,
    thickness: Option<f64>,
    wellbore_radius: Option<f64>,
    initial_pressure: Option<f64>,
    gas_well: bool,
    gas: Option<GasProperties>,
}

impl TestConfigurationBuilder {
    /// Set the fluid viscosity, cP.
    #[must_use]
    pub fn with_viscosity(mut self, viscosity: f64) -> Self {
        self.viscosity = Some(viscosity);
        self
    }

    /// Set the total compressibility, 1/psi.
    #[must_use]
    pub fn with_total_compressibility(mut self, total_compressibility: f64) -> Self {
        self.total_compressibility = Some(total_compressibility);
        self
    }

    /// Set the formation volume factor.
    #[must_use]
    pub fn with_formation_volume_factor(mut self, formation_volume_factor: f64) -> Self {
        self.formation_volume_factor = Some(formation_volume_factor);
        self
    }

    /// Set the porosity (fraction).
    #[must_use]
    pub fn with_porosity(mut self, porosity: f64) -> Self {
        self.porosity = Some(porosity);
        self
    }

    /// Set the net pay thickness, ft.
    #[must_use]
    pub fn with_thickness(mut self, thickness: f64) -> Self {
        self.thickness = Some(thickness);
        self
    }

    /// Set the wellbore radius, ft.
    #[must_use]
    pub fn with_wellbore_radius(mut self, wellbore_radius: f64) -> Self {
        self.wellbore_radius = Some(wellbore_radius);
        self
    }

    /// Set the initial reservoir pressure estimate, psi.
    #[must_use]
    pub fn with_initial_pressure(mut self, initial_pressure: f64) -> Self {
        self.initial_pressure = Some(initial_pressure);
        self
    }

    /// Flag the well as a gas well. Requires [`with_gas_properties`](Self::with_gas_properties).
    #[must_use]
    pub fn with_gas_well(mut self, gas_well: bool) -> Self {
        self.gas_well = gas_well;
        self
    }

    /// Set the gas properties used by the pseudo-variable adapter.
    #[must_use]
    pub fn with_gas_properties(mut self, gas: GasProperties) -> Self {
        self.gas = Some(gas);
        self
    }

    /// Validate every field and build the configuration.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SeriesError::InvalidConfiguration`] | A required field is missing, non-finite or non-physical |
    /// | [`SeriesError::InvalidConfiguration`] | Gas flag set without gas properties |
    pub fn build(self) -> Result<TestConfiguration, SeriesError> {
        let viscosity = positive("viscosity", self.viscosity)?;
        let total_compressibility = positive("total_compressibility", self.total_compressibility)?;
        let formation_volume_factor =
            positive("formation_volume_factor", self.formation_volume_factor)?;
        let porosity = positive("porosity", self.porosity)?;
        if porosity > 1.0 {
            return Err(SeriesError::config(
                "porosity",
                porosity,
                "porosity is a fraction in (0, 1]",
            ));
        }
        let thickness = positive("thickness", self.thickness)?;
        let wellbore_radius = positive("wellbore_radius", self.wellbore_radius)?;
        let initial_pressure = match self.initial_pressure {
            Some(p) => Some(positive("initial_pressure", Some(p))?),
            None => None,
        };

        let gas = if self.gas_well {
            let Some(gas) = self.gas else {
                return Err(SeriesError::config(
                    "gas_properties",
                    f64::NAN,
                    "gas wells need specific gravity and reservoir temperature",
                ));
            };
            validate_gas(&gas)?;
            Some(gas)
        } else {
            None
        };

        Ok(TestConfiguration {
            viscosity,
            total_compressibility,
            formation_volume_factor,
            porosity,
            thickness,
            wellbore_radius,
            initial_pressure,
            gas,
        })
    }
}

fn positive(field: &'static str, value: Option<f64>) -> Result<f64, SeriesError> {
    match value {
        None => Err(SeriesError::config(field, f64::NAN, "required")),
        Some(v) if !v.is_finite() => Err(SeriesError::config(field, v, "must be finite")),
        Some(v) if v <= 0.0 => Err(SeriesError::config(field, v, "must be positive")),
        Some(v) => Ok(v),
    }
}

fn validate_gas(gas: &GasProperties) -> Result<(), SeriesError> {
    let sg = gas.specific_gravity;
    if !sg.is_finite() || sg <= 0.0 || sg > 3.0 {
        return Err(SeriesError::config(
            "specific_gravity",
            sg,
            "gas specific gravity must be in (0, 3]",
        ));
    }
    let t = gas.temperature_f;
    if !t.is_finite() || t <= 32.0 || t > 700.0 {
        return Err(SeriesError::config(
            "temperature_f",
            t,
            "reservoir temperature must be in (32, 700] °F",
        ));
    }
    Ok(())
}

/// Settings for [`normalize`](crate::normalize).
///
/// # Defaults
///
/// | Parameter        | Default |
/// |------------------|---------|
/// | `rate_tolerance` | 0.01    |
/// | `min_samples`    | 5       |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizeConfig {
    pub(crate) rate_tolerance: f64,
    pub(crate) min_samples: usize,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl NormalizeConfig {
    /// Create a config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rate_tolerance: 0.01,
            min_samples: 5,
        }
    }

    /// Relative change of rate that opens a new rate period.
    #[must_use]
    pub fn with_rate_tolerance(mut self, rate_tolerance: f64) -> Self {
        self.rate_tolerance = rate_tolerance;
        self
    }

    /// Minimum number of samples that must survive validation.
    #[must_use]
    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    /// Return the relative rate tolerance.
    #[must_use]
    pub fn rate_tolerance(&self) -> f64 {
        self.rate_tolerance
    }

    /// Return the minimum sample count.
    #[must_use]
    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    pub(crate) fn validate(&self) -> Result<(), SeriesError> {
        if !(self.rate_tolerance.is_finite()
            && self.rate_tolerance > 0.0
            && self.rate_tolerance < 1.0)
        {
            return Err(SeriesError::config(
                "rate_tolerance",
                self.rate_tolerance,
                "must be in (0, 1)",
            ));
        }
        if self.min_samples < 3 {
            return Err(SeriesError::config(
                "min_samples",
                self.min_samples as f64,
                "at least 3 samples are needed for a derivative",
            ));
        }
        Ok(())
    }
}
