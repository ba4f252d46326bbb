//! JSON test-configuration reader.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, instrument};
use welltest_series::{GasProperties, SeriesError, TestConfiguration};

use crate::IoError;

/// On-disk shape of a test configuration.
///
/// Every value goes through [`TestConfiguration::builder`], so missing or
/// non-physical fields are reported by the same validation as in-process
/// construction.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TestConfigFile {
    viscosity: Option<f64>,
    total_compressibility: Option<f64>,
    formation_volume_factor: Option<f64>,
    porosity: Option<f64>,
    thickness: Option<f64>,
    wellbore_radius: Option<f64>,
    initial_pressure: Option<f64>,
    #[serde(default)]
    gas_well: bool,
    gas: Option<GasFile>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GasFile {
    specific_gravity: f64,
    temperature_f: f64,
}

impl TestConfigFile {
    fn build(self) -> Result<TestConfiguration, SeriesError> {
        let mut builder = TestConfiguration::builder().with_gas_well(self.gas_well);
        if let Some(v) = self.viscosity {
            builder = builder.with_viscosity(v);
        }
        if let Some(v) = self.total_compressibility {
            builder = builder.with_total_compressibility(v);
        }
        if let Some(v) = self.formation_volume_factor {
            builder = builder.with_formation_volume_factor(v);
        }
        if let Some(v) = self.porosity {
            builder = builder.with_porosity(v);
        }
        if let Some(v) = self.thickness {
            builder = builder.with_thickness(v);
        }
        if let Some(v) = self.wellbore_radius {
            builder = builder.with_wellbore_radius(v);
        }
        if let Some(v) = self.initial_pressure {
            builder = builder.with_initial_pressure(v);
        }
        if let Some(gas) = self.gas {
            builder = builder.with_gas_properties(GasProperties {
                specific_gravity: gas.specific_gravity,
                temperature_f: gas.temperature_f,
            });
        }
        builder.build()
    }
}

/// Parse a JSON test configuration held in memory.
///
/// `origin` only labels errors.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::ConfigParse`] | Malformed JSON or an unknown field |
/// | [`IoError::InvalidConfiguration`] | A value is missing or non-physical |
pub fn parse_test_configuration(json: &str, origin: &Path) -> Result<TestConfiguration, IoError> {
    let file: TestConfigFile = serde_json::from_str(json).map_err(|e| IoError::ConfigParse {
        path: origin.to_path_buf(),
        source: e,
    })?;
    file.build().map_err(|e| IoError::InvalidConfiguration {
        path: origin.to_path_buf(),
        source: e,
    })
}

/// Reads a [`TestConfiguration`] from a JSON file.
///
/// ```json
/// {
///   "viscosity": 1.0,
///   "total_compressibility": 1e-5,
///   "formation_volume_factor": 1.2,
///   "porosity": 0.2,
///   "thickness": 50.0,
///   "wellbore_radius": 0.3,
///   "initial_pressure": 5000.0,
///   "gas_well": false
/// }
/// ```
pub struct ConfigReader {
    path: PathBuf,
}

impl ConfigReader {
    /// Create a new reader for the given JSON file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Read, parse and validate the configuration.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
    /// | [`IoError::ConfigParse`] | Malformed JSON or an unknown field |
    /// | [`IoError::InvalidConfiguration`] | A value is missing or non-physical |
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<TestConfiguration, IoError> {
        let json = std::fs::read_to_string(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;
        let config = parse_test_configuration(&json, &self.path)?;
        info!(gas = config.is_gas_well(), "test configuration loaded");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OIL: &str = r#"{
        "viscosity": 1.0,
        "total_compressibility": 1e-5,
        "formation_volume_factor": 1.2,
        "porosity": 0.2,
        "thickness": 50.0,
        "wellbore_radius": 0.3,
        "initial_pressure": 5000.0
    }"#;

    fn origin() -> &'static Path {
        Path::new("test.json")
    }

    #[test]
    fn parses_oil_configuration() {
        let config = parse_test_configuration(OIL, origin()).unwrap();
        assert_eq!(config.thickness(), 50.0);
        assert_eq!(config.initial_pressure(), Some(5000.0));
        assert!(!config.is_gas_well());
    }

    #[test]
    fn parses_gas_configuration() {
        let json = OIL.replace(
            "\"initial_pressure\": 5000.0",
            "\"initial_pressure\": 3000.0, \"gas_well\": true, \
             \"gas\": {\"specific_gravity\": 0.65, \"temperature_f\": 200.0}",
        );
        let config = parse_test_configuration(&json, origin()).unwrap();
        assert!(config.is_gas_well());
        assert_eq!(config.gas().map(|g| g.specific_gravity), Some(0.65));
    }

    #[test]
    fn missing_field_is_reported_by_name() {
        let json = OIL.replace("\"porosity\": 0.2,", "");
        let err = parse_test_configuration(&json, origin()).unwrap_err();
        match err {
            IoError::InvalidConfiguration {
                source: SeriesError::InvalidConfiguration { field, .. },
                ..
            } => assert_eq!(field, "porosity"),
            other => panic!("expected InvalidConfiguration, got {other:?}"),
        }
    }

    #[test]
    fn non_physical_value_is_rejected() {
        let json = OIL.replace("\"porosity\": 0.2", "\"porosity\": 1.5");
        assert!(matches!(
            parse_test_configuration(&json, origin()),
            Err(IoError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn unknown_field_is_a_parse_error() {
        let json = OIL.replace("\"thickness\"", "\"thicknes\"");
        assert!(matches!(
            parse_test_configuration(&json, origin()),
            Err(IoError::ConfigParse { .. })
        ));
    }
}
