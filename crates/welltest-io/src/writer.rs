//! JSON result writer for diagnostics, flow regimes and fits.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument};
use welltest_diag::{AxisKind, FlowRegime, TimeTransform};
use welltest_fit::{Analysis, FitResult};

use crate::IoError;
use crate::domain::ExperimentName;

/// Writes analysis results to JSON files.
///
/// Creates the output directory on construction if it does not exist.
/// Output files are named `{experiment}_diagnostics.json`,
/// `{experiment}_regimes.json` and `{experiment}_fit.json`.
pub struct ResultWriter {
    output_dir: PathBuf,
    experiment: ExperimentName,
}

impl ResultWriter {
    /// Create a new writer targeting the given directory and experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(dir = %output_dir.display(), experiment = %experiment))]
    pub fn new(output_dir: &Path, experiment: ExperimentName) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|e| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            experiment,
        })
    }

    fn path_for(&self, suffix: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{suffix}.json", self.experiment.as_str()))
    }

    fn write_json<T: Serialize>(&self, path: &Path, artifact: &T) -> Result<(), IoError> {
        let json = serde_json::to_string_pretty(artifact).map_err(|e| IoError::Serialize {
            path: path.to_path_buf(),
            source: e,
        })?;
        fs::write(path, &json).map_err(|e| IoError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Write the diagnostic curves and time transforms to
    /// `{experiment}_diagnostics.json`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::Serialize`] | A value cannot be represented in JSON |
    /// | [`IoError::WriteFile`] | The file cannot be written |
    #[instrument(skip_all)]
    pub fn write_diagnostics(&self, analysis: &Analysis) -> Result<PathBuf, IoError> {
        let path = self.path_for("diagnostics");
        let d = &analysis.diagnostics;
        let equivalent_time = d.equivalent_time();
        let artifact = DiagnosticsArtifact {
            experiment: self.experiment.as_str(),
            period: d.period(),
            axis: match d.axis_kind() {
                AxisKind::LogTime => "log_time",
                AxisKind::Superposition => "superposition",
            },
            smoothing: d.smoothing(),
            reference_pressure: d.reference_pressure(),
            rate_change: d.rate_change(),
            pseudo_variables: analysis.series.is_pseudo(),
            elapsed: d.elapsed(),
            equivalent_time: &equivalent_time,
            pressure: d.pressure(),
            delta_p: d.delta_p(),
            derivative: d.derivative(),
            smoothed_derivative: d.smoothed_derivative(),
            horner: analysis.horner.as_ref().map(TransformEntry::from),
            mdh: TransformEntry::from(&analysis.mdh),
            superposition: TransformEntry::from(&analysis.superposition),
            semilog: analysis.semilog.map(|s| SemilogEntry {
                slope: s.slope,
                intercept: s.intercept,
                r_squared: s.r_squared,
                kh: s.kh,
                skin: s.skin,
                extrapolated_pressure: s.extrapolated_pressure,
            }),
        };
        self.write_json(&path, &artifact)?;
        info!(path = %path.display(), "diagnostics written");
        Ok(path)
    }

    /// Write the flow-regime list to `{experiment}_regimes.json`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::Serialize`] | A value cannot be represented in JSON |
    /// | [`IoError::WriteFile`] | The file cannot be written |
    #[instrument(skip_all)]
    pub fn write_regimes(&self, regimes: &[FlowRegime]) -> Result<PathBuf, IoError> {
        let path = self.path_for("regimes");
        let artifact = RegimesArtifact {
            experiment: self.experiment.as_str(),
            regimes: regimes.iter().map(RegimeEntry::from).collect(),
        };
        self.write_json(&path, &artifact)?;
        info!(path = %path.display(), n_regimes = regimes.len(), "regimes written");
        Ok(path)
    }

    /// Write a model fit to `{experiment}_fit.json`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::Serialize`] | A value cannot be represented in JSON |
    /// | [`IoError::WriteFile`] | The file cannot be written |
    #[instrument(skip_all)]
    pub fn write_fit(&self, result: &FitResult) -> Result<PathBuf, IoError> {
        let path = self.path_for("fit");
        let artifact = FitArtifact::new(self.experiment.as_str(), result);
        self.write_json(&path, &artifact)?;
        info!(path = %path.display(), model = %result.model, "fit written");
        Ok(path)
    }
}

// --- Shadow structs for JSON serialization ---

#[derive(Serialize)]
struct DiagnosticsArtifact<'a> {
    experiment: &'a str,
    period: usize,
    axis: &'static str,
    smoothing: f64,
    reference_pressure: f64,
    rate_change: f64,
    pseudo_variables: bool,
    elapsed: &'a [f64],
    equivalent_time: &'a [f64],
    pressure: &'a [f64],
    delta_p: &'a [f64],
    derivative: &'a [f64],
    smoothed_derivative: &'a [f64],
    horner: Option<TransformEntry<'a>>,
    mdh: TransformEntry<'a>,
    superposition: TransformEntry<'a>,
    semilog: Option<SemilogEntry>,
}

#[derive(Serialize)]
struct TransformEntry<'a> {
    elapsed: &'a [f64],
    values: &'a [f64],
    pressure: &'a [f64],
}

impl<'a> From<&'a TimeTransform> for TransformEntry<'a> {
    fn from(t: &'a TimeTransform) -> Self {
        Self {
            elapsed: &t.elapsed,
            values: &t.values,
            pressure: &t.pressure,
        }
    }
}

#[derive(Serialize)]
struct SemilogEntry {
    slope: f64,
    intercept: f64,
    r_squared: f64,
    kh: f64,
    skin: f64,
    extrapolated_pressure: Option<f64>,
}

#[derive(Serialize)]
struct RegimesArtifact<'a> {
    experiment: &'a str,
    regimes: Vec<RegimeEntry>,
}

#[derive(Serialize)]
struct RegimeEntry {
    label: &'static str,
    description: String,
    start: f64,
    end: f64,
    confidence: f64,
    mean_slope: Option<f64>,
    log_cycles: f64,
}

impl From<&FlowRegime> for RegimeEntry {
    fn from(r: &FlowRegime) -> Self {
        Self {
            label: r.label.as_str(),
            description: r.label.to_string(),
            start: r.start,
            end: r.end,
            confidence: r.confidence,
            mean_slope: r.mean_slope,
            log_cycles: r.log_cycles(),
        }
    }
}

#[derive(Serialize)]
struct FitArtifact<'a> {
    experiment: &'a str,
    model: String,
    parameters: &'a BTreeMap<&'static str, f64>,
    confidence_intervals: BTreeMap<&'static str, IntervalEntry>,
    rmse: f64,
    boundary_distance: Option<f64>,
    iterations: usize,
    converged: bool,
    warnings: Vec<String>,
    model_fit_series: ModelFitEntry<'a>,
}

#[derive(Serialize)]
struct IntervalEntry {
    p10: f64,
    p90: f64,
}

#[derive(Serialize)]
struct ModelFitEntry<'a> {
    elapsed: &'a [f64],
    delta_p: &'a [f64],
    derivative: &'a [f64],
}

impl<'a> FitArtifact<'a> {
    fn new(experiment: &'a str, result: &'a FitResult) -> Self {
        Self {
            experiment,
            model: result.model.to_string(),
            parameters: &result.parameters,
            confidence_intervals: result
                .confidence_intervals
                .iter()
                .map(|(&name, ci)| {
                    (
                        name,
                        IntervalEntry {
                            p10: ci.p10,
                            p90: ci.p90,
                        },
                    )
                })
                .collect(),
            rmse: result.rmse,
            boundary_distance: result.boundary_distance,
            iterations: result.iterations,
            converged: result.converged,
            warnings: result.warnings.iter().map(ToString::to_string).collect(),
            model_fit_series: ModelFitEntry {
                elapsed: &result.model_fit_series.elapsed,
                delta_p: &result.model_fit_series.delta_p,
                derivative: &result.model_fit_series.derivative,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use welltest_fit::{AnalysisOptions, analyze};
    use welltest_model::ReservoirModel;
    use welltest_series::{Sample, TestConfiguration};

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

    /// Storage-dominated start rolling over to a semilog line.
    fn drawdown() -> Vec<Sample> {
        (0..60)
            .map(|i| {
                let t = 0.01 * 10f64.powf(i as f64 / 12.0);
                Sample::new(t, 5000.0 - 20.0 * (1.0 + t / 0.05).ln(), 500.0)
            })
            .collect()
    }

    fn read(path: &Path) -> serde_json::Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn write_diagnostics_json_structure() {
        let dir = TempDir::new().unwrap();
        let experiment = ExperimentName::new("dd_test".into()).unwrap();
        let writer = ResultWriter::new(dir.path(), experiment).unwrap();
        let analysis = analyze(&drawdown(), &test_config(), &AnalysisOptions::new()).unwrap();

        let path = writer.write_diagnostics(&analysis).unwrap();
        assert_eq!(path, dir.path().join("dd_test_diagnostics.json"));

        let content = read(&path);
        assert_eq!(content["experiment"], "dd_test");
        assert_eq!(content["axis"], "log_time");
        assert_eq!(content["period"], 0);
        let n = content["elapsed"].as_array().unwrap().len();
        assert_eq!(n, 60);
        assert_eq!(content["smoothed_derivative"].as_array().unwrap().len(), n);
        assert!(content["horner"].is_null());
        assert_eq!(content["mdh"]["values"].as_array().unwrap().len(), n);
    }

    #[test]
    fn write_regimes_json_structure() {
        let dir = TempDir::new().unwrap();
        let experiment = ExperimentName::new("reg_test".into()).unwrap();
        let writer = ResultWriter::new(dir.path(), experiment).unwrap();
        let analysis = analyze(&drawdown(), &test_config(), &AnalysisOptions::new()).unwrap();

        let path = writer.write_regimes(&analysis.regimes).unwrap();
        let content = read(&path);
        let regimes = content["regimes"].as_array().unwrap();
        assert_eq!(regimes.len(), analysis.regimes.len());
        for r in regimes {
            assert!(r["label"].is_string());
            assert!(r["start"].as_f64().unwrap() <= r["end"].as_f64().unwrap());
            assert!(r["confidence"].is_number());
        }
    }

    #[test]
    fn write_fit_json_structure() {
        let dir = TempDir::new().unwrap();
        let experiment = ExperimentName::new("fit_test".into()).unwrap();
        let writer = ResultWriter::new(dir.path(), experiment).unwrap();
        let options = AnalysisOptions::new().with_model(ReservoirModel::HomogeneousWbsSkin);
        let analysis = analyze(&drawdown(), &test_config(), &options).unwrap();
        let fit = analysis.fit.as_ref().unwrap();

        let path = writer.write_fit(fit).unwrap();
        let content = read(&path);
        assert_eq!(content["model"], "homogeneous");
        for name in ["kh", "skin", "C", "Pi"] {
            assert!(content["parameters"][name].is_number(), "{name}");
            assert!(content["confidence_intervals"][name]["p10"].is_number(), "{name}");
        }
        assert!(content["rmse"].is_number());
        assert!(content["converged"].is_boolean());
        assert!(content["warnings"].is_array());
        assert!(content["boundary_distance"].is_null());
    }

    #[test]
    fn writer_creates_nested_output_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("nested").join("deep");
        let experiment = ExperimentName::new("nested_test".into()).unwrap();
        let writer = ResultWriter::new(&nested, experiment).unwrap();
        writer.write_regimes(&[]).unwrap();
        assert!(nested.join("nested_test_regimes.json").exists());
    }
}
