use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;

use welltest_diag::{ClassifierConfig, DerivativeAxis, DerivativeConfig};
use welltest_fit::{Analysis, AnalysisOptions, ConfidenceMethod, FitConfig, analyze};
use welltest_io::{ColumnNames, ConfigReader, ExperimentName, ResultWriter, SampleReader};
use welltest_model::ReservoirModel;
use welltest_series::NormalizeConfig;

#[derive(Parser)]
#[command(name = "welltest")]
#[command(about = "Pressure transient analysis: diagnostics, flow regimes and model fitting")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for bootstrap refits (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum AxisArg {
    /// Superposition time after earlier rate periods, log time otherwise
    Auto,
    /// Natural log of elapsed time
    LogTime,
    /// Superposition function over the rate history
    Superposition,
}

impl From<AxisArg> for DerivativeAxis {
    fn from(axis: AxisArg) -> Self {
        match axis {
            AxisArg::Auto => Self::Auto,
            AxisArg::LogTime => Self::LogTime,
            AxisArg::Superposition => Self::Superposition,
        }
    }
}

/// Inputs and diagnostic settings shared by every subcommand.
#[derive(Args, Debug, Clone)]
struct InputArgs {
    /// Path to the column-mapped CSV file
    #[arg(long)]
    data: PathBuf,

    /// Path to the JSON test configuration
    #[arg(long)]
    config: PathBuf,

    /// Experiment name for output files (must match [a-zA-Z0-9_-]+)
    #[arg(long)]
    experiment: String,

    /// Output directory for result files
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Header of the time column (hours)
    #[arg(long, default_value = "time")]
    time_column: String,

    /// Header of the pressure column (psi)
    #[arg(long, default_value = "pressure")]
    pressure_column: String,

    /// Header of the rate column (STB/D or Mscf/D)
    #[arg(long, default_value = "rate")]
    rate_column: String,

    /// Relative tolerance for grouping rates into one period
    #[arg(long, default_value_t = 0.01)]
    rate_tolerance: f64,

    /// Bourdet smoothing window L in log cycles
    #[arg(long, default_value_t = 0.1)]
    smoothing: f64,

    /// Rate period to analyse (defaults to the last one)
    #[arg(long)]
    period: Option<usize>,

    /// Derivative axis
    #[arg(long, value_enum, default_value = "auto")]
    axis: AxisArg,
}

#[derive(Subcommand)]
enum Command {
    /// Normalize, differentiate, transform and classify flow regimes
    Diagnose {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Diagnose, then fit an analytical reservoir model
    Fit {
        #[command(flatten)]
        input: InputArgs,

        /// Reservoir model: homogeneous, dual_porosity_pss, naturally_fractured,
        /// horizontal or linear_boundary
        #[arg(long, default_value = "homogeneous")]
        model: String,

        /// Levenberg-Marquardt iteration limit
        #[arg(long, default_value_t = 100)]
        max_iterations: usize,

        /// Wall-clock budget for the fit in seconds
        #[arg(long)]
        time_budget: Option<f64>,

        /// Fit the derivative only, without ΔP residuals
        #[arg(long, default_value_t = false)]
        derivative_only: bool,

        /// Bootstrap resamples for P10/P90 (linearised intervals when absent)
        #[arg(long)]
        bootstrap: Option<usize>,

        /// RNG seed for the bootstrap
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Fit window start, hours of elapsed time
        #[arg(long, requires = "window_end")]
        window_start: Option<f64>,

        /// Fit window end, hours of elapsed time
        #[arg(long, requires = "window_start")]
        window_end: Option<f64>,

        /// Initial guess override as name=value (repeatable)
        #[arg(long = "guess", value_parser = parse_guess)]
        guesses: Vec<(String, f64)>,
    },
}

fn parse_guess(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got {s:?}"))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid value for {name}: {e}"))?;
    Ok((name.trim().to_string(), value))
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct RegimeOutput {
    label: &'static str,
    start: f64,
    end: f64,
    confidence: f64,
}

#[derive(Serialize)]
struct SemilogOutput {
    kh: f64,
    skin: f64,
    r_squared: f64,
    extrapolated_pressure: Option<f64>,
}

#[derive(Serialize)]
struct FitOutput {
    model: String,
    parameters: BTreeMap<&'static str, f64>,
    rmse: f64,
    iterations: usize,
    converged: bool,
    boundary_distance: Option<f64>,
    warnings: Vec<String>,
}

#[derive(Serialize)]
struct AnalysisOutput {
    experiment: String,
    n_samples: usize,
    n_periods: usize,
    period: usize,
    regimes: Vec<RegimeOutput>,
    semilog: Option<SemilogOutput>,
    fit: Option<FitOutput>,
    artifacts: Vec<PathBuf>,
}

impl AnalysisOutput {
    fn new(experiment: &ExperimentName, analysis: &Analysis, artifacts: Vec<PathBuf>) -> Self {
        Self {
            experiment: experiment.to_string(),
            n_samples: analysis.series.len(),
            n_periods: analysis.series.periods().len(),
            period: analysis.diagnostics.period(),
            regimes: analysis
                .regimes
                .iter()
                .map(|r| RegimeOutput {
                    label: r.label.as_str(),
                    start: r.start,
                    end: r.end,
                    confidence: r.confidence,
                })
                .collect(),
            semilog: analysis.semilog.map(|s| SemilogOutput {
                kh: s.kh,
                skin: s.skin,
                r_squared: s.r_squared,
                extrapolated_pressure: s.extrapolated_pressure,
            }),
            fit: analysis.fit.as_ref().map(|f| FitOutput {
                model: f.model.to_string(),
                parameters: f.parameters.clone(),
                rmse: f.rmse,
                iterations: f.iterations,
                converged: f.converged,
                boundary_distance: f.boundary_distance,
                warnings: f.warnings.iter().map(ToString::to_string).collect(),
            }),
            artifacts,
        }
    }
}

fn base_options(input: &InputArgs) -> AnalysisOptions {
    let mut derivative = DerivativeConfig::new()
        .with_smoothing(input.smoothing)
        .with_axis(input.axis.into());
    if let Some(period) = input.period {
        derivative = derivative.with_period(period);
    }
    AnalysisOptions::new()
        .with_normalize(NormalizeConfig::new().with_rate_tolerance(input.rate_tolerance))
        .with_derivative(derivative)
        .with_classifier(ClassifierConfig::new())
}

/// Read inputs, run the analysis and write every artifact.
fn run(input: &InputArgs, options: &AnalysisOptions) -> Result<AnalysisOutput> {
    let experiment = ExperimentName::new(input.experiment.clone())?;

    let columns = ColumnNames::new()
        .with_time(input.time_column.as_str())
        .with_pressure(input.pressure_column.as_str())
        .with_rate(input.rate_column.as_str());
    let samples = SampleReader::new(&input.data)
        .with_columns(columns)
        .read()
        .context("failed to read input CSV")?;
    let test = ConfigReader::new(&input.config)
        .read()
        .context("failed to read test configuration")?;

    let analysis = analyze(&samples, &test, options).context("analysis failed")?;

    let writer = ResultWriter::new(&input.output_dir, experiment.clone())?;
    let mut artifacts = vec![
        writer
            .write_diagnostics(&analysis)
            .context("failed to write diagnostics")?,
        writer
            .write_regimes(&analysis.regimes)
            .context("failed to write regimes")?,
    ];
    if let Some(fit) = &analysis.fit {
        artifacts.push(writer.write_fit(fit).context("failed to write fit")?);
    }

    info!(
        n_regimes = analysis.regimes.len(),
        fitted = analysis.fit.is_some(),
        "analysis written"
    );
    Ok(AnalysisOutput::new(&experiment, &analysis, artifacts))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    let output = match cli.command {
        Command::Diagnose { input } => run(&input, &base_options(&input))?,
        Command::Fit {
            input,
            model,
            max_iterations,
            time_budget,
            derivative_only,
            bootstrap,
            seed,
            window_start,
            window_end,
            guesses,
        } => {
            let model: ReservoirModel = model
                .parse()
                .with_context(|| format!("unknown model {model:?}"))?;

            let mut fit = FitConfig::new()
                .with_max_iterations(max_iterations)
                .with_fit_delta_p(!derivative_only);
            if let Some(secs) = time_budget {
                let budget = Duration::try_from_secs_f64(secs)
                    .with_context(|| format!("invalid time budget {secs}"))?;
                fit = fit.with_time_budget(budget);
            }
            if let Some(resamples) = bootstrap {
                fit = fit.with_confidence(ConfidenceMethod::Bootstrap { resamples, seed });
            }
            if let (Some(start), Some(end)) = (window_start, window_end) {
                fit = fit.with_window(start, end);
            }
            for (name, value) in guesses {
                fit = fit.with_initial_guess(name, value);
            }

            let options = base_options(&input).with_model(model).with_fit(fit);
            run(&input, &options)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
