//! Accuracy regression tests for welltest-fit.
//!
//! Synthetic drawdowns generated by the model library are fitted back and
//! the recovered parameters, warnings and intervals are checked against the
//! values used to generate them.

use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use welltest_diag::{
    ClassifierConfig, DerivativeConfig, DiagnosticSeries, FlowRegime, RegimeLabel, classify,
    diagnose,
};
use welltest_fit::{ConfidenceMethod, FitConfig, FitResult, FitWarning, fit};
use welltest_model::{ReservoirModel, pressure_derivative};
use welltest_series::{NormalizeConfig, Sample, TestConfiguration, normalize};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const RATE: f64 = 500.0;
const PI: f64 = 5000.0;

fn test_config() -> TestConfiguration {
    TestConfiguration::builder()
        .with_viscosity(1.0)
        .with_total_compressibility(1e-5)
        .with_formation_volume_factor(1.2)
        .with_porosity(0.2)
        .with_thickness(50.0)
        .with_wellbore_radius(0.3)
        .with_initial_pressure(PI)
        .build()
        .expect("valid test configuration")
}

fn log_times(n: usize, first: f64, last: f64) -> Vec<f64> {
    (0..n)
        .map(|i| first * (last / first).powf(i as f64 / (n - 1) as f64))
        .collect()
}

/// Model ΔP at `times` for a 500 STB/D drawdown.
fn model_drop(model: ReservoirModel, params: &[f64], times: &[f64]) -> Vec<f64> {
    pressure_derivative(&model, params, &test_config(), RATE, times)
        .expect("model evaluates")
        .delta_p
}

fn samples(times: &[f64], delta_p: &[f64]) -> Vec<Sample> {
    times
        .iter()
        .zip(delta_p)
        .map(|(&t, dp)| Sample::new(t, PI - dp, RATE))
        .collect()
}

fn diagnostics(raw: &[Sample]) -> (DiagnosticSeries, Vec<FlowRegime>) {
    let series = normalize(raw, &test_config(), &NormalizeConfig::new()).expect("normalizes");
    let diag = diagnose(&series, &DerivativeConfig::new()).expect("derivative");
    let regimes = classify(&diag, &ClassifierConfig::new()).expect("classifies");
    (diag, regimes)
}

fn run_fit(raw: &[Sample], model: ReservoirModel, config: &FitConfig) -> FitResult {
    let (diag, regimes) = diagnostics(raw);
    fit(&diag, &regimes, model, &test_config(), config).expect("fit succeeds")
}

/// The scenario drawdown: 50 points over 0.01–100 h, kh 500, skin 2, C 0.01.
fn scenario_times() -> Vec<f64> {
    log_times(50, 0.01, 100.0)
}

fn scenario_drop() -> Vec<f64> {
    model_drop(
        ReservoirModel::HomogeneousWbsSkin,
        &[500.0, 2.0, 0.01, PI],
        &scenario_times(),
    )
}

/// Box–Muller normal deviates.
fn gaussian(rng: &mut ChaCha8Rng, sigma: f64) -> f64 {
    let u1: f64 = rng.r#gen::<f64>().max(1e-300);
    let u2: f64 = rng.r#gen();
    sigma * (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

fn noisy_scenario(seed: u64) -> Vec<Sample> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let noisy: Vec<f64> = scenario_drop()
        .iter()
        .map(|dp| dp + gaussian(&mut rng, 0.1))
        .collect();
    samples(&scenario_times(), &noisy)
}

// ---------------------------------------------------------------------------
// a) scenario_recovers_kh_and_skin
// ---------------------------------------------------------------------------

/// Noise-free homogeneous drawdown: kh within [450, 550], skin within
/// [1.5, 2.5], the fit converges and the closed-form Pi is the true one.
#[test]
fn scenario_recovers_kh_and_skin() {
    let raw = samples(&scenario_times(), &scenario_drop());
    let result = run_fit(&raw, ReservoirModel::HomogeneousWbsSkin, &FitConfig::new());

    let kh = result.parameter("kh").expect("kh");
    let skin = result.parameter("skin").expect("skin");
    let storage = result.parameter("C").expect("C");
    let pi = result.parameter("Pi").expect("Pi");
    assert!((450.0..=550.0).contains(&kh), "kh = {kh}");
    assert!((1.5..=2.5).contains(&skin), "skin = {skin}");
    assert!((storage / 0.01 - 1.0).abs() < 0.1, "C = {storage}");
    assert!((pi - PI).abs() < 5.0, "Pi = {pi}");
    assert!(result.converged, "warnings: {:?}", result.warnings);
    assert!(result.rmse < 0.01, "rmse = {}", result.rmse);
    assert!(result.boundary_distance.is_none());
    assert!(!result.has_model_mismatch());
    assert_eq!(result.model_fit_series.elapsed.len(), 50);
}

// ---------------------------------------------------------------------------
// b) noisy_round_trip
// ---------------------------------------------------------------------------

/// RMS of `ln(noisy) − ln(clean)` derivative over the points a fit uses:
/// positive observed derivative and ΔP.
fn injected_noise(noisy: &DiagnosticSeries, clean: &DiagnosticSeries) -> f64 {
    let (observed, truth) = (noisy.smoothed_derivative(), clean.smoothed_derivative());
    let squares: Vec<f64> = (0..noisy.len())
        .filter(|&i| observed[i] > 0.0 && noisy.delta_p()[i] > 0.0)
        .map(|i| (observed[i].ln() - truth[i].ln()).powi(2))
        .collect();
    (squares.iter().sum::<f64>() / squares.len() as f64).sqrt()
}

/// With 0.1 psi of pressure noise every parameter is recovered within 10 %.
/// Fitted on the derivative alone, which is what RMSE measures, the misfit
/// stays below the noise that was injected.
#[test]
fn noisy_round_trip() {
    let clean = samples(&scenario_times(), &scenario_drop());
    let (clean_diag, _) = diagnostics(&clean);
    assert!(clean_diag.smoothed_derivative().iter().all(|d| *d > 0.0));

    for seed in [1, 2, 3] {
        let raw = noisy_scenario(seed);
        let (diag, regimes) = diagnostics(&raw);
        assert_eq!(diag.len(), clean_diag.len());
        let fit_with = |config: &FitConfig| {
            fit(&diag, &regimes, ReservoirModel::HomogeneousWbsSkin, &test_config(), config)
                .expect("fit succeeds")
        };

        let result = fit_with(&FitConfig::new());
        let kh = result.parameter("kh").expect("kh");
        let skin = result.parameter("skin").expect("skin");
        let storage = result.parameter("C").expect("C");
        let pi = result.parameter("Pi").expect("Pi");
        assert!((kh / 500.0 - 1.0).abs() < 0.1, "seed {seed}: kh = {kh}");
        assert!((skin / 2.0 - 1.0).abs() < 0.1, "seed {seed}: skin = {skin}");
        assert!((storage / 0.01 - 1.0).abs() < 0.1, "seed {seed}: C = {storage}");
        assert!((pi / PI - 1.0).abs() < 0.1, "seed {seed}: Pi = {pi}");
        assert!((pi - PI).abs() < 5.0, "seed {seed}: Pi = {pi}");

        let ci = result.interval("kh").expect("kh interval");
        assert!(ci.p10 <= kh && kh <= ci.p90, "seed {seed}: {ci:?} around {kh}");

        let derivative_only = fit_with(&FitConfig::new().with_fit_delta_p(false));
        assert!(derivative_only.converged, "seed {seed}: {:?}", derivative_only.warnings);
        let injected = injected_noise(&diag, &clean_diag);
        assert!(
            derivative_only.rmse < injected,
            "seed {seed}: rmse {} vs injected {injected}",
            derivative_only.rmse
        );
    }
}

// ---------------------------------------------------------------------------
// c) linear_boundary_on_infinite_acting_data
// ---------------------------------------------------------------------------

/// Long homogeneous drawdown with no boundary.
fn infinite_acting() -> Vec<Sample> {
    let times = log_times(80, 0.001, 5000.0);
    let dp = model_drop(
        ReservoirModel::HomogeneousWbsSkin,
        &[500.0, 2.0, 0.001, PI],
        &times,
    );
    samples(&times, &dp)
}

/// Fitting a fault model to pure radial flow warns of a mismatch and reports
/// no boundary distance.
#[test]
fn linear_boundary_on_infinite_acting_data() {
    let raw = infinite_acting();
    let (_, regimes) = diagnostics(&raw);
    assert!(regimes.iter().any(|r| r.label == RegimeLabel::RadialFlow));
    assert!(!regimes.iter().any(|r| r.label == RegimeLabel::BoundaryDominated));

    let result = run_fit(&raw, ReservoirModel::LinearBoundary, &FitConfig::new());
    assert!(result.has_model_mismatch(), "warnings: {:?}", result.warnings);
    assert!(result.warnings.iter().any(|w| matches!(
        w,
        FitWarning::ModelMismatch {
            model: ReservoirModel::LinearBoundary,
            ..
        }
    )));
    assert!(result.boundary_distance.is_none());
}

// ---------------------------------------------------------------------------
// d) fault_distance_from_diffusivity
// ---------------------------------------------------------------------------

/// A sealing fault 500 ft away: the departure-time distance falls within the
/// accuracy of the diffusivity relation and the fitted distance is close.
#[test]
fn fault_distance_from_diffusivity() {
    let distance = 500.0;
    let times = log_times(80, 0.001, 5000.0);
    let dp = model_drop(
        ReservoirModel::LinearBoundary,
        &[500.0, 2.0, 0.001, PI, distance],
        &times,
    );
    let raw = samples(&times, &dp);
    let (_, regimes) = diagnostics(&raw);
    assert!(regimes.iter().any(|r| r.label == RegimeLabel::BoundaryDominated));

    let result = run_fit(&raw, ReservoirModel::LinearBoundary, &FitConfig::new());
    assert!(!result.has_model_mismatch(), "warnings: {:?}", result.warnings);
    let estimate = result.boundary_distance.expect("boundary distance");
    assert!(
        (0.3 * distance..=3.0 * distance).contains(&estimate),
        "estimate = {estimate}"
    );
    let fitted = result.parameter("distance").expect("distance");
    assert!(
        (distance / 1.5..=distance * 1.5).contains(&fitted),
        "fitted distance = {fitted}"
    );
}

// ---------------------------------------------------------------------------
// e) determinism
// ---------------------------------------------------------------------------

/// Refitting identical input gives an identical result.
#[test]
fn refit_is_deterministic() {
    let raw = noisy_scenario(11);
    let a = run_fit(&raw, ReservoirModel::HomogeneousWbsSkin, &FitConfig::new());
    let b = run_fit(&raw, ReservoirModel::HomogeneousWbsSkin, &FitConfig::new());
    assert_eq!(a, b);
}

/// Bootstrap intervals with a fixed seed are reproducible and ordered.
#[test]
fn bootstrap_is_reproducible() {
    let raw = noisy_scenario(5);
    let config = FitConfig::new().with_confidence(ConfidenceMethod::Bootstrap {
        resamples: 24,
        seed: 7,
    });
    let a = run_fit(&raw, ReservoirModel::HomogeneousWbsSkin, &config);
    let b = run_fit(&raw, ReservoirModel::HomogeneousWbsSkin, &config);
    assert_eq!(a.confidence_intervals, b.confidence_intervals);
    for name in ["kh", "skin", "C", "Pi"] {
        let ci = a.interval(name).expect("interval");
        assert!(ci.p10 <= ci.p90, "{name}: {ci:?}");
    }
    assert!(!a.warnings.iter().any(|w| matches!(w, FitWarning::BootstrapTruncated { .. })));
}

// ---------------------------------------------------------------------------
// f) budgets
// ---------------------------------------------------------------------------

/// A one-iteration budget returns a usable result flagged as not converged.
#[test]
fn iteration_budget_returns_best_iterate() {
    let raw = noisy_scenario(3);
    let result = run_fit(
        &raw,
        ReservoirModel::HomogeneousWbsSkin,
        &FitConfig::new().with_max_iterations(1),
    );
    assert_eq!(result.iterations, 1);
    assert!(!result.converged);
    assert!(result.warnings.iter().any(|w| matches!(w, FitWarning::NonConvergence { .. })));
    assert!(result.parameter("kh").is_some_and(f64::is_finite));
}

/// The time budget covers the bootstrap refits too: the call returns close to
/// the deadline, reports the truncation and still carries ordered intervals.
#[test]
fn time_budget_bounds_bootstrap() {
    let raw = noisy_scenario(1);
    let (diag, regimes) = diagnostics(&raw);
    let budget = Duration::from_millis(50);
    let config = FitConfig::new()
        .with_time_budget(budget)
        .with_confidence(ConfidenceMethod::Bootstrap {
            resamples: 1000,
            seed: 7,
        });

    let started = Instant::now();
    let result = fit(
        &diag,
        &regimes,
        ReservoirModel::HomogeneousWbsSkin,
        &test_config(),
        &config,
    )
    .expect("fit succeeds");
    let elapsed = started.elapsed();

    assert!(elapsed < 20 * budget, "elapsed {elapsed:?} for a {budget:?} budget");
    assert!(
        result.warnings.iter().any(|w| matches!(
            w,
            FitWarning::BootstrapTruncated {
                requested: 1000,
                completed,
            } if *completed < 1000
        )),
        "warnings: {:?}",
        result.warnings
    );
    for name in ["kh", "skin", "C", "Pi"] {
        let ci = result.interval(name).expect("interval");
        assert!(ci.p10 <= ci.p90, "{name}: {ci:?}");
    }
}

/// Initial guesses naming a parameter the model lacks are rejected.
#[test]
fn unknown_initial_guess_is_rejected() {
    let (diag, regimes) = diagnostics(&samples(&scenario_times(), &scenario_drop()));
    let err = fit(
        &diag,
        &regimes,
        ReservoirModel::HomogeneousWbsSkin,
        &test_config(),
        &FitConfig::new().with_initial_guess("omega", 0.1),
    )
    .unwrap_err();
    assert!(err.to_string().contains("omega"), "{err}");
}
