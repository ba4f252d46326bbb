//! Criterion benchmarks for welltest-fit: one homogeneous fit and a short bootstrap.

use criterion::{Criterion, criterion_group, criterion_main};

use welltest_diag::{ClassifierConfig, DerivativeConfig, classify, diagnose};
use welltest_fit::{ConfidenceMethod, FitConfig, fit};
use welltest_model::{ReservoirModel, pressure_derivative};
use welltest_series::{NormalizeConfig, Sample, TestConfiguration, normalize};

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

/// 50-point homogeneous drawdown over 0.01–100 h.
fn make_drawdown() -> Vec<Sample> {
    let times: Vec<f64> = (0..50).map(|i| 0.01 * 1e4f64.powf(i as f64 / 49.0)).collect();
    let response = pressure_derivative(
        &ReservoirModel::HomogeneousWbsSkin,
        &[500.0, 2.0, 0.01, 5000.0],
        &test_config(),
        500.0,
        &times,
    )
    .unwrap();
    times
        .iter()
        .zip(&response.delta_p)
        .map(|(&t, dp)| Sample::new(t, 5000.0 - dp, 500.0))
        .collect()
}

fn bench_fit(c: &mut Criterion) {
    let config = test_config();
    let series = normalize(&make_drawdown(), &config, &NormalizeConfig::new()).unwrap();
    let diag = diagnose(&series, &DerivativeConfig::new()).unwrap();
    let regimes = classify(&diag, &ClassifierConfig::new()).unwrap();

    let mut group = c.benchmark_group("fit");
    group.sample_size(10);
    group.bench_function("homogeneous_sensitivity", |b| {
        b.iter(|| {
            fit(
                &diag,
                &regimes,
                ReservoirModel::HomogeneousWbsSkin,
                &config,
                &FitConfig::new(),
            )
            .unwrap()
        });
    });
    let bootstrap = FitConfig::new().with_confidence(ConfidenceMethod::Bootstrap {
        resamples: 32,
        seed: 42,
    });
    group.bench_function("homogeneous_bootstrap_32", |b| {
        b.iter(|| {
            fit(
                &diag,
                &regimes,
                ReservoirModel::HomogeneousWbsSkin,
                &config,
                &bootstrap,
            )
            .unwrap()
        });
    });
    group.finish();
}

criterion_group!(benches, bench_fit);
criterion_main!(benches);
