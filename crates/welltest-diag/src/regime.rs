//! Rule-based flow-regime segmentation of the log-log derivative.

use std::fmt;

use tracing::{debug, info, instrument};

use crate::derivative::DiagnosticSeries;
use crate::error::DiagnosticError;

/// Flow regime recognised on the derivative curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegimeLabel {
    /// Unit slope at early time.
    WellboreStorage,
    /// Storage hump and skin, between storage and radial flow.
    Transition,
    /// Flat derivative for at least the configured number of log cycles.
    RadialFlow,
    /// Rising or re-stabilised (higher) derivative after radial flow.
    BoundaryDominated,
    /// Unit slope after radial flow.
    PseudoSteadyState,
    /// No rule matched.
    Unclassified,
}

impl RegimeLabel {
    /// Short machine-friendly name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WellboreStorage => "wellbore_storage",
            Self::Transition => "transition",
            Self::RadialFlow => "iarf",
            Self::BoundaryDominated => "boundary_dominated",
            Self::PseudoSteadyState => "pseudo_steady_state",
            Self::Unclassified => "unclassified",
        }
    }

    fn target(self) -> SlopeTarget {
        match self {
            Self::WellboreStorage | Self::PseudoSteadyState => SlopeTarget::Level(1.0),
            Self::RadialFlow => SlopeTarget::Level(0.0),
            Self::Transition => SlopeTarget::Range(-0.85, 0.85),
            Self::BoundaryDominated => SlopeTarget::Range(0.0, 0.85),
            Self::Unclassified => SlopeTarget::None,
        }
    }
}

impl fmt::Display for RegimeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::WellboreStorage => "Wellbore Storage",
            Self::Transition => "Transition (Storage + Skin)",
            Self::RadialFlow => "Infinite-Acting Radial Flow",
            Self::BoundaryDominated => "Boundary-Dominated / Transition to Boundary",
            Self::PseudoSteadyState => "Pseudo-Steady-State / Closed Boundary",
            Self::Unclassified => "Unclassified",
        })
    }
}

/// A labelled time interval of the derivative curve.
///
/// `first_index..end_index` index the points of the classified series.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowRegime {
    /// Regime label.
    pub label: RegimeLabel,
    /// Interval start (elapsed time), hours.
    pub start: f64,
    /// Interval end (elapsed time), hours.
    pub end: f64,
    /// Fraction of points whose local slope matches the label's target.
    pub confidence: f64,
    /// Index of the first point in the regime.
    pub first_index: usize,
    /// One past the index of the last point in the regime.
    pub end_index: usize,
    /// Mean local slope over the regime, if any slope is defined.
    pub mean_slope: Option<f64>,
}

impl FlowRegime {
    /// Duration in log cycles.
    #[must_use]
    pub fn log_cycles(&self) -> f64 {
        (self.end / self.start).log10()
    }
}

/// Settings for [`classify`].
///
/// # Defaults
///
/// | Parameter              | Default |
/// |------------------------|---------|
/// | `slope_tolerance`      | 0.15    |
/// | `window`               | 0.2     |
/// | `min_regime_cycles`    | 0.1     |
/// | `min_radial_cycles`    | 1.0     |
/// | `boundary_level_ratio` | 1.5     |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierConfig {
    pub(crate) slope_tolerance: f64,
    pub(crate) window: f64,
    pub(crate) min_regime_cycles: f64,
    pub(crate) min_radial_cycles: f64,
    pub(crate) boundary_level_ratio: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassifierConfig {
    /// Create a config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slope_tolerance: 0.15,
            window: 0.2,
            min_regime_cycles: 0.1,
            min_radial_cycles: 1.0,
            boundary_level_ratio: 1.5,
        }
    }

    /// Set the slope tolerance around each rule's target.
    #[must_use]
    pub fn with_slope_tolerance(mut self, slope_tolerance: f64) -> Self {
        self.slope_tolerance = slope_tolerance;
        self
    }

    /// Set the half-width of the slope window, ln units.
    #[must_use]
    pub fn with_window(mut self, window: f64) -> Self {
        self.window = window;
        self
    }

    /// Set the minimum regime length, log cycles.
    #[must_use]
    pub fn with_min_regime_cycles(mut self, min_regime_cycles: f64) -> Self {
        self.min_regime_cycles = min_regime_cycles;
        self
    }

    /// Set the minimum radial-flow length, log cycles.
    #[must_use]
    pub fn with_min_radial_cycles(mut self, min_radial_cycles: f64) -> Self {
        self.min_radial_cycles = min_radial_cycles;
        self
    }

    /// Set the derivative level ratio above radial flow that marks a boundary.
    #[must_use]
    pub fn with_boundary_level_ratio(mut self, boundary_level_ratio: f64) -> Self {
        self.boundary_level_ratio = boundary_level_ratio;
        self
    }

    fn validate(&self) -> Result<(), DiagnosticError> {
        let checks = [
            ("slope_tolerance", self.slope_tolerance),
            ("window", self.window),
            ("min_regime_cycles", self.min_regime_cycles),
            ("min_radial_cycles", self.min_radial_cycles),
        ];
        for (field, value) in checks {
            if !value.is_finite() || value <= 0.0 {
                return Err(DiagnosticError::InvalidClassifier { field, value });
            }
        }
        if !self.boundary_level_ratio.is_finite() || self.boundary_level_ratio <= 1.0 {
            return Err(DiagnosticError::InvalidClassifier {
                field: "boundary_level_ratio",
                value: self.boundary_level_ratio,
            });
        }
        Ok(())
    }
}

// ── Slopes ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum SlopeTarget {
    Level(f64),
    Range(f64, f64),
    None,
}

impl SlopeTarget {
    fn matches(self, slope: Option<f64>, tolerance: f64) -> bool {
        let Some(s) = slope else {
            return false;
        };
        match self {
            Self::Level(v) => (s - v).abs() <= tolerance,
            Self::Range(lo, hi) => s >= lo - tolerance && s <= hi + tolerance,
            Self::None => false,
        }
    }
}

/// Shape of the derivative at one point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlopeClass {
    Unit,
    Flat,
    Rising,
    Steep,
    Falling,
    Undefined,
}

impl SlopeClass {
    fn of(slope: Option<f64>, tolerance: f64) -> Self {
        match slope {
            None => Self::Undefined,
            Some(s) if (s - 1.0).abs() <= tolerance => Self::Unit,
            Some(s) if s.abs() <= tolerance => Self::Flat,
            Some(s) if s > 1.0 => Self::Steep,
            Some(s) if s > 0.0 => Self::Rising,
            Some(_) => Self::Falling,
        }
    }

    fn target(self) -> SlopeTarget {
        match self {
            Self::Unit => SlopeTarget::Level(1.0),
            Self::Flat => SlopeTarget::Level(0.0),
            Self::Rising => SlopeTarget::Range(0.0, 1.0),
            Self::Steep => SlopeTarget::Range(1.0, f64::INFINITY),
            Self::Falling => SlopeTarget::Range(f64::NEG_INFINITY, 0.0),
            Self::Undefined => SlopeTarget::None,
        }
    }
}

/// Least-squares slope of `ln d` against `ln t` in a window of half-width
/// `window` around each point.
///
/// Points with a non-positive derivative have no slope. When fewer than three
/// points fall inside the window the adjacent valid points are used instead.
#[must_use]
pub fn local_slopes(elapsed: &[f64], derivative: &[f64], window: f64) -> Vec<Option<f64>> {
    let n = elapsed.len().min(derivative.len());
    let lt: Vec<f64> = elapsed[..n].iter().map(|t| t.ln()).collect();
    let ld: Vec<Option<f64>> = derivative[..n]
        .iter()
        .map(|&d| (d > 0.0 && d.is_finite()).then(|| d.ln()))
        .collect();

    (0..n)
        .map(|i| {
            ld[i]?;
            let mut members: Vec<usize> = (0..n)
                .filter(|&j| ld[j].is_some() && (lt[j] - lt[i]).abs() <= window)
                .collect();
            if members.len() < 3 {
                members = [i.checked_sub(1), Some(i), (i + 1 < n).then_some(i + 1)]
                    .into_iter()
                    .flatten()
                    .filter(|&j| ld[j].is_some())
                    .collect();
            }
            regression_slope(&members, &lt, &ld)
        })
        .collect()
}

fn regression_slope(members: &[usize], x: &[f64], y: &[Option<f64>]) -> Option<f64> {
    if members.len() < 2 {
        return None;
    }
    let m = members.len() as f64;
    let mx = members.iter().map(|&j| x[j]).sum::<f64>() / m;
    let my = members.iter().filter_map(|&j| y[j]).sum::<f64>() / m;
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for &j in members {
        let dx = x[j] - mx;
        sxx += dx * dx;
        sxy += dx * (y[j]? - my);
    }
    (sxx > 0.0).then(|| sxy / sxx)
}

// ── Segmentation ──────────────────────────────────────────────────────────────

/// A contiguous run of points sharing a class, `[first, end)`.
#[derive(Debug, Clone, Copy)]
struct Run<C> {
    class: C,
    first: usize,
    end: usize,
}

/// Split points into maximal runs of equal class.
fn runs_of<C: Copy + PartialEq>(classes: &[C]) -> Vec<Run<C>> {
    let mut runs: Vec<Run<C>> = Vec::new();
    for (i, &class) in classes.iter().enumerate() {
        match runs.last_mut() {
            Some(run) if run.class == class => run.end = i + 1,
            _ => runs.push(Run {
                class,
                first: i,
                end: i + 1,
            }),
        }
    }
    runs
}

fn coalesce<C: Copy + PartialEq>(runs: Vec<Run<C>>) -> Vec<Run<C>> {
    let mut out: Vec<Run<C>> = Vec::with_capacity(runs.len());
    for run in runs {
        match out.last_mut() {
            Some(last) if last.class == run.class => last.end = run.end,
            _ => out.push(run),
        }
    }
    out
}

/// Interval bounds of each run: geometric means of neighbouring samples,
/// clamped to the first and last sample.
fn bounds(elapsed: &[f64], first: usize, end: usize) -> (f64, f64) {
    let n = elapsed.len();
    let start = if first == 0 {
        elapsed[0]
    } else {
        (elapsed[first - 1] * elapsed[first]).sqrt()
    };
    let stop = if end >= n {
        elapsed[n - 1]
    } else {
        (elapsed[end - 1] * elapsed[end]).sqrt()
    };
    (start, stop)
}

fn cycles(elapsed: &[f64], first: usize, end: usize) -> f64 {
    let (start, stop) = bounds(elapsed, first, end);
    (stop / start).log10()
}

fn confidence(slopes: &[Option<f64>], first: usize, end: usize, target: SlopeTarget, tol: f64) -> f64 {
    if target == SlopeTarget::None || end <= first {
        return 0.0;
    }
    let hits = slopes[first..end]
        .iter()
        .filter(|&&s| target.matches(s, tol))
        .count();
    hits as f64 / (end - first) as f64
}

/// Merge runs shorter than `min_cycles` into the neighbour of higher
/// confidence, then coalesce equal neighbours; repeat until stable.
fn merge_short_runs(
    mut runs: Vec<Run<SlopeClass>>,
    elapsed: &[f64],
    slopes: &[Option<f64>],
    config: &ClassifierConfig,
) -> Vec<Run<SlopeClass>> {
    let tol = config.slope_tolerance;
    loop {
        if runs.len() < 2 {
            return runs;
        }
        let shortest = runs
            .iter()
            .enumerate()
            .map(|(i, r)| (i, cycles(elapsed, r.first, r.end)))
            .filter(|&(_, c)| c < config.min_regime_cycles)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        let Some((i, _)) = shortest else {
            return runs;
        };

        let score = |r: &Run<SlopeClass>| confidence(slopes, r.first, r.end, r.class.target(), tol);
        let into_left = match (i.checked_sub(1), runs.get(i + 1)) {
            (Some(l), Some(right)) => score(&runs[l]) >= score(right),
            (Some(_), None) => true,
            (None, _) => false,
        };
        let absorbed = runs.remove(i);
        if into_left {
            runs[i - 1].end = absorbed.end;
        } else {
            runs[i].first = absorbed.first;
        }
        runs = coalesce(runs);
    }
}

fn median(values: &[f64]) -> f64 {
    let mut v: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
    if v.is_empty() {
        return f64::NAN;
    }
    v.sort_by(f64::total_cmp);
    let mid = v.len() / 2;
    if v.len() % 2 == 0 {
        0.5 * (v[mid - 1] + v[mid])
    } else {
        v[mid]
    }
}

/// Label slope runs by their position relative to radial flow.
fn label_runs(
    runs: &[Run<SlopeClass>],
    elapsed: &[f64],
    derivative: &[f64],
    config: &ClassifierConfig,
) -> Vec<Run<RegimeLabel>> {
    let radial = runs.iter().position(|r| {
        r.class == SlopeClass::Flat && cycles(elapsed, r.first, r.end) >= config.min_radial_cycles
    });
    let radial_level = radial.map(|i| median(&derivative[runs[i].first..runs[i].end]));

    let mut labelled = Vec::with_capacity(runs.len());
    let mut leading_storage = true;
    for (i, run) in runs.iter().enumerate() {
        let label = match radial {
            Some(r) if i == r => RegimeLabel::RadialFlow,
            Some(r) if i > r => {
                let level = radial_level.unwrap_or(f64::NAN);
                match run.class {
                    SlopeClass::Rising => RegimeLabel::BoundaryDominated,
                    SlopeClass::Flat => {
                        let run_level = median(&derivative[run.first..run.end]);
                        if run_level >= config.boundary_level_ratio * level {
                            RegimeLabel::BoundaryDominated
                        } else {
                            RegimeLabel::RadialFlow
                        }
                    }
                    SlopeClass::Unit | SlopeClass::Steep => RegimeLabel::PseudoSteadyState,
                    SlopeClass::Falling | SlopeClass::Undefined => RegimeLabel::Unclassified,
                }
            }
            _ => {
                let storage = matches!(run.class, SlopeClass::Unit | SlopeClass::Steep);
                if leading_storage && storage {
                    RegimeLabel::WellboreStorage
                } else {
                    leading_storage = false;
                    match run.class {
                        SlopeClass::Undefined | SlopeClass::Steep => RegimeLabel::Unclassified,
                        _ => RegimeLabel::Transition,
                    }
                }
            }
        };
        labelled.push(Run {
            class: label,
            first: run.first,
            end: run.end,
        });
    }
    coalesce(labelled)
}

/// Classify the smoothed derivative of `series` into flow regimes.
///
/// The result is ordered, non-overlapping and spans
/// `[elapsed[0], elapsed[n − 1]]` exactly; neighbouring regimes share the
/// geometric mean of their adjacent sample times as a boundary.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`DiagnosticError::InvalidClassifier`] | A setting is non-positive or non-finite |
/// | [`DiagnosticError::InsufficientData`] | Fewer than 3 points |
#[instrument(skip_all, fields(n = series.len()))]
pub fn classify(
    series: &DiagnosticSeries,
    config: &ClassifierConfig,
) -> Result<Vec<FlowRegime>, DiagnosticError> {
    config.validate()?;
    let elapsed = series.elapsed();
    let derivative = series.smoothed_derivative();
    if elapsed.len() < 3 {
        return Err(DiagnosticError::InsufficientData {
            context: "regime classification",
            needed: 3,
            got: elapsed.len(),
        });
    }

    let slopes = local_slopes(elapsed, derivative, config.window);
    let classes: Vec<SlopeClass> = slopes
        .iter()
        .map(|&s| SlopeClass::of(s, config.slope_tolerance))
        .collect();
    let runs = runs_of(&classes);
    debug!(n_runs = runs.len(), "slope runs");
    let runs = merge_short_runs(runs, elapsed, &slopes, config);
    debug!(n_runs = runs.len(), "short runs merged");

    let regimes: Vec<FlowRegime> = label_runs(&runs, elapsed, derivative, config)
        .into_iter()
        .map(|run| {
            let (start, end) = bounds(elapsed, run.first, run.end);
            let defined: Vec<f64> = slopes[run.first..run.end].iter().flatten().copied().collect();
            let mean_slope =
                (!defined.is_empty()).then(|| defined.iter().sum::<f64>() / defined.len() as f64);
            FlowRegime {
                label: run.class,
                start,
                end,
                confidence: confidence(
                    &slopes,
                    run.first,
                    run.end,
                    run.class.target(),
                    config.slope_tolerance,
                ),
                first_index: run.first,
                end_index: run.end,
                mean_slope,
            }
        })
        .collect();

    info!(
        n_regimes = regimes.len(),
        radial = regimes.iter().any(|r| r.label == RegimeLabel::RadialFlow),
        "flow regimes classified"
    );
    Ok(regimes)
}
