//! Model fitting for pressure transient analysis.
//!
//! Pure math library, zero I/O. Fits a [`welltest_model::ReservoirModel`] to
//! the diagnostics of one flow period by bounded Levenberg–Marquardt in log
//! space, reports P10/P90 intervals from the local linearisation or a seeded
//! parallel residual bootstrap, and estimates the distance to a boundary.
//! [`analyze`] chains every stage from raw samples to a fitted model.

mod boundary;
mod confidence;
mod config;
mod error;
mod estimator;
mod guess;
mod lm;
mod objective;
mod pipeline;
mod result;

pub use boundary::{boundary_distance, investigation_radius};
pub use config::{ConfidenceMethod, FitConfig, MAX_BOOTSTRAP_RESAMPLES};
pub use error::FitError;
pub use estimator::fit;
pub use lm::StopReason;
pub use pipeline::{Analysis, AnalysisOptions, analyze};
pub use result::{ConfidenceInterval, FitResult, FitWarning, ModelFitSeries};
