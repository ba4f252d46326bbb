//! Diagnostic curves for pressure transient analysis.
//!
//! Pure math library, zero I/O. Turns a [`welltest_series::NormalizedSeries`]
//! into the Bourdet log-derivative, the Horner / MDH / superposition /
//! equivalent time axes, a flow-regime segmentation of the derivative curve
//! and a semilog straight-line analysis of the radial-flow regime.

mod derivative;
mod error;
mod regime;
mod semilog;
mod transform;

pub use derivative::{
    AxisKind, DerivativeAxis, DerivativeConfig, DiagnosticSeries, bourdet_derivative,
    diagnose, recompute_derivative,
};
pub use error::DiagnosticError;
pub use regime::{ClassifierConfig, FlowRegime, RegimeLabel, classify, local_slopes};
pub use semilog::{SemilogAnalysis, semilog_analysis};
pub use transform::{
    TimeTransform, TransformKind, agarwal_time, equivalent_time, horner_time, mdh_time,
    superposition_time,
};
