use welltest_diag::DiagnosticError;
use welltest_model::ModelError;
use welltest_series::SeriesError;

/// Errors from parameter estimation and the analysis pipeline.
#[derive(Debug, thiserror::Error)]
pub enum FitError {
    /// Returned when there are fewer fit points than free parameters + 1.
    #[error("need at least {needed} fit points, got {got}")]
    InsufficientData {
        /// Minimum number of usable points.
        needed: usize,
        /// Usable points found.
        got: usize,
    },

    /// Returned when an initial guess names a parameter the model does not have.
    #[error("model {model} has no parameter named {name:?}")]
    UnknownParameter {
        /// Model name.
        model: &'static str,
        /// The unknown parameter name.
        name: String,
    },

    /// Returned when a fit setting is out of range.
    #[error("invalid fit configuration: {field} = {value}: {reason}")]
    InvalidConfiguration {
        /// Name of the offending setting.
        field: &'static str,
        /// The rejected value.
        value: f64,
        /// Human-readable cause.
        reason: String,
    },

    /// Wraps a normalization or configuration error.
    #[error(transparent)]
    Series(#[from] SeriesError),

    /// Wraps a diagnostic error.
    #[error(transparent)]
    Diagnostic(#[from] DiagnosticError),

    /// Wraps a model evaluation error.
    #[error("model evaluation failed: {0}")]
    Model(#[from] ModelError),
}
