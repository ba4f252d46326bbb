/// Errors from derivative computation, time transforms and regime analysis.
#[derive(Debug, thiserror::Error)]
pub enum DiagnosticError {
    /// Returned when too few usable points remain for the computation.
    #[error("insufficient data for {context}: need at least {needed} points, got {got}")]
    InsufficientData {
        /// What was being computed.
        context: &'static str,
        /// Minimum number of points required.
        needed: usize,
        /// Number of usable points available.
        got: usize,
    },

    /// Returned when a time transform does not apply to the selected period.
    #[error("{transform} transform is not applicable: {reason}")]
    InapplicableTransform {
        /// Name of the transform.
        transform: &'static str,
        /// Human-readable cause.
        reason: String,
    },

    /// Returned when the smoothing level is outside `[0, 0.5]`.
    #[error("smoothing level must be in [0, 0.5], got {level}")]
    InvalidSmoothing {
        /// The rejected smoothing level.
        level: f64,
    },

    /// Returned when the requested flow period does not exist.
    #[error("period {period} out of range: series has {n_periods} periods")]
    InvalidPeriod {
        /// The requested period index.
        period: usize,
        /// Number of rate periods in the series.
        n_periods: usize,
    },

    /// Returned when a classifier setting is out of range.
    #[error("invalid classifier setting {field} = {value}")]
    InvalidClassifier {
        /// Name of the offending setting.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },
}
