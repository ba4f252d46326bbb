/// Errors from sample validation, normalization and test configuration.
#[derive(Debug, thiserror::Error)]
pub enum SeriesError {
    /// Returned when the sample series cannot be analysed.
    #[error("invalid series ({field}): {reason}")]
    InvalidSeries {
        /// The sample field (or `samples`) at fault.
        field: &'static str,
        /// Human-readable cause.
        reason: String,
    },

    /// Returned when a test configuration value is missing or non-physical.
    #[error("invalid configuration: {field} = {value}: {reason}")]
    InvalidConfiguration {
        /// Name of the offending configuration field.
        field: &'static str,
        /// The rejected value (NaN when the field was missing).
        value: f64,
        /// Human-readable cause.
        reason: String,
    },
}

impl SeriesError {
    pub(crate) fn series(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidSeries {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn config(field: &'static str, value: f64, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field,
            value,
            reason: reason.into(),
        }
    }
}
