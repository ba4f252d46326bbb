//! Domain types for welltest-io.

use crate::IoError;

/// A validated experiment name for output file naming.
///
/// Must match `[a-zA-Z0-9_-]+`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentName(String);

impl ExperimentName {
    /// Parse and validate an experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidExperimentName`] if the name is empty or
    /// contains characters outside `[a-zA-Z0-9_-]`.
    pub fn new(name: String) -> Result<Self, IoError> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(IoError::InvalidExperimentName { name });
        }
        Ok(Self(name))
    }

    /// Return the experiment name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExperimentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Header names of the time, pressure and rate columns.
///
/// Matched case-insensitively after trimming whitespace.
///
/// # Defaults
///
/// | Column     | Default      |
/// |------------|--------------|
/// | `time`     | `"time"`     |
/// | `pressure` | `"pressure"` |
/// | `rate`     | `"rate"`     |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnNames {
    pub(crate) time: String,
    pub(crate) pressure: String,
    pub(crate) rate: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self::new()
    }
}

impl ColumnNames {
    /// Create the default `time,pressure,rate` mapping.
    #[must_use]
    pub fn new() -> Self {
        Self {
            time: "time".into(),
            pressure: "pressure".into(),
            rate: "rate".into(),
        }
    }

    /// Set the time column name.
    #[must_use]
    pub fn with_time(mut self, name: impl Into<String>) -> Self {
        self.time = name.into();
        self
    }

    /// Set the pressure column name.
    #[must_use]
    pub fn with_pressure(mut self, name: impl Into<String>) -> Self {
        self.pressure = name.into();
        self
    }

    /// Set the rate column name.
    #[must_use]
    pub fn with_rate(mut self, name: impl Into<String>) -> Self {
        self.rate = name.into();
        self
    }

    /// Return the time column name.
    #[must_use]
    pub fn time(&self) -> &str {
        &self.time
    }

    /// Return the pressure column name.
    #[must_use]
    pub fn pressure(&self) -> &str {
        &self.pressure
    }

    /// Return the rate column name.
    #[must_use]
    pub fn rate(&self) -> &str {
        &self.rate
    }
}
