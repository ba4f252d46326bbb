/// Errors from analytical model evaluation.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Returned when a parameter vector has the wrong length for the model.
    #[error("{model} expects {expected} parameters, got {got}")]
    ParameterCount {
        /// Model name.
        model: &'static str,
        /// Number of parameters the model defines.
        expected: usize,
        /// Number of parameters supplied.
        got: usize,
    },

    /// Returned when a parameter lies outside its physical bounds or is not finite.
    #[error("parameter {name} = {value} is outside [{lower}, {upper}]")]
    OutOfBounds {
        /// Parameter name.
        name: &'static str,
        /// The rejected value.
        value: f64,
        /// Lower physical bound.
        lower: f64,
        /// Upper physical bound.
        upper: f64,
    },

    /// Returned when an evaluation time is not positive and finite.
    #[error("evaluation time {time} h must be positive and finite")]
    InvalidTime {
        /// The rejected time, hours.
        time: f64,
    },

    /// Returned when the inversion produced a non-finite pressure.
    #[error("{model} response is not finite at t = {time} h")]
    NonFiniteResponse {
        /// Model name.
        model: &'static str,
        /// Evaluation time, hours.
        time: f64,
    },

    /// Returned when a model name cannot be parsed.
    #[error("unknown reservoir model {name:?}")]
    UnknownModel {
        /// The name that failed to parse.
        name: String,
    },
}
