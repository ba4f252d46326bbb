//! Well test samples, test configuration and rate-period normalization.
//!
//! Pure math library, zero I/O. Validates raw `(time, pressure, rate)`
//! samples, removes the static pre-test period, splits the history into
//! constant-rate periods and, for gas wells, substitutes normalized
//! pseudo-pressure and pseudo-time before anything downstream sees the data.

mod config;
mod error;
mod normalize;
mod period;
mod pvt;
mod sample;
pub mod units;

pub use config::{GasProperties, NormalizeConfig, TestConfiguration, TestConfigurationBuilder};
pub use error::SeriesError;
pub use normalize::{NormalizedSeries, normalize};
pub use period::{FlowKind, RatePeriod, RateStep};
pub use pvt::GasPvt;
pub use sample::Sample;
