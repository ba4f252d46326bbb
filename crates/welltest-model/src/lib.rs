//! Analytical reservoir models for pressure transient analysis.
//!
//! Pure math library, zero I/O. Every model is a Laplace-space solution in
//! dimensionless variables, wrapped with wellbore storage and skin and
//! inverted with the Gaver–Stehfest algorithm. Results are in field units:
//! psi, hours, STB/D (Mscf/D for gas).

mod bessel;
mod boundary;
mod dual_porosity;
mod error;
mod homogeneous;
mod horizontal;
mod model;
pub mod param;
mod response;
mod stehfest;

pub use boundary::LinearBoundary;
pub use dual_porosity::{DualPorosityPss, NaturallyFracturedVertical};
pub use error::ModelError;
pub use homogeneous::HomogeneousWbsSkin;
pub use horizontal::HorizontalWell;
pub use model::{AnalyticalModel, DimensionlessFrame, LaplaceKernel, ReservoirModel};
pub use param::{ParamScale, ParamSpec};
pub use response::{
    ModelResponse, pressure_derivative, storage_skin, superposed_drop, superposed_pressure,
    unit_response,
};
pub use stehfest::{STEHFEST_TERMS, stehfest_invert, stehfest_weights};
