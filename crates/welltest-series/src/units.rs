//! Oilfield-unit conversion constants.
//!
//! Times in hours, pressures in psi, rates in STB/D (Mscf/D for gas),
//! permeability in mD, lengths in ft, viscosity in cP.

// -- Dimensionless groups --

/// `t_D = DIMENSIONLESS_TIME · k · t / (φ μ c_t r_w²)`.
pub const DIMENSIONLESS_TIME: f64 = 0.000_263_7;

/// `C_D = DIMENSIONLESS_STORAGE · C / (φ c_t h r_w²)`.
pub const DIMENSIONLESS_STORAGE: f64 = 0.8936;

/// `Δp = DIMENSIONLESS_PRESSURE · q B μ / kh · p_D`.
pub const DIMENSIONLESS_PRESSURE: f64 = 141.2;

// -- Straight-line analysis --

/// Constant of the semilog radial-flow approximation `p_D = ½(ln t_D + 0.80907)`.
pub const RADIAL_FLOW_OFFSET: f64 = 0.809_07;

/// Radius of investigation: `L = sqrt(INVESTIGATION · k · t / (φ μ c_t))`.
pub const INVESTIGATION: f64 = 0.000_264;

/// Hours per day, for STB/D rates against hour time stamps.
pub const HOURS_PER_DAY: f64 = 24.0;

/// Effective wellbore radius for a (possibly negative) skin.
///
/// Negative skin is carried by `r_w · e^{-S}` with the skin itself reset to
/// zero, which keeps the storage wrapper well-posed.
#[must_use]
pub fn effective_wellbore(wellbore_radius: f64, skin: f64) -> (f64, f64) {
    if skin < 0.0 {
        (wellbore_radius * (-skin).exp(), 0.0)
    } else {
        (wellbore_radius, skin)
    }
}
