//! Raw observation type.

/// One gauge reading: elapsed time (h), bottom-hole pressure (psi) and the
/// surface rate at that time (positive = production, negative = injection).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Time since an arbitrary origin, hours.
    pub time: f64,
    /// Bottom-hole pressure, psi.
    pub pressure: f64,
    /// Surface rate, STB/D or Mscf/D.
    pub rate: f64,
}

impl Sample {
    /// Create a sample.
    #[must_use]
    pub fn new(time: f64, pressure: f64, rate: f64) -> Self {
        Self {
            time,
            pressure,
            rate,
        }
    }

    /// True when every field is finite, time is non-negative and pressure positive.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.time.is_finite()
            && self.pressure.is_finite()
            && self.rate.is_finite()
            && self.time >= 0.0
            && self.pressure > 0.0
    }
}
