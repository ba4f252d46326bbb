//! The model trait and the tagged set of supported reservoir models.

use std::fmt;
use std::str::FromStr;

use crate::boundary::LinearBoundary;
use crate::dual_porosity::{DualPorosityPss, NaturallyFracturedVertical};
use crate::error::ModelError;
use crate::homogeneous::HomogeneousWbsSkin;
use crate::horizontal::HorizontalWell;
use crate::param::ParamSpec;

/// Laplace-space dimensionless reservoir pressure `p̄_D(s)`, before storage and skin.
pub type LaplaceKernel = Box<dyn Fn(f64) -> f64 + Send + Sync>;

/// Length and time scales of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DimensionlessFrame {
    /// Effective wellbore radius (after negative skin), ft.
    pub wellbore_radius: f64,
    /// Net thickness, ft.
    pub thickness: f64,
    /// Largest dimensionless time that will be inverted.
    pub max_time: f64,
}

/// A Laplace-space reservoir solution with a fixed parameter vector.
///
/// Parameter vectors are ordered as [`param_specs`](Self::param_specs); the
/// first four entries are always `kh`, `skin`, `C` and `Pi`.
pub trait AnalyticalModel {
    /// Short model name.
    fn name(&self) -> &'static str;

    /// Parameter definitions, in vector order.
    fn param_specs(&self) -> &'static [ParamSpec];

    /// Reservoir kernel for `params` in `frame`.
    ///
    /// `params` has already been checked against [`param_specs`](Self::param_specs).
    fn kernel(&self, params: &[f64], frame: &DimensionlessFrame) -> LaplaceKernel;

    /// Whether the model carries a boundary response.
    fn has_boundary(&self) -> bool {
        false
    }
}

/// Supported reservoir models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReservoirModel {
    /// Infinite homogeneous reservoir with wellbore storage and skin.
    #[default]
    HomogeneousWbsSkin,
    /// Double porosity, pseudo-steady-state matrix flow.
    DualPorosityPss,
    /// Double porosity, transient slab matrix flow.
    NaturallyFracturedVertical,
    /// Horizontal well between sealing top and bottom.
    HorizontalWell,
    /// Homogeneous reservoir with one sealing fault.
    LinearBoundary,
}

impl ReservoirModel {
    /// Every supported model.
    pub const ALL: [Self; 5] = [
        Self::HomogeneousWbsSkin,
        Self::DualPorosityPss,
        Self::NaturallyFracturedVertical,
        Self::HorizontalWell,
        Self::LinearBoundary,
    ];

    fn analytical(&self) -> &'static dyn AnalyticalModel {
        match self {
            Self::HomogeneousWbsSkin => &HomogeneousWbsSkin,
            Self::DualPorosityPss => &DualPorosityPss,
            Self::NaturallyFracturedVertical => &NaturallyFracturedVertical,
            Self::HorizontalWell => &HorizontalWell,
            Self::LinearBoundary => &LinearBoundary,
        }
    }
}

impl AnalyticalModel for ReservoirModel {
    fn name(&self) -> &'static str {
        self.analytical().name()
    }

    fn param_specs(&self) -> &'static [ParamSpec] {
        self.analytical().param_specs()
    }

    fn kernel(&self, params: &[f64], frame: &DimensionlessFrame) -> LaplaceKernel {
        self.analytical().kernel(params, frame)
    }

    fn has_boundary(&self) -> bool {
        self.analytical().has_boundary()
    }
}

impl fmt::Display for ReservoirModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReservoirModel {
    type Err = ModelError;

    /// Parse a model name, ignoring case and `-`/`_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "homogeneous" | "homogeneouswbsskin" => Ok(Self::HomogeneousWbsSkin),
            "dualporositypss" | "dualporosity" | "pss" => Ok(Self::DualPorosityPss),
            "naturallyfractured" | "naturallyfracturedvertical" | "slab" => {
                Ok(Self::NaturallyFracturedVertical)
            }
            "horizontal" | "horizontalwell" => Ok(Self::HorizontalWell),
            "linearboundary" | "fault" => Ok(Self::LinearBoundary),
            _ => Err(ModelError::UnknownModel { name: s.to_owned() }),
        }
    }
}
