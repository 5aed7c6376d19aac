//! Axis names shared by rasters, points, shapes and transformations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SpatialDataError;

/// A named axis.
///
/// The derived ordering (`c < z < y < x`) is the canonical dimension
/// order used by every raster schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// Channel.
    C,
    Z,
    Y,
    X,
}

impl Axis {
    /// Spatial axes in point-column order.
    pub const SPATIAL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Axis::C => "c",
            Axis::Z => "z",
            Axis::Y => "y",
            Axis::X => "x",
        }
    }

    #[inline]
    pub fn is_spatial(self) -> bool {
        self != Axis::C
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Axis {
    type Err = SpatialDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "c" => Ok(Axis::C),
            "z" => Ok(Axis::Z),
            "y" => Ok(Axis::Y),
            "x" => Ok(Axis::X),
            other => Err(SpatialDataError::UnsupportedInput(format!(
                "unknown axis `{other}` (expected one of c, z, y, x)"
            ))),
        }
    }
}

/// Renders a list of axes as their string labels.
pub fn axis_labels(axes: &[Axis]) -> Vec<String> {
    axes.iter().map(|a| a.as_str().to_string()).collect()
}
