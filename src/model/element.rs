//! The closed set of spatial element kinds and schema lookup.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::points::{Points, PointsModel};
use super::raster::{RasterElement, RasterModel};
use super::shapes::{Shapes, ShapesModel};
use super::Axis;
use crate::error::{Result, SpatialDataError};
use crate::transform::{HasTransformations, Transformations};

/// Any element a container can hold, except the table.
#[derive(Clone, Debug, PartialEq)]
pub enum SpatialElement {
    Raster(RasterElement),
    Shapes(Shapes),
    Points(Points),
}

impl SpatialElement {
    pub fn as_raster(&self) -> Option<&RasterElement> {
        match self {
            SpatialElement::Raster(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_shapes(&self) -> Option<&Shapes> {
        match self {
            SpatialElement::Shapes(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_points(&self) -> Option<&Points> {
        match self {
            SpatialElement::Points(p) => Some(p),
            _ => None,
        }
    }

    /// One-line description used by listings.
    pub fn summary(&self) -> String {
        match self {
            SpatialElement::Raster(r) => {
                let model = r.model().map_or("unknown", RasterModel::name);
                let scales = if r.is_multiscale() {
                    format!(", {} scales", r.n_scales())
                } else {
                    String::new()
                };
                format!("{model} {:?} {:?}{scales}", r.dims(), r.shape())
            }
            SpatialElement::Shapes(s) => {
                let kind = match s.family() {
                    Some(super::GeometryFamily::Point) => "circles",
                    Some(super::GeometryFamily::Polygonal) => "polygons",
                    None => "shapes",
                };
                format!("{} {kind}", s.len())
            }
            SpatialElement::Points(p) => {
                format!("{} points along {:?}", p.len(), super::axis_labels(&p.axes()))
            }
        }
    }
}

impl From<RasterElement> for SpatialElement {
    fn from(r: RasterElement) -> Self {
        SpatialElement::Raster(r)
    }
}

impl From<Shapes> for SpatialElement {
    fn from(s: Shapes) -> Self {
        SpatialElement::Shapes(s)
    }
}

impl From<Points> for SpatialElement {
    fn from(p: Points) -> Self {
        SpatialElement::Points(p)
    }
}

impl HasTransformations for SpatialElement {
    fn transformations(&self) -> &Transformations {
        match self {
            SpatialElement::Raster(e) => e.transformations(),
            SpatialElement::Shapes(e) => e.transformations(),
            SpatialElement::Points(e) => e.transformations(),
        }
    }

    fn transformations_mut(&mut self) -> &mut Transformations {
        match self {
            SpatialElement::Raster(e) => e.transformations_mut(),
            SpatialElement::Shapes(e) => e.transformations_mut(),
            SpatialElement::Points(e) => e.transformations_mut(),
        }
    }

    fn element_axes(&self) -> Vec<Axis> {
        match self {
            SpatialElement::Raster(e) => e.element_axes(),
            SpatialElement::Shapes(e) => e.element_axes(),
            SpatialElement::Points(e) => e.element_axes(),
        }
    }
}

/// The four named collections of a container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Images,
    Labels,
    Points,
    Shapes,
}

impl ElementKind {
    pub const ALL: [ElementKind; 4] = [
        ElementKind::Images,
        ElementKind::Labels,
        ElementKind::Points,
        ElementKind::Shapes,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ElementKind::Images => "images",
            ElementKind::Labels => "labels",
            ElementKind::Points => "points",
            ElementKind::Shapes => "shapes",
        }
    }

    /// True if an element with this schema belongs in this collection.
    pub fn accepts(self, schema: Schema) -> bool {
        match (self, schema) {
            (ElementKind::Images, Schema::Raster(m)) => !m.is_labels(),
            (ElementKind::Labels, Schema::Raster(m)) => m.is_labels(),
            (ElementKind::Points, Schema::Points) => true,
            (ElementKind::Shapes, Schema::Shapes) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementKind {
    type Err = SpatialDataError;

    fn from_str(s: &str) -> Result<Self> {
        ElementKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| SpatialDataError::UnsupportedInput(format!("unknown element kind `{s}`")))
    }
}

/// The schema an element satisfies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Schema {
    Raster(RasterModel),
    Shapes,
    Points,
}

impl Schema {
    pub fn name(self) -> &'static str {
        match self {
            Schema::Raster(m) => m.name(),
            Schema::Shapes => "Shapes",
            Schema::Points => "Points",
        }
    }

    /// The collection elements of this schema live in.
    pub fn kind(self) -> ElementKind {
        match self {
            Schema::Raster(m) if m.is_labels() => ElementKind::Labels,
            Schema::Raster(_) => ElementKind::Images,
            Schema::Shapes => ElementKind::Shapes,
            Schema::Points => ElementKind::Points,
        }
    }
}

/// Finds the schema of an element and validates the element against it.
pub fn get_schema(element: &SpatialElement) -> Result<Schema> {
    match element {
        SpatialElement::Raster(r) => {
            let model = r.model().ok_or_else(|| SpatialDataError::WrongDims {
                found: r.dims().to_vec(),
                expected: vec!["y, x".into(), "z, y, x".into(), "c, y, x".into(), "c, z, y, x".into()],
            })?;
            model.validate(r)?;
            Ok(Schema::Raster(model))
        }
        SpatialElement::Shapes(s) => {
            ShapesModel::validate(s)?;
            Ok(Schema::Shapes)
        }
        SpatialElement::Points(p) => {
            PointsModel::validate(p)?;
            Ok(Schema::Points)
        }
    }
}
