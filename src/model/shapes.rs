//! Shapes schema: circles (points with a radius), polygons and
//! multipolygons.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use super::frame::{Column, DataFrame};
use super::geometry::{from_ragged_array, Coord, Geometry, GeometryFamily, GeometryType};
use super::io_geojson::{from_geojson_slice, read_geojson};
use super::Axis;
use crate::error::{Result, SpatialDataError};
use crate::transform::{parse_transformations, HasTransformations, Transformations};

/// A shapes element: one geometry per row plus row attributes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Shapes {
    pub geometry: Vec<Geometry>,
    #[serde(default)]
    pub attributes: DataFrame,
    #[serde(default)]
    pub transformations: Transformations,
}

impl Shapes {
    pub fn len(&self) -> usize {
        self.geometry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geometry.is_empty()
    }

    /// Radius per row, for point shapes.
    pub fn radius(&self) -> Option<Vec<f64>> {
        self.attributes
            .column(ShapesModel::RADIUS_KEY)
            .and_then(Column::to_f64)
    }

    /// Family shared by every geometry; `None` when empty or mixed.
    pub fn family(&self) -> Option<GeometryFamily> {
        let families: BTreeSet<Option<GeometryFamily>> =
            self.geometry.iter().map(Geometry::family).collect();
        match families.into_iter().collect::<Vec<_>>().as_slice() {
            [single] => *single,
            _ => None,
        }
    }
}

impl HasTransformations for Shapes {
    fn transformations(&self) -> &Transformations {
        &self.transformations
    }

    fn transformations_mut(&mut self) -> &mut Transformations {
        &mut self.transformations
    }

    fn element_axes(&self) -> Vec<Axis> {
        vec![Axis::X, Axis::Y]
    }
}

#[derive(Clone, Debug, Default)]
pub struct ShapesParseOptions {
    /// Required for point shapes, one value per row.
    pub radius: Option<Vec<f64>>,
    pub transformations: Option<Transformations>,
}

impl ShapesParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_radius(mut self, radius: impl Into<Vec<f64>>) -> Self {
        self.radius = Some(radius.into());
        self
    }

    pub fn with_transformations(mut self, transformations: Transformations) -> Self {
        self.transformations = Some(transformations);
        self
    }
}

/// Parsers and validator for [`Shapes`].
pub struct ShapesModel;

impl ShapesModel {
    pub const RADIUS_KEY: &'static str = "radius";

    /// Builds shapes from the ragged-array encoding (`geometry_type` tag
    /// 0 = Point, 3 = Polygon, 6 = MultiPolygon).
    pub fn parse_ragged(
        geometry_type: u8,
        coords: &[Coord],
        offsets: &[Vec<usize>],
        options: ShapesParseOptions,
    ) -> Result<Shapes> {
        let geometry_type = GeometryType::try_from(geometry_type)?;
        let geometry = from_ragged_array(geometry_type, coords, offsets)?;
        Self::parse_geometries(geometry, options)
    }

    /// Reads a GeoJSON GeometryCollection (or FeatureCollection) file.
    pub fn parse_geojson_path(path: &Path, options: ShapesParseOptions) -> Result<Shapes> {
        Self::parse_geometries(read_geojson(path)?, options)
    }

    pub fn parse_geojson_slice(bytes: &[u8], options: ShapesParseOptions) -> Result<Shapes> {
        Self::parse_geometries(from_geojson_slice(bytes)?, options)
    }

    /// Wraps bare geometries into a shapes element.
    pub fn parse_geometries(geometry: Vec<Geometry>, options: ShapesParseOptions) -> Result<Shapes> {
        let mut attributes = DataFrame::new();
        let is_point = geometry
            .first()
            .is_some_and(|g| g.family() == Some(GeometryFamily::Point));
        match options.radius {
            Some(radius) => {
                if !is_point {
                    return Err(SpatialDataError::invalid(
                        "shapes",
                        "`radius` is only meaningful for point shapes",
                    ));
                }
                if radius.len() != geometry.len() {
                    return Err(SpatialDataError::ShapeMismatch(format!(
                        "{} radius values for {} shapes",
                        radius.len(),
                        geometry.len()
                    )));
                }
                attributes.insert(Self::RADIUS_KEY, Column::Float64(radius))?;
            }
            None if is_point => {
                return Err(SpatialDataError::invalid(
                    "shapes",
                    "`radius` is required for point shapes",
                ));
            }
            None => {}
        }
        let shapes = Shapes {
            geometry,
            attributes,
            transformations: Transformations::new(),
        };
        Self::finish(shapes, options.transformations)
    }

    /// Re-parses an existing shapes element.
    pub fn parse_frame(shapes: Shapes, transformations: Option<Transformations>) -> Result<Shapes> {
        Self::finish(shapes, transformations)
    }

    fn finish(mut shapes: Shapes, transformations: Option<Transformations>) -> Result<Shapes> {
        parse_transformations(&mut shapes, transformations)?;
        Self::validate(&shapes)?;
        Ok(shapes)
    }

    pub fn validate(shapes: &Shapes) -> Result<()> {
        if shapes.attributes.n_cols() > 0 && shapes.attributes.n_rows() != shapes.len() {
            return Err(SpatialDataError::ShapeMismatch(format!(
                "{} attribute rows for {} geometries",
                shapes.attributes.n_rows(),
                shapes.len()
            )));
        }
        if let Some(other) = shapes.geometry.iter().find(|g| g.family().is_none()) {
            return Err(SpatialDataError::UnsupportedInput(format!(
                "geometry type {} is not supported for shapes; use Point, Polygon or MultiPolygon",
                other.geometry_type()
            )));
        }
        let families: BTreeSet<_> = shapes.geometry.iter().filter_map(Geometry::family).collect();
        if families.len() > 1 {
            return Err(SpatialDataError::invalid(
                "shapes",
                "point and polygonal geometries cannot be mixed",
            ));
        }

        let radius = shapes.attributes.column(Self::RADIUS_KEY);
        match (families.first(), radius) {
            (Some(GeometryFamily::Point), None) => {
                return Err(SpatialDataError::MissingColumn {
                    element: "shapes",
                    column: Self::RADIUS_KEY.to_string(),
                });
            }
            (Some(GeometryFamily::Point), Some(r)) if !r.is_numeric() => {
                return Err(SpatialDataError::invalid(
                    "shapes",
                    format!("`radius` must be numeric, found {}", r.dtype()),
                ));
            }
            (Some(GeometryFamily::Polygonal), Some(_)) => {
                return Err(SpatialDataError::invalid(
                    "shapes",
                    "`radius` is only meaningful for point shapes",
                ));
            }
            _ => {}
        }

        if shapes.transformations.is_empty() {
            return Err(SpatialDataError::invalid(
                "shapes",
                "transformation metadata is missing",
            ));
        }
        shapes.transformations.check(&shapes.element_axes())?;
        Ok(())
    }
}
