//! GeoJSON reader for shapes.
//!
//! Only collections are accepted at the top level: a GeometryCollection,
//! or a FeatureCollection whose feature geometries are taken in order.
//! Geometry types the shapes schema does not support are kept as
//! [`Geometry::Other`] so validation can report them.

use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use super::geometry::{Coord, Geometry, GeometryType, Polygon};
use crate::error::{Result, SpatialDataError};

#[derive(Deserialize)]
#[serde(tag = "type")]
enum Document {
    GeometryCollection {
        geometries: Vec<GeoJsonGeometry>,
    },
    FeatureCollection {
        features: Vec<Feature>,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Deserialize)]
struct Feature {
    geometry: Option<GeoJsonGeometry>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum GeoJsonGeometry {
    Point {
        coordinates: Vec<f64>,
    },
    Polygon {
        coordinates: Vec<Vec<Vec<f64>>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Vec<f64>>>>,
    },
    LineString {},
    MultiPoint {},
    MultiLineString {},
    GeometryCollection {},
}

fn coord(position: &[f64]) -> Result<Coord> {
    match position {
        [x, y, ..] => Ok([*x, *y]),
        _ => Err(SpatialDataError::UnsupportedInput(format!(
            "GeoJSON position needs at least 2 values, got {}",
            position.len()
        ))),
    }
}

fn ring(positions: &[Vec<f64>]) -> Result<Vec<Coord>> {
    positions.iter().map(|p| coord(p)).collect()
}

fn polygon(rings: &[Vec<Vec<f64>>]) -> Result<Polygon> {
    let (exterior, interiors) = rings.split_first().ok_or_else(|| {
        SpatialDataError::UnsupportedInput("GeoJSON polygon without rings".into())
    })?;
    Ok(Polygon {
        exterior: ring(exterior)?,
        interiors: interiors.iter().map(|r| ring(r)).collect::<Result<_>>()?,
    })
}

impl GeoJsonGeometry {
    fn into_geometry(self) -> Result<Geometry> {
        Ok(match self {
            GeoJsonGeometry::Point { coordinates } => Geometry::Point(coord(&coordinates)?),
            GeoJsonGeometry::Polygon { coordinates } => Geometry::Polygon(polygon(&coordinates)?),
            GeoJsonGeometry::MultiPolygon { coordinates } => Geometry::MultiPolygon(
                coordinates
                    .iter()
                    .map(|p| polygon(p))
                    .collect::<Result<_>>()?,
            ),
            GeoJsonGeometry::LineString {} => Geometry::Other(GeometryType::LineString),
            GeoJsonGeometry::MultiPoint {} => Geometry::Other(GeometryType::MultiPoint),
            GeoJsonGeometry::MultiLineString {} => Geometry::Other(GeometryType::MultiLineString),
            GeoJsonGeometry::GeometryCollection {} => {
                Geometry::Other(GeometryType::GeometryCollection)
            }
        })
    }
}

fn into_geometries(document: Document) -> Result<Vec<Geometry>> {
    match document {
        Document::GeometryCollection { geometries } => geometries
            .into_iter()
            .map(GeoJsonGeometry::into_geometry)
            .collect(),
        Document::FeatureCollection { features } => features
            .into_iter()
            .map(|f| {
                f.geometry
                    .ok_or_else(|| {
                        SpatialDataError::UnsupportedInput("feature without a geometry".into())
                    })?
                    .into_geometry()
            })
            .collect(),
        Document::Unsupported => Err(SpatialDataError::UnsupportedInput(
            "GeoJSON must be a GeometryCollection or a FeatureCollection".into(),
        )),
    }
}

/// Reads the geometries of a GeoJSON file.
pub fn read_geojson(path: &Path) -> Result<Vec<Geometry>> {
    let file = File::open(path).map_err(SpatialDataError::Io)?;
    let document: Document = serde_json::from_reader(BufReader::new(file)).map_err(|source| {
        SpatialDataError::GeoJsonParse {
            path: path.to_path_buf(),
            source,
        }
    })?;
    into_geometries(document)
}

/// Parses the geometries of an in-memory GeoJSON document.
pub fn from_geojson_slice(bytes: &[u8]) -> Result<Vec<Geometry>> {
    let document: Document =
        serde_json::from_slice(bytes).map_err(|source| SpatialDataError::GeoJsonParse {
            path: PathBuf::from("<memory>"),
            source,
        })?;
    into_geometries(document)
}
