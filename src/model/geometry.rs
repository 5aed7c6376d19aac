//! Planar geometries and their ragged-array encoding.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, SpatialDataError};

/// A 2D coordinate, `[x, y]`.
pub type Coord = [f64; 2];

/// A polygon: one exterior ring and any number of holes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub exterior: Vec<Coord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interiors: Vec<Vec<Coord>>,
}

impl Polygon {
    pub fn new(exterior: Vec<Coord>) -> Self {
        Self {
            exterior,
            interiors: Vec::new(),
        }
    }

    pub fn with_interior(mut self, ring: Vec<Coord>) -> Self {
        self.interiors.push(ring);
        self
    }
}

/// One row of a shapes element.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Coord),
    Polygon(Polygon),
    MultiPolygon(Vec<Polygon>),
    /// A geometry the shapes schema does not accept; kept so validation
    /// can name it.
    Other(GeometryType),
}

impl Geometry {
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Geometry::Point(_) => GeometryType::Point,
            Geometry::Polygon(_) => GeometryType::Polygon,
            Geometry::MultiPolygon(_) => GeometryType::MultiPolygon,
            Geometry::Other(t) => *t,
        }
    }

    pub fn family(&self) -> Option<GeometryFamily> {
        self.geometry_type().family()
    }

    /// Every vertex of the geometry.
    pub fn coords(&self) -> Vec<Coord> {
        fn polygon(p: &Polygon) -> impl Iterator<Item = Coord> + '_ {
            p.exterior.iter().chain(p.interiors.iter().flatten()).copied()
        }
        match self {
            Geometry::Point(c) => vec![*c],
            Geometry::Polygon(p) => polygon(p).collect(),
            Geometry::MultiPolygon(ps) => ps.iter().flat_map(polygon).collect(),
            Geometry::Other(_) => Vec::new(),
        }
    }
}

/// Geometry type tags of the ragged-array encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryType {
    Point = 0,
    LineString = 1,
    LinearRing = 2,
    Polygon = 3,
    MultiPoint = 4,
    MultiLineString = 5,
    MultiPolygon = 6,
    GeometryCollection = 7,
}

impl GeometryType {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            GeometryType::Point => "Point",
            GeometryType::LineString => "LineString",
            GeometryType::LinearRing => "LinearRing",
            GeometryType::Polygon => "Polygon",
            GeometryType::MultiPoint => "MultiPoint",
            GeometryType::MultiLineString => "MultiLineString",
            GeometryType::MultiPolygon => "MultiPolygon",
            GeometryType::GeometryCollection => "GeometryCollection",
        }
    }

    /// Family for the supported types, `None` for everything else.
    pub fn family(self) -> Option<GeometryFamily> {
        match self {
            GeometryType::Point => Some(GeometryFamily::Point),
            GeometryType::Polygon | GeometryType::MultiPolygon => Some(GeometryFamily::Polygonal),
            _ => None,
        }
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for GeometryType {
    type Error = SpatialDataError;

    fn try_from(tag: u8) -> Result<Self> {
        Ok(match tag {
            0 => GeometryType::Point,
            1 => GeometryType::LineString,
            2 => GeometryType::LinearRing,
            3 => GeometryType::Polygon,
            4 => GeometryType::MultiPoint,
            5 => GeometryType::MultiLineString,
            6 => GeometryType::MultiPolygon,
            7 => GeometryType::GeometryCollection,
            other => {
                return Err(SpatialDataError::UnsupportedInput(format!(
                    "unknown geometry type tag {other}"
                )))
            }
        })
    }
}

/// Point shapes and polygonal shapes never mix in one element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GeometryFamily {
    Point,
    Polygonal,
}

/// Rebuilds geometries from flat coordinates plus offset arrays.
///
/// - `Point`: no offsets, one geometry per coordinate.
/// - `Polygon`: `[ring_offsets, polygon_offsets]`.
/// - `MultiPolygon`: `[ring_offsets, polygon_offsets, multipolygon_offsets]`.
///
/// Each offset array indexes into the level below it (rings into
/// coordinates, polygons into rings, ...).
pub fn from_ragged_array(
    geometry_type: GeometryType,
    coords: &[Coord],
    offsets: &[Vec<usize>],
) -> Result<Vec<Geometry>> {
    let expected = match geometry_type {
        GeometryType::Point => 0,
        GeometryType::Polygon => 2,
        GeometryType::MultiPolygon => 3,
        other => {
            return Err(SpatialDataError::UnsupportedInput(format!(
                "geometry type {other} is not supported for shapes; use Point, Polygon or MultiPolygon"
            )))
        }
    };
    if offsets.len() != expected {
        return Err(SpatialDataError::ShapeMismatch(format!(
            "{geometry_type} needs {expected} offset arrays, got {}",
            offsets.len()
        )));
    }

    if geometry_type == GeometryType::Point {
        return Ok(coords.iter().map(|c| Geometry::Point(*c)).collect());
    }

    let rings: Vec<Vec<Coord>> = split(&offsets[0], coords, "ring")?
        .into_iter()
        .map(<[Coord]>::to_vec)
        .collect();
    let polygons: Vec<Polygon> = split(&offsets[1], &rings, "polygon")?
        .into_iter()
        .map(|rings| {
            let (exterior, interiors) = rings.split_first().ok_or_else(|| {
                SpatialDataError::ShapeMismatch("polygon without an exterior ring".into())
            })?;
            Ok(Polygon {
                exterior: exterior.clone(),
                interiors: interiors.to_vec(),
            })
        })
        .collect::<Result<_>>()?;

    if geometry_type == GeometryType::Polygon {
        return Ok(polygons.into_iter().map(Geometry::Polygon).collect());
    }
    Ok(split(&offsets[2], &polygons, "multipolygon")?
        .into_iter()
        .map(|parts| Geometry::MultiPolygon(parts.to_vec()))
        .collect())
}

fn split<'a, T>(offsets: &[usize], items: &'a [T], level: &str) -> Result<Vec<&'a [T]>> {
    if offsets.first().is_some_and(|o| *o != 0) {
        return Err(SpatialDataError::ShapeMismatch(format!(
            "{level} offsets must start at 0"
        )));
    }
    if offsets.last().is_some_and(|o| *o != items.len()) {
        return Err(SpatialDataError::ShapeMismatch(format!(
            "{level} offsets must end at {}",
            items.len()
        )));
    }
    offsets
        .windows(2)
        .map(|w| {
            if w[0] > w[1] {
                Err(SpatialDataError::ShapeMismatch(format!(
                    "{level} offsets must be non-decreasing"
                )))
            } else {
                Ok(&items[w[0]..w[1]])
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64) -> Vec<Coord> {
        vec![[x0, 0.0], [x0 + 1.0, 0.0], [x0 + 1.0, 1.0], [x0, 1.0], [x0, 0.0]]
    }

    #[test]
    fn test_points_from_ragged() {
        let g = from_ragged_array(GeometryType::Point, &[[1.0, 2.0], [3.0, 4.0]], &[]).unwrap();
        assert_eq!(g, vec![Geometry::Point([1.0, 2.0]), Geometry::Point([3.0, 4.0])]);
    }

    #[test]
    fn test_polygons_with_hole() {
        let mut coords = square(0.0);
        coords.extend(square(10.0));
        coords.extend(square(20.0));
        // polygon 0: one ring; polygon 1: exterior + hole
        let g = from_ragged_array(
            GeometryType::Polygon,
            &coords,
            &[vec![0, 5, 10, 15], vec![0, 1, 3]],
        )
        .unwrap();
        assert_eq!(g.len(), 2);
        let Geometry::Polygon(p) = &g[1] else {
            panic!("expected polygon");
        };
        assert_eq!(p.exterior, square(10.0));
        assert_eq!(p.interiors, vec![square(20.0)]);
    }

    #[test]
    fn test_multipolygons() {
        let mut coords = square(0.0);
        coords.extend(square(5.0));
        let g = from_ragged_array(
            GeometryType::MultiPolygon,
            &coords,
            &[vec![0, 5, 10], vec![0, 1, 2], vec![0, 2]],
        )
        .unwrap();
        assert_eq!(g.len(), 1);
        assert_eq!(g[0].geometry_type().tag(), 6);
        assert_eq!(g[0].coords().len(), 10);
    }

    #[test]
    fn test_bad_offsets() {
        let coords = square(0.0);
        assert!(from_ragged_array(GeometryType::Polygon, &coords, &[vec![0, 5]]).is_err());
        assert!(from_ragged_array(GeometryType::Polygon, &coords, &[vec![0, 4], vec![0, 1]]).is_err());
        assert!(from_ragged_array(GeometryType::Polygon, &coords, &[vec![0, 5], vec![0, 0, 1]]).is_err());
    }

    #[test]
    fn test_unsupported_types() {
        assert!(from_ragged_array(GeometryType::LineString, &[], &[vec![0]]).is_err());
        assert_eq!(GeometryType::try_from(3).unwrap(), GeometryType::Polygon);
        assert!(GeometryType::try_from(9).is_err());
        assert_eq!(GeometryType::MultiPoint.family(), None);
    }

    #[test]
    fn test_serde_form() {
        let json = serde_json::to_string(&Geometry::Point([1.0, 2.0])).unwrap();
        assert_eq!(json, r#"{"type":"Point","coordinates":[1.0,2.0]}"#);
    }
}
