//! Element schemas for spatial datasets.
//!
//! This module defines the element kinds a [`SpatialData`] container
//! holds and the parsers that turn raw inputs into them:
//!
//! - rasters ([`RasterModel`]): 2D/3D images and label masks, optionally
//!   as multiscale pyramids
//! - [`Shapes`]: circles, polygons and multipolygons
//! - [`Points`]: coordinate columns with annotations
//! - [`Table`]: an annotation matrix linked to elements by region
//!
//! # Design Principles
//!
//! 1. **One entry point per input shape**: every parser takes a concrete
//!    input type; there is no runtime type dispatch.
//!
//! 2. **Attach, then validate**: every parser resolves the element's
//!    transformations first and finishes with the schema's `validate`, so
//!    an element returned by a parser always satisfies its schema.
//!
//! 3. **Typed metadata**: transformations, points keys and table linkage
//!    are plain structs, serialized with the element.
//!
//! # Example
//!
//! ```
//! use spatialdata::model::{DenseArray, RasterModel, RasterParseOptions};
//!
//! let image = RasterModel::Image2D
//!     .parse_array(
//!         DenseArray::zeros(&[64, 64, 3]),
//!         RasterParseOptions::new().with_dims(&["y", "x", "c"]),
//!     )
//!     .unwrap();
//! assert_eq!(image.dims(), &["c", "y", "x"]);
//! ```
//!
//! [`SpatialData`]: crate::dataset::SpatialData

mod array;
mod axes;
mod element;
mod frame;
mod geometry;
pub mod io_geojson;
mod points;
pub mod pyramid;
mod raster;
mod shapes;
mod table;

pub use array::{ArrayData, ChunkedArray, DenseArray, LabeledArray};
pub use axes::{axis_labels, Axis};
pub use element::{get_schema, ElementKind, Schema, SpatialElement};
pub use frame::{Categorical, Column, DataFrame};
pub use geometry::{from_ragged_array, Coord, Geometry, GeometryFamily, GeometryType, Polygon};
pub use points::{Points, PointsAttrs, PointsModel, PointsParseOptions};
pub use pyramid::{DownsampleMethod, Downsampler, PyramidBuilder, ScaleFactor};
pub use raster::{
    MultiscaleRaster, RasterElement, RasterImage, RasterModel, RasterParseOptions, ScaleLevel,
    LEVEL_VARIABLE,
};
pub use shapes::{Shapes, ShapesModel, ShapesParseOptions};
pub use table::{NameSpec, Table, TableAttrs, TableLinkage, TableModel};
