//! Raster schemas: 2D/3D images and label masks, single-scale or
//! multiscale.
//!
//! Each [`RasterModel`] owns a canonical dimension order. Parsing accepts
//! any permutation of it and transposes into canonical order; any other
//! dimension set is rejected.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::array::{ArrayData, ChunkedArray, LabeledArray};
use super::axes::axis_labels;
use super::pyramid::{DownsampleMethod, Downsampler, PyramidBuilder, ScaleFactor};
use super::Axis;
use crate::error::{Result, SpatialDataError};
use crate::transform::{parse_transformations, HasTransformations, Transformation, Transformations};

/// Name of the single data variable every pyramid level exposes.
pub const LEVEL_VARIABLE: &str = "image";

/// A single-scale raster element.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RasterImage {
    pub dims: Vec<String>,
    pub data: ChunkedArray,
    #[serde(default)]
    pub transformations: Transformations,
}

impl RasterImage {
    /// Parsed axes of this raster.
    pub fn axes(&self) -> Result<Vec<Axis>> {
        self.dims.iter().map(|d| d.parse()).collect()
    }
}

impl From<RasterImage> for LabeledArray {
    fn from(image: RasterImage) -> Self {
        LabeledArray {
            dims: image.dims,
            data: ArrayData::Chunked(image.data),
            transformations: image.transformations,
        }
    }
}

/// One level of a multiscale raster.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScaleLevel {
    /// `scale0`, `scale1`, ...
    pub key: String,
    /// Name of the level's data variable.
    pub variable: String,
    pub dims: Vec<String>,
    pub data: ChunkedArray,
}

/// A multiscale pyramid; level 0 has full resolution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MultiscaleRaster {
    pub levels: Vec<ScaleLevel>,
    #[serde(default)]
    pub transformations: Transformations,
}

impl MultiscaleRaster {
    /// Scale taking level `i` pixel coordinates to level 0 pixel coordinates.
    pub fn level_transformation(&self, i: usize) -> Result<Transformation> {
        let base = self.levels.first().ok_or_else(|| {
            SpatialDataError::InvalidMultiscale("pyramid has no levels".into())
        })?;
        let level = self.levels.get(i).ok_or_else(|| {
            SpatialDataError::InvalidMultiscale(format!(
                "level {i} out of range ({} levels)",
                self.levels.len()
            ))
        })?;
        let mut axes = Vec::new();
        let mut factors = Vec::new();
        for (d, (n0, ni)) in base
            .dims
            .iter()
            .zip(base.data.shape().iter().zip(level.data.shape()))
        {
            let axis: Axis = d.parse()?;
            if axis.is_spatial() && *ni > 0 {
                axes.push(axis);
                factors.push(*n0 as f64 / *ni as f64);
            }
        }
        Transformation::scale(factors, axes)
    }
}

/// A raster element: one array or a pyramid of them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RasterElement {
    Single(RasterImage),
    Multiscale(MultiscaleRaster),
}

impl RasterElement {
    /// Dimension labels (of level 0 for pyramids).
    pub fn dims(&self) -> &[String] {
        match self {
            RasterElement::Single(image) => &image.dims,
            RasterElement::Multiscale(ms) => ms.levels.first().map_or(&[][..], |l| l.dims.as_slice()),
        }
    }

    /// Full-resolution shape.
    pub fn shape(&self) -> &[usize] {
        match self {
            RasterElement::Single(image) => image.data.shape(),
            RasterElement::Multiscale(ms) => ms.levels.first().map_or(&[][..], |l| l.data.shape()),
        }
    }

    pub fn n_scales(&self) -> usize {
        match self {
            RasterElement::Single(_) => 1,
            RasterElement::Multiscale(ms) => ms.levels.len(),
        }
    }

    /// The model matching this raster's dimension set, if any.
    pub fn model(&self) -> Option<RasterModel> {
        let axes: Vec<Axis> = self.dims().iter().filter_map(|d| d.parse().ok()).collect();
        RasterModel::from_axes(&axes)
    }

    pub fn is_multiscale(&self) -> bool {
        matches!(self, RasterElement::Multiscale(_))
    }
}

fn parsed_axes(dims: &[String]) -> Vec<Axis> {
    dims.iter().filter_map(|d| d.parse().ok()).collect()
}

impl HasTransformations for RasterImage {
    fn transformations(&self) -> &Transformations {
        &self.transformations
    }

    fn transformations_mut(&mut self) -> &mut Transformations {
        &mut self.transformations
    }

    fn element_axes(&self) -> Vec<Axis> {
        parsed_axes(&self.dims)
    }
}

impl HasTransformations for MultiscaleRaster {
    fn transformations(&self) -> &Transformations {
        &self.transformations
    }

    fn transformations_mut(&mut self) -> &mut Transformations {
        &mut self.transformations
    }

    fn element_axes(&self) -> Vec<Axis> {
        self.levels
            .first()
            .map(|l| parsed_axes(&l.dims))
            .unwrap_or_default()
    }
}

impl HasTransformations for RasterElement {
    fn transformations(&self) -> &Transformations {
        match self {
            RasterElement::Single(e) => e.transformations(),
            RasterElement::Multiscale(e) => e.transformations(),
        }
    }

    fn transformations_mut(&mut self) -> &mut Transformations {
        match self {
            RasterElement::Single(e) => e.transformations_mut(),
            RasterElement::Multiscale(e) => e.transformations_mut(),
        }
    }

    fn element_axes(&self) -> Vec<Axis> {
        match self {
            RasterElement::Single(e) => e.element_axes(),
            RasterElement::Multiscale(e) => e.element_axes(),
        }
    }
}

/// Options for the raster parse entry points.
#[derive(Clone, Debug, Default)]
pub struct RasterParseOptions {
    /// Order of the input dimensions.
    pub dims: Option<Vec<String>>,
    pub transformations: Option<Transformations>,
    /// Builds a pyramid when set.
    pub scale_factors: Option<Vec<ScaleFactor>>,
    pub method: Option<DownsampleMethod>,
    pub chunks: Option<Vec<usize>>,
    /// Reserved: rasters are unnamed, supplying a name is an error.
    pub name: Option<String>,
}

impl RasterParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dims(mut self, dims: &[&str]) -> Self {
        self.dims = Some(dims.iter().map(|d| d.to_string()).collect());
        self
    }

    pub fn with_transformations(mut self, transformations: Transformations) -> Self {
        self.transformations = Some(transformations);
        self
    }

    /// An empty list leaves the raster single-scale.
    pub fn with_scale_factors(mut self, factors: impl IntoIterator<Item = ScaleFactor>) -> Self {
        let factors: Vec<ScaleFactor> = factors.into_iter().collect();
        self.scale_factors = (!factors.is_empty()).then_some(factors);
        self
    }

    pub fn with_method(mut self, method: DownsampleMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn with_chunks(mut self, chunks: &[usize]) -> Self {
        self.chunks = Some(chunks.to_vec());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// The four raster schemas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RasterModel {
    Labels2D,
    Labels3D,
    Image2D,
    Image3D,
}

impl RasterModel {
    pub const ALL: [RasterModel; 4] = [
        RasterModel::Labels2D,
        RasterModel::Labels3D,
        RasterModel::Image2D,
        RasterModel::Image3D,
    ];

    /// Canonical dimension order.
    pub fn dims(self) -> &'static [Axis] {
        match self {
            RasterModel::Labels2D => &[Axis::Y, Axis::X],
            RasterModel::Labels3D => &[Axis::Z, Axis::Y, Axis::X],
            RasterModel::Image2D => &[Axis::C, Axis::Y, Axis::X],
            RasterModel::Image3D => &[Axis::C, Axis::Z, Axis::Y, Axis::X],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RasterModel::Labels2D => "Labels2D",
            RasterModel::Labels3D => "Labels3D",
            RasterModel::Image2D => "Image2D",
            RasterModel::Image3D => "Image3D",
        }
    }

    pub fn is_labels(self) -> bool {
        matches!(self, RasterModel::Labels2D | RasterModel::Labels3D)
    }

    /// Picks the model whose dimension set equals `axes`.
    pub fn from_axes(axes: &[Axis]) -> Option<RasterModel> {
        let set: BTreeSet<Axis> = axes.iter().copied().collect();
        if set.len() != axes.len() {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|m| m.dims().iter().copied().collect::<BTreeSet<_>>() == set)
    }

    fn canonical_labels(self) -> Vec<String> {
        axis_labels(self.dims())
    }

    fn is_permutation(self, dims: &[String]) -> bool {
        let canonical = self.canonical_labels();
        let given: BTreeSet<&String> = dims.iter().collect();
        given.len() == dims.len() && given == canonical.iter().collect()
    }

    fn wrong_dims(self, dims: &[String]) -> SpatialDataError {
        SpatialDataError::WrongDims {
            found: dims.to_vec(),
            expected: self.canonical_labels(),
        }
    }

    /// Parses an unlabeled array; `options.dims` gives its dimension order
    /// (canonical order when omitted).
    pub fn parse_array(
        self,
        data: impl Into<ArrayData>,
        options: RasterParseOptions,
    ) -> Result<RasterElement> {
        self.parse_array_with(data, options, &Downsampler)
    }

    pub fn parse_array_with<B: PyramidBuilder + ?Sized>(
        self,
        data: impl Into<ArrayData>,
        options: RasterParseOptions,
        builder: &B,
    ) -> Result<RasterElement> {
        reject_name(&options)?;
        let dims = match &options.dims {
            Some(dims) => {
                if !self.is_permutation(dims) {
                    return Err(self.wrong_dims(dims));
                }
                dims.clone()
            }
            None => {
                let dims = self.canonical_labels();
                log::info!("no axes information specified in the object, setting `dims` to: {dims:?}");
                dims
            }
        };
        self.finish(data.into(), dims, Transformations::new(), options, builder)
    }

    /// Parses a labeled array. `options.dims`, if given, must name the same
    /// dimensions as the array.
    pub fn parse_labeled(
        self,
        data: LabeledArray,
        options: RasterParseOptions,
    ) -> Result<RasterElement> {
        self.parse_labeled_with(data, options, &Downsampler)
    }

    pub fn parse_labeled_with<B: PyramidBuilder + ?Sized>(
        self,
        data: LabeledArray,
        options: RasterParseOptions,
        builder: &B,
    ) -> Result<RasterElement> {
        reject_name(&options)?;
        if let Some(dims) = &options.dims {
            if !self.is_permutation(dims) {
                return Err(self.wrong_dims(dims));
            }
            let given: BTreeSet<&String> = dims.iter().collect();
            if given != data.dims.iter().collect() {
                return Err(SpatialDataError::AmbiguousSpecification(format!(
                    "`dims` {dims:?} does not match the dims of the data {:?}; specify the dims only once",
                    data.dims
                )));
            }
            log::info!("`dims` is specified redundantly: found also inside `data`");
        }
        if !self.is_permutation(&data.dims) {
            return Err(self.wrong_dims(&data.dims));
        }
        self.finish(data.data, data.dims, data.transformations, options, builder)
    }

    /// Re-parses an already-parsed single-scale raster.
    pub fn parse_image(
        self,
        image: RasterImage,
        options: RasterParseOptions,
    ) -> Result<RasterElement> {
        self.parse_labeled(image.into(), options)
    }

    /// Attaches transformations to an already-built pyramid and validates it.
    pub fn parse_multiscale(
        self,
        mut data: MultiscaleRaster,
        transformations: Option<Transformations>,
    ) -> Result<RasterElement> {
        self.validate_levels(&data)?;
        parse_transformations(&mut data, transformations)?;
        let element = RasterElement::Multiscale(data);
        self.validate(&element)?;
        Ok(element)
    }

    fn finish<B: PyramidBuilder + ?Sized>(
        self,
        data: ArrayData,
        dims: Vec<String>,
        transformations: Transformations,
        options: RasterParseOptions,
        builder: &B,
    ) -> Result<RasterElement> {
        let canonical = self.canonical_labels();
        if data.ndim() != dims.len() {
            return Err(SpatialDataError::ShapeMismatch(format!(
                "cannot transpose array of shape {:?} to match `dims`: {dims:?}; try to reshape `data` or `dims`",
                data.shape()
            )));
        }

        let mut array = data.into_chunked()?;
        if dims != canonical {
            let perm: Vec<usize> = canonical
                .iter()
                .map(|c| dims.iter().position(|d| d == c).unwrap_or_default())
                .collect();
            array = array.transpose(&perm).map_err(|_| {
                SpatialDataError::ShapeMismatch(format!(
                    "cannot transpose arrays to match `dims`: {dims:?}"
                ))
            })?;
            log::info!("transposing `data` from {dims:?} to {canonical:?}");
        }
        if let Some(chunks) = &options.chunks {
            array = array.rechunk(chunks)?;
        }

        let mut image = RasterImage {
            dims: canonical,
            data: array,
            transformations,
        };
        parse_transformations(&mut image, options.transformations)?;

        let element = match options.scale_factors {
            Some(factors) => {
                let parsed = std::mem::take(&mut image.transformations);
                let mut multiscale = builder.build(
                    &image,
                    &factors,
                    options.method.unwrap_or_default(),
                    options.chunks.as_deref(),
                )?;
                parse_transformations(&mut multiscale, Some(parsed))?;
                RasterElement::Multiscale(multiscale)
            }
            None => RasterElement::Single(image),
        };
        self.validate(&element)?;
        Ok(element)
    }

    /// Validates a raster element against this schema.
    pub fn validate(self, element: &RasterElement) -> Result<()> {
        match element {
            RasterElement::Single(image) => {
                self.validate_single(&image.dims, &image.data)?;
            }
            RasterElement::Multiscale(ms) => self.validate_levels(ms)?,
        }
        if element.transformations().is_empty() {
            return Err(SpatialDataError::invalid(
                "raster",
                "transformation metadata is missing",
            ));
        }
        element.transformations().check(&element.element_axes())
    }

    fn validate_single(self, dims: &[String], data: &ChunkedArray) -> Result<()> {
        if !self.is_permutation(dims) {
            return Err(self.wrong_dims(dims));
        }
        if data.ndim() != dims.len() {
            return Err(SpatialDataError::ShapeMismatch(format!(
                "array has {} dimensions but dims are {dims:?}",
                data.ndim()
            )));
        }
        Ok(())
    }

    fn validate_levels(self, ms: &MultiscaleRaster) -> Result<()> {
        if ms.levels.is_empty() {
            return Err(SpatialDataError::InvalidMultiscale(
                "pyramid has no levels".into(),
            ));
        }
        for (i, level) in ms.levels.iter().enumerate() {
            let expected = format!("scale{i}");
            if level.key != expected {
                return Err(SpatialDataError::InvalidMultiscale(format!(
                    "wrong key for multiscale data, found: `{}`, expected: `{expected}`",
                    level.key
                )));
            }
        }
        let names: BTreeSet<&str> = ms.levels.iter().map(|l| l.variable.as_str()).collect();
        if names.len() > 1 {
            return Err(SpatialDataError::InvalidMultiscale(format!(
                "levels disagree on the data variable name: {names:?}"
            )));
        }
        ms.levels
            .iter()
            .try_for_each(|l| self.validate_single(&l.dims, &l.data))
    }
}

fn reject_name(options: &RasterParseOptions) -> Result<()> {
    if options.name.is_some() {
        return Err(SpatialDataError::ReservedArgument("name"));
    }
    Ok(())
}
