//! Multiscale pyramid construction.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::array::{strides, unravel, ChunkedArray, DenseArray};
use super::raster::{MultiscaleRaster, RasterImage, ScaleLevel, LEVEL_VARIABLE};
use super::Axis;
use crate::error::{Result, SpatialDataError};
use crate::transform::Transformations;

/// Downsampling factor of one pyramid level relative to the previous one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScaleFactor {
    /// Same factor along every spatial axis; channels are never reduced.
    Uniform(usize),
    /// Factor per axis; unlisted axes keep factor 1.
    PerAxis(BTreeMap<Axis, usize>),
}

impl ScaleFactor {
    fn for_axis(&self, axis: Axis) -> usize {
        match self {
            ScaleFactor::Uniform(f) if axis.is_spatial() => *f,
            ScaleFactor::Uniform(_) => 1,
            ScaleFactor::PerAxis(map) => map.get(&axis).copied().unwrap_or(1),
        }
    }
}

impl From<usize> for ScaleFactor {
    fn from(f: usize) -> Self {
        ScaleFactor::Uniform(f)
    }
}

/// How a block of values is reduced to one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownsampleMethod {
    /// Block mean, trimming incomplete edge blocks.
    #[default]
    Coarsen,
    /// First value of each block (suitable for label masks).
    Nearest,
}

/// Builds a multiscale pyramid from a single-scale raster.
pub trait PyramidBuilder {
    /// The returned pyramid has no transformations attached.
    fn build(
        &self,
        base: &RasterImage,
        scale_factors: &[ScaleFactor],
        method: DownsampleMethod,
        chunks: Option<&[usize]>,
    ) -> Result<MultiscaleRaster>;
}

/// Default in-memory pyramid builder.
#[derive(Clone, Copy, Debug, Default)]
pub struct Downsampler;

impl PyramidBuilder for Downsampler {
    fn build(
        &self,
        base: &RasterImage,
        scale_factors: &[ScaleFactor],
        method: DownsampleMethod,
        chunks: Option<&[usize]>,
    ) -> Result<MultiscaleRaster> {
        let axes = base.axes()?;
        let first = match chunks {
            Some(c) => base.data.rechunk(c)?,
            None => base.data.clone(),
        };
        let mut levels = vec![ScaleLevel {
            key: "scale0".to_string(),
            variable: LEVEL_VARIABLE.to_string(),
            dims: base.dims.clone(),
            data: first,
        }];

        for (i, factor) in scale_factors.iter().enumerate() {
            let factors: Vec<usize> = axes.iter().map(|a| factor.for_axis(*a)).collect();
            let previous = &levels[levels.len() - 1].data;
            let data = downsample(previous, &factors, method)?;
            let data = data.rechunk(previous.chunks())?;
            log::debug!(
                "built pyramid level scale{} with shape {:?}",
                i + 1,
                data.shape()
            );
            levels.push(ScaleLevel {
                key: format!("scale{}", i + 1),
                variable: LEVEL_VARIABLE.to_string(),
                dims: base.dims.clone(),
                data,
            });
        }

        Ok(MultiscaleRaster {
            levels,
            transformations: Transformations::new(),
        })
    }
}

/// Reduces every `factors`-shaped block of `array` to one value.
pub fn downsample(
    array: &ChunkedArray,
    factors: &[usize],
    method: DownsampleMethod,
) -> Result<ChunkedArray> {
    let shape = array.shape();
    if factors.len() != shape.len() {
        return Err(SpatialDataError::ShapeMismatch(format!(
            "{} scale factors for an array with {} dimensions",
            factors.len(),
            shape.len()
        )));
    }
    for (n, f) in shape.iter().zip(factors) {
        if *f == 0 {
            return Err(SpatialDataError::ShapeMismatch(
                "scale factors must be positive".into(),
            ));
        }
        if f > n {
            return Err(SpatialDataError::ShapeMismatch(format!(
                "cannot downsample a dimension of size {n} by a factor of {f}"
            )));
        }
    }

    let out_shape: Vec<usize> = shape.iter().zip(factors).map(|(n, f)| n / f).collect();
    let in_strides = strides(shape);
    let block_len: usize = factors.iter().product();
    let values = array.values();

    let out = DenseArray::from_fn(&out_shape, |idx| {
        let origin: usize = idx
            .iter()
            .zip(factors)
            .zip(&in_strides)
            .map(|((i, f), s)| i * f * s)
            .sum();
        match method {
            DownsampleMethod::Nearest => values[origin],
            DownsampleMethod::Coarsen => {
                let sum: f64 = (0..block_len)
                    .map(|b| {
                        let offset: usize = unravel(b, factors)
                            .iter()
                            .zip(&in_strides)
                            .map(|(o, s)| o * s)
                            .sum();
                        values[origin + offset]
                    })
                    .sum();
                sum / block_len as f64
            }
        }
    });
    ChunkedArray::from_dense(out, None)
}
