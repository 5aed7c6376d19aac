//! N-dimensional array storage for raster elements.
//!
//! [`DenseArray`] is what callers hand in; [`ChunkedArray`] is the
//! normalized storage every parsed raster holds. Chunked arrays share
//! their values behind an `Arc`, so cloning an element never copies
//! pixel data.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{Result, SpatialDataError};
use crate::transform::Transformations;

/// A dense, row-major array of `f64` values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawArray")]
pub struct DenseArray {
    shape: Vec<usize>,
    values: Vec<f64>,
}

#[derive(Deserialize)]
struct RawArray {
    shape: Vec<usize>,
    values: Vec<f64>,
}

impl TryFrom<RawArray> for DenseArray {
    type Error = SpatialDataError;

    fn try_from(raw: RawArray) -> Result<Self> {
        DenseArray::new(raw.shape, raw.values)
    }
}

impl DenseArray {
    /// Creates an array, checking that `values` fills `shape` exactly.
    pub fn new(shape: Vec<usize>, values: Vec<f64>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != values.len() {
            return Err(SpatialDataError::ShapeMismatch(format!(
                "shape {shape:?} holds {expected} values, got {}",
                values.len()
            )));
        }
        Ok(Self { shape, values })
    }

    pub fn zeros(shape: &[usize]) -> Self {
        Self {
            shape: shape.to_vec(),
            values: vec![0.0; shape.iter().product()],
        }
    }

    /// Builds an array by evaluating `f` at every multi-index.
    pub fn from_fn(shape: &[usize], mut f: impl FnMut(&[usize]) -> f64) -> Self {
        let len: usize = shape.iter().product();
        let values = (0..len).map(|flat| f(&unravel(flat, shape))).collect();
        Self {
            shape: shape.to_vec(),
            values,
        }
    }

    /// Builds a 2D array from rows of equal length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let ncols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != ncols) {
            return Err(SpatialDataError::ShapeMismatch(
                "rows have different lengths".into(),
            ));
        }
        Ok(Self {
            shape: vec![rows.len(), ncols],
            values: rows.iter().flatten().copied().collect(),
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Row `i` of a 2D array.
    pub fn row(&self, i: usize) -> &[f64] {
        let ncols = self.shape.get(1).copied().unwrap_or(1);
        &self.values[i * ncols..(i + 1) * ncols]
    }
}

/// Chunked array storage.
///
/// Chunks are a per-dimension block size; they never exceed the
/// dimension (a zero-length dimension keeps a chunk of 1).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawChunked")]
pub struct ChunkedArray {
    shape: Vec<usize>,
    chunks: Vec<usize>,
    values: Arc<[f64]>,
}

#[derive(Deserialize)]
struct RawChunked {
    shape: Vec<usize>,
    chunks: Vec<usize>,
    values: Vec<f64>,
}

impl TryFrom<RawChunked> for ChunkedArray {
    type Error = SpatialDataError;

    fn try_from(raw: RawChunked) -> Result<Self> {
        ChunkedArray::from_dense(DenseArray::new(raw.shape, raw.values)?, Some(&raw.chunks))
    }
}

impl ChunkedArray {
    /// Wraps a dense array. Without `chunks` the whole array is one chunk.
    pub fn from_dense(dense: DenseArray, chunks: Option<&[usize]>) -> Result<Self> {
        let chunks = normalize_chunks(&dense.shape, chunks)?;
        Ok(Self {
            shape: dense.shape,
            chunks,
            values: dense.values.into(),
        })
    }

    /// Same values, new chunking.
    pub fn rechunk(&self, chunks: &[usize]) -> Result<Self> {
        Ok(Self {
            shape: self.shape.clone(),
            chunks: normalize_chunks(&self.shape, Some(chunks))?,
            values: Arc::clone(&self.values),
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn chunks(&self) -> &[usize] {
        &self.chunks
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of chunks the array is split into.
    pub fn n_chunks(&self) -> usize {
        self.shape
            .iter()
            .zip(&self.chunks)
            .map(|(n, c)| n.div_ceil(*c).max(1))
            .product()
    }

    /// Value at a multi-index.
    pub fn get(&self, index: &[usize]) -> Option<f64> {
        if index.len() != self.ndim() || index.iter().zip(&self.shape).any(|(i, n)| i >= n) {
            return None;
        }
        let flat: usize = index
            .iter()
            .zip(strides(&self.shape))
            .map(|(i, s)| i * s)
            .sum();
        self.values.get(flat).copied()
    }

    /// Reorders dimensions: output dimension `k` is input dimension `perm[k]`.
    pub fn transpose(&self, perm: &[usize]) -> Result<Self> {
        let ndim = self.ndim();
        let mut seen = vec![false; ndim];
        for &p in perm {
            if p >= ndim || std::mem::replace(&mut seen[p], true) {
                return Err(SpatialDataError::ShapeMismatch(format!(
                    "{perm:?} is not a permutation of the {ndim} dimensions"
                )));
            }
        }
        if perm.len() != ndim {
            return Err(SpatialDataError::ShapeMismatch(format!(
                "{perm:?} is not a permutation of the {ndim} dimensions"
            )));
        }
        let in_strides = strides(&self.shape);
        let out_shape: Vec<usize> = perm.iter().map(|&p| self.shape[p]).collect();
        let len = self.values.len();
        let values: Vec<f64> = (0..len)
            .map(|flat| {
                let out_idx = unravel(flat, &out_shape);
                let src: usize = out_idx
                    .iter()
                    .zip(perm)
                    .map(|(i, &p)| i * in_strides[p])
                    .sum();
                self.values[src]
            })
            .collect();
        let chunks: Vec<usize> = perm.iter().map(|&p| self.chunks[p]).collect();
        Ok(Self {
            shape: out_shape,
            chunks,
            values: values.into(),
        })
    }

    /// Minimum and maximum value, `None` for an empty array.
    pub fn min_max(&self) -> Option<(f64, f64)> {
        self.values.iter().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            None
        } else {
            Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
        }
    }

    /// Copies the values out into a dense array.
    pub fn to_dense(&self) -> DenseArray {
        DenseArray {
            shape: self.shape.clone(),
            values: self.values.to_vec(),
        }
    }

    /// True if both arrays share the same value buffer.
    pub fn shares_values_with(&self, other: &ChunkedArray) -> bool {
        Arc::ptr_eq(&self.values, &other.values)
    }
}

fn normalize_chunks(shape: &[usize], chunks: Option<&[usize]>) -> Result<Vec<usize>> {
    match chunks {
        None => Ok(shape.iter().map(|n| (*n).max(1)).collect()),
        Some(c) => {
            if c.len() != shape.len() {
                return Err(SpatialDataError::ShapeMismatch(format!(
                    "chunks {c:?} do not match the {} dimensions of the array",
                    shape.len()
                )));
            }
            if c.contains(&0) {
                return Err(SpatialDataError::ShapeMismatch(
                    "chunk sizes must be positive".into(),
                ));
            }
            Ok(c.iter().zip(shape).map(|(c, n)| (*c).min((*n).max(1))).collect())
        }
    }
}

/// Row-major strides of a shape.
pub(crate) fn strides(shape: &[usize]) -> Vec<usize> {
    let mut out = vec![1; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        out[i] = out[i + 1] * shape[i + 1];
    }
    out
}

/// Converts a flat row-major offset into a multi-index.
pub(crate) fn unravel(mut flat: usize, shape: &[usize]) -> Vec<usize> {
    let mut idx = vec![0; shape.len()];
    for i in (0..shape.len()).rev() {
        let n = shape[i].max(1);
        idx[i] = flat % n;
        flat /= n;
    }
    idx
}

/// Storage of a labeled array: raw or already chunked.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrayData {
    Dense(DenseArray),
    Chunked(ChunkedArray),
}

impl ArrayData {
    pub fn shape(&self) -> &[usize] {
        match self {
            ArrayData::Dense(a) => a.shape(),
            ArrayData::Chunked(a) => a.shape(),
        }
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Normalizes to chunked storage; already-chunked data keeps its chunks.
    pub fn into_chunked(self) -> Result<ChunkedArray> {
        match self {
            ArrayData::Dense(a) => ChunkedArray::from_dense(a, None),
            ArrayData::Chunked(a) => Ok(a),
        }
    }
}

impl From<DenseArray> for ArrayData {
    fn from(a: DenseArray) -> Self {
        ArrayData::Dense(a)
    }
}

impl From<ChunkedArray> for ArrayData {
    fn from(a: ChunkedArray) -> Self {
        ArrayData::Chunked(a)
    }
}

/// An array whose dimensions carry names, possibly with transformation
/// metadata already attached.
#[derive(Clone, Debug, PartialEq)]
pub struct LabeledArray {
    pub dims: Vec<String>,
    pub data: ArrayData,
    pub transformations: Transformations,
}

impl LabeledArray {
    pub fn new(data: impl Into<ArrayData>, dims: &[&str]) -> Self {
        Self {
            dims: dims.iter().map(|d| d.to_string()).collect(),
            data: data.into(),
            transformations: Transformations::new(),
        }
    }

    pub fn with_transformations(mut self, transformations: Transformations) -> Self {
        self.transformations = transformations;
        self
    }
}
