//! Composable geometric transformations between coordinate systems.
//!
//! A [`Transformation`] maps an element's native coordinates into a named
//! coordinate system. Elements carry one transformation per coordinate
//! system in a [`Transformations`] mapping (see [`mapping`]).
//!
//! Every transformation has an action on a point set once an ordered list
//! of axes is fixed: [`Transformation::to_affine_matrix`] builds the
//! homogeneous matrix over those axes, and axes the transformation does
//! not mention are left untouched.

pub mod mapping;

pub use mapping::{
    get_transformation, parse_transformations, remove_transformation, set_transformation,
    HasTransformations, Transformations, DEFAULT_COORDINATE_SYSTEM,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{Result, SpatialDataError};
use crate::model::Axis;

/// A geometric transformation.
///
/// Constructors validate their arguments; the variants stay public so
/// deserialized values can be checked later with [`Transformation::validate`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Transformation {
    #[default]
    Identity,
    Scale {
        scale: Vec<f64>,
        axes: Vec<Axis>,
    },
    Translation {
        translation: Vec<f64>,
        axes: Vec<Axis>,
    },
    /// Homogeneous `(n+1) x (n+1)` matrix over `axes`.
    Affine {
        matrix: Vec<Vec<f64>>,
        axes: Vec<Axis>,
    },
    /// Applied in order: the first transformation acts first.
    Sequence {
        transformations: Vec<Transformation>,
    },
}

impl Transformation {
    /// Creates a scale along the given axes.
    pub fn scale(scale: impl Into<Vec<f64>>, axes: impl Into<Vec<Axis>>) -> Result<Self> {
        let t = Transformation::Scale {
            scale: scale.into(),
            axes: axes.into(),
        };
        t.validate()?;
        Ok(t)
    }

    /// Creates a translation along the given axes.
    pub fn translation(
        translation: impl Into<Vec<f64>>,
        axes: impl Into<Vec<Axis>>,
    ) -> Result<Self> {
        let t = Transformation::Translation {
            translation: translation.into(),
            axes: axes.into(),
        };
        t.validate()?;
        Ok(t)
    }

    /// Creates an affine transformation from a homogeneous matrix.
    pub fn affine(matrix: Vec<Vec<f64>>, axes: impl Into<Vec<Axis>>) -> Result<Self> {
        let t = Transformation::Affine {
            matrix,
            axes: axes.into(),
        };
        t.validate()?;
        Ok(t)
    }

    /// Creates a sequence applied first-to-last.
    pub fn sequence(transformations: Vec<Transformation>) -> Self {
        Transformation::Sequence { transformations }
    }

    /// Returns a transformation that applies `self` and then `next`.
    ///
    /// Nested sequences are flattened, so composition is associative.
    pub fn compose(self, next: Transformation) -> Transformation {
        let mut parts = self.into_parts();
        parts.extend(next.into_parts());
        Transformation::Sequence {
            transformations: parts,
        }
    }

    fn into_parts(self) -> Vec<Transformation> {
        match self {
            Transformation::Sequence { transformations } => transformations
                .into_iter()
                .flat_map(Transformation::into_parts)
                .collect(),
            other => vec![other],
        }
    }

    /// Checks internal consistency (lengths, duplicated axes, matrix shape).
    pub fn validate(&self) -> Result<()> {
        match self {
            Transformation::Identity => Ok(()),
            Transformation::Scale { scale, axes } => {
                check_vector("scale", scale, axes)?;
                if scale.iter().any(|s| *s == 0.0) {
                    return Err(SpatialDataError::InvalidTransformation(
                        "scale factors must be non-zero".into(),
                    ));
                }
                Ok(())
            }
            Transformation::Translation { translation, axes } => {
                check_vector("translation", translation, axes)
            }
            Transformation::Affine { matrix, axes } => {
                check_unique_axes(axes)?;
                let n = axes.len() + 1;
                if matrix.len() != n || matrix.iter().any(|row| row.len() != n) {
                    return Err(SpatialDataError::InvalidTransformation(format!(
                        "affine matrix over {} axes must be {n}x{n}",
                        axes.len()
                    )));
                }
                if matrix.iter().flatten().any(|v| !v.is_finite()) {
                    return Err(SpatialDataError::InvalidTransformation(
                        "affine matrix contains non-finite values".into(),
                    ));
                }
                let last = &matrix[n - 1];
                let homogeneous = last[..n - 1].iter().all(|v| *v == 0.0) && last[n - 1] == 1.0;
                if !homogeneous {
                    return Err(SpatialDataError::InvalidTransformation(
                        "last row of an affine matrix must be [0, ..., 0, 1]".into(),
                    ));
                }
                Ok(())
            }
            Transformation::Sequence { transformations } => {
                transformations.iter().try_for_each(Transformation::validate)
            }
        }
    }

    /// Returns every axis this transformation refers to.
    pub fn axes(&self) -> BTreeSet<Axis> {
        match self {
            Transformation::Identity => BTreeSet::new(),
            Transformation::Scale { axes, .. }
            | Transformation::Translation { axes, .. }
            | Transformation::Affine { axes, .. } => axes.iter().copied().collect(),
            Transformation::Sequence { transformations } => {
                transformations.iter().flat_map(|t| t.axes()).collect()
            }
        }
    }

    /// Fails unless every referenced axis is one of `dims`.
    pub fn check_axes(&self, dims: &[Axis]) -> Result<()> {
        let extra: Vec<String> = self
            .axes()
            .into_iter()
            .filter(|a| !dims.contains(a))
            .map(|a| a.to_string())
            .collect();
        if extra.is_empty() {
            Ok(())
        } else {
            Err(SpatialDataError::InvalidTransformation(format!(
                "axes {extra:?} are not dimensions of the element {:?}",
                crate::model::axis_labels(dims)
            )))
        }
    }

    /// Builds the homogeneous matrix of this transformation over `axes`.
    pub fn to_affine_matrix(&self, axes: &[Axis]) -> Result<Vec<Vec<f64>>> {
        self.check_axes(axes)?;
        let n = axes.len();
        let index = |a: &Axis| axes.iter().position(|b| b == a).unwrap_or_default();
        let mut m = identity_matrix(n + 1);
        match self {
            Transformation::Identity => {}
            Transformation::Scale { scale, axes: own } => {
                for (a, s) in own.iter().zip(scale) {
                    let i = index(a);
                    m[i][i] = *s;
                }
            }
            Transformation::Translation {
                translation,
                axes: own,
            } => {
                for (a, t) in own.iter().zip(translation) {
                    m[index(a)][n] = *t;
                }
            }
            Transformation::Affine { matrix, axes: own } => {
                let k = own.len();
                for (r, ar) in own.iter().enumerate() {
                    let i = index(ar);
                    for (c, ac) in own.iter().enumerate() {
                        m[i][index(ac)] = matrix[r][c];
                    }
                    m[i][n] = matrix[r][k];
                }
            }
            Transformation::Sequence { transformations } => {
                for t in transformations {
                    m = matmul(&t.to_affine_matrix(axes)?, &m);
                }
            }
        }
        Ok(m)
    }

    /// Applies the transformation to points whose coordinates follow `axes`.
    pub fn transform_points(&self, points: &[Vec<f64>], axes: &[Axis]) -> Result<Vec<Vec<f64>>> {
        let m = self.to_affine_matrix(axes)?;
        let n = axes.len();
        points
            .iter()
            .map(|p| {
                if p.len() != n {
                    return Err(SpatialDataError::ShapeMismatch(format!(
                        "point has {} coordinates but {n} axes were given",
                        p.len()
                    )));
                }
                Ok((0..n)
                    .map(|i| (0..n).map(|j| m[i][j] * p[j]).sum::<f64>() + m[i][n])
                    .collect())
            })
            .collect()
    }

    /// Returns the inverse transformation.
    pub fn inverse(&self) -> Result<Transformation> {
        match self {
            Transformation::Identity => Ok(Transformation::Identity),
            Transformation::Scale { scale, axes } => Transformation::scale(
                scale.iter().map(|s| 1.0 / s).collect::<Vec<_>>(),
                axes.clone(),
            ),
            Transformation::Translation { translation, axes } => Transformation::translation(
                translation.iter().map(|t| -t).collect::<Vec<_>>(),
                axes.clone(),
            ),
            Transformation::Affine { matrix, axes } => {
                let inverted = invert(matrix).ok_or_else(|| {
                    SpatialDataError::InvalidTransformation("affine matrix is singular".into())
                })?;
                Transformation::affine(inverted, axes.clone())
            }
            Transformation::Sequence { transformations } => Ok(Transformation::Sequence {
                transformations: transformations
                    .iter()
                    .rev()
                    .map(Transformation::inverse)
                    .collect::<Result<_>>()?,
            }),
        }
    }
}

fn check_unique_axes(axes: &[Axis]) -> Result<()> {
    let unique: BTreeSet<_> = axes.iter().collect();
    if unique.len() != axes.len() {
        return Err(SpatialDataError::InvalidTransformation(format!(
            "duplicated axes in {:?}",
            crate::model::axis_labels(axes)
        )));
    }
    Ok(())
}

fn check_vector(what: &str, values: &[f64], axes: &[Axis]) -> Result<()> {
    check_unique_axes(axes)?;
    if values.len() != axes.len() {
        return Err(SpatialDataError::InvalidTransformation(format!(
            "{what} has {} values for {} axes",
            values.len(),
            axes.len()
        )));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(SpatialDataError::InvalidTransformation(format!(
            "{what} contains non-finite values"
        )));
    }
    Ok(())
}

fn identity_matrix(n: usize) -> Vec<Vec<f64>> {
    (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect()
}

fn matmul(a: &[Vec<f64>], b: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = a.len();
    (0..n)
        .map(|i| (0..n).map(|j| (0..n).map(|k| a[i][k] * b[k][j]).sum()).collect())
        .collect()
}

// Gauss-Jordan with partial pivoting.
fn invert(m: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let n = m.len();
    let mut a: Vec<Vec<f64>> = m.to_vec();
    let mut inv = identity_matrix(n);
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        inv.swap(col, pivot);
        let p = a[col][col];
        for j in 0..n {
            a[col][j] /= p;
            inv[col][j] /= p;
        }
        for row in 0..n {
            if row != col {
                let f = a[row][col];
                if f != 0.0 {
                    for j in 0..n {
                        a[row][j] -= f * a[col][j];
                        inv[row][j] -= f * inv[col][j];
                    }
                }
            }
        }
    }
    Some(inv)
}
