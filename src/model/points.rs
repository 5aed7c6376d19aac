//! Points schema: coordinate columns along x, y and optionally z, plus
//! per-point annotation columns.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::array::DenseArray;
use super::frame::{Column, DataFrame};
use super::Axis;
use crate::error::{Result, SpatialDataError};
use crate::transform::{parse_transformations, HasTransformations, Transformations};

/// Names of the annotation columns with a special role.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsAttrs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_key: Option<String>,
}

/// A points element.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Points {
    pub frame: DataFrame,
    /// Present only when a feature or instance key was given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<PointsAttrs>,
    #[serde(default)]
    pub transformations: Transformations,
}

impl Points {
    /// Coordinate axes present in the frame, in `x, y, z` order.
    pub fn axes(&self) -> Vec<Axis> {
        Axis::SPATIAL
            .into_iter()
            .filter(|a| self.frame.contains(a.as_str()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.frame.n_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Coordinates row by row, following [`Points::axes`].
    pub fn coordinates(&self) -> Vec<Vec<f64>> {
        let columns: Vec<&Column> = self
            .axes()
            .iter()
            .filter_map(|a| self.frame.column(a.as_str()))
            .collect();
        (0..self.len())
            .map(|row| columns.iter().filter_map(|c| c.get_f64(row)).collect())
            .collect()
    }

    pub fn feature_key(&self) -> Option<&str> {
        self.attrs.as_ref()?.feature_key.as_deref()
    }

    pub fn instance_key(&self) -> Option<&str> {
        self.attrs.as_ref()?.instance_key.as_deref()
    }
}

impl HasTransformations for Points {
    fn transformations(&self) -> &Transformations {
        &self.transformations
    }

    fn transformations_mut(&mut self) -> &mut Transformations {
        &mut self.transformations
    }

    fn element_axes(&self) -> Vec<Axis> {
        self.axes()
    }
}

#[derive(Clone, Debug, Default)]
pub struct PointsParseOptions {
    pub feature_key: Option<String>,
    pub instance_key: Option<String>,
    pub transformations: Option<Transformations>,
    /// Defaults to [`PointsModel::NPARTITIONS`].
    pub npartitions: Option<usize>,
}

impl PointsParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feature_key(mut self, key: impl Into<String>) -> Self {
        self.feature_key = Some(key.into());
        self
    }

    pub fn with_instance_key(mut self, key: impl Into<String>) -> Self {
        self.instance_key = Some(key.into());
        self
    }

    pub fn with_transformations(mut self, transformations: Transformations) -> Self {
        self.transformations = Some(transformations);
        self
    }

    pub fn with_npartitions(mut self, npartitions: usize) -> Self {
        self.npartitions = Some(npartitions);
        self
    }

    fn attrs(&self) -> Option<PointsAttrs> {
        (self.feature_key.is_some() || self.instance_key.is_some()).then(|| PointsAttrs {
            feature_key: self.feature_key.clone(),
            instance_key: self.instance_key.clone(),
        })
    }
}

/// Parsers and validator for [`Points`].
pub struct PointsModel;

impl PointsModel {
    pub const NPARTITIONS: usize = 1;

    /// Builds points from a `rows x axes` coordinate matrix; axes are
    /// `x`, `x y` or `x y z` depending on the column count.
    pub fn parse_array(
        coords: &DenseArray,
        annotation: Option<&DataFrame>,
        options: PointsParseOptions,
    ) -> Result<Points> {
        let &[n_rows, n_axes] = coords.shape() else {
            return Err(SpatialDataError::ShapeMismatch(format!(
                "point coordinates must be 2D, got shape {:?}",
                coords.shape()
            )));
        };
        if !(1..=3).contains(&n_axes) {
            return Err(SpatialDataError::UnsupportedInput(format!(
                "point coordinates need 1 to 3 columns, got {n_axes}"
            )));
        }

        let mut frame = DataFrame::new();
        for (j, axis) in Axis::SPATIAL[..n_axes].iter().enumerate() {
            let values = (0..n_rows).map(|i| coords.row(i)[j]).collect();
            frame.insert(axis.as_str(), Column::Float64(values))?;
        }
        Self::annotate(&mut frame, annotation, &options, &[])?;
        Self::finish(frame, options)
    }

    /// Builds points from an existing frame; `coordinates` maps each axis
    /// to the column holding it.
    pub fn parse_frame(
        data: &DataFrame,
        coordinates: &BTreeMap<Axis, String>,
        options: PointsParseOptions,
    ) -> Result<Points> {
        if coordinates.is_empty() {
            return Err(SpatialDataError::invalid(
                "points",
                "at least one coordinate column is required",
            ));
        }
        if coordinates.contains_key(&Axis::C) {
            return Err(SpatialDataError::UnsupportedInput(
                "`c` is not a point coordinate axis".into(),
            ));
        }

        let mut frame = DataFrame::new();
        for axis in Axis::SPATIAL {
            if let Some(source) = coordinates.get(&axis) {
                let column = data.column(source).ok_or_else(|| SpatialDataError::MissingColumn {
                    element: "points",
                    column: source.clone(),
                })?;
                frame.insert(axis.as_str(), column.clone())?;
            }
        }
        let sources: Vec<&str> = coordinates.values().map(String::as_str).collect();
        Self::annotate(&mut frame, Some(data), &options, &sources)?;
        Self::finish(frame, options)
    }

    /// Re-parses an existing points element.
    pub fn parse_points(mut points: Points, transformations: Option<Transformations>) -> Result<Points> {
        parse_transformations(&mut points, transformations)?;
        Self::validate(&points)?;
        Ok(points)
    }

    fn annotate(
        frame: &mut DataFrame,
        annotation: Option<&DataFrame>,
        options: &PointsParseOptions,
        skip: &[&str],
    ) -> Result<()> {
        let Some(annotation) = annotation else {
            if let Some(key) = options.feature_key.as_ref().or(options.instance_key.as_ref()) {
                return Err(SpatialDataError::MissingColumn {
                    element: "points",
                    column: key.clone(),
                });
            }
            return Ok(());
        };
        if annotation.n_cols() > 0 && annotation.n_rows() != frame.n_rows() {
            return Err(SpatialDataError::ShapeMismatch(format!(
                "annotation has {} rows but there are {} points",
                annotation.n_rows(),
                frame.n_rows()
            )));
        }

        let lookup = |key: &String| {
            annotation
                .column(key)
                .ok_or_else(|| SpatialDataError::MissingColumn {
                    element: "points",
                    column: key.clone(),
                })
        };
        if let Some(key) = &options.feature_key {
            frame.insert(key.as_str(), lookup(key)?.to_categorical()?)?;
        }
        if let Some(key) = &options.instance_key {
            frame.insert(key.as_str(), lookup(key)?.clone())?;
        }
        for (name, column) in annotation.iter() {
            let is_key = Some(name) == options.feature_key.as_deref()
                || Some(name) == options.instance_key.as_deref();
            if is_key || skip.contains(&name) {
                continue;
            }
            if frame.contains(name) {
                log::debug!("annotation column `{name}` shadows a coordinate column, skipping it");
                continue;
            }
            frame.insert(name, column.clone())?;
        }
        Ok(())
    }

    fn finish(frame: DataFrame, options: PointsParseOptions) -> Result<Points> {
        let attrs = options.attrs();
        let npartitions = options.npartitions.unwrap_or(Self::NPARTITIONS);
        let points = Points {
            frame: frame.with_npartitions(npartitions),
            attrs,
            transformations: Transformations::new(),
        };
        Self::parse_points(points, options.transformations)
    }

    pub fn validate(points: &Points) -> Result<()> {
        let axes = points.axes();
        if axes.is_empty() {
            return Err(SpatialDataError::invalid(
                "points",
                "no coordinate column (x, y or z) found",
            ));
        }
        for axis in &axes {
            if let Some(column) = points.frame.column(axis.as_str()) {
                if !column.is_numeric() {
                    return Err(SpatialDataError::invalid(
                        "points",
                        format!(
                            "column `{axis}` has dtype {}, expected float32, float64 or int64",
                            column.dtype()
                        ),
                    ));
                }
            }
        }
        if points.transformations.is_empty() {
            return Err(SpatialDataError::invalid(
                "points",
                "transformation metadata is missing",
            ));
        }
        points.transformations.check(&points.element_axes())?;
        if let Some(attrs) = &points.attrs {
            for key in [&attrs.feature_key, &attrs.instance_key].into_iter().flatten() {
                let column = points.frame.column(key).ok_or_else(|| SpatialDataError::MissingColumn {
                    element: "points",
                    column: key.clone(),
                })?;
                if !column.is_categorical() {
                    log::info!(
                        "column `{key}` is of type {}, consider converting it to categorical",
                        column.dtype()
                    );
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    fn coords(n_axes: usize) -> DenseArray {
        DenseArray::from_fn(&[4, n_axes], |i| (i[0] * 10 + i[1]) as f64)
    }

    fn annotation() -> DataFrame {
        DataFrame::new()
            .with_column("gene", Column::Int64(vec![1, 2, 1, 3]))
            .unwrap()
            .with_column("cell_id", Column::Int64(vec![0, 0, 1, 1]))
            .unwrap()
            .with_column("quality", Column::Float64(vec![0.1, 0.2, 0.3, 0.4]))
            .unwrap()
    }

    #[test]
    fn test_axes_inferred_from_columns() {
        for n in 1..=3 {
            let p = PointsModel::parse_array(&coords(n), None, PointsParseOptions::new()).unwrap();
            assert_eq!(p.axes(), Axis::SPATIAL[..n].to_vec());
            assert!(p.attrs.is_none());
            assert_eq!(p.frame.npartitions(), PointsModel::NPARTITIONS);
        }
        assert!(PointsModel::parse_array(&coords(4), None, PointsParseOptions::new()).is_err());
    }

    #[test]
    fn test_feature_key_becomes_categorical() {
        let ann = annotation();
        let p = PointsModel::parse_array(
            &coords(2),
            Some(&ann),
            PointsParseOptions::new()
                .with_feature_key("gene")
                .with_instance_key("cell_id"),
        )
        .unwrap();
        assert!(p.frame.column("gene").unwrap().is_categorical());
        assert_eq!(p.frame.column("cell_id").unwrap().dtype(), "int64");
        assert!(p.frame.contains("quality"));
        assert_eq!(p.feature_key(), Some("gene"));
        assert_eq!(p.instance_key(), Some("cell_id"));
        assert_eq!(p.coordinates()[3], vec![30.0, 31.0]);
    }

    #[test]
    fn test_missing_key_column() {
        let ann = annotation();
        let err = PointsModel::parse_array(
            &coords(2),
            Some(&ann),
            PointsParseOptions::new().with_feature_key("missing"),
        )
        .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Structural);
        assert!(PointsModel::parse_array(
            &coords(2),
            None,
            PointsParseOptions::new().with_instance_key("cell_id")
        )
        .is_err());
    }

    #[test]
    fn test_annotation_rows_checked() {
        let ann = annotation().take(&[0, 1]);
        assert!(PointsModel::parse_array(&coords(2), Some(&ann), PointsParseOptions::new()).is_err());
    }

    #[test]
    fn test_parse_frame_renames_coordinates() {
        let data = annotation()
            .with_column("px", Column::Float32(vec![1.0, 2.0, 3.0, 4.0]))
            .unwrap()
            .with_column("py", Column::Int64(vec![5, 6, 7, 8]))
            .unwrap();
        let map = BTreeMap::from([(Axis::X, "px".to_string()), (Axis::Y, "py".to_string())]);
        let p = PointsModel::parse_frame(
            &data,
            &map,
            PointsParseOptions::new().with_npartitions(3),
        )
        .unwrap();
        assert_eq!(p.axes(), vec![Axis::X, Axis::Y]);
        assert!(!p.frame.contains("px"));
        assert!(p.frame.contains("gene"));
        assert_eq!(p.frame.npartitions(), 3);
        assert_eq!(p.frame.column("y").unwrap().dtype(), "int64");
    }

    #[test]
    fn test_non_numeric_axis_rejected() {
        let data = DataFrame::new()
            .with_column("x", Column::strings(&["a"]))
            .unwrap();
        let map = BTreeMap::from([(Axis::X, "x".to_string())]);
        assert!(PointsModel::parse_frame(&data, &map, PointsParseOptions::new()).is_err());
    }

    #[test]
    fn test_transformations_attached_once() {
        let p = PointsModel::parse_array(&coords(2), None, PointsParseOptions::new()).unwrap();
        assert!(PointsModel::parse_points(p.clone(), None).is_ok());
        let err = PointsModel::parse_points(p, Some(Transformations::global_identity())).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn test_stored_transformation_axes_checked() {
        let mut p = PointsModel::parse_array(&coords(2), None, PointsParseOptions::new()).unwrap();
        p.transformations = Transformations::new().with(
            "stack",
            crate::transform::Transformation::translation([4.0], [Axis::Z]).unwrap(),
        );
        let err = PointsModel::validate(&p).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Structural);
        assert!(PointsModel::parse_points(p, None).is_err());
    }
}
