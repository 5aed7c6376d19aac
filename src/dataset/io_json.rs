//! JSON document form of a [`SpatialData`] container.
//!
//! Elements are grouped by collection. An element bound under several
//! names is written once, under its first binding; the other bindings
//! are listed as aliases. Every element is re-validated on read.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use super::SpatialData;
use crate::error::{Result, SpatialDataError};
use crate::model::{ElementKind, Points, RasterElement, Shapes, SpatialElement, Table};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    images: BTreeMap<String, RasterElement>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    labels: BTreeMap<String, RasterElement>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    points: BTreeMap<String, Points>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    shapes: BTreeMap<String, Shapes>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    aliases: Vec<Alias>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    table: Option<Table>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Alias {
    kind: ElementKind,
    name: String,
    /// Binding the alias points at.
    target_kind: ElementKind,
    target: String,
}

impl Document {
    fn from_container(sdata: &SpatialData) -> Self {
        let mut doc = Document {
            table: sdata.table.clone(),
            ..Default::default()
        };
        let mut written: BTreeMap<super::ElementId, (ElementKind, String)> = BTreeMap::new();
        for (kind, names) in &sdata.bindings {
            for (name, id) in names {
                if let Some((target_kind, target)) = written.get(id) {
                    doc.aliases.push(Alias {
                        kind: *kind,
                        name: name.clone(),
                        target_kind: *target_kind,
                        target: target.clone(),
                    });
                    continue;
                }
                let Some(element) = sdata.get(*id) else {
                    continue;
                };
                match (kind, element.clone()) {
                    (ElementKind::Images, SpatialElement::Raster(r)) => {
                        doc.images.insert(name.clone(), r);
                    }
                    (ElementKind::Labels, SpatialElement::Raster(r)) => {
                        doc.labels.insert(name.clone(), r);
                    }
                    (ElementKind::Points, SpatialElement::Points(p)) => {
                        doc.points.insert(name.clone(), p);
                    }
                    (ElementKind::Shapes, SpatialElement::Shapes(s)) => {
                        doc.shapes.insert(name.clone(), s);
                    }
                    _ => continue,
                }
                written.insert(*id, (*kind, name.clone()));
            }
        }
        doc
    }

    fn into_container(self) -> Result<SpatialData> {
        let mut sdata = SpatialData::new();
        for (name, image) in self.images {
            sdata.add_image(name, image)?;
        }
        for (name, labels) in self.labels {
            sdata.add_labels(name, labels)?;
        }
        for (name, points) in self.points {
            sdata.add_points(name, points)?;
        }
        for (name, shapes) in self.shapes {
            sdata.add_shapes(name, shapes)?;
        }
        for alias in self.aliases {
            let id = sdata
                .id(alias.target_kind, &alias.target)
                .ok_or(SpatialDataError::ElementNotFound)?;
            sdata.alias(alias.kind, alias.name, id)?;
        }
        if let Some(table) = self.table {
            sdata.set_table(table)?;
        }
        Ok(sdata)
    }
}

/// Reads a container from a JSON file.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed, or if an
/// element fails its schema.
pub fn read_spatialdata_json(path: &Path) -> Result<SpatialData> {
    let file = File::open(path).map_err(SpatialDataError::Io)?;
    let reader = BufReader::new(file);

    let doc: Document =
        serde_json::from_reader(reader).map_err(|source| SpatialDataError::JsonParse {
            path: path.to_path_buf(),
            source,
        })?;
    doc.into_container()
}

/// Writes a container to a JSON file.
pub fn write_spatialdata_json(path: &Path, sdata: &SpatialData) -> Result<()> {
    let file = File::create(path).map_err(SpatialDataError::Io)?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, &Document::from_container(sdata)).map_err(|source| {
        SpatialDataError::JsonWrite {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Reads a container from a JSON string.
pub fn from_json_str(json: &str) -> Result<SpatialData> {
    from_json_slice(json.as_bytes())
}

/// Reads a container from JSON bytes.
pub fn from_json_slice(bytes: &[u8]) -> Result<SpatialData> {
    let doc: Document =
        serde_json::from_slice(bytes).map_err(|source| SpatialDataError::JsonParse {
            path: PathBuf::from("<memory>"),
            source,
        })?;
    doc.into_container()
}

/// Writes a container to a pretty-printed JSON string.
pub fn to_json_string(sdata: &SpatialData) -> std::result::Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&Document::from_container(sdata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::model::{
        Axis, Column, DataFrame, DenseArray, PointsModel, PointsParseOptions, RasterModel,
        RasterParseOptions, ScaleFactor, TableLinkage, TableModel,
    };
    use crate::transform::{Transformation, Transformations};

    fn sample() -> SpatialData {
        let image = RasterModel::Image2D
            .parse_array(
                DenseArray::zeros(&[2, 8, 8]),
                RasterParseOptions::new()
                    .with_scale_factors([ScaleFactor::Uniform(2)])
                    .with_transformations(Transformations::new().with(
                        "global",
                        Transformation::scale([0.5, 0.5], [Axis::Y, Axis::X]).unwrap(),
                    )),
            )
            .unwrap();
        let annotation = DataFrame::new()
            .with_column("gene", Column::strings(&["a", "b", "a"]))
            .unwrap();
        let points = PointsModel::parse_array(
            &DenseArray::zeros(&[3, 2]),
            Some(&annotation),
            PointsParseOptions::new().with_feature_key("gene"),
        )
        .unwrap();
        let obs = DataFrame::new()
            .with_column("instance_id", Column::Int64(vec![0, 1, 2]))
            .unwrap();
        let table = TableModel::parse(
            Table::new(DenseArray::zeros(&[3, 4]), obs).unwrap(),
            TableLinkage::single("points/transcripts", "instance_id"),
        )
        .unwrap();
        let mut sdata = SpatialData::new()
            .with_image("img", image)
            .unwrap()
            .with_points("transcripts", points)
            .unwrap()
            .with_table(table)
            .unwrap();
        let id = sdata.id(ElementKind::Images, "img").unwrap();
        sdata.alias(ElementKind::Images, "img_again", id).unwrap();
        sdata
    }

    #[test]
    fn test_json_roundtrip() {
        let original = sample();
        let json = to_json_string(&original).expect("serialization failed");
        let restored = from_json_str(&json).expect("deserialization failed");

        assert_eq!(restored.len(), original.len());
        assert_eq!(restored.coordinate_systems(), original.coordinate_systems());
        assert_eq!(restored.get_image("img"), original.get_image("img"));
        assert_eq!(restored.get_points("transcripts"), original.get_points("transcripts"));
        assert_eq!(restored.table(), original.table());

        let id = restored.id(ElementKind::Images, "img").unwrap();
        assert_eq!(restored.id(ElementKind::Images, "img_again"), Some(id));
    }

    #[test]
    fn test_invalid_element_rejected_on_read() {
        let json = r#"{
            "shapes": {
                "circles": {
                    "geometry": [{"type": "Point", "coordinates": [0.0, 0.0]}],
                    "transformations": {"global": {"type": "identity"}}
                }
            }
        }"#;
        let err = from_json_str(json).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Structural);
    }

    #[test]
    fn test_transformation_outside_element_axes_rejected_on_read() {
        let json = r#"{
            "shapes": {
                "poly": {
                    "geometry": [{
                        "type": "Polygon",
                        "coordinates": {"exterior": [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [0.0, 0.0]]}
                    }],
                    "transformations": {
                        "global": {"type": "identity"},
                        "zspace": {"type": "scale", "scale": [2.0], "axes": ["z"]}
                    }
                }
            }
        }"#;
        let err = from_json_str(json).unwrap_err();
        assert!(matches!(err, SpatialDataError::InvalidTransformation(_)));

        let planar = json.replace(r#""axes": ["z"]"#, r#""axes": ["x"]"#);
        let sdata = from_json_str(&planar).unwrap();
        assert_eq!(sdata.coordinate_systems(), vec!["global", "zspace"]);
    }

    #[test]
    fn test_table_rows_outside_region_list_rejected_on_read() {
        let mut sdata = sample();
        let mut table = sdata.take_table().unwrap();
        table
            .set_obs_column("region", Column::strings(&["points/transcripts"; 3]))
            .unwrap();
        table.attrs = Some(crate::model::TableAttrs {
            region: Some(crate::model::NameSpec::from(&["points/transcripts"][..])),
            region_key: Some("region".into()),
            instance_key: Some("instance_id".into()),
        });
        sdata.set_table(table).unwrap();
        let mut value: serde_json::Value =
            serde_json::from_str(&to_json_string(&sdata).unwrap()).unwrap();
        value["table"]["attrs"]["region"] = serde_json::json!(["points/other"]);
        let err = from_json_str(&value.to_string()).unwrap_err();
        assert!(matches!(err, SpatialDataError::RegionLinkage(_)));
    }

    #[test]
    fn test_malformed_json() {
        let err = from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, SpatialDataError::JsonParse { .. }));
    }
}
