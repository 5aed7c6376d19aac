//! Annotation tables and their linkage to spatial elements.
//!
//! A [`Table`] is an observation x feature matrix with per-observation
//! metadata. Its [`TableAttrs`] block says which elements the rows
//! annotate: one `region` for every row, or a list of regions plus a
//! `region_key` column naming each row's region. `instance_key` names the
//! column matching rows to instances inside the annotated element.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::array::DenseArray;
use super::frame::{Column, DataFrame};
use crate::error::{Result, SpatialDataError};

/// A single name or a list of names.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NameSpec {
    One(String),
    Many(Vec<String>),
}

impl NameSpec {
    pub fn names(&self) -> Vec<&str> {
        match self {
            NameSpec::One(n) => vec![n.as_str()],
            NameSpec::Many(ns) => ns.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_many(&self) -> bool {
        matches!(self, NameSpec::Many(_))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names().contains(&name)
    }

    pub fn as_one(&self) -> Option<&str> {
        match self {
            NameSpec::One(n) => Some(n),
            NameSpec::Many(_) => None,
        }
    }
}

impl From<&str> for NameSpec {
    fn from(name: &str) -> Self {
        NameSpec::One(name.to_string())
    }
}

impl From<String> for NameSpec {
    fn from(name: String) -> Self {
        NameSpec::One(name)
    }
}

impl From<Vec<String>> for NameSpec {
    fn from(names: Vec<String>) -> Self {
        NameSpec::Many(names)
    }
}

impl From<&[&str]> for NameSpec {
    fn from(names: &[&str]) -> Self {
        NameSpec::Many(names.iter().map(|n| n.to_string()).collect())
    }
}

/// Region linkage metadata stored on a table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableAttrs {
    pub region: Option<NameSpec>,
    pub region_key: Option<String>,
    pub instance_key: Option<NameSpec>,
}

impl TableAttrs {
    pub fn instance_key(&self) -> Option<&str> {
        self.instance_key.as_ref().and_then(NameSpec::as_one)
    }

    pub fn regions(&self) -> Vec<&str> {
        self.region.as_ref().map(NameSpec::names).unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct RawTable {
    x: DenseArray,
    #[serde(default)]
    obs: DataFrame,
    #[serde(default)]
    var_names: Option<Vec<String>>,
    #[serde(default)]
    attrs: Option<TableAttrs>,
}

impl TryFrom<RawTable> for Table {
    type Error = SpatialDataError;

    fn try_from(raw: RawTable) -> Result<Self> {
        let mut table = match raw.var_names {
            Some(var_names) => Table::with_var_names(raw.x, raw.obs, var_names)?,
            None => Table::new(raw.x, raw.obs)?,
        };
        table.attrs = raw.attrs;
        Ok(table)
    }
}

/// An annotated observation x feature matrix.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTable")]
pub struct Table {
    x: DenseArray,
    obs: DataFrame,
    var_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<TableAttrs>,
}

impl Table {
    /// Creates a table with variables named `"0"`, `"1"`, ...
    pub fn new(x: DenseArray, obs: DataFrame) -> Result<Self> {
        let n_vars = x.shape().get(1).copied().unwrap_or(0);
        Self::with_var_names(x, obs, (0..n_vars).map(|i| i.to_string()).collect())
    }

    pub fn with_var_names(x: DenseArray, obs: DataFrame, var_names: Vec<String>) -> Result<Self> {
        let &[n_obs, n_vars] = x.shape() else {
            return Err(SpatialDataError::ShapeMismatch(format!(
                "table matrix must be 2D, got shape {:?}",
                x.shape()
            )));
        };
        if obs.n_cols() > 0 && obs.n_rows() != n_obs {
            return Err(SpatialDataError::ShapeMismatch(format!(
                "obs has {} rows but the matrix has {n_obs}",
                obs.n_rows()
            )));
        }
        if var_names.len() != n_vars {
            return Err(SpatialDataError::ShapeMismatch(format!(
                "{} variable names for {n_vars} variables",
                var_names.len()
            )));
        }
        Ok(Self {
            x,
            obs,
            var_names,
            attrs: None,
        })
    }

    pub fn x(&self) -> &DenseArray {
        &self.x
    }

    pub fn obs(&self) -> &DataFrame {
        &self.obs
    }

    pub fn var_names(&self) -> &[String] {
        &self.var_names
    }

    pub fn n_obs(&self) -> usize {
        self.x.shape()[0]
    }

    pub fn n_vars(&self) -> usize {
        self.var_names.len()
    }

    pub fn len(&self) -> usize {
        self.n_obs()
    }

    pub fn is_empty(&self) -> bool {
        self.n_obs() == 0
    }

    /// Sets an observation column; its length must equal the row count.
    pub fn set_obs_column(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        if column.len() != self.n_obs() {
            return Err(SpatialDataError::ShapeMismatch(format!(
                "column `{name}` has {} rows but the table has {}",
                column.len(),
                self.n_obs()
            )));
        }
        self.obs.insert(name, column)
    }

    pub fn remove_obs_column(&mut self, name: &str) -> Option<Column> {
        self.obs.remove(name)
    }

    /// Keeps the given rows, in order; metadata is carried over.
    pub fn take_rows(&self, rows: &[usize]) -> Table {
        let rows: Vec<usize> = rows.iter().copied().filter(|r| *r < self.n_obs()).collect();
        Table {
            x: DenseArray::from_fn(&[rows.len(), self.n_vars()], |i| self.x.row(rows[i[0]])[i[1]]),
            obs: self.obs.take(&rows),
            var_names: self.var_names.clone(),
            attrs: self.attrs.clone(),
        }
    }

    /// Region annotated by each row, `None` when the table has no linkage.
    pub fn row_regions(&self) -> Option<Vec<String>> {
        let attrs = self.attrs.as_ref()?;
        match attrs.region.as_ref()? {
            NameSpec::One(region) => Some(vec![region.clone(); self.n_obs()]),
            NameSpec::Many(_) => {
                let key = attrs.region_key.as_ref()?;
                Some(self.obs.column(key)?.to_strings())
            }
        }
    }

    /// For each row, the position of its region in `names`.
    ///
    /// Fails when a row's region is not one of `names`.
    pub fn region_indices(&self, names: &[&str]) -> Result<Vec<usize>> {
        let index: BTreeMap<&str, usize> = names.iter().enumerate().map(|(i, n)| (*n, i)).collect();
        let regions = self.row_regions().ok_or_else(|| {
            SpatialDataError::RegionLinkage("table has no region linkage".into())
        })?;
        regions
            .iter()
            .map(|r| {
                index.get(r.as_str()).copied().ok_or_else(|| {
                    SpatialDataError::RegionLinkage(format!("region `{r}` is not one of {names:?}"))
                })
            })
            .collect()
    }

    /// Row-wise concatenation.
    ///
    /// Variables are outer-joined by name (missing values are NaN);
    /// observation columns are inner-joined. Metadata is dropped.
    pub fn concat(tables: &[&Table]) -> Result<Table> {
        let mut var_names: Vec<String> = Vec::new();
        for t in tables {
            for v in &t.var_names {
                if !var_names.contains(v) {
                    var_names.push(v.clone());
                }
            }
        }
        let position: BTreeMap<&str, usize> = var_names
            .iter()
            .enumerate()
            .map(|(i, v)| (v.as_str(), i))
            .collect();

        let n_obs: usize = tables.iter().map(|t| t.n_obs()).sum();
        let mut values = Vec::with_capacity(n_obs * var_names.len());
        for t in tables {
            for r in 0..t.n_obs() {
                let mut row = vec![f64::NAN; var_names.len()];
                for (v, value) in t.var_names.iter().zip(t.x.row(r)) {
                    row[position[v.as_str()]] = *value;
                }
                values.extend(row);
            }
        }
        let x = DenseArray::new(vec![n_obs, var_names.len()], values)?;
        let frames: Vec<&DataFrame> = tables.iter().map(|t| &t.obs).collect();
        let obs = DataFrame::concat(&frames)?;
        Table::with_var_names(x, obs, var_names)
    }
}

/// Explicit region linkage passed to [`TableModel::parse`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableLinkage {
    pub region: Option<NameSpec>,
    pub region_key: Option<String>,
    pub instance_key: Option<String>,
}

impl TableLinkage {
    /// No explicit linkage: use the table's own metadata, if any.
    pub fn none() -> Self {
        Self::default()
    }

    /// Every row annotates `region`.
    pub fn single(region: impl Into<String>, instance_key: impl Into<String>) -> Self {
        Self {
            region: Some(NameSpec::One(region.into())),
            region_key: None,
            instance_key: Some(instance_key.into()),
        }
    }

    /// Rows annotate one of `regions`, named by the `region_key` column.
    pub fn multiple<S: AsRef<str>>(
        regions: &[S],
        region_key: impl Into<String>,
        instance_key: impl Into<String>,
    ) -> Self {
        Self {
            region: Some(NameSpec::Many(
                regions.iter().map(|r| r.as_ref().to_string()).collect(),
            )),
            region_key: Some(region_key.into()),
            instance_key: Some(instance_key.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.region.is_none() && self.region_key.is_none() && self.instance_key.is_none()
    }
}

/// Parser and validator for [`Table`].
pub struct TableModel;

impl TableModel {
    /// Resolves and stores the region linkage of a table.
    ///
    /// The linkage comes either from `linkage` or from the table's own
    /// metadata, never both.
    pub fn parse(mut table: Table, linkage: TableLinkage) -> Result<Table> {
        let resolved = match (linkage.is_empty(), table.attrs.take()) {
            (false, Some(_)) => {
                return Err(SpatialDataError::AmbiguousSpecification(
                    "pass `region`, `region_key` and `instance_key` either as arguments or in the \
                     table metadata, not both"
                        .into(),
                ));
            }
            (false, None) => linkage,
            (true, Some(existing)) => {
                let instance_key = match existing.instance_key {
                    None => None,
                    Some(NameSpec::One(k)) => Some(k),
                    Some(NameSpec::Many(ks)) => {
                        return Err(SpatialDataError::RegionLinkage(format!(
                            "`instance_key` must be a single column name, found {ks:?}"
                        )));
                    }
                };
                TableLinkage {
                    region: existing.region,
                    region_key: existing.region_key,
                    instance_key,
                }
            }
            (true, None) => return Ok(table),
        };

        let Some(region) = resolved.region else {
            if resolved.region_key.is_some() || resolved.instance_key.is_some() {
                return Err(SpatialDataError::RegionLinkage(
                    "`region_key` and `instance_key` require `region`".into(),
                ));
            }
            return Ok(table);
        };
        let instance_key = resolved.instance_key.ok_or_else(|| {
            SpatialDataError::RegionLinkage("`instance_key` must be provided".into())
        })?;

        match &region {
            NameSpec::One(_) => {
                if resolved.region_key.is_some() {
                    return Err(SpatialDataError::RegionLinkage(
                        "`region_key` must be absent when `region` is a single name".into(),
                    ));
                }
            }
            NameSpec::Many(regions) => {
                let key = resolved.region_key.as_deref().ok_or_else(|| {
                    SpatialDataError::RegionLinkage(
                        "`region_key` must be provided when `region` is a list".into(),
                    )
                })?;
                let column = region_column(&table.obs, key, regions)?;
                if !column.is_categorical() {
                    log::warn!("converting `region_key: {key}` to categorical dtype");
                    let categorical = column.to_categorical()?;
                    table.obs.insert(key, categorical)?;
                }
            }
        }
        instance_column(&table.obs, &instance_key)?;

        table.attrs = Some(TableAttrs {
            region: Some(region),
            region_key: resolved.region_key,
            instance_key: Some(NameSpec::One(instance_key)),
        });
        Ok(table)
    }

    /// Checks the stored metadata block.
    pub fn validate(table: &Table) -> Result<()> {
        let Some(attrs) = &table.attrs else {
            return Ok(());
        };
        match &attrs.region {
            None => {
                return Err(SpatialDataError::RegionLinkage(
                    "`region` not found in the table metadata".into(),
                ))
            }
            Some(NameSpec::One(_)) if attrs.region_key.is_some() => {
                return Err(SpatialDataError::RegionLinkage(
                    "`region_key` must be absent when `region` is a single name".into(),
                ))
            }
            Some(NameSpec::Many(_)) if attrs.region_key.is_none() => {
                return Err(SpatialDataError::RegionLinkage(
                    "`region` is a list but `region_key` is missing".into(),
                ))
            }
            Some(_) => {}
        }
        match &attrs.instance_key {
            Some(NameSpec::One(_)) => Ok(()),
            Some(NameSpec::Many(keys)) => Err(SpatialDataError::RegionLinkage(format!(
                "`instance_key` must be a single column name, found {keys:?}"
            ))),
            None => Err(SpatialDataError::RegionLinkage(
                "`instance_key` not found in the table metadata".into(),
            )),
        }
    }

    /// Checks the stored block against the observation columns: the
    /// instance column exists and, for a list of regions, every row of
    /// the `region_key` column names one of them.
    pub fn validate_linkage(table: &Table) -> Result<()> {
        Self::validate(table)?;
        let Some(attrs) = &table.attrs else {
            return Ok(());
        };
        if let Some(key) = attrs.instance_key() {
            instance_column(&table.obs, key)?;
        }
        if let (Some(NameSpec::Many(regions)), Some(key)) = (&attrs.region, &attrs.region_key) {
            region_column(&table.obs, key, regions)?;
        }
        Ok(())
    }
}

fn instance_column<'a>(obs: &'a DataFrame, key: &str) -> Result<&'a Column> {
    obs.column(key).ok_or_else(|| SpatialDataError::MissingColumn {
        element: "table",
        column: key.to_string(),
    })
}

/// The `region_key` column, provided each of its values is in `regions`.
fn region_column<'a>(obs: &'a DataFrame, key: &str, regions: &[String]) -> Result<&'a Column> {
    let column = obs.column(key).ok_or_else(|| SpatialDataError::MissingColumn {
        element: "table",
        column: key.to_string(),
    })?;
    if let Some(bad) = column.to_strings().into_iter().find(|v| !regions.contains(v)) {
        return Err(SpatialDataError::RegionLinkage(format!(
            "`obs[{key}]` value `{bad}` is not one of the regions {regions:?}"
        )));
    }
    Ok(column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    fn table(n: usize) -> Table {
        let x = DenseArray::from_fn(&[n, 3], |i| (i[0] * 3 + i[1]) as f64);
        let obs = DataFrame::new()
            .with_column("instance_id", Column::Int64((0..n as i64).collect()))
            .unwrap()
            .with_column(
                "annotated",
                Column::strings(&(0..n).map(|i| if i % 2 == 0 { "a" } else { "b" }).collect::<Vec<_>>()),
            )
            .unwrap();
        Table::new(x, obs).unwrap()
    }

    #[test]
    fn test_single_region() {
        let t = TableModel::parse(table(4), TableLinkage::single("shapes/circles", "instance_id"))
            .unwrap();
        assert_eq!(t.row_regions().unwrap(), vec!["shapes/circles"; 4]);
        TableModel::validate(&t).unwrap();
    }

    #[test]
    fn test_list_region_coerces_categorical() {
        let t = TableModel::parse(
            table(4),
            TableLinkage::multiple(&["a", "b"], "annotated", "instance_id"),
        )
        .unwrap();
        assert!(t.obs().column("annotated").unwrap().is_categorical());
        assert_eq!(t.region_indices(&["b", "a"]).unwrap(), vec![1, 0, 1, 0]);
        assert!(t.region_indices(&["a"]).is_err());
    }

    #[test]
    fn test_list_region_values_checked() {
        let err = TableModel::parse(
            table(4),
            TableLinkage::multiple(&["a"], "annotated", "instance_id"),
        )
        .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Structural);
        assert!(TableModel::parse(
            table(4),
            TableLinkage::multiple(&["a", "b"], "missing", "instance_id"),
        )
        .is_err());
    }

    #[test]
    fn test_linkage_requirements() {
        let single_with_key = TableLinkage {
            region_key: Some("annotated".into()),
            ..TableLinkage::single("r", "instance_id")
        };
        assert!(TableModel::parse(table(2), single_with_key).is_err());
        let no_instance = TableLinkage {
            instance_key: None,
            ..TableLinkage::single("r", "instance_id")
        };
        assert!(TableModel::parse(table(2), no_instance).is_err());
        assert!(TableModel::parse(table(2), TableLinkage::single("r", "missing")).is_err());
        let keys_without_region = TableLinkage {
            instance_key: Some("instance_id".into()),
            ..TableLinkage::none()
        };
        assert!(TableModel::parse(table(2), keys_without_region).is_err());
        let unlinked = TableModel::parse(table(2), TableLinkage::none()).unwrap();
        assert!(unlinked.attrs.is_none());
    }

    #[test]
    fn test_metadata_and_arguments_conflict() {
        let t = TableModel::parse(table(2), TableLinkage::single("r", "instance_id")).unwrap();
        let err = TableModel::parse(t.clone(), TableLinkage::single("r", "instance_id")).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);
        let again = TableModel::parse(t.clone(), TableLinkage::none()).unwrap();
        assert_eq!(again.attrs, t.attrs);
    }

    #[test]
    fn test_validate_stored_block() {
        let mut t = table(2);
        t.attrs = Some(TableAttrs {
            region: Some("r".into()),
            region_key: Some("annotated".into()),
            instance_key: Some("instance_id".into()),
        });
        assert!(TableModel::validate(&t).is_err());
        t.attrs = Some(TableAttrs {
            region: Some("r".into()),
            region_key: None,
            instance_key: Some(NameSpec::from(&["a", "b"][..])),
        });
        assert!(TableModel::validate(&t).is_err());
    }

    #[test]
    fn test_validate_linkage_reads_columns() {
        let mut t = TableModel::parse(
            table(4),
            TableLinkage::multiple(&["a", "b"], "annotated", "instance_id"),
        )
        .unwrap();
        TableModel::validate_linkage(&t).unwrap();

        t.set_obs_column("annotated", Column::strings(&["a", "b", "c", "a"]))
            .unwrap();
        TableModel::validate(&t).unwrap();
        let err = TableModel::validate_linkage(&t).unwrap_err();
        assert!(matches!(err, SpatialDataError::RegionLinkage(_)));

        t.remove_obs_column("annotated");
        let err = TableModel::validate_linkage(&t).unwrap_err();
        assert!(matches!(err, SpatialDataError::MissingColumn { .. }));

        t.remove_obs_column("instance_id");
        t.attrs.as_mut().unwrap().region = Some("a".into());
        t.attrs.as_mut().unwrap().region_key = None;
        assert!(TableModel::validate_linkage(&t).is_err());
    }

    #[test]
    fn test_concat_outer_joins_variables() {
        let a = table(2);
        let x = DenseArray::from_rows(&[vec![7.0]]).unwrap();
        let obs = DataFrame::new()
            .with_column("instance_id", Column::Int64(vec![9]))
            .unwrap();
        let b = Table::with_var_names(x, obs, vec!["2".into()]).unwrap();
        let c = Table::concat(&[&a, &b]).unwrap();
        assert_eq!(c.n_obs(), 3);
        assert_eq!(c.var_names(), &["0", "1", "2"]);
        assert!(c.x().row(2)[0].is_nan());
        assert_eq!(c.x().row(2)[2], 7.0);
        assert_eq!(c.obs().column_names().collect::<Vec<_>>(), ["instance_id"]);
    }

    #[test]
    fn test_take_rows() {
        let t = table(4).take_rows(&[3, 1]);
        assert_eq!(t.n_obs(), 2);
        assert_eq!(t.x().row(0), &[9.0, 10.0, 11.0]);
    }
}
