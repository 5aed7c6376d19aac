//! Minimal columnar table engine used by points, shapes and tables.
//!
//! Only what the element schemas need: typed columns, categorical
//! coercion, projection, row selection and row-wise concatenation.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Result, SpatialDataError};

/// A categorical column: sorted categories plus one code per row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCategorical")]
pub struct Categorical {
    categories: Vec<String>,
    codes: Vec<u32>,
}

#[derive(Deserialize)]
struct RawCategorical {
    categories: Vec<String>,
    codes: Vec<u32>,
}

impl TryFrom<RawCategorical> for Categorical {
    type Error = SpatialDataError;

    fn try_from(raw: RawCategorical) -> Result<Self> {
        Categorical::new(raw.categories, raw.codes)
    }
}

impl Categorical {
    pub fn new(categories: Vec<String>, codes: Vec<u32>) -> Result<Self> {
        let unique: BTreeSet<&String> = categories.iter().collect();
        if unique.len() != categories.len() {
            return Err(SpatialDataError::ShapeMismatch(
                "categories must be unique".into(),
            ));
        }
        if let Some(bad) = codes.iter().find(|c| **c as usize >= categories.len()) {
            return Err(SpatialDataError::ShapeMismatch(format!(
                "code {bad} out of range for {} categories",
                categories.len()
            )));
        }
        Ok(Self { categories, codes })
    }

    /// Builds a categorical whose categories are the sorted distinct values.
    ///
    /// # Errors
    /// Returns an error if there are more distinct values than `u32` codes.
    pub fn from_values<S: AsRef<str>>(values: &[S]) -> Result<Self> {
        let categories: Vec<String> = values
            .iter()
            .map(|v| v.as_ref())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();
        let index = category_codes(&categories)?;
        let codes = values.iter().map(|v| index[v.as_ref()]).collect();
        Ok(Self { categories, codes })
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn codes(&self) -> &[u32] {
        &self.codes
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn value(&self, row: usize) -> Option<&str> {
        self.codes
            .get(row)
            .and_then(|c| self.categories.get(*c as usize))
            .map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(|c| self.categories[*c as usize].as_str())
    }
}

fn category_codes(categories: &[String]) -> Result<BTreeMap<&str, u32>> {
    categories
        .iter()
        .enumerate()
        .map(|(i, c)| Ok((c.as_str(), category_code(i)?)))
        .collect()
}

fn category_code(index: usize) -> Result<u32> {
    u32::try_from(index).map_err(|_| {
        SpatialDataError::ShapeMismatch(format!(
            "category {index} exceeds the u32 code range"
        ))
    })
}

/// A typed column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dtype", content = "values", rename_all = "lowercase")]
pub enum Column {
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Int64(Vec<i64>),
    Str(Vec<String>),
    Categorical(Categorical),
}

impl Column {
    /// Convenience constructor for string columns.
    pub fn strings<S: AsRef<str>>(values: &[S]) -> Self {
        Column::Str(values.iter().map(|v| v.as_ref().to_string()).collect())
    }

    /// Convenience constructor for categorical columns.
    pub fn categorical<S: AsRef<str>>(values: &[S]) -> Result<Self> {
        Categorical::from_values(values).map(Column::Categorical)
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Float32(v) => v.len(),
            Column::Float64(v) => v.len(),
            Column::Int64(v) => v.len(),
            Column::Str(v) => v.len(),
            Column::Categorical(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> &'static str {
        match self {
            Column::Float32(_) => "float32",
            Column::Float64(_) => "float64",
            Column::Int64(_) => "int64",
            Column::Str(_) => "str",
            Column::Categorical(_) => "categorical",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Column::Float32(_) | Column::Float64(_) | Column::Int64(_))
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self, Column::Categorical(_))
    }

    /// Numeric value of a row, `None` for non-numeric columns.
    pub fn get_f64(&self, row: usize) -> Option<f64> {
        match self {
            Column::Float32(v) => v.get(row).map(|x| f64::from(*x)),
            Column::Float64(v) => v.get(row).copied(),
            Column::Int64(v) => v.get(row).map(|x| *x as f64),
            Column::Str(_) | Column::Categorical(_) => None,
        }
    }

    /// All values as `f64`, `None` for non-numeric columns.
    pub fn to_f64(&self) -> Option<Vec<f64>> {
        self.is_numeric()
            .then(|| (0..self.len()).filter_map(|i| self.get_f64(i)).collect())
    }

    /// String form of a row.
    pub fn value_str(&self, row: usize) -> Option<String> {
        match self {
            Column::Float32(v) => v.get(row).map(|x| x.to_string()),
            Column::Float64(v) => v.get(row).map(|x| x.to_string()),
            Column::Int64(v) => v.get(row).map(|x| x.to_string()),
            Column::Str(v) => v.get(row).cloned(),
            Column::Categorical(c) => c.value(row).map(str::to_string),
        }
    }

    /// Every row in string form.
    pub fn to_strings(&self) -> Vec<String> {
        (0..self.len()).filter_map(|i| self.value_str(i)).collect()
    }

    /// Coerces to categorical; values are stringified first.
    pub fn to_categorical(&self) -> Result<Column> {
        match self {
            Column::Categorical(_) => Ok(self.clone()),
            other => Column::categorical(&other.to_strings()),
        }
    }

    /// Selects rows by index.
    pub fn take(&self, rows: &[usize]) -> Column {
        fn pick<T: Clone>(v: &[T], rows: &[usize]) -> Vec<T> {
            rows.iter().filter_map(|r| v.get(*r).cloned()).collect()
        }
        match self {
            Column::Float32(v) => Column::Float32(pick(v, rows)),
            Column::Float64(v) => Column::Float64(pick(v, rows)),
            Column::Int64(v) => Column::Int64(pick(v, rows)),
            Column::Str(v) => Column::Str(pick(v, rows)),
            Column::Categorical(c) => Column::Categorical(Categorical {
                categories: c.categories.clone(),
                codes: pick(&c.codes, rows),
            }),
        }
    }

    /// Stacks columns row-wise.
    ///
    /// Equal dtypes are kept. Mixed numeric columns become `float64`;
    /// mixed string/categorical columns become categorical over the union
    /// of their values. Anything else is a shape error.
    pub fn concat(columns: &[&Column]) -> Result<Column> {
        let Some(first) = columns.first() else {
            return Ok(Column::Float64(Vec::new()));
        };
        let same = columns.iter().all(|c| c.dtype() == first.dtype());
        if same {
            return Ok(match first {
                Column::Float32(_) => Column::Float32(
                    columns
                        .iter()
                        .flat_map(|c| match c {
                            Column::Float32(v) => v.clone(),
                            _ => Vec::new(),
                        })
                        .collect(),
                ),
                Column::Int64(_) => Column::Int64(
                    columns
                        .iter()
                        .flat_map(|c| match c {
                            Column::Int64(v) => v.clone(),
                            _ => Vec::new(),
                        })
                        .collect(),
                ),
                Column::Str(_) => {
                    Column::Str(columns.iter().flat_map(|c| c.to_strings()).collect())
                }
                Column::Float64(_) => promote_f64(columns),
                Column::Categorical(_) => union_categorical(columns)?,
            });
        }
        if columns.iter().all(|c| c.is_numeric()) {
            Ok(promote_f64(columns))
        } else if columns
            .iter()
            .all(|c| matches!(c, Column::Str(_) | Column::Categorical(_)))
        {
            union_categorical(columns)
        } else {
            let dtypes: Vec<&str> = columns.iter().map(|c| c.dtype()).collect();
            Err(SpatialDataError::ShapeMismatch(format!(
                "cannot concatenate columns of dtypes {dtypes:?}"
            )))
        }
    }
}

fn promote_f64(columns: &[&Column]) -> Column {
    Column::Float64(
        columns
            .iter()
            .flat_map(|c| c.to_f64().unwrap_or_default())
            .collect(),
    )
}

fn union_categorical(columns: &[&Column]) -> Result<Column> {
    let values: Vec<String> = columns.iter().flat_map(|c| c.to_strings()).collect();
    Column::categorical(&values)
}

/// One named column as stored on disk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct NamedColumn {
    name: String,
    data: Column,
}

#[derive(Serialize, Deserialize)]
struct RawFrame {
    columns: Vec<NamedColumn>,
    #[serde(default = "default_partitions")]
    npartitions: usize,
}

fn default_partitions() -> usize {
    1
}

/// An ordered collection of equal-length named columns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFrame", into = "RawFrame")]
pub struct DataFrame {
    columns: Vec<(String, Column)>,
    npartitions: usize,
}

impl TryFrom<RawFrame> for DataFrame {
    type Error = SpatialDataError;

    fn try_from(raw: RawFrame) -> Result<Self> {
        let mut frame = DataFrame::new().with_npartitions(raw.npartitions);
        for c in raw.columns {
            if frame.contains(&c.name) {
                return Err(SpatialDataError::ShapeMismatch(format!(
                    "duplicated column `{}`",
                    c.name
                )));
            }
            frame.insert(c.name, c.data)?;
        }
        Ok(frame)
    }
}

impl From<DataFrame> for RawFrame {
    fn from(frame: DataFrame) -> Self {
        RawFrame {
            columns: frame
                .columns
                .into_iter()
                .map(|(name, data)| NamedColumn { name, data })
                .collect(),
            npartitions: frame.npartitions,
        }
    }
}

impl Default for DataFrame {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            npartitions: 1,
        }
    }
}

impl DataFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column (builder style), replacing one with the same name.
    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Result<Self> {
        self.insert(name, column)?;
        Ok(self)
    }

    /// Inserts or replaces a column. Its length must match the frame.
    pub fn insert(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        if let Some((other, existing)) = self.columns.iter().find(|(n, _)| *n != name) {
            if existing.len() != column.len() {
                return Err(SpatialDataError::ShapeMismatch(format!(
                    "column `{name}` has {} rows but `{other}` has {}",
                    column.len(),
                    existing.len()
                )));
            }
        }
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = column,
            None => self.columns.push((name, column)),
        }
        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    pub fn remove(&mut self, name: &str) -> Option<Column> {
        let pos = self.columns.iter().position(|(n, _)| n == name)?;
        Some(self.columns.remove(pos).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.columns.iter().map(|(n, c)| (n.as_str(), c))
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, |(_, c)| c.len())
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn npartitions(&self) -> usize {
        self.npartitions
    }

    pub fn with_npartitions(mut self, npartitions: usize) -> Self {
        self.npartitions = npartitions.max(1);
        self
    }

    /// Keeps the named columns, in the given order.
    pub fn project(&self, names: &[&str]) -> Result<DataFrame> {
        let mut out = DataFrame::new().with_npartitions(self.npartitions);
        for name in names {
            let column = self.column(name).ok_or_else(|| SpatialDataError::MissingColumn {
                element: "dataframe",
                column: name.to_string(),
            })?;
            out.columns.push((name.to_string(), column.clone()));
        }
        Ok(out)
    }

    /// Renames a column; missing columns are an error.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        let slot = self
            .columns
            .iter_mut()
            .find(|(n, _)| n == from)
            .ok_or_else(|| SpatialDataError::MissingColumn {
                element: "dataframe",
                column: from.to_string(),
            })?;
        slot.0 = to.to_string();
        Ok(())
    }

    /// Selects rows by index.
    pub fn take(&self, rows: &[usize]) -> DataFrame {
        DataFrame {
            columns: self
                .columns
                .iter()
                .map(|(n, c)| (n.clone(), c.take(rows)))
                .collect(),
            npartitions: self.npartitions,
        }
    }

    /// Keeps rows where `mask` is true.
    pub fn filter(&self, mask: &[bool]) -> DataFrame {
        let rows: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, keep)| keep.then_some(i))
            .collect();
        self.take(&rows)
    }

    /// Row-wise concatenation keeping only columns present in every frame.
    pub fn concat(frames: &[&DataFrame]) -> Result<DataFrame> {
        let Some(first) = frames.first() else {
            return Ok(DataFrame::new());
        };
        let mut out = DataFrame::new().with_npartitions(first.npartitions);
        for (name, _) in &first.columns {
            let parts: Option<Vec<&Column>> = frames.iter().map(|f| f.column(name)).collect();
            match parts {
                Some(parts) => out.columns.push((name.clone(), Column::concat(&parts)?)),
                None => log::debug!("dropping column `{name}`: not present in every frame"),
            }
        }
        Ok(out)
    }
}
