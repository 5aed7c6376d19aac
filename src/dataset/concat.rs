//! Concatenation of containers and of their tables.

use std::collections::{BTreeMap, BTreeSet};

use super::{ElementId, SpatialData};
use crate::error::{Result, SpatialDataError};
use crate::model::{Column, ElementKind, NameSpec, Table, TableAttrs, TableModel};

/// Base name of the region column synthesized when merging tables that
/// each annotate a single region.
pub const MERGED_REGION_KEY: &str = "annotated_element_merged";

const MAX_KEY_ATTEMPTS: usize = 100;

/// Merges containers into one.
///
/// Element names must be unique per collection across all inputs. Tables
/// are merged with [`concatenate_tables`] unless `omit_table` is set.
pub fn concatenate(
    containers: impl IntoIterator<Item = SpatialData>,
    omit_table: bool,
) -> Result<SpatialData> {
    let containers: Vec<SpatialData> = containers.into_iter().collect();

    for kind in ElementKind::ALL {
        let mut seen = BTreeSet::new();
        let mut collisions = BTreeSet::new();
        for sdata in &containers {
            for name in sdata.names(kind) {
                if !seen.insert(name) {
                    collisions.insert(name.to_string());
                }
            }
        }
        if !collisions.is_empty() {
            return Err(SpatialDataError::NameCollision {
                kind: kind.as_str(),
                names: collisions.into_iter().collect(),
            });
        }
    }

    let mut out = SpatialData::new();
    let mut tables = Vec::new();
    for mut sdata in containers {
        let mut moved: BTreeMap<ElementId, ElementId> = BTreeMap::new();
        for (kind, names) in std::mem::take(&mut sdata.bindings) {
            for (name, id) in names {
                let new_id = match moved.get(&id) {
                    Some(new_id) => *new_id,
                    None => {
                        let Some(element) = sdata.arena.get_mut(id.0).and_then(Option::take) else {
                            continue;
                        };
                        out.arena.push(Some(element));
                        let new_id = ElementId(out.arena.len() - 1);
                        moved.insert(id, new_id);
                        new_id
                    }
                };
                out.bind(kind, name, new_id);
            }
        }
        if let Some(table) = sdata.table.take() {
            tables.push(table);
        }
    }

    if !omit_table {
        if let Some(table) = concatenate_tables(&tables)? {
            out.set_table(table)?;
        }
    }
    Ok(out)
}

/// Concatenates tables row-wise and reconciles their region linkage.
///
/// - no tables: `None`
/// - one table: returned as is, after validation
/// - several: every table must carry valid linkage with the same scalar
///   `instance_key`. Tables annotating a list of regions must agree on
///   `region_key`; tables annotating a single region get a region column,
///   named after the shared `region_key` or, when there is none, a fresh
///   [`MERGED_REGION_KEY`] name. The result annotates the sorted union of
///   all regions.
///
/// The inputs are left untouched.
pub fn concatenate_tables(tables: &[Table]) -> Result<Option<Table>> {
    match tables {
        [] => return Ok(None),
        [single] => {
            TableModel::validate_linkage(single)?;
            return Ok(Some(single.clone()));
        }
        _ => {}
    }

    let mut attrs: Vec<&TableAttrs> = Vec::with_capacity(tables.len());
    for table in tables {
        TableModel::validate_linkage(table)?;
        attrs.push(table.attrs.as_ref().ok_or_else(|| {
            SpatialDataError::RegionLinkage("table has no region linkage to concatenate".into())
        })?);
    }

    let instance_keys: BTreeSet<String> = attrs
        .iter()
        .map(|a| match &a.instance_key {
            Some(NameSpec::One(k)) => k.clone(),
            Some(NameSpec::Many(ks)) => format!("{ks:?}"),
            None => String::new(),
        })
        .collect();
    let instance_key = match attrs[0].instance_key() {
        Some(key) if instance_keys.len() == 1 => key.to_string(),
        _ => {
            return Err(SpatialDataError::InstanceKeyMismatch {
                found: instance_keys.into_iter().collect(),
            })
        }
    };

    let list_keys: BTreeSet<&str> = attrs
        .iter()
        .filter(|a| a.region.as_ref().is_some_and(NameSpec::is_many))
        .filter_map(|a| a.region_key.as_deref())
        .collect();
    if list_keys.len() > 1 {
        return Err(SpatialDataError::IncompatibleTables(format!(
            "tables annotate lists of regions through different `region_key` columns: {list_keys:?}"
        )));
    }

    let region_key = match list_keys.first() {
        Some(key) => key.to_string(),
        None => fresh_region_key(tables)?,
    };

    let mut prepared: Vec<Table> = Vec::with_capacity(tables.len());
    let mut regions: BTreeSet<String> = BTreeSet::new();
    for (table, attrs) in tables.iter().zip(&attrs) {
        let mut table = table.clone();
        match &attrs.region {
            Some(NameSpec::One(region)) => {
                if table.obs().contains(&region_key) {
                    return Err(SpatialDataError::IncompatibleTables(format!(
                        "cannot add the region column `{region_key}`: a table annotating \
                         `{region}` already has a column with that name"
                    )));
                }
                table.set_obs_column(
                    region_key.as_str(),
                    Column::Str(vec![region.clone(); table.n_obs()]),
                )?;
                regions.insert(region.clone());
            }
            Some(NameSpec::Many(list)) => regions.extend(list.iter().cloned()),
            None => {}
        }
        prepared.push(table);
    }

    let refs: Vec<&Table> = prepared.iter().collect();
    let mut merged = Table::concat(&refs)?;
    let column = merged.obs().column(&region_key).ok_or_else(|| SpatialDataError::MissingColumn {
        element: "table",
        column: region_key.clone(),
    })?;
    let categorical = column.to_categorical()?;
    merged.set_obs_column(region_key.as_str(), categorical)?;
    if !merged.obs().contains(&instance_key) {
        return Err(SpatialDataError::MissingColumn {
            element: "table",
            column: instance_key,
        });
    }
    merged.attrs = Some(TableAttrs {
        region: Some(NameSpec::Many(regions.into_iter().collect())),
        region_key: Some(region_key),
        instance_key: Some(NameSpec::One(instance_key)),
    });
    Ok(Some(merged))
}

/// First of `annotated_element_merged`, `annotated_element_merged_1`, ...
/// that is not an observation column of any table.
fn fresh_region_key(tables: &[Table]) -> Result<String> {
    (0..MAX_KEY_ATTEMPTS)
        .map(|i| match i {
            0 => MERGED_REGION_KEY.to_string(),
            i => format!("{MERGED_REGION_KEY}_{i}"),
        })
        .find(|key| tables.iter().all(|t| !t.obs().contains(key)))
        .ok_or_else(|| {
            SpatialDataError::IncompatibleTables(format!(
                "could not find a free name for the merged region column after {MAX_KEY_ATTEMPTS} attempts"
            ))
        })
}
