//! Container validation.
//!
//! Parsers already guarantee that each element satisfies its schema when
//! it enters a container. This module re-checks a whole container after
//! the fact, since elements and the table can be mutated in place:
//! - every element against its schema
//! - consistency between the table's linkage and the elements
//! - soft issues such as aliased elements or non-categorical keys

mod report;

pub use report::{IssueCode, IssueContext, Severity, ValidationIssue, ValidationReport};

use std::collections::BTreeSet;

use crate::dataset::{ElementId, SpatialData};
use crate::model::{get_schema, NameSpec, Table, TableModel};
use crate::transform::{HasTransformations, DEFAULT_COORDINATE_SYSTEM};

/// Options for validation behavior.
#[derive(Clone, Debug, Default)]
pub struct ValidateOptions {
    /// If true, treat warnings as errors.
    pub strict: bool,
    /// If true, every element must be mapped into the `global`
    /// coordinate system.
    pub require_global: bool,
}

/// Validates a container and returns a report of all issues found.
pub fn validate_spatial_data(sdata: &SpatialData, opts: &ValidateOptions) -> ValidationReport {
    let mut report = ValidationReport::new();

    validate_elements(sdata, opts, &mut report);

    if let Some(table) = sdata.table() {
        validate_table(sdata, table, &mut report);
    }

    report
}

/// Validates each element once, under the first name it is bound to.
fn validate_elements(sdata: &SpatialData, opts: &ValidateOptions, report: &mut ValidationReport) {
    let mut seen: BTreeSet<ElementId> = BTreeSet::new();

    for (kind, name, element) in sdata.iter() {
        let Some(id) = sdata.id(kind, name) else {
            continue;
        };
        if !seen.insert(id) {
            continue;
        }
        let context = IssueContext::element(kind, name);

        let bindings = sdata.locate_all(id);
        if bindings.len() > 1 {
            let names: Vec<String> = bindings.iter().map(|(k, n)| format!("{k}/{n}")).collect();
            report.add(ValidationIssue::warning(
                IssueCode::AliasedElement,
                format!("element is bound under {} names: {}", names.len(), names.join(", ")),
                context.clone(),
            ));
        }

        if let Err(e) = get_schema(element) {
            report.add(ValidationIssue::error(
                IssueCode::InvalidElement,
                e.to_string(),
                context.clone(),
            ));
        }

        if opts.require_global && !element.transformations().contains(DEFAULT_COORDINATE_SYSTEM) {
            report.add(ValidationIssue::error(
                IssueCode::MissingCoordinateSystem,
                format!("not mapped into the `{DEFAULT_COORDINATE_SYSTEM}` coordinate system"),
                context.clone(),
            ));
        }

        if let Some(points) = element.as_points() {
            for key in [points.feature_key(), points.instance_key()].into_iter().flatten() {
                match points.frame.column(key) {
                    Some(column) if !column.is_categorical() => {
                        report.add(ValidationIssue::warning(
                            IssueCode::NonCategoricalKey,
                            format!("key column `{key}` has dtype {}", column.dtype()),
                            context.clone(),
                        ));
                    }
                    _ => {}
                }
            }
        }
    }
}

fn validate_table(sdata: &SpatialData, table: &Table, report: &mut ValidationReport) {
    if let Err(e) = TableModel::validate(table) {
        report.add(ValidationIssue::error(
            IssueCode::InvalidTableLinkage,
            e.to_string(),
            IssueContext::Table,
        ));
        return;
    }
    let Some(attrs) = &table.attrs else {
        return;
    };

    if let Some(key) = attrs.instance_key() {
        if !table.obs().contains(key) {
            report.add(ValidationIssue::error(
                IssueCode::MissingInstanceColumn,
                format!("instance column `{key}` not found"),
                IssueContext::Table,
            ));
        }
    }

    for region in sdata.dangling_regions(table) {
        report.add(ValidationIssue::warning(
            IssueCode::DanglingRegion,
            format!("region `{region}` is not an element of the container"),
            IssueContext::Table,
        ));
    }

    let (Some(NameSpec::Many(regions)), Some(key)) = (&attrs.region, &attrs.region_key) else {
        return;
    };
    let Some(column) = table.obs().column(key) else {
        report.add(ValidationIssue::error(
            IssueCode::MissingRegionColumn,
            format!("region column `{key}` not found"),
            IssueContext::Table,
        ));
        return;
    };
    if !column.is_categorical() {
        report.add(ValidationIssue::warning(
            IssueCode::NonCategoricalKey,
            format!("region column `{key}` has dtype {}", column.dtype()),
            IssueContext::Table,
        ));
    }
    for (row, value) in column.to_strings().iter().enumerate() {
        if !regions.contains(value) {
            report.add(ValidationIssue::error(
                IssueCode::RegionOutsideList,
                format!("region `{value}` is not one of {regions:?}"),
                IssueContext::TableRow { row },
            ));
        }
    }
}
