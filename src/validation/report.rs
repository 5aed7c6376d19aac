//! Validation report types for structured error reporting.
//!
//! A report collects every issue found in a container instead of stopping
//! at the first one, so it can be printed, serialized or filtered.

use serde::Serialize;
use std::fmt;

use crate::model::ElementKind;

/// The result of validating a container.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ValidationReport {
    /// All issues found during validation.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }

    /// Returns true if there are no errors.
    pub fn is_ok(&self) -> bool {
        self.error_count() == 0
    }

    /// Returns true if there are no issues at all.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Issues carrying `code`.
    pub fn with_code(&self, code: IssueCode) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.code == code)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.issues.is_empty() {
            return writeln!(f, "Validation passed: no issues found");
        }

        writeln!(
            f,
            "Validation completed with {} error(s) and {} warning(s):",
            self.error_count(),
            self.warning_count()
        )?;
        writeln!(f)?;

        for issue in &self.issues {
            writeln!(f, "  {}", issue)?;
        }

        Ok(())
    }
}

/// A single validation issue (error or warning).
#[derive(Clone, Debug, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,

    /// A stable code for the issue type.
    pub code: IssueCode,

    pub message: String,

    /// Where the issue occurred.
    #[serde(serialize_with = "serialize_display")]
    pub context: IssueContext,
}

impl ValidationIssue {
    pub fn new(
        severity: Severity,
        code: IssueCode,
        message: impl Into<String>,
        context: IssueContext,
    ) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            context,
        }
    }

    pub fn error(code: IssueCode, message: impl Into<String>, context: IssueContext) -> Self {
        Self::new(Severity::Error, code, message, context)
    }

    pub fn warning(code: IssueCode, message: impl Into<String>, context: IssueContext) -> Self {
        Self::new(Severity::Warning, code, message, context)
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "WARN ",
        };
        write!(
            f,
            "[{}] {:?} in {}: {}",
            severity, self.code, self.context, self.message
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Severity {
    /// Suspicious but usable data.
    Warning,
    /// Data that breaks a schema or the container's consistency.
    Error,
}

/// A stable code identifying the type of validation issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum IssueCode {
    // Element issues
    /// An element fails its schema.
    InvalidElement,
    /// An element is bound under more than one name.
    AliasedElement,
    /// An element is not mapped into the required coordinate system.
    MissingCoordinateSystem,
    /// A points key column is not categorical.
    NonCategoricalKey,

    // Table issues
    /// The table's linkage metadata is malformed.
    InvalidTableLinkage,
    /// A declared region names no element of the container.
    DanglingRegion,
    /// A row's region value is not one of the declared regions.
    RegionOutsideList,
    /// The table's region column is missing.
    MissingRegionColumn,
    /// The table's instance column is missing.
    MissingInstanceColumn,
}

/// Context about where a validation issue occurred.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IssueContext {
    Element { kind: ElementKind, name: String },
    Table,
    /// Issue with one row of the table.
    TableRow { row: usize },
}

impl IssueContext {
    pub fn element(kind: ElementKind, name: impl Into<String>) -> Self {
        IssueContext::Element {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for IssueContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueContext::Element { kind, name } => write!(f, "{kind}/{name}"),
            IssueContext::Table => write!(f, "table"),
            IssueContext::TableRow { row } => write!(f, "table row {}", row),
        }
    }
}

fn serialize_display<T: fmt::Display, S: serde::Serializer>(
    value: &T,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}
