use std::path::PathBuf;
use thiserror::Error;

use crate::validation::ValidationReport;

/// Broad classes of failure, so callers can tell "your input shape is
/// wrong" apart from "your input values are logically inconsistent".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Conflicting or redundant specification by the caller.
    Configuration,
    /// A required column, attribute or dimension is missing or wrong.
    Structural,
    /// The input has the wrong type or shape for the operation.
    TypeShape,
    /// Reading or writing failed.
    Io,
}

/// The main error type for spatialdata operations.
#[derive(Debug, Error)]
pub enum SpatialDataError {
    #[error("Ambiguous specification: {0}")]
    AmbiguousSpecification(String),

    #[error("The `{0}` argument is not supported for raster data")]
    ReservedArgument(&'static str),

    #[error("Wrong dims {found:?}, expected a permutation of {expected:?}")]
    WrongDims {
        found: Vec<String>,
        expected: Vec<String>,
    },

    #[error("Column `{column}` not found in {element}")]
    MissingColumn {
        element: &'static str,
        column: String,
    },

    #[error("Invalid {element}: {message}")]
    InvalidElement {
        element: &'static str,
        message: String,
    },

    #[error("Invalid multiscale raster: {0}")]
    InvalidMultiscale(String),

    #[error("Invalid region linkage: {0}")]
    RegionLinkage(String),

    #[error("Tables disagree on `instance_key`: found {found:?}")]
    InstanceKeyMismatch { found: Vec<String> },

    #[error("Invalid transformation: {0}")]
    InvalidTransformation(String),

    #[error("An element named `{name}` already exists in `{kind}`")]
    DuplicateName { kind: &'static str, name: String },

    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Incompatible tables: {0}")]
    IncompatibleTables(String),

    #[error("Element names collide in `{kind}`: {names:?}")]
    NameCollision {
        kind: &'static str,
        names: Vec<String>,
    },

    #[error("Element not found in the SpatialData object")]
    ElementNotFound,

    #[error("Element is bound under more than one name: {bindings:?}")]
    AmbiguousElement { bindings: Vec<String> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse SpatialData JSON from {path}: {source}")]
    JsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write SpatialData JSON to {path}: {source}")]
    JsonWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse GeoJSON from {path}: {source}")]
    GeoJsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Validation failed with {error_count} error(s) and {warning_count} warning(s)")]
    ValidationFailed {
        error_count: usize,
        warning_count: usize,
        report: ValidationReport,
    },
}

impl SpatialDataError {
    /// Returns the broad class this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        use SpatialDataError::*;
        match self {
            AmbiguousSpecification(_) | ReservedArgument(_) => ErrorCategory::Configuration,
            WrongDims { .. }
            | MissingColumn { .. }
            | InvalidElement { .. }
            | InvalidMultiscale(_)
            | RegionLinkage(_)
            | InstanceKeyMismatch { .. }
            | InvalidTransformation(_)
            | DuplicateName { .. } => ErrorCategory::Structural,
            UnsupportedInput(_)
            | ShapeMismatch(_)
            | IncompatibleTables(_)
            | NameCollision { .. }
            | ElementNotFound
            | AmbiguousElement { .. } => ErrorCategory::TypeShape,
            Io(_)
            | JsonParse { .. }
            | JsonWrite { .. }
            | GeoJsonParse { .. }
            | ValidationFailed { .. } => ErrorCategory::Io,
        }
    }

    pub(crate) fn invalid(element: &'static str, message: impl Into<String>) -> Self {
        SpatialDataError::InvalidElement {
            element,
            message: message.into(),
        }
    }
}

/// A specialized Result type for spatialdata operations.
pub type Result<T> = std::result::Result<T, SpatialDataError>;
