//! Error handling for Trellis.
//!
//! This module provides the unified error type and result alias used
//! across all Trellis components. Each variant carries enough context
//! for the HTTP layer to produce an actionable response; duplicate-key
//! errors in particular always surface the offending field and value.

use thiserror::Error;

/// Result type alias for Trellis operations.
pub type TrellisResult<T> = std::result::Result<T, TrellisError>;

/// The main error type for Trellis.
///
/// This enum covers every failure a table-engine operation can surface
/// to a caller. Per-row CSV import failures are *not* raised as this
/// type; they are collected into the import outcome instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TrellisError {
    /// The named table is not in the schema registry.
    #[error("table '{table}' not found")]
    UnknownTable {
        /// Requested table name.
        table: String,
    },

    /// The table descriptor cannot support the requested operation.
    #[error("schema error on table '{table}': {message}")]
    Schema {
        /// Table name.
        table: String,
        /// What the descriptor is missing.
        message: String,
    },

    /// A field value failed validation after coercion.
    #[error("validation failed for field '{field}': {message}")]
    Validation {
        /// Offending field.
        field: String,
        /// Human-readable reason.
        message: String,
    },

    /// A unique constraint was violated.
    #[error("Duplicate {field} value: {value}")]
    DuplicateKey {
        /// The field carrying the unique constraint.
        field: String,
        /// The conflicting value.
        value: String,
    },

    /// A foreign-key constraint was violated.
    #[error("Foreign key constraint failed for {field}: {value}")]
    Reference {
        /// The referencing field.
        field: String,
        /// The value with no referenced row.
        value: String,
    },

    /// A CSV header is missing required columns.
    #[error("missing required columns: {}", columns.join(", "))]
    MissingColumns {
        /// The absent column names.
        columns: Vec<String>,
    },

    /// CSV text could not be parsed at all.
    #[error("error parsing CSV: {message}")]
    Parse {
        /// Parser diagnostic.
        message: String,
    },

    /// No record with the given primary key exists.
    #[error("record not found")]
    RecordNotFound {
        /// Table name.
        table: String,
        /// The primary-key value that was looked up.
        id: String,
    },

    /// Every production stage failed during order aggregation.
    ///
    /// Individual stage failures degrade to warnings on the order
    /// view; this error is raised only when no stage answered.
    #[error("all {} stages failed during aggregation", stages.len())]
    AggregationFailed {
        /// The stages that failed.
        stages: Vec<String>,
    },

    /// The underlying store failed outside any constraint.
    #[error("store error: {message}")]
    Store {
        /// Driver diagnostic.
        message: String,
    },
}

impl TrellisError {
    /// Returns the stable machine-readable error code.
    ///
    /// These codes appear in API responses (`errorType`) and are
    /// stable across versions.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnknownTable { .. } => "UNKNOWN_TABLE",
            Self::Schema { .. } => "SCHEMA_ERROR",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::DuplicateKey { .. } => "DUPLICATE_KEY",
            Self::Reference { .. } => "REFERENCE_ERROR",
            Self::MissingColumns { .. } => "MISSING_COLUMNS",
            Self::Parse { .. } => "PARSE_ERROR",
            Self::RecordNotFound { .. } => "RECORD_NOT_FOUND",
            Self::AggregationFailed { .. } => "AGGREGATION_FAILED",
            Self::Store { .. } => "STORE_ERROR",
        }
    }

    /// Returns the field implicated by this error, if any.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. }
            | Self::DuplicateKey { field, .. }
            | Self::Reference { field, .. } => Some(field),
            _ => None,
        }
    }
}
