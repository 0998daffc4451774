//! Error types for the Surveytab pipeline.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`NotFoundError`] - missing input file
//! - [`FormatError`] - malformed or inconsistent tabular input
//! - [`DomainError`] - undefined operations (empty-group mean, missing join key)
//! - [`RegistryError`] - recipe registry errors
//! - [`PipelineError`] - top-level wrapper
//!
//! Error conversion is automatic via `From` implementations, allowing `?`
//! to work across module boundaries. Arithmetic edge cases (division by
//! zero and friends) are deliberately NOT errors: they produce IEEE
//! sentinel values in the derived column instead (see [`crate::transform`]).

use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// Not-found Errors
// =============================================================================

/// An input file does not exist.
#[derive(Debug, Clone, Error)]
#[error("Input file not found: {}", path.display())]
pub struct NotFoundError {
    /// The path that was looked up.
    pub path: PathBuf,
}

impl NotFoundError {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

// =============================================================================
// Format Errors
// =============================================================================

/// Malformed or inconsistent tabular input.
#[derive(Debug, Clone, Error)]
pub enum FormatError {
    /// Input has no content at all.
    #[error("Input is empty")]
    Empty,

    /// Input has no header row.
    #[error("No header row found")]
    NoHeader,

    /// A data row has a different field count than the header.
    #[error("Line {line}: expected {expected} fields, found {found}")]
    RaggedRow {
        line: u64,
        expected: usize,
        found: usize,
    },

    /// A referenced column is not in the schema.
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// Two columns share the same name.
    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    /// A value does not match the declared or expected column type.
    #[error("Column '{column}': expected {expected}, found value '{value}'")]
    TypeMismatch {
        column: String,
        expected: String,
        value: String,
    },

    /// An arithmetic or aggregation source column is not numeric.
    #[error("Column '{column}' is {ty}, expected a numeric column")]
    NonNumeric { column: String, ty: String },

    /// A row literal does not match the schema width.
    #[error("Row has {found} cells, schema has {expected} columns")]
    RowWidth { expected: usize, found: usize },

    /// An appended column does not match the table's row count.
    #[error("New column has {found} values, table has {expected} rows")]
    ColumnLength { expected: usize, found: usize },

    /// A row index beyond the table's row count.
    #[error("Row index {index} out of range ({rows} rows)")]
    RowIndex { index: usize, rows: usize },

    /// A filter pattern failed to compile.
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Failed to decode the input bytes.
    #[error("Failed to decode input: {0}")]
    Encoding(String),
}

// =============================================================================
// Domain Errors
// =============================================================================

/// Operations that are mathematically or relationally undefined.
///
/// These are surfaced immediately, never papered over with a default value.
#[derive(Debug, Clone, Error)]
pub enum DomainError {
    /// Mean over a group with no non-null values is undefined.
    #[error("Mean of column '{column}' is undefined for group '{key}': no non-null values")]
    EmptyGroupMean { column: String, key: String },

    /// Mean over a column with no non-null values is undefined.
    #[error("Mean of column '{0}' is undefined: no non-null values")]
    EmptyColumnMean(String),

    /// A join key must exist in both tables.
    #[error("Join key '{key}' not present in {side} table")]
    JoinKeyMissing { key: String, side: &'static str },

    /// A recipe references columns absent from the input schema.
    #[error("Recipe references missing columns: {}", columns.join(", "))]
    MissingColumns { columns: Vec<String> },
}

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors from the recipe registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Recipe not found.
    #[error("Recipe not found: {0}")]
    NotFound(String),

    /// Failed to persist a recipe.
    #[error("Failed to save recipe: {0}")]
    SaveError(String),

    /// Stored recipe data is invalid.
    #[error("Invalid recipe: {0}")]
    InvalidRecipe(String),

    /// IO error.
    #[error("Registry IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error.
    #[error("Registry JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline errors.
///
/// This is the error type returned by operations that can fail in more
/// than one family (loading, grouping, recipe execution). It wraps all
/// lower-level errors; none of the components catches or retries another's
/// errors, so every failure surfaces to the caller immediately.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing input file.
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// Format error.
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Registry error.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// CSV codec error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for format-sensitive operations.
pub type FormatResult<T> = Result<T, FormatError>;

/// Result type for domain-sensitive operations.
pub type DomainResult<T> = Result<T, DomainError>;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // FormatError -> PipelineError
        let fmt_err = FormatError::UnknownColumn("Yield".into());
        let pipeline_err: PipelineError = fmt_err.into();
        assert!(pipeline_err.to_string().contains("Yield"));

        // DomainError -> PipelineError
        let dom_err = DomainError::EmptyColumnMean("Production_mt".into());
        let pipeline_err: PipelineError = dom_err.into();
        assert!(pipeline_err.to_string().contains("Production_mt"));
    }

    #[test]
    fn test_not_found_message() {
        let err = NotFoundError::new("missing/farms.csv");
        assert!(err.to_string().contains("missing/farms.csv"));
    }

    #[test]
    fn test_ragged_row_format() {
        let err = FormatError::RaggedRow {
            line: 5,
            expected: 4,
            found: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("Line 5"));
        assert!(msg.contains("expected 4"));
        assert!(msg.contains("found 3"));
    }
}
