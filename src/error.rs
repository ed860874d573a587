//! Error types.
//!
//! Loading and aggregation each have their own error enum so a failing
//! report section can say exactly which stage went wrong. The application
//! boundary (CLI, config, server bind) uses `anyhow` instead.

use thiserror::Error;

/// Failure of a pure table transform.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregateError {
    /// A required column is absent from the table.
    #[error("Column '{0}' not found")]
    ColumnNotFound(String),

    /// A numeric operation met a non-numeric cell.
    #[error("Column '{column}' row {row}: expected a number, found {found}")]
    TypeMismatch {
        column: String,
        row: usize,
        found: String,
    },

    /// The operation was given nothing to work on.
    #[error("Empty input: {0}")]
    EmptyInput(String),
}

/// Failure to produce a table from a source identifier.
#[derive(Debug, Error)]
pub enum SourceError {
    /// File missing, network error or non-success HTTP status.
    #[error("Source '{identifier}' unavailable: {reason}")]
    Unavailable { identifier: String, reason: String },

    /// The document as a whole could not be parsed.
    #[error("Source '{identifier}' could not be parsed: {reason}")]
    Parse { identifier: String, reason: String },
}

impl SourceError {
    pub fn unavailable(identifier: &str, reason: impl ToString) -> Self {
        SourceError::Unavailable {
            identifier: identifier.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn parse(identifier: &str, reason: impl ToString) -> Self {
        SourceError::Parse {
            identifier: identifier.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Why a single report section could not be rendered.
#[derive(Debug, Error)]
pub enum SectionError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    /// The section names a source that is not configured.
    #[error("Unknown source '{0}'")]
    UnknownSource(String),
}
