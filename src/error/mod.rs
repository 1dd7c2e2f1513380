//! Error handling for the exposure pipeline.
//!
//! Every fatal condition maps onto one variant of [`PipelineError`] and each
//! variant carries a distinct process exit code. Row-level problems are never
//! errors; they are counted by the stage that sees them.

pub mod util;

use std::io;
use std::path::PathBuf;

use arrow::error::ArrowError;
use parquet::errors::ParquetError;

/// Specialized error type for pipeline stages
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A required input file or directory does not exist
    #[error("Missing input ({purpose}): {}", .path.display())]
    MissingInput {
        /// Path that was looked up
        path: PathBuf,
        /// What the file was needed for
        purpose: String,
    },

    /// A required field could not be located by alias or by content
    #[error("Could not detect {field} column; columns considered: [{}]", .considered.join(", "))]
    SchemaDetection {
        /// Logical field being searched for
        field: String,
        /// Column names that were inspected
        considered: Vec<String>,
    },

    /// None of the sheet/header candidates produced a usable table
    #[error("No usable table in workbook {}: {details}", .path.display())]
    WorkbookUnusable {
        /// Workbook location
        path: PathBuf,
        /// Per-attempt failure summary
        details: String,
    },

    /// A cleaning stage reduced its output to zero rows
    #[error("Stage '{stage}' produced no rows: {reason}")]
    EmptyResult {
        /// Stage name
        stage: String,
        /// Why the rows were dropped
        reason: String,
    },

    /// Error opening, reading or writing a file
    #[error("IO error{}: {source}", .context.as_ref().map(|c| format!(" ({c})")).unwrap_or_default())]
    Io {
        /// Underlying error
        #[source]
        source: io::Error,
        /// Optional context message
        context: Option<String>,
    },

    /// Error processing Arrow data (including CSV reading and writing)
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Error processing Parquet data
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// Error converting between model structs and record batches
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_arrow::Error),

    /// Error reading or writing JSON documents
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<io::Error> for PipelineError {
    fn from(error: io::Error) -> Self {
        Self::Io {
            source: error,
            context: None,
        }
    }
}

impl PipelineError {
    /// Create a missing-input error
    pub fn missing_input(path: impl Into<PathBuf>, purpose: impl Into<String>) -> Self {
        Self::MissingInput {
            path: path.into(),
            purpose: purpose.into(),
        }
    }

    /// Create a schema-detection error from the columns that were inspected
    pub fn schema_detection<S: AsRef<str>>(field: impl Into<String>, considered: &[S]) -> Self {
        Self::SchemaDetection {
            field: field.into(),
            considered: considered.iter().map(|c| c.as_ref().to_string()).collect(),
        }
    }

    /// Create an empty-result error
    pub fn empty_result(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EmptyResult {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// Wrap an IO error with a context message
    pub fn io_with_context(source: io::Error, context: impl Into<String>) -> Self {
        Self::Io {
            source,
            context: Some(context.into()),
        }
    }

    /// Process exit code for this failure class
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MissingInput { .. } => 2,
            Self::SchemaDetection { .. } | Self::WorkbookUnusable { .. } => 3,
            Self::EmptyResult { .. } => 4,
            Self::Io { .. } => 5,
            Self::Arrow(_) | Self::Parquet(_) | Self::Serialization(_) | Self::Json(_) => 6,
            Self::Config(_) => 7,
        }
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
