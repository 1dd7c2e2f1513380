//! Utility functions for error handling
//!
//! This module provides utility functions to make error handling more convenient.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{PipelineError, Result};

/// Check that a required input file exists and is a regular file
pub fn validate_input_file(path: &Path, purpose: &str) -> Result<()> {
    if !path.exists() {
        return Err(PipelineError::missing_input(path, purpose));
    }

    if !path.is_file() {
        return Err(PipelineError::io_with_context(
            io::Error::new(io::ErrorKind::InvalidInput, "path is not a file"),
            format!("expected a file for {purpose}: {}", path.display()),
        ));
    }

    Ok(())
}

/// Safely open a file with rich error information
///
/// # Arguments
/// * `path` - The path to the file to open
/// * `purpose` - Why the file is being opened (for error context)
pub fn safe_open_file(path: &Path, purpose: &str) -> Result<fs::File> {
    validate_input_file(path, purpose)?;

    fs::File::open(path).map_err(|e| {
        let context = match e.kind() {
            io::ErrorKind::PermissionDenied => {
                format!("permission denied opening {}", path.display())
            }
            io::ErrorKind::NotFound => {
                format!("{} was removed during the run", path.display())
            }
            _ => format!("failed to open {} for {purpose}", path.display()),
        };
        PipelineError::io_with_context(e, context)
    })
}

/// Check if a directory exists and is readable
pub fn validate_directory(path: &Path, purpose: &str) -> Result<()> {
    if !path.exists() {
        return Err(PipelineError::missing_input(path, purpose));
    }

    if !path.is_dir() {
        return Err(PipelineError::io_with_context(
            io::Error::new(io::ErrorKind::InvalidInput, "path is not a directory"),
            format!("expected a directory for {purpose}: {}", path.display()),
        ));
    }

    fs::read_dir(path).map(|_| ()).map_err(|e| {
        PipelineError::io_with_context(e, format!("failed to access {}", path.display()))
    })
}

/// Create an output file, creating its parent directory first
pub fn create_output_file(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                PipelineError::io_with_context(e, format!("creating {}", parent.display()))
            })?;
        }
    }
    fs::File::create(path)
        .map_err(|e| PipelineError::io_with_context(e, format!("creating {}", path.display())))
}

/// Try multiple operations in sequence, returning the first success or all errors
///
/// Each attempt is labelled; when every attempt fails the labels and messages
/// are returned so the caller can build a descriptive fatal error.
pub fn try_operations<T, F>(
    operations: impl IntoIterator<Item = (String, F)>,
) -> std::result::Result<T, Vec<(String, PipelineError)>>
where
    F: FnOnce() -> Result<T>,
{
    let mut errors = Vec::new();

    for (label, operation) in operations {
        match operation() {
            Ok(result) => return Ok(result),
            Err(e) => {
                log::debug!("Attempt '{label}' failed: {e}");
                errors.push((label, e));
            }
        }
    }

    Err(errors)
}

/// Render the failures collected by [`try_operations`] as one message
#[must_use]
pub fn describe_failures(errors: &[(String, PipelineError)]) -> String {
    if errors.is_empty() {
        return "no candidates were tried".to_string();
    }
    errors
        .iter()
        .map(|(label, e)| format!("{label}: {e}"))
        .collect::<Vec<_>>()
        .join("; ")
}
