//! Shared utilities: logging, progress reporting and test fixtures

pub mod logging;
