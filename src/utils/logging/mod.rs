//! Logging and progress helpers shared by the pipeline stages

pub mod log;
pub mod progress;

pub use self::log::{log_operation_complete, log_operation_start, log_stage, log_warning};
pub use progress::{create_spinner, create_stage_bar, finish_progress_bar};
