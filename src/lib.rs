//! Occupation exposure pipeline for CPS survey microdata.
//!
//! Reconciles CPS occupation codes with SOC classification codes through a
//! content-detected crosswalk, joins survey respondents to task-based
//! exposure scores while tracking matched weight, and writes an analysis
//! panel with unweighted and survey-weighted percentile snapshots.

pub mod algorithm;
pub mod codes;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod reader;
pub mod schema;
pub mod table;
pub mod utils;

// Re-export the most common types for easier use
pub use codes::{ClassificationCode, CodeShape, IndustryCode, OccupationCode};
pub use config::{CrosswalkSource, DuplicatePolicy, MultiCodePolicy, PipelineConfig};
pub use error::{PipelineError, Result};
pub use models::{
    ArrowSchema, ClassifiedPersonRecord, CrosswalkEntry, ExposureScore, PanelRecord,
    PersonRecord, Sex, TaskScore, Weighted,
};
pub use pipeline::{Manifest, Pipeline};
pub use table::{Column, RawTable};

// Arrow types
pub use arrow::record_batch::RecordBatch;
