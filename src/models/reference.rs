//! Reference tables: crosswalk mappings, task scores and exposure scores

use arrow::datatypes::{DataType, Field, Schema};
use serde::{Deserialize, Serialize};

use super::traits::ArrowSchema;
use crate::codes::{ClassificationCode, OccupationCode};

/// One occupation→classification mapping, unique per occupation code
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CrosswalkEntry {
    /// 4-digit occupation code
    pub occupation_code: OccupationCode,
    /// SOC code in `NN-NNNN` form
    pub classification_code: ClassificationCode,
}

impl ArrowSchema for CrosswalkEntry {
    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("occupation_code", DataType::Utf8, false),
            Field::new("classification_code", DataType::Utf8, false),
        ])
    }
}

/// One task of one classification code, as reported by the task inventory
///
/// Values are stored as read; the exposure aggregator scales them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskScore {
    /// SOC code the task belongs to
    pub classification_code: ClassificationCode,
    /// Task importance (fraction or percentage)
    pub importance: f64,
    /// Share of time spent on the task (fraction or percentage)
    pub time_weight: f64,
}

impl ArrowSchema for TaskScore {
    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("classification_code", DataType::Utf8, false),
            Field::new("importance", DataType::Float64, false),
            Field::new("time_weight", DataType::Float64, false),
        ])
    }
}

/// Time-weighted mean task importance of one classification code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureScore {
    /// SOC code
    pub classification_code: ClassificationCode,
    /// Exposure in [0, 1]; absent when the code's total time weight is zero
    pub exposure: Option<f64>,
    /// Number of tasks aggregated
    pub task_count: u32,
    /// Sum of scaled time weights
    pub total_time: f64,
}

impl ArrowSchema for ExposureScore {
    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("classification_code", DataType::Utf8, false),
            Field::new("exposure", DataType::Float64, true),
            Field::new("task_count", DataType::UInt32, false),
            Field::new("total_time", DataType::Float64, false),
        ])
    }
}
