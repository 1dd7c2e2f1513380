//! Pipeline stage algorithms
//!
//! Each stage is a plain function (or a small builder) over typed records so
//! it can be tested without touching the filesystem. File handling lives in
//! [`crate::pipeline`].

pub mod context;
pub mod crosswalk;
pub mod exposure;
pub mod ingest;
pub mod join;

pub use context::{ContextColumns, ContextKey, JoinPlan, join_context, plan_context_join};
pub use crosswalk::{Crosswalk, CrosswalkBuilder, CrosswalkStats};
pub use exposure::{
    ExposureQuantiles, ScaleDivisors, TaskStats, UnweightedSnapshotRow, WeightedSnapshotRow,
    aggregate_exposure, tasks_from_table, unweighted_snapshot, weighted_quantile,
    weighted_snapshot,
};
pub use ingest::{IngestStats, persons_from_table};
pub use join::{JoinOutcome, JoinReport, UnmatchedKey, weighted_left_join, write_unmatched_csv};
