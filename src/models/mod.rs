//! Typed records produced and consumed by the pipeline stages

pub mod person;
pub mod reference;
pub mod traits;

pub use person::{ClassifiedPersonRecord, PanelRecord, PersonRecord, Sex};
pub use reference::{CrosswalkEntry, ExposureScore, TaskScore};
pub use traits::{ArrowSchema, Weighted};
