//! Configuration for the exposure pipeline.
//!
//! A single [`PipelineConfig`] is built once (defaults, then a JSON file, then
//! command-line overrides) and passed by reference to every stage.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::util::safe_open_file;
use crate::error::{PipelineError, Result};
use crate::schema::ClassifierOptions;

/// How to pick one classification code when an occupation code maps to several
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep the lowest classification code
    #[default]
    LowestCode,
    /// Prefer detailed codes over major-group codes (`NN-0000`), then lowest
    PreferDetailed,
    /// Drop occupation codes that map to more than one classification code
    DropAmbiguous,
}

/// How to treat crosswalk cells that hold more than one classification code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiCodePolicy {
    /// Keep the first code listed in the cell
    #[default]
    First,
    /// Discard cells with more than one code
    Strict,
    /// Emit one mapping per code in the cell
    Expand,
}

/// Where the occupation crosswalk comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CrosswalkSource {
    /// A two-column CSV or Parquet table
    Prebuilt {
        /// Table path
        path: PathBuf,
    },
    /// A workbook exported as one CSV per sheet
    Workbook {
        /// Export directory
        dir: PathBuf,
    },
}

impl fmt::Display for CrosswalkSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prebuilt { path } => write!(f, "pre-built table {}", path.display()),
            Self::Workbook { dir } => write!(f, "workbook export {}", dir.display()),
        }
    }
}

/// An auxiliary table joined onto the panel when it shares a key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextTable {
    /// Short name used as the column prefix and in the manifest
    pub name: String,
    /// CSV path
    pub path: PathBuf,
}

/// Input file locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputPaths {
    /// Person-level survey extract (CSV)
    pub persons: PathBuf,
    /// Occupation crosswalk source
    pub crosswalk: CrosswalkSource,
    /// Task inventory (CSV)
    pub tasks: PathBuf,
    /// Optional context tables
    pub context: Vec<ContextTable>,
}

impl Default for InputPaths {
    fn default() -> Self {
        Self {
            persons: PathBuf::from("data/cps_asec.csv"),
            crosswalk: CrosswalkSource::Workbook {
                dir: PathBuf::from("data/census_occ_codes"),
            },
            tasks: PathBuf::from("data/onet_tasks.csv"),
            context: Vec::new(),
        }
    }
}

/// Crosswalk building options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrosswalkConfig {
    /// Sheet names to try, in priority order
    pub sheet_names: Vec<String>,
    /// Header row offsets to try for each sheet, in priority order
    pub header_rows: Vec<usize>,
    /// Use only this sheet instead of `sheet_names`
    pub sheet: Option<String>,
    /// Tie-break for occupation codes with several classification codes
    pub duplicate_policy: DuplicatePolicy,
    /// Treatment of cells listing several classification codes
    pub multi_code_policy: MultiCodePolicy,
    /// A detected column must score strictly above this fraction
    pub min_column_score: f64,
    /// Score only the first N non-missing cells of each column
    pub max_sample: Option<usize>,
    /// Warn when fewer mappings than this remain
    pub min_expected_rows: usize,
}

impl Default for CrosswalkConfig {
    fn default() -> Self {
        Self {
            sheet_names: vec![
                "2018 Census Occ Code List".to_string(),
                "2018 Census Occ Code".to_string(),
                "Census Occ Code List".to_string(),
                "Sheet1".to_string(),
            ],
            header_rows: vec![0, 1, 2, 3, 4, 5],
            sheet: None,
            duplicate_policy: DuplicatePolicy::default(),
            multi_code_policy: MultiCodePolicy::default(),
            min_column_score: 0.0,
            max_sample: None,
            min_expected_rows: 100,
        }
    }
}

impl CrosswalkConfig {
    /// Sheets to try, honouring a forced sheet
    #[must_use]
    pub fn candidate_sheets(&self) -> Vec<&str> {
        match &self.sheet {
            Some(sheet) => vec![sheet.as_str()],
            None => self.sheet_names.iter().map(String::as_str).collect(),
        }
    }

    /// Classifier settings derived from this config
    #[must_use]
    pub fn classifier_options(&self) -> ClassifierOptions {
        ClassifierOptions {
            min_score: self.min_column_score,
            max_sample: self.max_sample,
        }
    }
}

/// Diagnostic report options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Rows in the unmatched-occupation report
    pub top_unmatched: usize,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self { top_unmatched: 50 }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Input locations
    pub inputs: InputPaths,
    /// Directory receiving every output file
    pub output_dir: PathBuf,
    /// Crosswalk building options
    pub crosswalk: CrosswalkConfig,
    /// Diagnostic report options
    pub diagnostics: DiagnosticsConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            inputs: InputPaths::default(),
            output_dir: PathBuf::from("output"),
            crosswalk: CrosswalkConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file; absent keys take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = safe_open_file(path, "configuration")?;
        let config: Self = serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|e| PipelineError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no stage can work with
    pub fn validate(&self) -> Result<()> {
        let crosswalk = &self.crosswalk;
        if !(0.0..1.0).contains(&crosswalk.min_column_score) {
            return Err(PipelineError::Config(format!(
                "crosswalk.min_column_score must be in [0, 1), got {}",
                crosswalk.min_column_score
            )));
        }
        if crosswalk.max_sample == Some(0) {
            return Err(PipelineError::Config(
                "crosswalk.max_sample must be positive".to_string(),
            ));
        }
        if crosswalk.candidate_sheets().is_empty() || crosswalk.header_rows.is_empty() {
            return Err(PipelineError::Config(
                "crosswalk needs at least one sheet name and one header row".to_string(),
            ));
        }
        let mut names: Vec<&str> = self.inputs.context.iter().map(|c| c.name.as_str()).collect();
        names.sort_unstable();
        if names.windows(2).any(|w| w[0] == w[1]) {
            return Err(PipelineError::Config(
                "context table names must be unique".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pipeline Configuration:")?;
        writeln!(f, "  Persons: {}", self.inputs.persons.display())?;
        writeln!(f, "  Crosswalk: {}", self.inputs.crosswalk)?;
        writeln!(f, "  Tasks: {}", self.inputs.tasks.display())?;
        for table in &self.inputs.context {
            writeln!(f, "  Context '{}': {}", table.name, table.path.display())?;
        }
        writeln!(f, "  Output Directory: {}", self.output_dir.display())?;
        if let Some(sheet) = &self.crosswalk.sheet {
            writeln!(f, "  Forced Sheet: {sheet}")?;
        }
        writeln!(f, "  Duplicate Policy: {:?}", self.crosswalk.duplicate_policy)?;
        writeln!(f, "  Multi-code Policy: {:?}", self.crosswalk.multi_code_policy)?;
        writeln!(f, "  Minimum Column Score: {}", self.crosswalk.min_column_score)?;
        if let Some(limit) = self.crosswalk.max_sample {
            writeln!(f, "  Max Sample: {limit}")?;
        }
        writeln!(f, "  Top Unmatched: {}", self.diagnostics.top_unmatched)?;
        Ok(())
    }
}
