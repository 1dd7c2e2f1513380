//! Stage orchestration
//!
//! A run reads the person extract, builds the crosswalk and the exposure
//! scores (concurrently), joins them onto the persons, writes every output
//! table and finally a `manifest.json` describing the run. Any fatal error
//! aborts the run; row-level problems are counted in the manifest.

use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::algorithm::context::{ContextColumns, JoinPlan, extended_panel_batch};
use crate::algorithm::exposure::{ExposureQuantiles, ScaleDivisors, TaskStats};
use crate::algorithm::{
    Crosswalk, CrosswalkBuilder, CrosswalkStats, IngestStats, JoinOutcome, JoinReport,
    aggregate_exposure, join_context, persons_from_table, plan_context_join, tasks_from_table,
    unweighted_snapshot, weighted_left_join, weighted_snapshot, write_unmatched_csv,
};
use crate::codes::{ClassificationCode, OccupationCode};
use crate::config::{CrosswalkSource, InputPaths, PipelineConfig};
use crate::error::util::{create_output_file, validate_directory, validate_input_file};
use crate::error::{PipelineError, Result};
use crate::models::{
    ArrowSchema, ClassifiedPersonRecord, ExposureScore, PanelRecord, PersonRecord,
};
use crate::reader::{DirectorySheetSource, read_delimited, read_table, write_csv, write_records};
use crate::schema::ClassifierOptions;
use crate::utils::logging::{create_stage_bar, finish_progress_bar, log_stage, log_warning};

/// Stages of a full run, in order
const STAGES: [&str; 6] = [
    "Ingesting persons",
    "Preparing crosswalk and exposure scores",
    "Classifying persons",
    "Attaching exposure scores",
    "Joining context tables",
    "Writing manifest",
];

/// Result of one optional context join, as recorded in the manifest
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextSummary {
    /// The join decision
    pub plan: JoinPlan,
    /// Match diagnostics when the join ran
    pub report: Option<JoinReport>,
    /// Context rows skipped because their key repeated
    pub duplicate_keys: usize,
}

/// Match diagnostics of one join plus its headline share
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinSummary {
    /// Full report
    #[serde(flatten)]
    pub report: JoinReport,
    /// Matched weight as a percentage of total weight
    pub matched_weight_share: f64,
}

impl From<&JoinReport> for JoinSummary {
    fn from(report: &JoinReport) -> Self {
        Self {
            report: report.clone(),
            matched_weight_share: report.matched_weight_share(),
        }
    }
}

/// Exposure scoring summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExposureSummary {
    /// Task inventory counters
    pub tasks: TaskStats,
    /// Divisors applied to importance and time
    pub divisors: ScaleDivisors,
    /// Classification codes with tasks
    pub codes: usize,
    /// Codes with a defined exposure
    pub scored_codes: usize,
}

/// Run summary written as `manifest.json`
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    /// Crate version that produced the run
    pub version: &'static str,
    /// Run start (UTC)
    pub started_at: DateTime<Utc>,
    /// Run end (UTC)
    pub finished_at: DateTime<Utc>,
    /// Inputs read
    pub inputs: InputPaths,
    /// Output directory
    pub output_dir: PathBuf,
    /// Person ingest counters
    pub ingest: IngestStats,
    /// Crosswalk build statistics
    pub crosswalk: CrosswalkStats,
    /// Exposure scoring summary
    pub exposure: ExposureSummary,
    /// Persons joined to the crosswalk
    pub crosswalk_join: JoinSummary,
    /// Classified persons joined to exposure scores
    pub exposure_join: JoinSummary,
    /// Weighted exposure quantiles of the panel
    pub quantiles: ExposureQuantiles,
    /// Optional context joins
    pub context: Vec<ContextSummary>,
    /// Files written
    pub outputs: Vec<PathBuf>,
}

/// Check that every required input exists before anything is written
///
/// Context tables are optional and are not checked here.
pub fn check_inputs(config: &PipelineConfig) -> Result<()> {
    validate_input_file(&config.inputs.persons, "person extract")?;
    match &config.inputs.crosswalk {
        CrosswalkSource::Prebuilt { path } => validate_input_file(path, "crosswalk")?,
        CrosswalkSource::Workbook { dir } => validate_directory(dir, "crosswalk workbook")?,
    }
    validate_input_file(&config.inputs.tasks, "task inventory")
}

/// Build the crosswalk from whichever source is configured
pub fn prepare_crosswalk(config: &PipelineConfig) -> Result<Crosswalk> {
    let builder = CrosswalkBuilder::new(&config.crosswalk);
    match &config.inputs.crosswalk {
        CrosswalkSource::Prebuilt { path } => {
            validate_input_file(path, "crosswalk")?;
            builder.load_prebuilt(path)
        }
        CrosswalkSource::Workbook { dir } => {
            let source = DirectorySheetSource::open(dir)?;
            builder.build_from_workbook(&source)
        }
    }
}

/// Read the task inventory and aggregate exposure scores
pub fn prepare_exposure(config: &PipelineConfig) -> Result<(Vec<ExposureScore>, ExposureSummary)> {
    validate_input_file(&config.inputs.tasks, "task inventory")?;
    let table = read_table(&config.inputs.tasks)?;
    let (tasks, stats) = tasks_from_table(&table, &config.crosswalk.classifier_options())?;
    let (scores, divisors) = aggregate_exposure(&tasks);
    let summary = ExposureSummary {
        tasks: stats,
        divisors,
        codes: scores.len(),
        scored_codes: scores.iter().filter(|s| s.exposure.is_some()).count(),
    };
    log::info!(
        "Exposure scores for {} codes ({} with zero time); divisors importance={} time={}",
        summary.codes,
        summary.codes - summary.scored_codes,
        divisors.importance,
        divisors.time
    );
    Ok((scores, summary))
}

/// Read the person extract into typed records
pub fn ingest_persons(path: &Path, options: &ClassifierOptions) -> Result<(Vec<PersonRecord>, IngestStats)> {
    validate_input_file(path, "person extract")?;
    let table = read_table(path)?;
    persons_from_table(&table, options)
}

/// Attach classification codes to persons
#[must_use]
pub fn classify_persons(
    persons: Vec<PersonRecord>,
    crosswalk: &Crosswalk,
) -> JoinOutcome<ClassifiedPersonRecord, OccupationCode> {
    let lookup = crosswalk.lookup();
    weighted_left_join(
        persons,
        &lookup,
        |p| p.occupation_code.as_ref(),
        |p, soc| ClassifiedPersonRecord::from_person(p, soc.cloned()),
    )
}

/// Attach exposure scores to classified persons
#[must_use]
pub fn attach_exposure(
    persons: Vec<ClassifiedPersonRecord>,
    scores: &[ExposureScore],
) -> JoinOutcome<PanelRecord, ClassificationCode> {
    let lookup: FxHashMap<ClassificationCode, Option<f64>> = scores
        .iter()
        .map(|s| (s.classification_code.clone(), s.exposure))
        .collect();
    weighted_left_join(
        persons,
        &lookup,
        |p| p.classification_code.as_ref(),
        |p, exposure| PanelRecord::from_classified(p, exposure.copied().flatten()),
    )
}

/// Write typed records as CSV only
fn write_csv_records<T: ArrowSchema>(path: &Path, records: &[T]) -> Result<PathBuf> {
    write_csv(path, &T::to_record_batch(records)?)?;
    Ok(path.to_path_buf())
}

fn write_manifest(path: &Path, manifest: &Manifest) -> Result<()> {
    let writer = BufWriter::new(create_output_file(path)?);
    serde_json::to_writer_pretty(writer, manifest)?;
    Ok(())
}

/// Drives a full pipeline run
pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    progress: ProgressBar,
}

impl<'a> Pipeline<'a> {
    /// Create a run over `config`; progress is drawn only when `show_progress`
    #[must_use]
    pub fn new(config: &'a PipelineConfig, show_progress: bool) -> Self {
        Self {
            config,
            progress: create_stage_bar(STAGES.len() as u64, show_progress),
        }
    }

    fn stage(&self, index: usize) {
        let name = STAGES[index];
        log_stage(index + 1, STAGES.len(), name);
        self.progress.set_position(index as u64);
        self.progress.set_message(name);
    }

    fn output(&self, file: &str) -> PathBuf {
        self.config.output_dir.join(file)
    }

    /// Execute every stage and write all outputs
    pub fn run(&self) -> Result<Manifest> {
        let config = self.config;
        let started_at = Utc::now();
        let start = Instant::now();
        check_inputs(config)?;
        fs::create_dir_all(&config.output_dir).map_err(|e| {
            PipelineError::io_with_context(e, format!("creating {}", config.output_dir.display()))
        })?;
        let mut outputs = Vec::new();

        self.stage(0);
        let options = config.crosswalk.classifier_options();
        let (persons, ingest) = ingest_persons(&config.inputs.persons, &options)?;
        let (p, c) = write_records(&config.output_dir, "persons", &persons)?;
        outputs.extend([p, c]);

        self.stage(1);
        let (crosswalk, exposure) =
            rayon::join(|| prepare_crosswalk(config), || prepare_exposure(config));
        let crosswalk = crosswalk?;
        let (scores, exposure) = exposure?;
        let (p, c) = write_records(&config.output_dir, "crosswalk", &crosswalk.entries)?;
        outputs.extend([p, c]);
        outputs.push(write_csv_records(&self.output("exposure.csv"), &scores)?);

        self.stage(2);
        let classified = classify_persons(persons, &crosswalk);
        classified.report.log("Crosswalk join");
        let (p, c) = write_records(&config.output_dir, "classified", &classified.rows)?;
        outputs.extend([p, c]);
        let unmatched_path = self.output("unmatched_top.csv");
        write_unmatched_csv(
            &unmatched_path,
            "occupation_code",
            &classified.top_unmatched(config.diagnostics.top_unmatched),
        )?;
        outputs.push(unmatched_path);

        self.stage(3);
        let panel = attach_exposure(classified.rows, &scores);
        panel.report.log("Exposure join");
        let (p, c) = write_records(&config.output_dir, "panel", &panel.rows)?;
        outputs.extend([p, c]);
        outputs.push(write_csv_records(
            &self.output("snapshot_unweighted.csv"),
            &unweighted_snapshot(&scores, &panel.rows),
        )?);
        outputs.push(write_csv_records(
            &self.output("snapshot_weighted.csv"),
            &weighted_snapshot(&panel.rows),
        )?);
        let quantiles = ExposureQuantiles::from_panel(&panel.rows);

        self.stage(4);
        let (context, context_columns) = self.join_context_tables(&panel.rows);
        if !context_columns.is_empty() {
            let path = self.output("panel_context.csv");
            write_csv(&path, &extended_panel_batch(&panel.rows, &context_columns)?)?;
            outputs.push(path);
        }

        self.stage(5);
        let manifest_path = self.output("manifest.json");
        outputs.push(manifest_path.clone());
        let manifest = Manifest {
            version: env!("CARGO_PKG_VERSION"),
            started_at,
            finished_at: Utc::now(),
            inputs: config.inputs.clone(),
            output_dir: config.output_dir.clone(),
            ingest,
            crosswalk: crosswalk.stats,
            exposure,
            crosswalk_join: JoinSummary::from(&classified.report),
            exposure_join: JoinSummary::from(&panel.report),
            quantiles,
            context,
            outputs,
        };
        write_manifest(&manifest_path, &manifest)?;

        finish_progress_bar(&self.progress, Some("Pipeline complete"));
        log::info!(
            "Pipeline finished in {:?}; outputs in {}",
            start.elapsed(),
            config.output_dir.display()
        );
        Ok(manifest)
    }

    /// Plan and run every configured context join; failures are logged and skipped
    fn join_context_tables(&self, panel: &[PanelRecord]) -> (Vec<ContextSummary>, Vec<ContextColumns>) {
        let mut summaries = Vec::new();
        let mut columns = Vec::new();

        for table_config in &self.config.inputs.context {
            let name = table_config.name.as_str();
            let table = match read_delimited(&table_config.path) {
                Ok(table) => table,
                Err(e) => {
                    log_warning(&format!("Skipping context table '{name}': {e}"), None);
                    summaries.push(ContextSummary {
                        plan: JoinPlan {
                            table: name.to_string(),
                            compatible: false,
                            reason: e.to_string(),
                            key: None,
                            key_column: None,
                        },
                        report: None,
                        duplicate_keys: 0,
                    });
                    continue;
                }
            };

            let plan = plan_context_join(name, &table);
            if !plan.compatible {
                log_warning(
                    &format!("Skipping context table '{name}': {}", plan.reason),
                    Some(&table_config.path),
                );
            }
            let joined = join_context(panel, &table, &plan);
            summaries.push(ContextSummary {
                report: joined.as_ref().map(|j| j.report.clone()),
                duplicate_keys: joined.as_ref().map_or(0, |j| j.duplicate_keys),
                plan,
            });
            columns.extend(joined);
        }
        (summaries, columns)
    }
}

/// Build and persist only the crosswalk (`crosswalk.parquet`, `crosswalk.csv`)
pub fn run_crosswalk(config: &PipelineConfig) -> Result<Crosswalk> {
    let crosswalk = prepare_crosswalk(config)?;
    write_records(&config.output_dir, "crosswalk", &crosswalk.entries)?;
    Ok(crosswalk)
}

/// Score and persist only the exposure table (`exposure.csv`)
pub fn run_exposure(config: &PipelineConfig) -> Result<Vec<ExposureScore>> {
    let (scores, _) = prepare_exposure(config)?;
    write_csv_records(&config.output_dir.join("exposure.csv"), &scores)?;
    Ok(scores)
}
