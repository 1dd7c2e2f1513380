use std::path::PathBuf;
use std::process;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use cps_exposure::config::{ContextTable, CrosswalkSource, PipelineConfig};
use cps_exposure::pipeline::{Pipeline, run_crosswalk, run_exposure};
use cps_exposure::utils::logging::{create_spinner, finish_progress_bar};
use cps_exposure::{DuplicatePolicy, MultiCodePolicy, PipelineError};

#[derive(Parser, Debug)]
#[command(
    name = "cps-exposure",
    version,
    about = "Build an occupation exposure panel from CPS microdata"
)]
struct Cli {
    /// JSON configuration file; flags below override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for every output file
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Person extract (CSV or Parquet)
    #[arg(long, global = true)]
    persons: Option<PathBuf>,

    /// Prebuilt crosswalk table (occupation_code, classification_code)
    #[arg(long, global = true, conflicts_with = "workbook")]
    crosswalk: Option<PathBuf>,

    /// Directory holding one CSV export per workbook sheet
    #[arg(long, global = true)]
    workbook: Option<PathBuf>,

    /// Task inventory (CSV or Parquet)
    #[arg(long, global = true)]
    tasks: Option<PathBuf>,

    /// Context table as NAME=PATH; may be repeated
    #[arg(long = "context", global = true, value_parser = parse_context)]
    context: Vec<ContextTable>,

    /// Use only this workbook sheet
    #[arg(long, global = true)]
    sheet: Option<String>,

    /// Tie-break for occupation codes with several classification codes
    #[arg(long, global = true, value_parser = parse_duplicate_policy)]
    duplicate_policy: Option<DuplicatePolicy>,

    /// Handling of crosswalk cells listing several classification codes
    #[arg(long, global = true, value_parser = parse_multi_code_policy)]
    multi_code_policy: Option<MultiCodePolicy>,

    /// Hide the progress display
    #[arg(long, global = true)]
    no_progress: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Run every stage and write the panel, snapshots and manifest (default)
    Run,
    /// Build and write only the crosswalk
    Crosswalk,
    /// Score and write only the exposure table
    Exposure,
}

fn parse_context(value: &str) -> Result<ContextTable, String> {
    let (name, path) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=PATH, got '{value}'"))?;
    if name.trim().is_empty() {
        return Err(format!("context table name is empty in '{value}'"));
    }
    Ok(ContextTable {
        name: name.trim().to_string(),
        path: PathBuf::from(path),
    })
}

fn parse_duplicate_policy(value: &str) -> Result<DuplicatePolicy, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|_| format!("unknown duplicate policy '{value}' (lowest_code, prefer_detailed, drop_ambiguous)"))
}

fn parse_multi_code_policy(value: &str) -> Result<MultiCodePolicy, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|_| format!("unknown multi-code policy '{value}' (first, strict, expand)"))
}

impl Cli {
    /// Load the configuration file (or defaults) and apply flag overrides
    fn config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)
                .with_context(|| format!("loading configuration {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(dir) = &self.output_dir {
            config.output_dir.clone_from(dir);
        }
        if let Some(path) = &self.persons {
            config.inputs.persons.clone_from(path);
        }
        if let Some(path) = &self.crosswalk {
            config.inputs.crosswalk = CrosswalkSource::Prebuilt { path: path.clone() };
        }
        if let Some(dir) = &self.workbook {
            config.inputs.crosswalk = CrosswalkSource::Workbook { dir: dir.clone() };
        }
        if let Some(path) = &self.tasks {
            config.inputs.tasks.clone_from(path);
        }
        if !self.context.is_empty() {
            config.inputs.context.clone_from(&self.context);
        }
        if let Some(sheet) = &self.sheet {
            config.crosswalk.sheet = Some(sheet.clone());
        }
        if let Some(policy) = self.duplicate_policy {
            config.crosswalk.duplicate_policy = policy;
        }
        if let Some(policy) = self.multi_code_policy {
            config.crosswalk.multi_code_policy = policy;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

fn execute(cli: &Cli) -> anyhow::Result<()> {
    let config = cli.config()?;
    log::info!("{config}");
    let show_progress = !cli.no_progress;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let manifest = Pipeline::new(&config, show_progress)
                .run()
                .context("pipeline run failed")?;
            log::info!(
                "Crosswalk join matched {:.2}% of weight; exposure join matched {:.2}%",
                manifest.crosswalk_join.matched_weight_share,
                manifest.exposure_join.matched_weight_share
            );
        }
        Command::Crosswalk => {
            let start = Instant::now();
            let spinner = show_progress.then(|| create_spinner("Building crosswalk"));
            let crosswalk = run_crosswalk(&config).context("crosswalk build failed")?;
            if let Some(spinner) = &spinner {
                finish_progress_bar(spinner, Some("Crosswalk written"));
            }
            log::info!(
                "Wrote {} crosswalk rows to {} in {:?}",
                crosswalk.len(),
                config.output_dir.display(),
                start.elapsed()
            );
        }
        Command::Exposure => {
            let start = Instant::now();
            let spinner = show_progress.then(|| create_spinner("Scoring exposure"));
            let scores = run_exposure(&config).context("exposure scoring failed")?;
            if let Some(spinner) = &spinner {
                finish_progress_bar(spinner, Some("Exposure scores written"));
            }
            let scored = scores.iter().filter(|s| s.exposure.is_some()).count();
            if scored == 0 {
                log::warn!("No classification code received a defined exposure score");
            }
            log::info!(
                "Wrote {} exposure scores ({scored} defined) in {:?}",
                scores.len(),
                start.elapsed()
            );
        }
    }
    Ok(())
}

fn main() {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Usage errors are configuration errors; help and version output exit cleanly
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if !err.use_stderr() => err.exit(),
        Err(err) => {
            let _ = err.print();
            process::exit(7);
        }
    };
    if let Err(err) = execute(&cli) {
        log::error!("{err:#}");
        let code = err
            .downcast_ref::<PipelineError>()
            .map_or(1, PipelineError::exit_code);
        process::exit(code);
    }
}
