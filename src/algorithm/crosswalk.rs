//! Occupation to classification crosswalk
//!
//! Reference workbooks move their tables between sheets and pad them with
//! title rows, so the builder tries every sheet/header candidate in order and
//! picks the code columns by content. Whatever the source, the output holds
//! exactly one classification code per occupation code.

use std::path::Path;

use itertools::Itertools;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::codes::{ClassificationCode, CodeShape, OccupationCode, split_code_tokens};
use crate::config::{CrosswalkConfig, DuplicatePolicy, MultiCodePolicy};
use crate::error::util::{describe_failures, try_operations};
use crate::error::{PipelineError, Result};
use crate::models::CrosswalkEntry;
use crate::reader::{SheetSource, read_table};
use crate::schema::{ClassifierOptions, aliases, classify_excluding, classify_pair};
use crate::table::RawTable;
use crate::utils::logging::log_warning;

/// How the crosswalk was built
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CrosswalkStats {
    /// Sheet name or file the mappings came from
    pub source: String,
    /// Header row offset that produced the table (workbooks only)
    pub header_row: Option<usize>,
    /// Column holding occupation codes
    pub occupation_column: String,
    /// Column holding classification codes
    pub classification_column: String,
    /// Data rows in the chosen table
    pub raw_rows: usize,
    /// Rows dropped because either code was missing or malformed
    pub invalid_rows: usize,
    /// Cells listing more than one classification code
    pub multi_code_cells: usize,
    /// Occupation codes that mapped to several classification codes
    pub ambiguous_codes: usize,
    /// Occupation codes dropped by the `drop_ambiguous` policy
    pub dropped_ambiguous: usize,
    /// Mappings in the final crosswalk
    pub final_rows: usize,
}

/// A deduplicated crosswalk with its build statistics
#[derive(Debug, Clone, PartialEq)]
pub struct Crosswalk {
    /// One entry per occupation code, sorted by occupation code
    pub entries: Vec<CrosswalkEntry>,
    /// Build statistics
    pub stats: CrosswalkStats,
}

impl Crosswalk {
    /// Lookup table keyed by occupation code
    #[must_use]
    pub fn lookup(&self) -> FxHashMap<OccupationCode, ClassificationCode> {
        self.entries
            .iter()
            .map(|e| (e.occupation_code.clone(), e.classification_code.clone()))
            .collect()
    }

    /// Number of mappings
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the crosswalk has no mappings
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds crosswalks from workbooks and pre-built tables
#[derive(Debug, Clone)]
pub struct CrosswalkBuilder<'a> {
    config: &'a CrosswalkConfig,
}

impl<'a> CrosswalkBuilder<'a> {
    /// Create a builder using the given crosswalk settings
    #[must_use]
    pub fn new(config: &'a CrosswalkConfig) -> Self {
        Self { config }
    }

    /// Build from a workbook, trying sheets (outer) and header rows (inner)
    ///
    /// A candidate succeeds when its table has data rows and both code
    /// columns can be classified.
    pub fn build_from_workbook<S: SheetSource + ?Sized>(&self, source: &S) -> Result<Crosswalk> {
        let options = self.config.classifier_options();
        let mut failures = Vec::new();

        for sheet in self.config.candidate_sheets() {
            let Some(grid) = source.read_grid(sheet)? else {
                failures.push((
                    format!("sheet '{sheet}'"),
                    PipelineError::missing_input(source.location().join(sheet), "crosswalk sheet"),
                ));
                continue;
            };

            let attempts = self.config.header_rows.iter().map(|&header_row| {
                let grid = &grid;
                let attempt = move || -> Result<(RawTable, usize, usize, usize)> {
                    let table = RawTable::from_grid(grid, header_row);
                    if table.is_empty() {
                        return Err(PipelineError::empty_result(
                            "crosswalk",
                            format!("no data rows below header row {header_row}"),
                        ));
                    }
                    let (occ, soc) = locate_by_content(&table, &options)?;
                    Ok((table, header_row, occ, soc))
                };
                (format!("sheet '{sheet}' header row {header_row}"), attempt)
            });

            match try_operations(attempts) {
                Ok((table, header_row, occ, soc)) => {
                    log::info!("Using crosswalk sheet '{sheet}' with header row {header_row}");
                    let mut crosswalk = self.assemble(&table, occ, soc, sheet)?;
                    crosswalk.stats.header_row = Some(header_row);
                    return Ok(crosswalk);
                }
                Err(errors) => failures.extend(errors),
            }
        }

        Err(PipelineError::WorkbookUnusable {
            path: source.location().to_path_buf(),
            details: describe_failures(&failures),
        })
    }

    /// Build from a table that already holds the two code columns
    ///
    /// Columns are found by alias first, then by content.
    pub fn build_from_table(&self, table: &RawTable, label: &str) -> Result<Crosswalk> {
        if table.is_empty() {
            return Err(PipelineError::empty_result(
                "crosswalk",
                format!("{label} has no data rows"),
            ));
        }
        let options = self.config.classifier_options();
        let position = |name: &str| table.columns().iter().position(|c| c.name == name);

        let occ_alias = aliases::CROSSWALK_OCCUPATION
            .resolve(table)
            .and_then(|c| position(&c.name));
        let soc_alias = aliases::CLASSIFICATION
            .resolve(table)
            .and_then(|c| position(&c.name));

        let (occ, soc) = match (occ_alias, soc_alias) {
            (Some(occ), Some(soc)) if occ != soc => (occ, soc),
            (Some(occ), _) => (occ, locate_one(table, CodeShape::Classification, &options, Some(occ))?),
            (None, Some(soc)) => (locate_one(table, CodeShape::Occupation, &options, Some(soc))?, soc),
            (None, None) => locate_by_content(table, &options)?,
        };
        self.assemble(table, occ, soc, label)
    }

    /// Load and normalize a pre-built CSV or Parquet crosswalk
    pub fn load_prebuilt(&self, path: &Path) -> Result<Crosswalk> {
        let table = read_table(path)?;
        self.build_from_table(&table, &path.display().to_string())
    }

    fn assemble(
        &self,
        table: &RawTable,
        occ_index: usize,
        soc_index: usize,
        source: &str,
    ) -> Result<Crosswalk> {
        let occ_column = &table.columns()[occ_index];
        let soc_column = &table.columns()[soc_index];
        let mut stats = CrosswalkStats {
            source: source.to_string(),
            occupation_column: occ_column.name.clone(),
            classification_column: soc_column.name.clone(),
            raw_rows: table.num_rows(),
            ..CrosswalkStats::default()
        };

        let mut pairs = Vec::with_capacity(table.num_rows());
        for (occ_cell, soc_cell) in occ_column.cells.iter().zip(&soc_column.cells) {
            let occ = occ_cell.as_deref().and_then(OccupationCode::parse);
            let socs = soc_cell
                .as_deref()
                .map(|cell| self.classification_codes(cell, &mut stats))
                .unwrap_or_default();

            match occ {
                Some(occ) if !socs.is_empty() => {
                    pairs.extend(socs.into_iter().map(|soc| (occ.clone(), soc)));
                }
                _ => stats.invalid_rows += 1,
            }
        }

        let entries = dedupe(pairs, self.config.duplicate_policy, &mut stats);
        stats.final_rows = entries.len();

        if entries.is_empty() {
            return Err(PipelineError::empty_result(
                "crosswalk",
                format!(
                    "no valid occupation/classification pairs in {source} \
                     ({} rows, {} invalid)",
                    stats.raw_rows, stats.invalid_rows
                ),
            ));
        }
        if entries.len() < self.config.min_expected_rows {
            log_warning(
                &format!(
                    "Crosswalk is small ({} rows); check the chosen sheet and columns of {source}",
                    entries.len()
                ),
                None,
            );
        }
        log::info!(
            "Crosswalk from {source}: {} raw rows, {} invalid, {} ambiguous codes, {} mappings",
            stats.raw_rows,
            stats.invalid_rows,
            stats.ambiguous_codes,
            stats.final_rows
        );

        Ok(Crosswalk { entries, stats })
    }

    /// Classification codes of one cell under the multi-code policy
    fn classification_codes(
        &self,
        cell: &str,
        stats: &mut CrosswalkStats,
    ) -> Vec<ClassificationCode> {
        let tokens = split_code_tokens(cell);
        if tokens.len() > 1 {
            stats.multi_code_cells += 1;
        }
        match self.config.multi_code_policy {
            MultiCodePolicy::First => tokens
                .first()
                .and_then(|t| ClassificationCode::parse(t))
                .into_iter()
                .collect(),
            MultiCodePolicy::Strict if tokens.len() > 1 => Vec::new(),
            MultiCodePolicy::Strict => tokens
                .iter()
                .filter_map(|t| ClassificationCode::parse(t))
                .collect(),
            MultiCodePolicy::Expand => tokens
                .iter()
                .filter_map(|t| ClassificationCode::parse(t))
                .unique()
                .collect(),
        }
    }
}

/// Locate occupation and classification columns by content only
fn locate_by_content(table: &RawTable, options: &ClassifierOptions) -> Result<(usize, usize)> {
    let columns = table
        .columns()
        .iter()
        .map(|c| (c.name.as_str(), c.cells.as_slice()));
    classify_pair(
        columns,
        &CodeShape::Occupation,
        &CodeShape::Classification,
        options,
    )
    .map(|(occ, soc)| (occ.index, soc.index))
    .map_err(|e| {
        log::debug!("Crosswalk column detection failed: {e}");
        PipelineError::schema_detection("occupation/classification", &table.column_names())
    })
}

fn locate_one(
    table: &RawTable,
    shape: CodeShape,
    options: &ClassifierOptions,
    exclude: Option<usize>,
) -> Result<usize> {
    let columns = table
        .columns()
        .iter()
        .map(|c| (c.name.as_str(), c.cells.as_slice()));
    classify_excluding(columns, &shape, options, exclude)
        .map(|found| found.index)
        .map_err(|_| PipelineError::schema_detection(shape.as_str(), &table.column_names()))
}

/// Reduce normalized pairs to one classification code per occupation code
fn dedupe(
    mut pairs: Vec<(OccupationCode, ClassificationCode)>,
    policy: DuplicatePolicy,
    stats: &mut CrosswalkStats,
) -> Vec<CrosswalkEntry> {
    pairs.sort_unstable();
    pairs.dedup();

    let mut entries = Vec::new();
    for group in pairs.chunk_by(|a, b| a.0 == b.0) {
        let (occupation_code, _) = &group[0];
        if group.len() > 1 {
            stats.ambiguous_codes += 1;
        }
        // Groups are sorted, so the first element carries the lowest code
        let chosen = match policy {
            DuplicatePolicy::LowestCode => Some(&group[0].1),
            DuplicatePolicy::PreferDetailed => group
                .iter()
                .map(|(_, soc)| soc)
                .find(|soc| !soc.is_major_group())
                .or(Some(&group[0].1)),
            DuplicatePolicy::DropAmbiguous if group.len() > 1 => {
                stats.dropped_ambiguous += 1;
                None
            }
            DuplicatePolicy::DropAmbiguous => Some(&group[0].1),
        };
        if let Some(classification_code) = chosen {
            entries.push(CrosswalkEntry {
                occupation_code: occupation_code.clone(),
                classification_code: classification_code.clone(),
            });
        }
    }
    entries
}
