//! Task-level exposure aggregation and percentile snapshots
//!
//! Task inventories report importance and time either as fractions or as
//! percentages. Each field gets its own divisor (100 when its maximum exceeds
//! 1), after which a classification code's exposure is the time-weighted mean
//! of its task importances.

use std::collections::BTreeMap;

use arrow::datatypes::{DataType, Field, Schema};
use serde::{Deserialize, Serialize};

use crate::codes::{ClassificationCode, CodeShape};
use crate::error::{PipelineError, Result};
use crate::models::{ArrowSchema, ExposureScore, PanelRecord, TaskScore};
use crate::schema::{ClassifierOptions, aliases, locate_code_column, require_alias};
use crate::table::RawTable;

/// Divisors applied to the two task fields
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScaleDivisors {
    /// Divisor for importance
    pub importance: f64,
    /// Divisor for time weight
    pub time: f64,
}

impl Default for ScaleDivisors {
    fn default() -> Self {
        Self {
            importance: 1.0,
            time: 1.0,
        }
    }
}

fn divisor_for(max: f64) -> f64 {
    if max > 1.0 { 100.0 } else { 1.0 }
}

impl ScaleDivisors {
    /// Choose divisors from the observed maxima of each field
    #[must_use]
    pub fn detect(tasks: &[TaskScore]) -> Self {
        let max_importance = tasks.iter().map(|t| t.importance).fold(f64::MIN, f64::max);
        let max_time = tasks.iter().map(|t| t.time_weight).fold(f64::MIN, f64::max);
        Self {
            importance: divisor_for(max_importance),
            time: divisor_for(max_time),
        }
    }
}

/// Counters collected while reading the task inventory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    /// Data rows read
    pub rows: usize,
    /// Rows dropped because the classification code did not normalize
    pub invalid_code: usize,
    /// Rows dropped because importance or time was missing, negative or non-numeric
    pub invalid_value: usize,
}

fn parse_score(cell: Option<&str>) -> Option<f64> {
    cell?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

/// Read task scores from a task inventory table
pub fn tasks_from_table(
    table: &RawTable,
    options: &ClassifierOptions,
) -> Result<(Vec<TaskScore>, TaskStats)> {
    let code = locate_code_column(
        table,
        &aliases::CLASSIFICATION,
        CodeShape::Classification,
        &[aliases::TASK_IMPORTANCE, aliases::TASK_TIME],
        options,
    )?;
    let importance = require_alias(table, &aliases::TASK_IMPORTANCE)?;
    let time = require_alias(table, &aliases::TASK_TIME)?;

    let mut stats = TaskStats {
        rows: table.num_rows(),
        ..TaskStats::default()
    };
    let mut tasks = Vec::with_capacity(table.num_rows());
    for row in 0..table.num_rows() {
        let Some(classification_code) = code.cells[row]
            .as_deref()
            .and_then(ClassificationCode::parse)
        else {
            stats.invalid_code += 1;
            continue;
        };
        let values = parse_score(importance.cells[row].as_deref())
            .zip(parse_score(time.cells[row].as_deref()));
        let Some((importance, time_weight)) = values else {
            stats.invalid_value += 1;
            continue;
        };
        tasks.push(TaskScore {
            classification_code,
            importance,
            time_weight,
        });
    }

    if tasks.is_empty() {
        return Err(PipelineError::empty_result(
            "tasks",
            format!(
                "no usable task rows ({} rows, {} invalid codes, {} invalid values)",
                stats.rows, stats.invalid_code, stats.invalid_value
            ),
        ));
    }
    log::info!(
        "Read {} task scores ({} invalid codes, {} invalid values dropped)",
        tasks.len(),
        stats.invalid_code,
        stats.invalid_value
    );
    Ok((tasks, stats))
}

/// Aggregate task scores into one exposure score per classification code
///
/// Output is sorted by classification code. A code whose scaled time weights
/// sum to zero gets a missing exposure.
#[must_use]
pub fn aggregate_exposure(tasks: &[TaskScore]) -> (Vec<ExposureScore>, ScaleDivisors) {
    let divisors = ScaleDivisors::detect(tasks);

    let mut groups: BTreeMap<&ClassificationCode, (f64, f64, u32)> = BTreeMap::new();
    for task in tasks {
        let importance = task.importance / divisors.importance;
        let time = task.time_weight / divisors.time;
        let entry = groups.entry(&task.classification_code).or_insert((0.0, 0.0, 0));
        entry.0 += importance * time;
        entry.1 += time;
        entry.2 += 1;
    }

    let scores = groups
        .into_iter()
        .map(|(code, (weighted, total_time, task_count))| ExposureScore {
            classification_code: code.clone(),
            exposure: (total_time > 0.0).then(|| weighted / total_time),
            task_count,
            total_time,
        })
        .collect();
    (scores, divisors)
}

/// One row of the unweighted (per-code) snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnweightedSnapshotRow {
    /// SOC code
    pub classification_code: ClassificationCode,
    /// Exposure score
    pub exposure: Option<f64>,
    /// Percentile rank 1-100 among scored codes
    pub percentile: Option<u32>,
    /// Panel respondents with this code
    pub respondents: u64,
    /// Panel weight with this code
    pub weight: f64,
}

impl ArrowSchema for UnweightedSnapshotRow {
    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("classification_code", DataType::Utf8, false),
            Field::new("exposure", DataType::Float64, true),
            Field::new("percentile", DataType::UInt32, true),
            Field::new("respondents", DataType::UInt64, false),
            Field::new("weight", DataType::Float64, false),
        ])
    }
}

/// One row of the survey-weighted snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedSnapshotRow {
    /// SOC code
    pub classification_code: ClassificationCode,
    /// Exposure score
    pub exposure: f64,
    /// Panel respondents with this code
    pub respondents: u64,
    /// Panel weight with this code
    pub weight: f64,
    /// Weighted percentile rank 1-100 across the panel population
    pub weighted_percentile: u32,
}

impl ArrowSchema for WeightedSnapshotRow {
    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("classification_code", DataType::Utf8, false),
            Field::new("exposure", DataType::Float64, false),
            Field::new("respondents", DataType::UInt64, false),
            Field::new("weight", DataType::Float64, false),
            Field::new("weighted_percentile", DataType::UInt32, false),
        ])
    }
}

/// Respondent count and weight per classification code
fn panel_totals(panel: &[PanelRecord]) -> BTreeMap<&ClassificationCode, (u64, f64)> {
    let mut totals: BTreeMap<&ClassificationCode, (u64, f64)> = BTreeMap::new();
    for person in panel {
        if let Some(code) = &person.classification_code {
            let entry = totals.entry(code).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += person.weight;
        }
    }
    totals
}

/// Ceiling of a percentage, tolerant of floating point noise, clamped to 1-100
fn ceil_percent(part: f64, total: f64) -> u32 {
    let percent = 100.0 * part / total;
    ((percent - 1e-9).ceil() as u32).clamp(1, 100)
}

/// Percentile rank of every scored code, plus panel counts
///
/// The rank of a score `v` is `ceil(100 * #{scores <= v} / n)`, so equal
/// scores share a percentile. Rows are ordered by exposure, then code; codes
/// without a score come last with no percentile.
#[must_use]
pub fn unweighted_snapshot(
    scores: &[ExposureScore],
    panel: &[PanelRecord],
) -> Vec<UnweightedSnapshotRow> {
    let totals = panel_totals(panel);
    let mut scored: Vec<f64> = scores.iter().filter_map(|s| s.exposure).collect();
    scored.sort_by(f64::total_cmp);
    let n = scored.len();

    let mut rows: Vec<UnweightedSnapshotRow> = scores
        .iter()
        .map(|score| {
            let percentile = score.exposure.map(|v| {
                let at_or_below = scored.partition_point(|s| *s <= v);
                ((100 * at_or_below).div_ceil(n)) as u32
            });
            let (respondents, weight) = totals
                .get(&score.classification_code)
                .copied()
                .unwrap_or((0, 0.0));
            UnweightedSnapshotRow {
                classification_code: score.classification_code.clone(),
                exposure: score.exposure,
                percentile,
                respondents,
                weight,
            }
        })
        .collect();

    rows.sort_by(|a, b| match (a.exposure, b.exposure) {
        (Some(x), Some(y)) => x
            .total_cmp(&y)
            .then_with(|| a.classification_code.cmp(&b.classification_code)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.classification_code.cmp(&b.classification_code),
    });
    rows
}

/// Weighted percentile of every code present among scored panel rows
///
/// The percentile of exposure `v` is `ceil(100 * W(<= v) / W_total)` where
/// `W` sums person weights. When the panel's total weight is zero,
/// respondent counts stand in for weights.
#[must_use]
pub fn weighted_snapshot(panel: &[PanelRecord]) -> Vec<WeightedSnapshotRow> {
    let mut groups: BTreeMap<&ClassificationCode, (f64, u64, f64)> = BTreeMap::new();
    for person in panel {
        if let (Some(code), Some(exposure)) = (&person.classification_code, person.exposure) {
            let entry = groups.entry(code).or_insert((exposure, 0, 0.0));
            entry.1 += 1;
            entry.2 += person.weight;
        }
    }

    let total_weight: f64 = groups.values().map(|g| g.2).sum();
    let use_counts = total_weight <= 0.0;
    let mass = |g: &(f64, u64, f64)| if use_counts { g.1 as f64 } else { g.2 };
    let total: f64 = groups.values().map(mass).sum();

    let mut ordered: Vec<(&ClassificationCode, (f64, u64, f64))> = groups.into_iter().collect();
    ordered.sort_by(|a, b| a.1.0.total_cmp(&b.1.0).then_with(|| a.0.cmp(b.0)));

    let mut rows = Vec::with_capacity(ordered.len());
    let mut idx = 0;
    let mut cumulative = 0.0;
    while idx < ordered.len() {
        // Codes with the same exposure share W(<= v)
        let exposure = ordered[idx].1.0;
        let end = idx + ordered[idx..].iter().take_while(|g| g.1.0 == exposure).count();
        cumulative += ordered[idx..end].iter().map(|g| mass(&g.1)).sum::<f64>();
        let weighted_percentile = ceil_percent(cumulative, total);

        for (code, (exposure, respondents, weight)) in &ordered[idx..end] {
            rows.push(WeightedSnapshotRow {
                classification_code: (*code).clone(),
                exposure: *exposure,
                respondents: *respondents,
                weight: *weight,
                weighted_percentile,
            });
        }
        idx = end;
    }
    rows
}

/// Smallest value `v` with `W(<= v) >= q * W_total`
///
/// Returns `None` for an empty input or zero total weight.
#[must_use]
pub fn weighted_quantile(values: &[(f64, f64)], q: f64) -> Option<f64> {
    let mut sorted: Vec<(f64, f64)> = values.iter().copied().filter(|(_, w)| *w > 0.0).collect();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
    let total: f64 = sorted.iter().map(|(_, w)| w).sum();
    if sorted.is_empty() || total <= 0.0 {
        return None;
    }

    let threshold = q.clamp(0.0, 1.0) * total;
    let mut cumulative = 0.0;
    for (value, weight) in &sorted {
        cumulative += weight;
        if cumulative >= threshold - 1e-12 * total {
            return Some(*value);
        }
    }
    sorted.last().map(|(v, _)| *v)
}

/// Weighted exposure quantiles of the panel population
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExposureQuantiles {
    /// 10th percentile
    pub p10: Option<f64>,
    /// 25th percentile
    pub p25: Option<f64>,
    /// Median
    pub p50: Option<f64>,
    /// 75th percentile
    pub p75: Option<f64>,
    /// 90th percentile
    pub p90: Option<f64>,
}

impl ExposureQuantiles {
    /// Compute quantiles over panel rows that have an exposure
    #[must_use]
    pub fn from_panel(panel: &[PanelRecord]) -> Self {
        let values: Vec<(f64, f64)> = panel
            .iter()
            .filter_map(|p| p.exposure.map(|e| (e, p.weight)))
            .collect();
        Self {
            p10: weighted_quantile(&values, 0.10),
            p25: weighted_quantile(&values, 0.25),
            p50: weighted_quantile(&values, 0.50),
            p75: weighted_quantile(&values, 0.75),
            p90: weighted_quantile(&values, 0.90),
        }
    }
}
