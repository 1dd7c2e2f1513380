//! Optional context joins onto the analysis panel
//!
//! Context tables (state labor-flow statistics, industry aggregates, other
//! occupation-level series) are joined only when they share a key with the
//! panel. The decision is made up front as a [`JoinPlan`]; an incompatible
//! table is reported and skipped, never fatal.

use std::fmt;
use std::sync::{Arc, LazyLock};

use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use regex::Regex;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::algorithm::join::{JoinReport, weighted_left_join};
use crate::codes::{ClassificationCode, CodeShape, IndustryCode, OccupationCode};
use crate::error::Result;
use crate::models::{ArrowSchema, PanelRecord, Weighted};
use crate::schema::classify::score_cells;
use crate::schema::{CellPattern, FieldAliases, aliases};
use crate::table::{Column, RawTable};

static STATE_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,2}(\.0+)?$").expect("valid state pattern"));

/// Cells sampled when checking a key column's shape
const SHAPE_SAMPLE: usize = 500;

/// Share of sampled key cells that must have the expected shape
const MIN_KEY_SCORE: f64 = 0.5;

/// Panel field a context table can be joined on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextKey {
    /// SOC classification code
    Classification,
    /// 4-digit occupation code
    Occupation,
    /// 4-digit industry code
    Industry,
    /// State FIPS code
    State,
}

impl ContextKey {
    /// Keys in detection priority order
    pub const ALL: [Self; 4] = [
        Self::Classification,
        Self::Occupation,
        Self::Industry,
        Self::State,
    ];

    fn aliases(self) -> FieldAliases {
        match self {
            Self::Classification => aliases::CLASSIFICATION,
            Self::Occupation => aliases::OCCUPATION,
            Self::Industry => aliases::INDUSTRY,
            Self::State => aliases::STATE,
        }
    }

    fn pattern(self) -> &'static dyn CellPattern {
        match self {
            Self::Classification => &CodeShape::Classification,
            Self::Occupation => &CodeShape::Occupation,
            Self::Industry => &CodeShape::Industry,
            Self::State => &*STATE_SHAPE,
        }
    }

    /// Canonical key of a context cell
    fn normalize(self, cell: &str) -> Option<String> {
        match self {
            Self::Classification => ClassificationCode::parse(cell).map(|c| c.to_string()),
            Self::Occupation => OccupationCode::parse(cell).map(|c| c.to_string()),
            Self::Industry => IndustryCode::parse(cell).map(|c| c.to_string()),
            Self::State => {
                let value = cell.trim().parse::<f64>().ok()?;
                (value.fract() == 0.0 && value >= 0.0).then(|| format!("{}", value as i64))
            }
        }
    }

    /// Canonical key of a panel row
    fn panel_key(self, person: &PanelRecord) -> Option<String> {
        match self {
            Self::Classification => person.classification_code.as_ref().map(ToString::to_string),
            Self::Occupation => person.occupation_code.as_ref().map(ToString::to_string),
            Self::Industry => person.industry_code.as_ref().map(ToString::to_string),
            Self::State => person.state_code.map(|s| s.to_string()),
        }
    }

    /// Field name used in messages
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Classification => "classification_code",
            Self::Occupation => "occupation_code",
            Self::Industry => "industry_code",
            Self::State => "state_code",
        }
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether and how a context table can be joined
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinPlan {
    /// Context table name
    pub table: String,
    /// Whether the join will run
    pub compatible: bool,
    /// Why the join will or will not run
    pub reason: String,
    /// Panel field used as key
    pub key: Option<ContextKey>,
    /// Context column holding the key
    pub key_column: Option<String>,
}

impl JoinPlan {
    fn skip(table: &str, reason: impl Into<String>) -> Self {
        Self {
            table: table.to_string(),
            compatible: false,
            reason: reason.into(),
            key: None,
            key_column: None,
        }
    }
}

/// Decide whether `table` shares a usable key with the panel
///
/// The first key whose alias is present decides; its column must also have
/// the key's value shape.
#[must_use]
pub fn plan_context_join(name: &str, table: &RawTable) -> JoinPlan {
    if table.is_empty() {
        return JoinPlan::skip(name, "table has no data rows");
    }

    let Some((key, column)) = ContextKey::ALL
        .iter()
        .find_map(|key| key.aliases().resolve(table).map(|c| (*key, c)))
    else {
        return JoinPlan::skip(
            name,
            format!(
                "no shared key column among [{}]",
                table.column_names().join(", ")
            ),
        );
    };

    let score = score_cells(&column.name, &column.cells, key.pattern(), Some(SHAPE_SAMPLE));
    if score.score() <= MIN_KEY_SCORE {
        return JoinPlan::skip(
            name,
            format!(
                "column '{}' does not hold {} values (shape score {:.2})",
                column.name,
                key,
                score.score()
            ),
        );
    }

    JoinPlan {
        table: name.to_string(),
        compatible: true,
        reason: format!(
            "joined on {key} via column '{}' (shape score {:.2})",
            column.name,
            score.score()
        ),
        key: Some(key),
        key_column: Some(column.name.clone()),
    }
}

/// Text columns appended to the panel by one context join
#[derive(Debug, Clone, PartialEq)]
pub struct ContextColumns {
    /// Output columns, parallel to the panel rows
    pub columns: Vec<Column>,
    /// Match diagnostics of the join
    pub report: JoinReport,
    /// Context rows skipped because their key repeated an earlier row
    pub duplicate_keys: usize,
}

struct KeyedRow {
    key: Option<String>,
    weight: f64,
}

impl Weighted for KeyedRow {
    fn weight(&self) -> f64 {
        self.weight
    }
}

/// Left-join a context table onto the panel according to `plan`
///
/// Returns `None` when the plan is not compatible. Context columns other than
/// the key are appended as `<table>_<column>`.
#[must_use]
pub fn join_context(
    panel: &[PanelRecord],
    table: &RawTable,
    plan: &JoinPlan,
) -> Option<ContextColumns> {
    let (Some(key), Some(key_column)) = (plan.key, plan.key_column.as_deref()) else {
        return None;
    };
    let key_cells = &table.column(key_column)?.cells;

    let mut lookup: FxHashMap<String, usize> = FxHashMap::default();
    let mut duplicate_keys = 0;
    for (row, cell) in key_cells.iter().enumerate() {
        if let Some(k) = cell.as_deref().and_then(|c| key.normalize(c)) {
            if lookup.contains_key(&k) {
                duplicate_keys += 1;
            } else {
                lookup.insert(k, row);
            }
        }
    }
    if duplicate_keys > 0 {
        log::warn!(
            "Context table '{}' repeats {duplicate_keys} keys; first occurrence kept",
            plan.table
        );
    }

    let keyed: Vec<KeyedRow> = panel
        .iter()
        .map(|p| KeyedRow {
            key: key.panel_key(p),
            weight: p.weight,
        })
        .collect();
    let outcome = weighted_left_join(keyed, &lookup, |r| r.key.as_ref(), |_, row| row.copied());

    let columns = table
        .columns()
        .iter()
        .filter(|c| c.name != key_column)
        .map(|c| Column {
            name: format!("{}_{}", plan.table, c.name),
            cells: outcome
                .rows
                .iter()
                .map(|row| row.and_then(|r| c.cells[r].clone()))
                .collect(),
        })
        .collect();

    outcome.report.log(&format!("Context join '{}'", plan.table));
    Some(ContextColumns {
        columns,
        report: outcome.report,
        duplicate_keys,
    })
}

/// The panel as a record batch with context columns appended
pub fn extended_panel_batch(
    panel: &[PanelRecord],
    context: &[ContextColumns],
) -> Result<RecordBatch> {
    let base = PanelRecord::to_record_batch(panel)?;
    let mut fields: Vec<Field> = base
        .schema()
        .fields()
        .iter()
        .map(|f| f.as_ref().clone())
        .collect();
    let mut arrays: Vec<ArrayRef> = base.columns().to_vec();

    for column in context.iter().flat_map(|c| &c.columns) {
        fields.push(Field::new(&column.name, DataType::Utf8, true));
        arrays.push(Arc::new(StringArray::from(column.cells.clone())));
    }
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}
