//! Person extract ingest
//!
//! Turns a survey extract with an unknown header layout into typed
//! [`PersonRecord`]s. Row-level problems never abort the stage; each kind is
//! counted in [`IngestStats`].

use serde::Serialize;

use crate::codes::{CodeShape, IndustryCode, OccupationCode};
use crate::error::{PipelineError, Result};
use crate::models::{PersonRecord, Sex};
use crate::schema::{ClassifierOptions, aliases, locate_code_column, require_alias};
use crate::table::{Column, RawTable};

/// Counters collected while ingesting the person extract
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    /// Data rows read
    pub rows: usize,
    /// Column used for occupation codes
    pub occupation_column: String,
    /// Column used for weights
    pub weight_column: String,
    /// Rows whose occupation code was blank or did not normalize
    pub missing_occupation: usize,
    /// Rows whose weight was blank, non-numeric or negative (set to 0)
    pub invalid_weight: usize,
    /// Rows with a state value that is not an integer
    pub invalid_state: usize,
    /// Rows with an age value that is not numeric
    pub invalid_age: usize,
    /// Rows with a sex value other than male or female
    pub invalid_sex: usize,
}

/// Parse a numeric cell, accepting float exports of integers
fn parse_number(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_integer(cell: &str) -> Option<i32> {
    let value = parse_number(cell)?;
    (value.fract() == 0.0 && value >= f64::from(i32::MIN) && value <= f64::from(i32::MAX))
        .then_some(value as i32)
}

/// Parse an optional column cell, counting values that are present but invalid
fn optional_cell<T>(
    column: Option<&Column>,
    row: usize,
    parse: impl Fn(&str) -> Option<T>,
    invalid: &mut usize,
) -> Option<T> {
    let cell = column?.cells.get(row)?.as_deref()?;
    let parsed = parse(cell);
    if parsed.is_none() {
        *invalid += 1;
    }
    parsed
}

/// Build person records from a raw survey extract
///
/// The occupation column is found by alias, falling back to content
/// classification over columns that no other person field claims; the weight column must be present under a known alias.
/// State, age, sex and industry are optional.
pub fn persons_from_table(
    table: &RawTable,
    options: &ClassifierOptions,
) -> Result<(Vec<PersonRecord>, IngestStats)> {
    if table.is_empty() {
        return Err(PipelineError::empty_result(
            "ingest",
            "person extract has no data rows",
        ));
    }

    let occupation = locate_code_column(
        table,
        &aliases::OCCUPATION,
        CodeShape::Occupation,
        &[
            aliases::WEIGHT,
            aliases::STATE,
            aliases::AGE,
            aliases::SEX,
            aliases::INDUSTRY,
            aliases::PERSON_IDENTIFIERS,
        ],
        options,
    )?;
    let weight = require_alias(table, &aliases::WEIGHT)?;
    let state = aliases::STATE.resolve(table);
    let age = aliases::AGE.resolve(table);
    let sex = aliases::SEX.resolve(table);
    let industry = aliases::INDUSTRY.resolve(table);

    let mut stats = IngestStats {
        rows: table.num_rows(),
        occupation_column: occupation.name.clone(),
        weight_column: weight.name.clone(),
        ..IngestStats::default()
    };

    let mut people = Vec::with_capacity(table.num_rows());
    for row in 0..table.num_rows() {
        let occupation_code = occupation.cells[row]
            .as_deref()
            .and_then(OccupationCode::parse);
        if occupation_code.is_none() {
            stats.missing_occupation += 1;
        }

        let weight = match weight.cells[row].as_deref().and_then(parse_number) {
            Some(w) if w >= 0.0 => w,
            _ => {
                stats.invalid_weight += 1;
                0.0
            }
        };

        people.push(PersonRecord {
            occupation_code,
            weight,
            state_code: optional_cell(state, row, parse_integer, &mut stats.invalid_state),
            age: optional_cell(age, row, parse_number, &mut stats.invalid_age),
            sex: optional_cell(sex, row, Sex::from_code, &mut stats.invalid_sex),
            industry_code: industry
                .and_then(|c| c.cells[row].as_deref())
                .and_then(IndustryCode::parse),
        });
    }

    if stats.missing_occupation > 0 {
        log::warn!(
            "{} of {} persons have no usable occupation code",
            stats.missing_occupation,
            stats.rows
        );
    }
    if stats.invalid_weight > 0 {
        log::warn!(
            "{} persons had a missing or invalid weight; set to 0",
            stats.invalid_weight
        );
    }
    log::info!(
        "Ingested {} persons (occupation column '{}', weight column '{}')",
        people.len(),
        stats.occupation_column,
        stats.weight_column
    );

    Ok((people, stats))
}
