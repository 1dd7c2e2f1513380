//! Content-based column classification
//!
//! Headers in reference workbooks change between releases ("2018 Census Code",
//! "Census 2018 Code", "OCC"), so columns are chosen by what their cells look
//! like. Each column is scored by the fraction of its non-missing cells that
//! match a [`CellPattern`]; the best score wins and ties go to the earliest
//! column.

use log::debug;
use regex::Regex;

use crate::codes::CodeShape;

/// A predicate over trimmed, non-empty cells
pub trait CellPattern {
    /// Label used in logs and errors
    fn label(&self) -> &str;

    /// Whether the cell has the expected shape
    fn matches(&self, cell: &str) -> bool;
}

impl CellPattern for CodeShape {
    fn label(&self) -> &str {
        self.as_str()
    }

    fn matches(&self, cell: &str) -> bool {
        CodeShape::matches(self, cell)
    }
}

impl CellPattern for Regex {
    fn label(&self) -> &str {
        self.as_str()
    }

    fn matches(&self, cell: &str) -> bool {
        self.is_match(cell.trim())
    }
}

/// Tuning knobs for the classifier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierOptions {
    /// A winning column must score strictly above this value
    pub min_score: f64,
    /// Score only the first N non-missing cells of each column
    pub max_sample: Option<usize>,
}

impl Default for ClassifierOptions {
    fn default() -> Self {
        Self {
            min_score: 0.0,
            max_sample: None,
        }
    }
}

/// The column chosen for a target
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    /// Position in the input column order
    pub index: usize,
    /// Column name
    pub name: String,
    /// Fraction of sampled non-missing cells that matched
    pub score: f64,
}

/// Failure to find a column for a target pattern
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClassificationError {
    /// No column scored above the threshold
    #[error("no column matches {target} (best score {best_score:.3}); considered: [{}]", .considered.join(", "))]
    NoMatch {
        /// Pattern label
        target: String,
        /// Best score observed
        best_score: f64,
        /// Columns that were scored
        considered: Vec<String>,
    },
}

/// Score of one column against one pattern
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnScore {
    /// Column name
    pub name: String,
    /// Matching cells among those sampled
    pub matched: usize,
    /// Non-missing cells sampled
    pub sampled: usize,
}

impl ColumnScore {
    /// Match fraction, zero for columns without values
    #[must_use]
    pub fn score(&self) -> f64 {
        if self.sampled == 0 {
            0.0
        } else {
            self.matched as f64 / self.sampled as f64
        }
    }
}

/// Score a single column's cells against a pattern
pub fn score_cells<P: CellPattern + ?Sized>(
    name: &str,
    cells: &[Option<String>],
    pattern: &P,
    max_sample: Option<usize>,
) -> ColumnScore {
    let present = cells.iter().filter_map(Option::as_deref).map(str::trim);
    let sample: Vec<&str> = match max_sample {
        Some(limit) => present.take(limit).collect(),
        None => present.collect(),
    };
    let matched = sample.iter().filter(|cell| pattern.matches(cell)).count();
    ColumnScore {
        name: name.to_string(),
        matched,
        sampled: sample.len(),
    }
}

/// Pick the best column for `pattern`, skipping the column at `exclude`
pub fn classify_excluding<'a, I, P>(
    columns: I,
    pattern: &P,
    options: &ClassifierOptions,
    exclude: Option<usize>,
) -> Result<ColumnRef, ClassificationError>
where
    I: IntoIterator<Item = (&'a str, &'a [Option<String>])>,
    P: CellPattern + ?Sized,
{
    let mut best: Option<ColumnRef> = None;
    let mut considered = Vec::new();

    for (index, (name, cells)) in columns.into_iter().enumerate() {
        if Some(index) == exclude {
            continue;
        }
        considered.push(name.to_string());
        let score = score_cells(name, cells, pattern, options.max_sample).score();
        debug!("Column '{name}' scores {score:.3} for {}", pattern.label());

        if best.as_ref().is_none_or(|b| score > b.score) {
            best = Some(ColumnRef {
                index,
                name: name.to_string(),
                score,
            });
        }
    }

    match best {
        Some(winner) if winner.score > options.min_score => Ok(winner),
        other => Err(ClassificationError::NoMatch {
            target: pattern.label().to_string(),
            best_score: other.map_or(0.0, |b| b.score),
            considered,
        }),
    }
}

/// Pick the best column for `pattern`
pub fn classify<'a, I, P>(columns: I, pattern: &P) -> Result<ColumnRef, ClassificationError>
where
    I: IntoIterator<Item = (&'a str, &'a [Option<String>])>,
    P: CellPattern + ?Sized,
{
    classify_excluding(columns, pattern, &ClassifierOptions::default(), None)
}

/// Pick columns for two targets that must land on different columns
///
/// The first target is classified normally. If the second target's winner is
/// the same column, it is recomputed with that column excluded.
pub fn classify_pair<'a, I, P, Q>(
    columns: I,
    first: &P,
    second: &Q,
    options: &ClassifierOptions,
) -> Result<(ColumnRef, ColumnRef), ClassificationError>
where
    I: IntoIterator<Item = (&'a str, &'a [Option<String>])> + Clone,
    P: CellPattern + ?Sized,
    Q: CellPattern + ?Sized,
{
    let first_ref = classify_excluding(columns.clone(), first, options, None)?;
    let second_ref = match classify_excluding(columns.clone(), second, options, None) {
        Ok(r) if r.index == first_ref.index => {
            debug!(
                "Column '{}' won both {} and {}; re-picking {}",
                r.name,
                first.label(),
                second.label(),
                second.label()
            );
            classify_excluding(columns, second, options, Some(first_ref.index))?
        }
        other => other?,
    };
    Ok((first_ref, second_ref))
}
