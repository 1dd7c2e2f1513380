//! Weighted many-to-one left join
//!
//! Every left row survives the join. Match quality is tracked both by row
//! count and by weight mass, since unmatched rows are often low-weight and a
//! plain match rate overstates the damage.

use std::fmt::Display;
use std::hash::Hash;
use std::io::{BufWriter, Write};
use std::path::Path;

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::error::util::create_output_file;
use crate::error::{PipelineError, Result};
use crate::models::Weighted;

/// Match diagnostics of one join
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JoinReport {
    /// Left rows
    pub total_rows: usize,
    /// Rows whose key was found in the lookup
    pub matched_rows: usize,
    /// Rows without a match, including rows without a key
    pub unmatched_rows: usize,
    /// Rows that had no key at all
    pub missing_key_rows: usize,
    /// Sum of all weights
    pub total_weight: f64,
    /// Weight of matched rows
    pub matched_weight: f64,
    /// Weight of unmatched rows
    pub unmatched_weight: f64,
    /// Weight of rows without a key
    pub missing_key_weight: f64,
}

impl JoinReport {
    /// Matched weight as a percentage of total weight, in `[0, 100]`
    ///
    /// A join where every row matched reports 100 even when all weights are 0.
    #[must_use]
    pub fn matched_weight_share(&self) -> f64 {
        if self.unmatched_rows == 0 {
            return 100.0;
        }
        if self.total_weight <= 0.0 {
            return 0.0;
        }
        (100.0 * self.matched_weight / self.total_weight).clamp(0.0, 100.0)
    }

    /// Matched rows as a percentage of all rows
    #[must_use]
    pub fn matched_row_share(&self) -> f64 {
        if self.total_rows == 0 {
            return 100.0;
        }
        100.0 * self.matched_rows as f64 / self.total_rows as f64
    }

    /// Log the report at info level under `label`
    pub fn log(&self, label: &str) {
        log::info!(
            "{label}: matched {}/{} rows ({:.2}%), weight share {:.2}% ({:.1} of {:.1}); \
             {} rows without key (weight {:.1})",
            self.matched_rows,
            self.total_rows,
            self.matched_row_share(),
            self.matched_weight_share(),
            self.matched_weight,
            self.total_weight,
            self.missing_key_rows,
            self.missing_key_weight
        );
    }
}

/// An unmatched key with the rows and weight it carried
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmatchedKey<K> {
    /// Join key that was not found
    pub key: K,
    /// Left rows with this key
    pub rows: usize,
    /// Summed weight of those rows
    pub weight: f64,
}

/// Result of [`weighted_left_join`]
#[derive(Debug, Clone)]
pub struct JoinOutcome<O, K> {
    /// Joined rows, in left order
    pub rows: Vec<O>,
    /// Per-row match flags, parallel to `rows`
    pub matched: Vec<bool>,
    /// Match diagnostics
    pub report: JoinReport,
    unmatched: FxHashMap<K, (usize, f64)>,
}

impl<O, K: Clone + Ord> JoinOutcome<O, K> {
    /// The `n` unmatched keys with the most weight
    ///
    /// Rows without a key are not included; they are counted in the report.
    /// Ties on weight are ordered by key.
    #[must_use]
    pub fn top_unmatched(&self, n: usize) -> Vec<UnmatchedKey<K>> {
        let mut keys: Vec<UnmatchedKey<K>> = self
            .unmatched
            .iter()
            .map(|(key, &(rows, weight))| UnmatchedKey {
                key: key.clone(),
                rows,
                weight,
            })
            .collect();
        keys.sort_by(|a, b| {
            b.weight
                .total_cmp(&a.weight)
                .then_with(|| a.key.cmp(&b.key))
        });
        keys.truncate(n);
        keys
    }
}

/// Left-join weighted records against a keyed lookup
///
/// `key` extracts the join key of a left row (`None` when missing) and
/// `combine` builds the output row from the left row and its match.
pub fn weighted_left_join<L, K, V, O, FK, FC>(
    left: Vec<L>,
    lookup: &FxHashMap<K, V>,
    key: FK,
    combine: FC,
) -> JoinOutcome<O, K>
where
    L: Weighted,
    K: Eq + Hash + Clone,
    FK: Fn(&L) -> Option<&K>,
    FC: Fn(L, Option<&V>) -> O,
{
    let mut report = JoinReport {
        total_rows: left.len(),
        ..JoinReport::default()
    };
    let mut unmatched: FxHashMap<K, (usize, f64)> = FxHashMap::default();
    let mut rows = Vec::with_capacity(left.len());
    let mut matched = Vec::with_capacity(left.len());

    for record in left {
        let weight = record.weight();
        report.total_weight += weight;

        let found = match key(&record) {
            Some(k) => {
                let found = lookup.get(k);
                if found.is_none() {
                    let entry = unmatched.entry(k.clone()).or_insert((0, 0.0));
                    entry.0 += 1;
                    entry.1 += weight;
                }
                found
            }
            None => {
                report.missing_key_rows += 1;
                report.missing_key_weight += weight;
                None
            }
        };

        if found.is_some() {
            report.matched_rows += 1;
            report.matched_weight += weight;
        } else {
            report.unmatched_rows += 1;
            report.unmatched_weight += weight;
        }
        matched.push(found.is_some());
        rows.push(combine(record, found));
    }

    JoinOutcome {
        rows,
        matched,
        report,
        unmatched,
    }
}

/// Escape a value for CSV output
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Write an unmatched-key report as CSV (`key,rows,weight`)
pub fn write_unmatched_csv<K: Display>(
    path: &Path,
    key_name: &str,
    keys: &[UnmatchedKey<K>],
) -> Result<()> {
    let write_err =
        |e: std::io::Error| PipelineError::io_with_context(e, format!("writing {}", path.display()));
    let mut out = BufWriter::new(create_output_file(path)?);

    writeln!(out, "{},rows,weight", escape_csv(key_name)).map_err(write_err)?;
    for entry in keys {
        writeln!(
            out,
            "{},{},{:.6}",
            escape_csv(&entry.key.to_string()),
            entry.rows,
            entry.weight
        )
        .map_err(write_err)?;
    }
    out.flush().map_err(write_err)?;
    Ok(())
}
