//! Locating fields in tables whose schema is not known in advance.
//!
//! Two strategies are used: [`aliases`] resolves a field by its historical
//! header names, and [`classify`] picks a column by the shape of its values.

pub mod aliases;
pub mod classify;

pub use aliases::FieldAliases;
pub use classify::{
    CellPattern, ClassificationError, ClassifierOptions, ColumnRef, classify, classify_excluding,
    classify_pair,
};

use crate::codes::CodeShape;
use crate::error::{PipelineError, Result};
use crate::table::{Column, RawTable};

/// Find a required code column: by alias first, then by content
///
/// Columns named by any of the `skip` fields are left out of the content
/// search. Fails with a schema-detection error listing every column of the
/// table.
pub fn locate_code_column<'t>(
    table: &'t RawTable,
    aliases: &FieldAliases,
    shape: CodeShape,
    skip: &[FieldAliases],
    options: &ClassifierOptions,
) -> Result<&'t Column> {
    if let Some(column) = aliases.resolve(table) {
        log::debug!("Resolved {} by alias '{}'", aliases.field, column.name);
        return Ok(column);
    }

    let columns = table.columns().iter().map(|c| {
        let cells: &[Option<String>] = if skip.iter().any(|field| field.names(&c.name)) {
            &[]
        } else {
            &c.cells
        };
        (c.name.as_str(), cells)
    });
    match classify_excluding(columns, &shape, options, None) {
        Ok(found) => {
            log::info!(
                "No {} alias present; using column '{}' by content (score {:.3})",
                aliases.field,
                found.name,
                found.score
            );
            Ok(&table.columns()[found.index])
        }
        Err(_) => Err(PipelineError::schema_detection(
            aliases.field,
            &table.column_names(),
        )),
    }
}

/// Find a required column by alias only
pub fn require_alias<'t>(table: &'t RawTable, aliases: &FieldAliases) -> Result<&'t Column> {
    aliases
        .resolve(table)
        .ok_or_else(|| PipelineError::schema_detection(aliases.field, &table.column_names()))
}
