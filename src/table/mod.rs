//! Loosely-typed tables read from delimited sources and spreadsheet exports
//!
//! A [`RawTable`] is an ordered list of named columns whose cells are optional
//! strings. Cells that are empty after trimming are stored as `None`, so every
//! downstream consumer sees a single notion of "missing".

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, StringArray};
use arrow::compute::kernels::cast::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;

use crate::error::Result;

/// A cell grid as delivered by a sheet source: rows of optional cells
pub type CellGrid = Vec<Vec<Option<String>>>;

/// A single named column of optional string cells
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Header text (trimmed); synthesized as `column_N` when blank
    pub name: String,
    /// Cell values, `None` when missing
    pub cells: Vec<Option<String>>,
}

impl Column {
    /// Create a column from raw cell values, normalizing blanks to `None`
    pub fn new<S: AsRef<str>>(
        name: impl Into<String>,
        cells: impl IntoIterator<Item = Option<S>>,
    ) -> Self {
        Self {
            name: name.into(),
            cells: cells
                .into_iter()
                .map(|c| clean_cell(c.as_ref().map(|s| s.as_ref())))
                .collect(),
        }
    }
}

/// An ordered set of equally long string columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    columns: Vec<Column>,
    num_rows: usize,
}

impl RawTable {
    /// Build a table from columns, padding short columns with missing cells
    #[must_use]
    pub fn from_columns(mut columns: Vec<Column>) -> Self {
        let num_rows = columns.iter().map(|c| c.cells.len()).max().unwrap_or(0);
        for column in &mut columns {
            column.cells.resize(num_rows, None);
        }
        Self { columns, num_rows }
    }

    /// Build a table from a cell grid whose header sits at `header_row`
    ///
    /// Rows above the header are discarded, rows that are entirely empty are
    /// dropped, and blank or duplicate header names are made unique.
    #[must_use]
    pub fn from_grid(grid: &CellGrid, header_row: usize) -> Self {
        let Some(header) = grid.get(header_row) else {
            return Self::default();
        };

        let width = grid
            .iter()
            .skip(header_row)
            .map(Vec::len)
            .max()
            .unwrap_or(0);

        let mut names: Vec<String> = Vec::with_capacity(width);
        for idx in 0..width {
            let base = header
                .get(idx)
                .and_then(|c| clean_cell(c.as_deref()))
                .unwrap_or_else(|| format!("column_{}", idx + 1));
            let mut name = base.clone();
            let mut suffix = 2;
            while names.contains(&name) {
                name = format!("{base}_{suffix}");
                suffix += 1;
            }
            names.push(name);
        }

        let body: Vec<&Vec<Option<String>>> = grid
            .iter()
            .skip(header_row + 1)
            .filter(|row| row.iter().any(|c| clean_cell(c.as_deref()).is_some()))
            .collect();

        let columns = names
            .into_iter()
            .enumerate()
            .map(|(idx, name)| Column {
                name,
                cells: body
                    .iter()
                    .map(|row| row.get(idx).and_then(|c| clean_cell(c.as_deref())))
                    .collect(),
            })
            .collect();

        Self::from_columns(columns)
    }

    /// Build a table from Arrow record batches, casting every column to text
    pub fn from_batches(batches: &[RecordBatch]) -> Result<Self> {
        let Some(first) = batches.first() else {
            return Ok(Self::default());
        };
        let schema = first.schema();
        let mut columns: Vec<Column> = schema
            .fields()
            .iter()
            .map(|f| Column {
                name: f.name().trim().to_string(),
                cells: Vec::new(),
            })
            .collect();

        for batch in batches {
            for (idx, column) in columns.iter_mut().enumerate() {
                let array = as_string_array(batch.column(idx))?;
                let strings = array
                    .as_any()
                    .downcast_ref::<StringArray>()
                    .ok_or_else(|| {
                        arrow::error::ArrowError::CastError(format!(
                            "column {} is not text after cast",
                            column.name
                        ))
                    })?;
                column.cells.extend(
                    (0..strings.len())
                        .map(|i| (!strings.is_null(i)).then(|| strings.value(i)))
                        .map(clean_cell),
                );
            }
        }

        Ok(Self::from_columns(columns))
    }

    /// Number of data rows
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Whether the table has no data rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    /// All columns in order
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in order
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Look up a column by exact name
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Look up a column by name, ignoring ASCII case
    #[must_use]
    pub fn column_ignore_case(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Cell at `row` in the named column
    #[must_use]
    pub fn cell(&self, column: &str, row: usize) -> Option<&str> {
        self.column(column)?.cells.get(row)?.as_deref()
    }
}

fn as_string_array(array: &ArrayRef) -> Result<ArrayRef> {
    if array.data_type() == &DataType::Utf8 {
        return Ok(Arc::clone(array));
    }
    Ok(cast(array, &DataType::Utf8)?)
}

/// Trim a cell; whitespace-only cells (including non-breaking spaces) are missing
fn clean_cell(cell: Option<&str>) -> Option<String> {
    let trimmed = cell?.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
