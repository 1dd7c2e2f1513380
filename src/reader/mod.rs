//! Reading and writing tabular files.
//!
//! Delimited inputs are read without trusting their header: every file is
//! first decoded as a headerless grid of text cells, and the header row is
//! chosen afterwards by [`RawTable::from_grid`]. Typed outputs go through
//! Arrow record batches and are written as Parquet and CSV.

use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use arrow::array::{Array, StringArray};
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::error::util::{create_output_file, safe_open_file, validate_directory};
use crate::error::{PipelineError, Result};
use crate::models::ArrowSchema;
use crate::table::{CellGrid, RawTable};
use crate::utils::logging::{log_operation_complete, log_operation_start};

/// Rows per decoded batch
const CSV_BATCH_SIZE: usize = 8192;

/// Field count of the widest record in a delimited file
///
/// Sheet exports often carry a title row without trailing delimiters, so the
/// first record says nothing about the width of the rows below it.
fn delimited_width<R: Read>(reader: R) -> Result<usize> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut record = csv::ByteRecord::new();
    let mut width = 0;
    while csv
        .read_byte_record(&mut record)
        .map_err(|e| ArrowError::CsvError(e.to_string()))?
    {
        width = width.max(record.len());
    }
    Ok(width)
}

/// Read a delimited file as a grid of optional text cells, header included
pub fn read_delimited_grid(path: &Path) -> Result<CellGrid> {
    let file = safe_open_file(path, "delimited table")?;
    let mut reader = BufReader::new(file);

    let width = delimited_width(&mut reader)?;
    if width == 0 {
        return Ok(Vec::new());
    }

    // Decode every cell as text; typing happens after column detection
    let text_schema = Schema::new(
        (1..=width)
            .map(|i| Field::new(format!("column_{i}"), DataType::Utf8, true))
            .collect::<Vec<_>>(),
    );

    reader.seek(SeekFrom::Start(0))?;
    let csv = ReaderBuilder::new(Arc::new(text_schema))
        .with_header(false)
        .with_truncated_rows(true)
        .with_batch_size(CSV_BATCH_SIZE)
        .build(reader)?;

    let mut grid = CellGrid::new();
    for batch in csv {
        append_rows(&mut grid, &batch?)?;
    }
    Ok(grid)
}

fn append_rows(grid: &mut CellGrid, batch: &RecordBatch) -> Result<()> {
    let columns = batch
        .columns()
        .iter()
        .map(|c| {
            c.as_any().downcast_ref::<StringArray>().ok_or_else(|| {
                PipelineError::Arrow(ArrowError::CastError(
                    "delimited cell column is not text".to_string(),
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    for row in 0..batch.num_rows() {
        grid.push(
            columns
                .iter()
                .map(|c| (!c.is_null(row)).then(|| c.value(row).to_string()))
                .collect(),
        );
    }
    Ok(())
}

/// Read a delimited file whose first row is the header
pub fn read_delimited(path: &Path) -> Result<RawTable> {
    let start = Instant::now();
    log_operation_start("Reading delimited table", path);
    let table = RawTable::from_grid(&read_delimited_grid(path)?, 0);
    log_operation_complete("read", path, table.num_rows(), Some(start.elapsed()));
    Ok(table)
}

/// Read all record batches of a Parquet file
pub fn read_parquet_batches(path: &Path) -> Result<Vec<RecordBatch>> {
    let file = safe_open_file(path, "parquet table")?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    Ok(reader.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Read a Parquet file into typed records
pub fn read_parquet_records<T: ArrowSchema>(path: &Path) -> Result<Vec<T>> {
    let mut records = Vec::new();
    for batch in read_parquet_batches(path)? {
        records.extend(T::from_record_batch(&batch)?);
    }
    Ok(records)
}

/// Whether a path names a Parquet file
#[must_use]
pub fn is_parquet(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"))
}

/// Read a CSV or Parquet file as a loosely-typed table
pub fn read_table(path: &Path) -> Result<RawTable> {
    if is_parquet(path) {
        let start = Instant::now();
        log_operation_start("Reading parquet table", path);
        let table = RawTable::from_batches(&read_parquet_batches(path)?)?;
        log_operation_complete("read", path, table.num_rows(), Some(start.elapsed()));
        Ok(table)
    } else {
        read_delimited(path)
    }
}

/// Write a record batch as CSV with a header row
pub fn write_csv(path: &Path, batch: &RecordBatch) -> Result<()> {
    let file = create_output_file(path)?;
    let mut writer = WriterBuilder::new().with_header(true).build(file);
    writer.write(batch)?;
    Ok(())
}

/// Write a record batch as a Snappy-compressed Parquet file
pub fn write_parquet(path: &Path, batch: &RecordBatch) -> Result<()> {
    let file = create_output_file(path)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

/// Persist typed records as `<stem>.parquet` and `<stem>.csv` under `dir`
///
/// Returns the two paths written.
pub fn write_records<T: ArrowSchema>(
    dir: &Path,
    stem: &str,
    records: &[T],
) -> Result<(PathBuf, PathBuf)> {
    let batch = T::to_record_batch(records)?;
    let parquet_path = dir.join(format!("{stem}.parquet"));
    let csv_path = dir.join(format!("{stem}.csv"));
    write_parquet(&parquet_path, &batch)?;
    write_csv(&csv_path, &batch)?;
    log::info!(
        "Wrote {} rows to {} and {}",
        batch.num_rows(),
        parquet_path.display(),
        csv_path.display()
    );
    Ok((parquet_path, csv_path))
}

/// A workbook seen as a set of named sheets, each a grid of cells
pub trait SheetSource {
    /// Cells of `sheet`, or `None` when the workbook has no such sheet
    fn read_grid(&self, sheet: &str) -> Result<Option<CellGrid>>;

    /// Where the workbook lives, for messages
    fn location(&self) -> &Path;
}

/// A workbook exported as one delimited file per sheet (`<dir>/<sheet>.csv`)
#[derive(Debug, Clone)]
pub struct DirectorySheetSource {
    dir: PathBuf,
}

impl DirectorySheetSource {
    /// Open a workbook export directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        validate_directory(&dir, "crosswalk workbook")?;
        Ok(Self { dir })
    }

    /// Path of the export holding `sheet`
    #[must_use]
    pub fn sheet_path(&self, sheet: &str) -> PathBuf {
        self.dir.join(format!("{sheet}.csv"))
    }
}

impl SheetSource for DirectorySheetSource {
    fn read_grid(&self, sheet: &str) -> Result<Option<CellGrid>> {
        let path = self.sheet_path(sheet);
        if !path.is_file() {
            log::debug!("Sheet '{sheet}' not present at {}", path.display());
            return Ok(None);
        }
        read_delimited_grid(&path).map(Some)
    }

    fn location(&self) -> &Path {
        &self.dir
    }
}
