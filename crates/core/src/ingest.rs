//! Table-definition CSV ingestion and validation.
//!
//! # File Format
//!
//! ```text
//! Table Instance;1;2
//! ;0.0;1.5
//! ;0.25;1.5
//! ;0.5;
//! ```
//!
//! - Cells are separated by `;` and may carry surrounding whitespace
//! - The header names the table instance each data column is loaded into
//! - The first column of body rows is a label column and is ignored
//! - A data column ends at its first empty or non-numeric cell; every later
//!   cell in that column must be empty
//!
//! Validation is all-or-nothing: the first violation aborts ingestion and no
//! partial [`TableSet`] is produced.

use crate::error::{Result, ValidationError};
use crate::table::{Column, TableInstance, TableSet, MAX_INSTANCES, MAX_SAMPLES, MIN_SAMPLES};
use std::path::Path;
use tracing::{debug, info};

/// Required content of the first header cell.
pub const HEADER_LABEL: &str = "Table Instance";

/// Cell separator.
pub const DELIMITER: char = ';';

/// Scan state for one data column.
#[derive(Debug)]
struct ColumnCursor {
    instance: TableInstance,
    samples: Vec<f32>,
    ended: bool,
}

impl ColumnCursor {
    fn new(instance: TableInstance) -> Self {
        Self {
            instance,
            samples: Vec::new(),
            ended: false,
        }
    }

    /// Consume the cell this column holds in `row`.
    fn feed(&mut self, row: usize, cell: &str) -> Result<()> {
        if self.ended {
            if !cell.is_empty() {
                return Err(ValidationError::NonEmptyAfterEnd {
                    row,
                    instance: self.instance.id(),
                }
                .into());
            }
            return Ok(());
        }

        match cell.parse::<f32>() {
            Ok(sample) => {
                if self.samples.len() == MAX_SAMPLES {
                    return Err(ValidationError::TooManySamples {
                        instance: self.instance.id(),
                        row,
                        max: MAX_SAMPLES,
                    }
                    .into());
                }
                self.samples.push(sample);
            }
            Err(_) => {
                debug!(
                    "table instance {} ends at row {} after {} samples",
                    self.instance,
                    row,
                    self.samples.len()
                );
                self.ended = true;
            }
        }

        Ok(())
    }

    /// Turn the scanned samples into a column; `None` if it never started.
    fn finish(self) -> Result<Option<Column>> {
        match self.samples.len() {
            0 => Ok(None),
            count if count < MIN_SAMPLES => Err(ValidationError::TooFewSamples {
                instance: self.instance.id(),
                count,
                min: MIN_SAMPLES,
            }
            .into()),
            _ => Ok(Some(Column::new(self.samples))),
        }
    }
}

/// Split a row into trimmed cells.
fn split_row(line: &str) -> Vec<&str> {
    line.split(DELIMITER).map(str::trim).collect()
}

/// Parse the header row into one cursor per data column.
fn parse_header(line: &str) -> Result<Vec<ColumnCursor>> {
    let cells = split_row(line);

    let count = cells.len();
    if !(2..=MAX_INSTANCES + 1).contains(&count) {
        return Err(ValidationError::ColumnCountOutOfRange { count }.into());
    }

    if cells[0] != HEADER_LABEL {
        return Err(ValidationError::BadHeaderCell {
            column: 1,
            value: cells[0].to_string(),
        }
        .into());
    }

    let mut cursors: Vec<ColumnCursor> = Vec::with_capacity(count - 1);
    for (index, cell) in cells[1..].iter().enumerate() {
        let instance = cell
            .parse::<u8>()
            .ok()
            .and_then(TableInstance::new)
            .ok_or_else(|| ValidationError::BadHeaderCell {
                column: index + 2,
                value: cell.to_string(),
            })?;

        if cursors.iter().any(|cursor| cursor.instance == instance) {
            return Err(ValidationError::DuplicateInstance {
                instance: instance.id(),
            }
            .into());
        }

        cursors.push(ColumnCursor::new(instance));
    }

    Ok(cursors)
}

/// Validate table-definition text and extract its columns.
///
/// # Errors
/// Returns `Error::Validation` with the first rule the text breaks:
/// - `ColumnCountOutOfRange` if the header has fewer than 2 or more than 5 cells
/// - `BadHeaderCell` if the label or an instance id is wrong
/// - `DuplicateInstance` if an id repeats
/// - `RowLengthMismatch` if a body row's cell count differs from the header
/// - `NonEmptyAfterEnd` if a value follows the end of its column
/// - `TooFewSamples` / `TooManySamples` if a column is outside `2..=16300`
pub fn ingest_table(text: &str) -> Result<TableSet> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut rows = text
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line))
        .filter(|(_, line)| !line.trim().is_empty());

    let mut cursors = match rows.next() {
        Some((_, header)) => parse_header(header)?,
        None => return Err(ValidationError::ColumnCountOutOfRange { count: 0 }.into()),
    };
    let expected = cursors.len() + 1;

    for (row, line) in rows {
        let cells = split_row(line);
        if cells.len() != expected {
            return Err(ValidationError::RowLengthMismatch {
                row,
                expected,
                actual: cells.len(),
            }
            .into());
        }

        for (cursor, cell) in cursors.iter_mut().zip(&cells[1..]) {
            cursor.feed(row, cell)?;
        }
    }

    let mut tables = TableSet::new();
    for cursor in cursors {
        let instance = cursor.instance;
        match cursor.finish()? {
            Some(column) => {
                debug!("table instance {} holds {} samples", instance, column.len());
                tables.insert(instance, column);
            }
            None => debug!("table instance {} is empty, skipping", instance),
        }
    }

    info!("validated {} lookup table(s)", tables.len());
    Ok(tables)
}

/// Read and validate a table-definition file.
///
/// # Errors
/// `Error::Io` if the file cannot be read, otherwise as [`ingest_table`].
pub fn read_table_file(path: impl AsRef<Path>) -> Result<TableSet> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    info!("read table file {}", path.display());
    ingest_table(&text)
}
