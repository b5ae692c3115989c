// src/decode/mod.rs

pub mod column;

use arrow::datatypes::{Field, Schema as ArrowSchema};
use arrow::record_batch::RecordBatch;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::debug;

pub use column::{Column, ColumnKind};

use crate::error::{Error, Result};
use crate::model::FileType;
use crate::spec::ResolvedWidths;

/// Decoded rows of one table group, stored column-wise in field order.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTable {
    columns: Vec<Column>,
    rows: usize,
}

impl DecodedTable {
    pub fn num_rows(&self) -> usize {
        self.rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Cells of row `idx` as (field, value) pairs.
    pub fn row(&self, idx: usize) -> Option<Vec<(&str, Option<&str>)>> {
        (idx < self.rows).then(|| {
            self.columns
                .iter()
                .map(|c| (c.name.as_str(), c.values[idx].as_deref()))
                .collect()
        })
    }

    pub fn schema(&self) -> Arc<ArrowSchema> {
        let fields: Vec<Field> = self
            .columns
            .iter()
            .map(|c| Field::new(&c.name, c.kind.arrow_type(), true))
            .collect();
        Arc::new(ArrowSchema::new(fields))
    }

    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let arrays = self.columns.iter().map(Column::to_array).collect();
        Ok(RecordBatch::try_new(self.schema(), arrays)?)
    }
}

/// Cut one record into `widths.len()` cells, left to right by character count.
///
/// Cells are trimmed inside their own span; blank cells and cells past the end
/// of a short line are `None`. Returns whether the line ran past the last field.
fn split_record(line: &str, widths: &[usize]) -> (Vec<Option<String>>, bool) {
    let mut cells = Vec::with_capacity(widths.len());
    let mut rest = line;
    for &w in widths {
        let end = rest
            .char_indices()
            .nth(w)
            .map_or(rest.len(), |(i, _)| i);
        let (field, tail) = rest.split_at(end);
        rest = tail;
        let v = field.trim();
        cells.push((!v.is_empty()).then(|| v.to_string()));
    }
    (cells, !rest.is_empty())
}

/// Split same-layout lines into a table labelled with the resolved field names.
pub fn decode(lines: &[String], widths: &ResolvedWidths) -> DecodedTable {
    let spans: Vec<usize> = widths.fields.iter().map(|(_, w)| *w).collect();

    let split: Vec<(Vec<Option<String>>, bool)> = lines
        .par_iter()
        .map(|line| split_record(line, &spans))
        .collect();

    let overlong = split.iter().filter(|(_, over)| *over).count();
    if overlong > 0 {
        debug!(overlong, total = widths.total(), "lines longer than the layout");
    }

    let mut values: Vec<Vec<Option<String>>> = spans
        .iter()
        .map(|_| Vec::with_capacity(lines.len()))
        .collect();
    for (cells, _) in split {
        for (col, cell) in values.iter_mut().zip(cells) {
            col.push(cell);
        }
    }

    let columns = widths
        .names()
        .zip(values)
        .map(|(name, vals)| Column::new(name, vals))
        .collect();

    DecodedTable {
        columns,
        rows: lines.len(),
    }
}

/// Column-kind expectations per file family; a mismatch means the widths
/// do not line up with the records.
fn expectations(file_type: FileType) -> &'static [(&'static str, ColumnKind)] {
    match file_type {
        FileType::Aggregate | FileType::Disclosure => &[
            ("table", ColumnKind::Utf8),
            ("activity_year", ColumnKind::Int64),
        ],
        FileType::Transmittal => &[
            ("agency_code", ColumnKind::Int64),
            ("activity_year", ColumnKind::Int64),
            ("respondent_st", ColumnKind::Utf8),
        ],
        FileType::Census => &[],
    }
}

pub fn check_layout(
    decoded: &DecodedTable,
    file_type: FileType,
    year: u16,
    table: &str,
) -> Result<()> {
    for &(name, expected) in expectations(file_type) {
        let failure = |problem: String| Error::DecodeAssertion {
            file_type,
            year,
            table: table.to_string(),
            column: name.to_string(),
            problem,
        };
        let col = decoded
            .column(name)
            .ok_or_else(|| failure("is missing".into()))?;
        let ok = if expected.is_text() {
            col.kind.is_text()
        } else {
            col.kind.is_numeric()
        };
        if !ok {
            let want = if expected.is_text() { "text" } else { "numeric" };
            return Err(failure(format!("should be {want}, decoded as {:?}", col.kind)));
        }
    }
    Ok(())
}

/// `decode` followed by `check_layout`.
pub fn decode_checked(
    lines: &[String],
    widths: &ResolvedWidths,
    file_type: FileType,
    year: u16,
    table: &str,
) -> Result<DecodedTable> {
    let decoded = decode(lines, widths);
    check_layout(&decoded, file_type, year, table)?;
    Ok(decoded)
}
