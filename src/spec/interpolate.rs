use tracing::warn;

use super::table::SpecTable;
use crate::error::{Error, Result};

/// Ordered (field, width) pairs for one concrete record layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWidths {
    /// Year of the spec row the widths were taken from.
    pub source_year: u16,
    pub fields: Vec<(String, usize)>,
}

impl ResolvedWidths {
    pub fn total(&self) -> usize {
        self.fields.iter().map(|(_, w)| w).sum()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn from_row(spec: &SpecTable, year: u16, widths: &[Option<u32>]) -> ResolvedWidths {
    let fields = spec
        .fields()
        .iter()
        .zip(widths)
        .filter_map(|(name, w)| w.map(|w| (name.clone(), w as usize)))
        .collect();
    ResolvedWidths {
        source_year: year,
        fields,
    }
}

/// Pick the width vector for `year`.
///
/// The exact year row wins. Failing that, the latest row whose widths add up
/// to `record_length` stands in for it. Two layouts of equal total length but
/// different field boundaries cannot be told apart here.
pub fn resolve(spec: &SpecTable, year: u16, record_length: usize) -> Result<ResolvedWidths> {
    if let Some(widths) = spec.row(year) {
        return Ok(from_row(spec, year, widths));
    }

    let candidate = spec
        .rows()
        .rev()
        .find(|(_, widths)| SpecTable::total_width(widths) == record_length as u64);

    match candidate {
        Some((source_year, widths)) => {
            warn!(
                file_type = %spec.file_type,
                table = %spec.table,
                year,
                source_year,
                record_length,
                "interpolating missing spec"
            );
            Ok(from_row(spec, source_year, widths))
        }
        None => Err(Error::MissingSpec {
            file_type: spec.file_type,
            table: spec.table.clone(),
            year: Some(year),
        }),
    }
}
