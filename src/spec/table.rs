use csv::ReaderBuilder;
use std::{
    collections::BTreeMap,
    fs::File,
    io::Read,
    path::Path,
};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::FileType;

/// Column widths per reporting year for one (file type, table) layout.
///
/// A `None` cell means the field does not exist in that year's layout.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecTable {
    pub file_type: FileType,
    pub table: String,
    fields: Vec<String>,
    rows: BTreeMap<u16, Vec<Option<u32>>>,
    duplicate_years: Vec<u16>,
}

impl SpecTable {
    pub fn new(file_type: FileType, table: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            file_type,
            table: table.into(),
            fields,
            rows: BTreeMap::new(),
            duplicate_years: Vec::new(),
        }
    }

    /// Adds a row; a repeated year keeps the first row and is remembered as a duplicate.
    /// Short rows are padded with absent cells.
    pub fn insert_row(&mut self, year: u16, mut widths: Vec<Option<u32>>) -> bool {
        if self.rows.contains_key(&year) {
            self.duplicate_years.push(year);
            return false;
        }
        widths.resize(self.fields.len(), None);
        self.rows.insert(year, widths);
        true
    }

    /// Reads the on-disk CSV form: a header of `<index>,<field>,...` then one
    /// row per year. Widths may be written as floats (`4.0`); empty cells are absent.
    pub fn from_csv<R: Read>(
        file_type: FileType,
        table: &str,
        reader: R,
        origin: &Path,
    ) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let fields: Vec<String> = rdr.headers()?.iter().skip(1).map(str::to_string).collect();
        if fields.is_empty() {
            return Err(Error::SpecFormat {
                path: origin.to_path_buf(),
                reason: "header has no field columns".into(),
            });
        }
        let mut spec = SpecTable::new(file_type, table, fields);

        for (idx, record) in rdr.records().enumerate() {
            let record = record?;
            let year_cell = record.get(0).unwrap_or_default();
            let year = parse_whole(year_cell)
                .and_then(|y| u16::try_from(y).ok())
                .ok_or_else(|| Error::SpecFormat {
                    path: origin.to_path_buf(),
                    reason: format!("row {idx}: bad year {year_cell:?}"),
                })?;

            let mut widths = Vec::with_capacity(spec.fields.len());
            for cell in record.iter().skip(1).take(spec.fields.len()) {
                if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
                    widths.push(None);
                    continue;
                }
                let width = parse_whole(cell)
                    .and_then(|w| u32::try_from(w).ok())
                    .ok_or_else(|| Error::SpecFormat {
                        path: origin.to_path_buf(),
                        reason: format!("row {idx} ({year}): bad width {cell:?}"),
                    })?;
                widths.push(Some(width));
            }
            spec.insert_row(year, widths);
        }

        debug!(
            path = %origin.display(),
            years = spec.rows.len(),
            fields = spec.fields.len(),
            "loaded spec"
        );
        Ok(spec)
    }

    pub fn load(file_type: FileType, table: &str, path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        Self::from_csv(file_type, table, file, path)
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn row(&self, year: u16) -> Option<&[Option<u32>]> {
        self.rows.get(&year).map(Vec::as_slice)
    }

    /// Rows in ascending year order.
    pub fn rows(&self) -> impl DoubleEndedIterator<Item = (u16, &[Option<u32>])> {
        self.rows.iter().map(|(y, w)| (*y, w.as_slice()))
    }

    pub fn duplicate_years(&self) -> &[u16] {
        &self.duplicate_years
    }

    /// Sum of the defined widths in a row.
    pub fn total_width(widths: &[Option<u32>]) -> u64 {
        widths.iter().flatten().map(|&w| u64::from(w)).sum()
    }
}

/// Accepts `40` and `40.0`, rejects fractions and negatives.
fn parse_whole(cell: &str) -> Option<u64> {
    if let Ok(v) = cell.parse::<u64>() {
        return Some(v);
    }
    let f: f64 = cell.parse().ok()?;
    (f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64).then_some(f as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(text: &str) -> Result<SpecTable> {
        SpecTable::from_csv(
            FileType::Aggregate,
            "a1",
            Cursor::new(text.as_bytes().to_vec()),
            Path::new("specs/specs_aggr_a1.csv"),
        )
    }

    #[test]
    fn reads_year_rows_with_absent_cells() -> Result<()> {
        let spec = parse(
            "year,table,activity_year,loan_amt,extra\n\
             2001,5,4,10,\n\
             2005,5.0,4.0,10.0,6\n",
        )?;
        assert_eq!(spec.fields(), ["table", "activity_year", "loan_amt", "extra"]);
        assert_eq!(spec.row(2001).unwrap(), &[Some(5), Some(4), Some(10), None]);
        assert_eq!(spec.row(2005).unwrap(), &[Some(5), Some(4), Some(10), Some(6)]);
        assert_eq!(SpecTable::total_width(spec.row(2001).unwrap()), 19);
        assert!(spec.row(2003).is_none());
        Ok(())
    }

    #[test]
    fn duplicate_years_keep_first_row() -> Result<()> {
        let spec = parse("year,a,b\n2001,1,2\n2001,3,4\n")?;
        assert_eq!(spec.row(2001).unwrap(), &[Some(1), Some(2)]);
        assert_eq!(spec.duplicate_years(), &[2001]);
        Ok(())
    }

    #[test]
    fn short_rows_are_padded() -> Result<()> {
        let spec = parse("year,a,b,c\n1999,1\n")?;
        assert_eq!(spec.row(1999).unwrap(), &[Some(1), None, None]);
        Ok(())
    }

    #[test]
    fn fractional_width_is_rejected() {
        let err = parse("year,a\n2001,2.5\n").unwrap_err();
        assert!(matches!(err, Error::SpecFormat { .. }), "{err}");
    }
}
