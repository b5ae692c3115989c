// src/decode/column.rs

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::DataType;
use std::sync::Arc;

/// Inferred column type of a decoded field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Int64,
    Float64,
    Utf8,
}

impl ColumnKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnKind::Int64 | ColumnKind::Float64)
    }

    pub fn is_text(self) -> bool {
        self == ColumnKind::Utf8
    }

    pub fn arrow_type(self) -> DataType {
        match self {
            ColumnKind::Int64 => DataType::Int64,
            ColumnKind::Float64 => DataType::Float64,
            ColumnKind::Utf8 => DataType::Utf8,
        }
    }

    /// Narrowest kind that holds every non-null cell. A column with no
    /// values at all is numeric (all nulls), matching what a reader that
    /// sniffs types would see.
    pub fn infer<'a>(values: impl IntoIterator<Item = &'a Option<String>>) -> Self {
        let mut kind = ColumnKind::Int64;
        let mut seen = false;
        for v in values.into_iter().flatten() {
            seen = true;
            match kind {
                ColumnKind::Int64 if v.parse::<i64>().is_ok() => {}
                ColumnKind::Int64 | ColumnKind::Float64 if is_finite_number(v) => {
                    kind = ColumnKind::Float64
                }
                _ => return ColumnKind::Utf8,
            }
        }
        if seen {
            kind
        } else {
            ColumnKind::Float64
        }
    }
}

/// `inf`, `NaN` and friends parse as `f64` but are text in a record.
fn is_finite_number(v: &str) -> bool {
    v.parse::<f64>().is_ok_and(f64::is_finite)
}

/// One named, typed column; cells keep their trimmed source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub values: Vec<Option<String>>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        let kind = ColumnKind::infer(&values);
        Self {
            name: name.into(),
            kind,
            values,
        }
    }

    pub fn to_array(&self) -> ArrayRef {
        match self.kind {
            ColumnKind::Int64 => Arc::new(
                self.values
                    .iter()
                    .map(|v| v.as_deref().and_then(|s| s.parse::<i64>().ok()))
                    .collect::<Int64Array>(),
            ),
            ColumnKind::Float64 => Arc::new(
                self.values
                    .iter()
                    .map(|v| v.as_deref().and_then(|s| s.parse::<f64>().ok()))
                    .collect::<Float64Array>(),
            ),
            ColumnKind::Utf8 => Arc::new(
                self.values
                    .iter()
                    .map(|v| v.as_deref())
                    .collect::<StringArray>(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;

    fn cells(raw: &[&str]) -> Vec<Option<String>> {
        raw.iter()
            .map(|s| (!s.is_empty()).then(|| s.to_string()))
            .collect()
    }

    #[test]
    fn infers_narrowest_kind() {
        assert_eq!(ColumnKind::infer(&cells(&["2003", "", "17"])), ColumnKind::Int64);
        assert_eq!(ColumnKind::infer(&cells(&["1", "2.5"])), ColumnKind::Float64);
        assert_eq!(ColumnKind::infer(&cells(&["2.5", "7"])), ColumnKind::Float64);
        assert_eq!(ColumnKind::infer(&cells(&["1", "A1-1"])), ColumnKind::Utf8);
        assert_eq!(ColumnKind::infer(&cells(&["", ""])), ColumnKind::Float64);
    }

    #[test]
    fn non_finite_tokens_are_text() {
        assert_eq!(ColumnKind::infer(&cells(&["inf"])), ColumnKind::Utf8);
        assert_eq!(ColumnKind::infer(&cells(&["1.5", "NaN"])), ColumnKind::Utf8);
        assert_eq!(ColumnKind::infer(&cells(&["7", "Infinity"])), ColumnKind::Utf8);
        assert_eq!(ColumnKind::infer(&cells(&["-0.25", "1e3"])), ColumnKind::Float64);
    }

    #[test]
    fn arrays_keep_nulls() {
        let col = Column::new("activity_year", cells(&["2003", "", "2004"]));
        let arr = col.to_array();
        assert_eq!(arr.data_type(), &DataType::Int64);
        assert_eq!(arr.len(), 3);
        assert!(arr.is_null(1));
    }
}
