// src/classify.rs

use chrono::{Datelike, Local};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};
use crate::model::TRANSMITTAL_TABLE;

/// Table records open with e.g. `A1-2`, `D3-1A` or `A1-0`.
static TABLE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z])(\d)-(\d)([A-Za-z]?)").expect("static regex"));

/// Transmittal records: 10-char respondent id, 1-digit agency code, 4-digit year.
/// Unanchored; the leftmost match wins.
static TRANSMITTAL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(.{10})(\d)(\d{4})").expect("static regex"));

/// Removes `\n` / `\r\n` and decodes as UTF-8, falling back to Latin-1.
///
/// Latin-1 maps every byte to a char, so this never fails.
pub fn decode_line(raw: &[u8]) -> String {
    let mut end = raw.len();
    while end > 0 && matches!(raw[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    let raw = &raw[..end];
    match std::str::from_utf8(raw) {
        Ok(s) => s.to_owned(),
        Err(_) => raw.iter().map(|&b| char::from(b)).collect(),
    }
}

/// Assigns each physical line to a table layout.
#[derive(Debug, Clone, Copy)]
pub struct RecordClassifier {
    current_year: u16,
}

impl Default for RecordClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordClassifier {
    pub fn new() -> Self {
        let year = Local::now().year();
        Self::with_current_year(u16::try_from(year).unwrap_or(u16::MAX))
    }

    /// Transmittal years must fall strictly between 1990 and `current_year`.
    pub fn with_current_year(current_year: u16) -> Self {
        Self { current_year }
    }

    /// Decode a raw line and classify it, handing the decoded record back.
    pub fn classify(&self, raw: &[u8]) -> Result<(String, String)> {
        let record = decode_line(raw);
        let table = self.table_id(&record)?;
        Ok((table, record))
    }

    /// Table id for an already-decoded record; empty for transmittal records.
    pub fn table_id(&self, record: &str) -> Result<String> {
        if let Some(caps) = TABLE_PREFIX.captures(record) {
            // `X9-0...` sub-variants fold into their parent table `x9`
            let id = if &caps[3] == "0" {
                format!("{}{}", &caps[1], &caps[2])
            } else {
                format!("{}{}{}{}", &caps[1], &caps[2], &caps[3], &caps[4])
            };
            return Ok(id.to_lowercase());
        }

        if let Some(caps) = TRANSMITTAL_PATTERN.captures(record) {
            let agency: u8 = caps[2].parse().unwrap_or(0);
            if !(1..=4).contains(&agency) {
                return Err(Error::Validation {
                    line: record.to_string(),
                    reason: format!("agency code {agency} outside 1..=4"),
                    member: None,
                });
            }
            let year: u16 = caps[3].parse().unwrap_or(0);
            if !(year > 1990 && year < self.current_year) {
                return Err(Error::Validation {
                    line: record.to_string(),
                    reason: format!(
                        "year {year} outside (1990, {current})",
                        current = self.current_year
                    ),
                    member: None,
                });
            }
            return Ok(TRANSMITTAL_TABLE.to_string());
        }

        Err(Error::Classification {
            line: record.to_string(),
            member: None,
        })
    }
}
