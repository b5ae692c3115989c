//! Error taxonomy for classification, spec lookup, decoding and persistence.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::FileType;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A line matched neither the table-record nor the transmittal pattern.
    #[error("record matches no known layout{}: {line:?}", member_suffix(.member))]
    Classification {
        line: String,
        member: Option<String>,
    },

    /// A transmittal record declares an out-of-domain agency code or year.
    #[error("invalid transmittal record{}: {reason} in {line:?}", member_suffix(.member))]
    Validation {
        line: String,
        reason: String,
        member: Option<String>,
    },

    #[error("no spec for {file_type} table {table:?}{}", year_suffix(.year))]
    MissingSpec {
        file_type: FileType,
        table: String,
        year: Option<u16>,
    },

    /// Decoded columns did not have the expected kinds; widths are probably misaligned.
    #[error("decoded {file_type} {year} table {table:?}: column {column:?} {problem}")]
    DecodeAssertion {
        file_type: FileType,
        year: u16,
        table: String,
        column: String,
        problem: String,
    },

    #[error("malformed spec file {path}: {reason}")]
    SpecFormat { path: PathBuf, reason: String },

    #[error("archive name {name:?} does not encode a year and file type")]
    InvalidArchiveName { name: String },

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("worker task failed: {message}")]
    Worker { message: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("glob error: {0}")]
    Glob(#[from] glob::PatternError),
}

fn member_suffix(member: &Option<String>) -> String {
    member
        .as_deref()
        .map(|m| format!(" in {m}"))
        .unwrap_or_default()
}

fn year_suffix(year: &Option<u16>) -> String {
    year.map(|y| format!(" at year {y}")).unwrap_or_default()
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Attach the identity of the archive member a record-level error came from.
    /// Other variants pass through untouched.
    pub fn in_member(self, context: impl Into<String>) -> Self {
        match self {
            Self::Classification { line, .. } => Self::Classification {
                line,
                member: Some(context.into()),
            },
            Self::Validation { line, reason, .. } => Self::Validation {
                line,
                reason,
                member: Some(context.into()),
            },
            other => other,
        }
    }

    /// The only kind the unit processor absorbs.
    pub fn is_missing_spec(&self) -> bool {
        matches!(self, Self::MissingSpec { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_context_keeps_the_variant() {
        let err = Error::Classification {
            line: "garbage".into(),
            member: None,
        }
        .in_member("03exp_aggr.zip!aggr.dat (2003 aggr)");

        match &err {
            Error::Classification { member, .. } => {
                assert_eq!(member.as_deref(), Some("03exp_aggr.zip!aggr.dat (2003 aggr)"))
            }
            other => panic!("unexpected variant {other:?}"),
        }
        assert!(err.to_string().contains("in 03exp_aggr.zip!aggr.dat"));
    }

    #[test]
    fn missing_spec_message_names_the_year() {
        let err = Error::MissingSpec {
            file_type: FileType::Disclosure,
            table: "x7".into(),
            year: Some(2004),
        };
        assert!(err.is_missing_spec());
        assert_eq!(err.to_string(), "no spec for discl table \"x7\" at year 2004");
    }
}
