//! Decoding of fixed-width regulatory flat-file archives into typed tables.
//!
//! Lines are classified by their structural prefix, grouped per table,
//! matched to a year-indexed width spec and written out as Parquet, one
//! archive member per task on a bounded worker pool.

pub mod classify;
pub mod config;
pub mod decode;
pub mod error;
pub mod model;
pub mod output;
pub mod process;
pub mod spec;

pub use config::{Config, ExecutionMode};
pub use error::{Error, Result};
pub use model::{ArchiveMember, FileType};
pub use process::{
    orchestrate::{BatchOrchestrator, BatchSummary},
    ArchiveUnitProcessor, ProcessSummary,
};
