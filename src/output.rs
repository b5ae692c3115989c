// src/output.rs

use parquet::arrow::ArrowWriter;
use parquet::basic::{BrotliLevel, Compression};
use parquet::file::properties::WriterProperties;
use std::{
    fs::{self, File},
    path::PathBuf,
};
use tracing::debug;

use crate::decode::DecodedTable;
use crate::error::{Error, Result};
use crate::model::FileType;

/// Where decoded tables land: `<root>/<type>/<type>-<year>[-<table>].parquet`.
#[derive(Debug, Clone)]
pub struct OutputStore {
    root: PathBuf,
}

impl OutputStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, file_type: FileType, year: u16, table: &str) -> PathBuf {
        let stem = if table.is_empty() {
            format!("{}-{}", file_type.tag(), year)
        } else {
            format!("{}-{}-{}", file_type.tag(), year, table)
        };
        self.root
            .join(file_type.tag())
            .join(format!("{stem}.parquet"))
    }

    /// Presence of the output is what marks a table as done.
    pub fn exists(&self, file_type: FileType, year: u16, table: &str) -> bool {
        self.path_for(file_type, year, table).is_file()
    }

    /// Write to a sibling temp file, then rename over the target.
    pub fn write(
        &self,
        file_type: FileType,
        year: u16,
        table: &str,
        decoded: &DecodedTable,
    ) -> Result<PathBuf> {
        let out_path = self.path_for(file_type, year, table);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let temp_path = out_path.with_extension("parquet.tmp");

        let batch = decoded.to_record_batch()?;
        let props = WriterProperties::builder()
            .set_compression(Compression::BROTLI(BrotliLevel::try_new(5)?))
            .set_dictionary_enabled(true)
            .build();

        let file = File::create(&temp_path).map_err(|e| Error::io(&temp_path, e))?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
        writer.write(&batch)?;
        writer.close()?;

        fs::rename(&temp_path, &out_path).map_err(|e| Error::io(&out_path, e))?;
        debug!(path = %out_path.display(), rows = batch.num_rows(), "wrote table");
        Ok(out_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode;
    use crate::spec::ResolvedWidths;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::path::Path;
    use tempfile::tempdir;

    #[test]
    fn paths_follow_type_year_table() {
        let store = OutputStore::new("out");
        assert_eq!(
            store.path_for(FileType::Aggregate, 2003, "a11"),
            Path::new("out/aggr/aggr-2003-a11.parquet")
        );
        assert_eq!(
            store.path_for(FileType::Transmittal, 1998, ""),
            Path::new("out/trans/trans-1998.parquet")
        );
    }

    #[test]
    fn written_table_reads_back() -> Result<()> {
        let dir = tempdir().map_err(|e| Error::io("tempdir", e))?;
        let store = OutputStore::new(dir.path());
        let widths = ResolvedWidths {
            source_year: 2003,
            fields: vec![("table".into(), 5), ("activity_year".into(), 4)],
        };
        let lines = vec!["A1-1 2003".to_string(), "A1-1 2003".to_string()];
        let decoded = decode(&lines, &widths);

        assert!(!store.exists(FileType::Aggregate, 2003, "a11"));
        let path = store.write(FileType::Aggregate, 2003, "a11", &decoded)?;
        assert!(store.exists(FileType::Aggregate, 2003, "a11"));
        assert!(!path.with_extension("parquet.tmp").exists());

        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&path).unwrap())?.build()?;
        let rows: usize = reader.map(|b| b.map(|b| b.num_rows()).unwrap_or(0)).sum();
        assert_eq!(rows, 2);
        Ok(())
    }
}
