// src/process/mod.rs

pub mod discover;
pub mod orchestrate;

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufRead, BufReader},
    sync::Arc,
};
use tracing::{debug, info, instrument, warn};
use zip::ZipArchive;

use crate::classify::{decode_line, RecordClassifier};
use crate::decode::decode_checked;
use crate::error::{Error, Result};
use crate::model::ArchiveMember;
use crate::output::OutputStore;
use crate::spec::{resolve, SpecRegistry};

/// Per-unit counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessSummary {
    pub lines: u64,
    pub tables_written: u64,
    pub tables_present: u64,
    pub tables_missing_spec: u64,
}

impl ProcessSummary {
    pub fn add(&mut self, other: ProcessSummary) {
        self.lines += other.lines;
        self.tables_written += other.tables_written;
        self.tables_present += other.tables_present;
        self.tables_missing_spec += other.tables_missing_spec;
    }
}

enum TableOutcome {
    Written,
    AlreadyPresent,
}

/// Decodes one archive member end to end: classify, group, resolve, decode, persist.
#[derive(Debug, Clone)]
pub struct ArchiveUnitProcessor {
    classifier: RecordClassifier,
    registry: Arc<SpecRegistry>,
    output: OutputStore,
}

impl ArchiveUnitProcessor {
    pub fn new(registry: Arc<SpecRegistry>, output: OutputStore) -> Self {
        Self {
            classifier: RecordClassifier::new(),
            registry,
            output,
        }
    }

    pub fn with_classifier(mut self, classifier: RecordClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Reopen the member from its (archive, entry) pair and process it.
    #[instrument(level = "info", skip(self), fields(member = %member))]
    pub fn process(&self, member: &ArchiveMember) -> Result<ProcessSummary> {
        let file = File::open(&member.archive).map_err(|e| Error::io(&member.archive, e))?;
        let mut archive = ZipArchive::new(file)?;
        let entry = archive.by_name(&member.member)?;
        self.process_reader(member, BufReader::new(entry))
    }

    pub fn process_reader<R: BufRead>(
        &self,
        member: &ArchiveMember,
        reader: R,
    ) -> Result<ProcessSummary> {
        let origin = member.to_string();
        let (groups, lines) = self
            .group_lines(reader, &origin)
            .map_err(|e| e.in_member(origin.clone()))?;
        debug!(lines, tables = groups.len(), "classified member");

        let mut summary = ProcessSummary {
            lines,
            ..Default::default()
        };

        for (table, records) in &groups {
            match self.process_table(member, table, records) {
                Ok(TableOutcome::Written) => summary.tables_written += 1,
                Ok(TableOutcome::AlreadyPresent) => summary.tables_present += 1,
                Err(e) if e.is_missing_spec() => {
                    warn!(
                        file_type = %member.file_type,
                        table = %table,
                        year = member.year,
                        error = %e,
                        "skipping table with missing spec"
                    );
                    summary.tables_missing_spec += 1;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(summary)
    }

    /// Classify every line, bucketing records by table id in line order.
    fn group_lines<R: BufRead>(
        &self,
        mut reader: R,
        origin: &str,
    ) -> Result<(BTreeMap<String, Vec<String>>, u64)> {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut buf = Vec::new();
        let mut count = 0u64;

        loop {
            buf.clear();
            let n = reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| Error::io(origin, e))?;
            if n == 0 {
                break;
            }
            let record = decode_line(&buf);
            if record.is_empty() {
                continue;
            }
            let table = self.classifier.table_id(&record)?;
            groups.entry(table).or_default().push(record);
            count += 1;
        }

        Ok((groups, count))
    }

    fn process_table(
        &self,
        member: &ArchiveMember,
        table: &str,
        records: &[String],
    ) -> Result<TableOutcome> {
        let (file_type, year) = (member.file_type, member.year);

        if self.output.exists(file_type, year, table) {
            info!(%file_type, year, table, "output already exists");
            return Ok(TableOutcome::AlreadyPresent);
        }

        let spec = self
            .registry
            .get_spec(file_type, table)
            .map_err(|e| match e {
                Error::MissingSpec {
                    file_type, table, ..
                } => Error::MissingSpec {
                    file_type,
                    table,
                    year: Some(year),
                },
                other => other,
            })?;
        if !spec.duplicate_years().is_empty() {
            warn!(
                %file_type,
                year,
                table,
                duplicates = ?spec.duplicate_years(),
                "duplicate file specs"
            );
        }

        let record_length = records.first().map_or(0, |r| r.chars().count());
        let widths = resolve(&spec, year, record_length)?;

        info!(%file_type, year, table, rows = records.len(), "parsing table");
        let decoded = decode_checked(records, &widths, file_type, year, table)?;
        self.output.write(file_type, year, table, &decoded)?;
        Ok(TableOutcome::Written)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::FileType;
    use std::{fs, io::Write, path::Path};
    use tempfile::TempDir;
    use tracing_subscriber::{fmt, EnvFilter};
    use zip::write::SimpleFileOptions;
    use zip::CompressionMethod;

    pub(crate) fn init_logging() {
        let _ = fmt()
            .with_env_filter(EnvFilter::new("debug"))
            .with_test_writer()
            .try_init();
    }

    pub(crate) fn write_zip(path: &Path, members: &[(&str, &str)]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, body) in members {
            zip.start_file(*name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    /// specs/ with a1 (2003, 20 wide), b2 (2001, 15 wide) and transmittal (2003).
    pub(crate) fn write_specs(dir: &Path) {
        fs::create_dir_all(dir).unwrap();
        fs::write(
            dir.join("specs_aggr_a1.csv"),
            "year,table,activity_year,msa,count\n2003,5,4,5,6\n",
        )
        .unwrap();
        fs::write(
            dir.join("specs_aggr_b2.csv"),
            "year,table,activity_year,count\n2001,5,4,6\n",
        )
        .unwrap();
        fs::write(
            dir.join("specs_trans.csv"),
            "year,respondent_id,agency_code,activity_year,respondent_st\n2003,10,1,4,2\n",
        )
        .unwrap();
    }

    struct Fixture {
        _dir: TempDir,
        archive: std::path::PathBuf,
        out: std::path::PathBuf,
        unit: ArchiveUnitProcessor,
    }

    fn fixture(body: &str) -> Fixture {
        init_logging();
        let dir = tempfile::tempdir().unwrap();
        let specs = dir.path().join("specs");
        write_specs(&specs);
        let archive = dir.path().join("03exp_aggr.zip");
        write_zip(&archive, &[("aggr.dat", body)]);
        let out = dir.path().join("out");
        let unit = ArchiveUnitProcessor::new(
            Arc::new(SpecRegistry::new(&specs)),
            OutputStore::new(&out),
        )
        .with_classifier(RecordClassifier::with_current_year(2024));
        Fixture {
            _dir: dir,
            archive,
            out,
            unit,
        }
    }

    const AGGR_2003: &str = "A1-0 200301234000012\r\n\
A1-0 200301234000400\r\n\
B2-0 2003000007\r\n\
X7-1 2003 no spec for this one\r\n\
\r\n";

    #[test]
    fn groups_are_decoded_independently_of_missing_specs() -> Result<()> {
        let fx = fixture(AGGR_2003);
        let member = ArchiveMember::new(&fx.archive, "aggr.dat", 2003, FileType::Aggregate);

        let summary = fx.unit.process(&member)?;
        assert_eq!(summary.lines, 4);
        assert_eq!(summary.tables_written, 2);
        assert_eq!(summary.tables_missing_spec, 1);

        assert!(fx.out.join("aggr/aggr-2003-a1.parquet").is_file());
        // b2 only has a 2001 row; same 15-char length stands in for 2003
        assert!(fx.out.join("aggr/aggr-2003-b2.parquet").is_file());
        assert!(!fx.out.join("aggr/aggr-2003-x71.parquet").exists());
        Ok(())
    }

    #[test]
    fn second_run_does_no_work_and_leaves_output_untouched() -> Result<()> {
        let fx = fixture(AGGR_2003);
        let member = ArchiveMember::new(&fx.archive, "aggr.dat", 2003, FileType::Aggregate);
        fx.unit.process(&member)?;
        let a1 = fx.out.join("aggr/aggr-2003-a1.parquet");
        let before = fs::read(&a1).unwrap();
        let modified = fs::metadata(&a1).unwrap().modified().unwrap();

        let again = fx.unit.process(&member)?;
        assert_eq!(again.tables_written, 0);
        assert_eq!(again.tables_present, 2);
        assert_eq!(fs::read(&a1).unwrap(), before);
        assert_eq!(fs::metadata(&a1).unwrap().modified().unwrap(), modified);
        Ok(())
    }

    #[test]
    fn bad_line_aborts_the_member_with_its_identity() {
        let fx = fixture("A1-0 200301234000012\nthis is not a record\n");
        let member = ArchiveMember::new(&fx.archive, "aggr.dat", 2003, FileType::Aggregate);

        let err = fx.unit.process(&member).unwrap_err();
        match &err {
            Error::Classification { line, member } => {
                assert_eq!(line, "this is not a record");
                let ctx = member.as_deref().unwrap();
                assert!(ctx.contains("aggr.dat") && ctx.contains("2003"), "{ctx}");
            }
            other => panic!("unexpected {other:?}"),
        }
        // nothing decoded before classification finished
        assert!(!fx.out.join("aggr/aggr-2003-a1.parquet").exists());
    }

    #[test]
    fn single_character_line_is_not_skipped() {
        let fx = fixture("A1-0 200301234000012\n\r\nX\n");
        let member = ArchiveMember::new(&fx.archive, "aggr.dat", 2003, FileType::Aggregate);
        match fx.unit.process(&member).unwrap_err() {
            Error::Classification { line, .. } => assert_eq!(line, "X"),
            other => panic!("unexpected {other:?}"),
        }
    }

    struct FailingReader;

    impl std::io::Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "corrupt entry"))
        }
    }

    #[test]
    fn read_failure_names_the_member() {
        let fx = fixture("");
        let member = ArchiveMember::new(&fx.archive, "aggr.dat", 2003, FileType::Aggregate);
        let err = fx
            .unit
            .process_reader(&member, BufReader::new(FailingReader))
            .unwrap_err();
        match err {
            Error::Io { path, .. } => {
                let path = path.to_string_lossy().into_owned();
                assert!(path.contains("aggr.dat") && path.contains("2003"), "{path}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn misaligned_layout_is_not_persisted() {
        // a1 spec is 20 wide with a 4-wide year; a stray letter shifts the year right
        let fx = fixture("A1-0 X20030123400001\n");
        let member = ArchiveMember::new(&fx.archive, "aggr.dat", 2003, FileType::Aggregate);
        let err = fx.unit.process(&member).unwrap_err();
        assert!(matches!(err, Error::DecodeAssertion { .. }), "{err}");
        assert!(!fx.out.join("aggr/aggr-2003-a1.parquet").exists());
    }

    #[test]
    fn transmittal_member_writes_table_without_suffix() -> Result<()> {
        let fx = fixture("");
        let archive = fx.archive.with_file_name("03exp_trans.zip");
        write_zip(
            &archive,
            &[("trans.dat", "000001234522003NY\n000009876512003CA\n")],
        );
        let member = ArchiveMember::new(&archive, "trans.dat", 2003, FileType::Transmittal);
        let summary = fx.unit.process(&member)?;
        assert_eq!(summary.tables_written, 1);
        assert!(fx.out.join("trans/trans-2003.parquet").is_file());
        Ok(())
    }
}
