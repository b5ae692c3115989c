use glob::{glob, Pattern};
use once_cell::sync::Lazy;
use regex::Regex;
use std::{
    fs::File,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::model::{ArchiveMember, FileType};

/// `03exp_aggr.zip`, `98exp_trans.zip`, ...
static ARCHIVE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2})exp_(\w+)").expect("static regex"));

/// A downloaded archive whose name carries its year and file type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    pub path: PathBuf,
    pub year: u16,
    pub file_type: FileType,
}

/// Two-digit stubs below 90 are 20xx, the rest 19xx.
pub fn parse_archive_name(name: &str) -> Result<(u16, FileType)> {
    let caps = ARCHIVE_NAME
        .captures(name)
        .ok_or_else(|| Error::InvalidArchiveName {
            name: name.to_string(),
        })?;
    let stub: u16 = caps[1].parse().map_err(|_| Error::InvalidArchiveName {
        name: name.to_string(),
    })?;
    let year = if stub < 90 { 2000 + stub } else { 1900 + stub };
    let file_type = caps[2]
        .parse::<FileType>()
        .map_err(|_| Error::InvalidArchiveName {
            name: name.to_string(),
        })?;
    Ok((year, file_type))
}

/// All `*.zip` files in `dir` with a recognisable name, ordered by (year, type tag).
pub fn discover_archives(dir: &Path) -> Result<Vec<ArchiveFile>> {
    let pattern = format!("{}/*.zip", Pattern::escape(&dir.to_string_lossy()));
    let mut archives = Vec::new();

    for entry in glob(&pattern)? {
        let path = match entry {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "unreadable download entry");
                continue;
            }
        };
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n.to_string(),
            None => continue,
        };
        match parse_archive_name(&name) {
            Ok((year, file_type)) => archives.push(ArchiveFile {
                path,
                year,
                file_type,
            }),
            Err(e) => warn!(error = %e, "skipping archive"),
        }
    }

    archives.sort_by(|a, b| {
        (a.year, a.file_type.tag(), &a.path).cmp(&(b.year, b.file_type.tag(), &b.path))
    });
    debug!(count = archives.len(), dir = %dir.display(), "discovered archives");
    Ok(archives)
}

/// File entries inside one archive, in archive order.
pub fn list_members(archive: &ArchiveFile) -> Result<Vec<ArchiveMember>> {
    let file = File::open(&archive.path).map_err(|e| Error::io(&archive.path, e))?;
    let mut zip = ZipArchive::new(file)?;
    let mut members = Vec::with_capacity(zip.len());
    for i in 0..zip.len() {
        let entry = zip.by_index(i)?;
        if !entry.is_file() {
            continue;
        }
        members.push(ArchiveMember::new(
            &archive.path,
            entry.name(),
            archive.year,
            archive.file_type,
        ));
    }
    Ok(members)
}

/// Every member of every archive in `dir`.
pub fn enumerate_members(dir: &Path) -> Result<Vec<ArchiveMember>> {
    let mut members = Vec::new();
    for archive in discover_archives(dir)? {
        members.extend(list_members(&archive)?);
    }
    Ok(members)
}
