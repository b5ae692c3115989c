//! Run configuration: directories, pool size and execution mode.
//!
//! Loaded from an optional YAML file; command-line flags override it.

use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf};

use crate::error::{Error, Result};

pub const DEFAULT_WORKERS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One unit at a time on a single worker; for debugging.
    Sequential,
    #[default]
    Parallel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the downloaded `NNexp_<type>.zip` archives.
    pub downloads_dir: PathBuf,
    /// Directory holding `specs_<type>[_<table>].csv` width specifications.
    pub specs_dir: PathBuf,
    /// Root of the decoded output tree.
    pub out_dir: PathBuf,
    pub workers: usize,
    pub mode: ExecutionMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            downloads_dir: PathBuf::from("downloads"),
            specs_dir: PathBuf::from("specs"),
            out_dir: PathBuf::from("out"),
            workers: DEFAULT_WORKERS,
            mode: ExecutionMode::Parallel,
        }
    }
}

impl Config {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Self::parse(text, "<inline>")
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::parse(&text, &path.display().to_string())
    }

    fn parse(text: &str, origin: &str) -> Result<Self> {
        let cfg: Config = serde_yaml::from_str(text)
            .map_err(|e| Error::config(format!("{origin}: invalid YAML: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::config("workers must be at least 1"));
        }
        Ok(())
    }
}
