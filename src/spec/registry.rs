use std::{
    collections::HashMap,
    hash::Hash,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};
use tracing::debug;

use super::table::SpecTable;
use crate::error::{Error, Result};
use crate::model::FileType;

pub const SPEC_CACHE_CAPACITY: usize = 100;

/// Small bounded map that evicts the least recently touched key.
#[derive(Debug)]
struct RecencyCache<K, V> {
    cap: usize,
    map: HashMap<K, V>,
    order: Vec<K>,
}

impl<K: Eq + Hash + Clone, V: Clone> RecencyCache<K, V> {
    fn new(cap: usize) -> Self {
        Self {
            cap,
            map: HashMap::new(),
            order: Vec::new(),
        }
    }

    fn get(&mut self, key: &K) -> Option<V> {
        let value = self.map.get(key).cloned()?;
        self.touch(key);
        Some(value)
    }

    fn insert(&mut self, key: K, value: V) {
        if self.cap == 0 {
            return;
        }
        if self.map.insert(key.clone(), value).is_some() {
            self.touch(&key);
            return;
        }
        self.order.push(key);
        while self.map.len() > self.cap {
            let evict = self.order.remove(0);
            self.map.remove(&evict);
        }
    }

    fn touch(&mut self, key: &K) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            let k = self.order.remove(pos);
            self.order.push(k);
        }
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}

type SpecKey = (FileType, String);

/// Loads spec CSVs from `dir` and keeps recently used ones in memory.
///
/// Two workers asking for the same unseen key may both load it; the second
/// insert simply replaces an identical table.
#[derive(Debug)]
pub struct SpecRegistry {
    dir: PathBuf,
    cache: Mutex<RecencyCache<SpecKey, Arc<SpecTable>>>,
}

impl SpecRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_capacity(dir, SPEC_CACHE_CAPACITY)
    }

    pub fn with_capacity(dir: impl Into<PathBuf>, cap: usize) -> Self {
        Self {
            dir: dir.into(),
            cache: Mutex::new(RecencyCache::new(cap)),
        }
    }

    /// `specs_<type>_<table>.csv`, or `specs_<type>.csv` for the transmittal layout.
    pub fn spec_path(&self, file_type: FileType, table: &str) -> PathBuf {
        let name = if table.is_empty() {
            format!("specs_{}.csv", file_type.tag())
        } else {
            format!("specs_{}_{}.csv", file_type.tag(), table)
        };
        self.dir.join(name)
    }

    pub fn get_spec(&self, file_type: FileType, table: &str) -> Result<Arc<SpecTable>> {
        let key = (file_type, table.to_string());
        if let Some(hit) = self.lock().get(&key) {
            return Ok(hit);
        }

        let path = self.spec_path(file_type, table);
        if !path.is_file() {
            return Err(Error::MissingSpec {
                file_type,
                table: table.to_string(),
                year: None,
            });
        }

        // load without holding the lock; other keys stay readable meanwhile
        let spec = Arc::new(SpecTable::load(file_type, table, &path)?);
        debug!(path = %path.display(), "caching spec");
        self.lock().insert(key, Arc::clone(&spec));
        Ok(spec)
    }

    pub fn cached(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RecencyCache<SpecKey, Arc<SpecTable>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
