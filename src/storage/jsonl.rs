//! JSONL file storage with an in-memory cache.
//!
//! One `<collection>.jsonl` file per collection under the base directory.
//! Inserts append; updates and replacements rewrite the file through
//! a temporary sibling and a rename, so a crash never leaves a torn file.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use super::traits::{Filter, HasId, Storage};
use crate::error::{Result, SchedError};

type Cache = HashMap<String, Vec<Value>>;

pub struct JsonlStorage {
    base_path: PathBuf,
    cache: RwLock<Cache>,
}

impl std::fmt::Debug for JsonlStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlStorage")
            .field("base_path", &self.base_path)
            .finish_non_exhaustive()
    }
}

fn record_id(record: &Value) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

impl JsonlStorage {
    /// Open (creating if needed) storage rooted at `base_path`
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        Ok(Self {
            base_path,
            cache: RwLock::new(HashMap::new()),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.base_path.join(format!("{}.jsonl", collection))
    }

    fn read_cache(&self) -> Result<RwLockReadGuard<'_, Cache>> {
        self.cache.read().map_err(|e| SchedError::Storage(e.to_string()))
    }

    fn write_cache(&self) -> Result<RwLockWriteGuard<'_, Cache>> {
        self.cache.write().map_err(|e| SchedError::Storage(e.to_string()))
    }

    /// Load a collection from disk into the cache if not already there
    fn ensure_loaded(&self, collection: &str) -> Result<()> {
        if self.read_cache()?.contains_key(collection) {
            return Ok(());
        }

        let mut cache = self.write_cache()?;
        if cache.contains_key(collection) {
            return Ok(());
        }

        let path = self.collection_path(collection);
        let mut records = Vec::new();
        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            for line in reader.lines() {
                let line = line?;
                if !line.trim().is_empty() {
                    records.push(serde_json::from_str(&line)?);
                }
            }
        }
        log::debug!("Loaded {} records from {}", records.len(), path.display());
        cache.insert(collection.to_string(), records);
        Ok(())
    }

    fn append_to_file(&self, collection: &str, record: &Value) -> Result<()> {
        let path = self.collection_path(collection);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{}", serde_json::to_string(record)?)?;
        Ok(())
    }

    /// Write `records` to a temp file and rename it over the collection file
    fn rewrite_file(&self, collection: &str, records: &[Value]) -> Result<()> {
        let path = self.collection_path(collection);
        let tmp = self.base_path.join(format!(".{}.jsonl.tmp", collection));
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            for record in records {
                writeln!(writer, "{}", serde_json::to_string(record)?)?;
            }
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn records_mut<'a>(cache: &'a mut Cache, collection: &str) -> Result<&'a mut Vec<Value>> {
        cache
            .get_mut(collection)
            .ok_or_else(|| SchedError::Storage(format!("Collection not loaded: {}", collection)))
    }
}

impl Storage for JsonlStorage {
    fn create<T: Serialize + HasId>(&self, collection: &str, record: &T) -> Result<()> {
        self.ensure_loaded(collection)?;
        let value = serde_json::to_value(record)?;

        let mut cache = self.write_cache()?;
        let records = Self::records_mut(&mut cache, collection)?;
        if records.iter().any(|r| record_id(r) == Some(record.id())) {
            return Err(SchedError::Storage(format!(
                "Duplicate id in {}: {}",
                collection,
                record.id()
            )));
        }

        // File first, it is the source of truth
        self.append_to_file(collection, &value)?;
        records.push(value);
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<Option<T>> {
        self.ensure_loaded(collection)?;
        let cache = self.read_cache()?;
        let found = cache
            .get(collection)
            .and_then(|records| records.iter().find(|r| record_id(r) == Some(id)));
        match found {
            Some(record) => Ok(Some(serde_json::from_value(record.clone())?)),
            None => Ok(None),
        }
    }

    fn update<T: Serialize + HasId>(&self, collection: &str, record: &T) -> Result<()> {
        self.ensure_loaded(collection)?;
        let value = serde_json::to_value(record)?;

        let mut cache = self.write_cache()?;
        let records = Self::records_mut(&mut cache, collection)?;
        let position = records
            .iter()
            .position(|r| record_id(r) == Some(record.id()))
            .ok_or_else(|| SchedError::NotFound(format!("{} in {}", record.id(), collection)))?;

        let mut next = records.clone();
        next[position] = value;
        self.rewrite_file(collection, &next)?;
        *records = next;
        Ok(())
    }

    fn query<T: DeserializeOwned>(&self, collection: &str, filters: &[Filter]) -> Result<Vec<T>> {
        self.ensure_loaded(collection)?;
        let cache = self.read_cache()?;
        let Some(records) = cache.get(collection) else {
            return Ok(Vec::new());
        };

        records
            .iter()
            .filter(|r| filters.iter().all(|f| f.matches(r)))
            .map(|r| serde_json::from_value(r.clone()).map_err(SchedError::from))
            .collect()
    }

    fn replace_where<T, F>(&self, collection: &str, predicate: F, records: &[T]) -> Result<usize>
    where
        T: Serialize + HasId,
        F: Fn(&Value) -> bool,
    {
        self.ensure_loaded(collection)?;
        let incoming = records
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut cache = self.write_cache()?;
        let current = Self::records_mut(&mut cache, collection)?;
        let mut next: Vec<Value> = current.iter().filter(|r| !predicate(r)).cloned().collect();
        let removed = current.len() - next.len();

        for value in incoming {
            if let Some(id) = record_id(&value) {
                if next.iter().any(|r| record_id(r) == Some(id)) {
                    return Err(SchedError::Storage(format!("Duplicate id in {}: {}", collection, id)));
                }
            }
            next.push(value);
        }

        self.rewrite_file(collection, &next)?;
        *current = next;
        Ok(removed)
    }
}
