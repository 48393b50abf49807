//! Storage that fails chosen writes on demand, for exercising error paths.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use super::{Filter, HasId, JsonlStorage, Storage};
use crate::error::{Result, SchedError};

pub struct FaultyStorage {
    inner: JsonlStorage,
    /// Reject replacements of the `reports` collection
    pub fail_reports: AtomicBool,
    /// Reject updates that move a job to `completed` or `failed`
    pub fail_job_outcomes: AtomicBool,
}

impl FaultyStorage {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            inner: JsonlStorage::new(path.as_ref())?,
            fail_reports: AtomicBool::new(false),
            fail_job_outcomes: AtomicBool::new(false),
        })
    }

    pub fn set_fail_reports(&self, fail: bool) {
        self.fail_reports.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_job_outcomes(&self, fail: bool) {
        self.fail_job_outcomes.store(fail, Ordering::SeqCst);
    }
}

fn is_outcome<T: Serialize>(record: &T) -> bool {
    let status = serde_json::to_value(record)
        .ok()
        .and_then(|v| v.get("status").and_then(Value::as_str).map(str::to_string));
    matches!(status.as_deref(), Some("completed") | Some("failed"))
}

impl Storage for FaultyStorage {
    fn create<T: Serialize + HasId>(&self, collection: &str, record: &T) -> Result<()> {
        self.inner.create(collection, record)
    }

    fn get<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<Option<T>> {
        self.inner.get(collection, id)
    }

    fn update<T: Serialize + HasId>(&self, collection: &str, record: &T) -> Result<()> {
        if collection == "jobs" && self.fail_job_outcomes.load(Ordering::SeqCst) && is_outcome(record) {
            return Err(SchedError::Storage(format!("disk full writing {}", record.id())));
        }
        self.inner.update(collection, record)
    }

    fn query<T: DeserializeOwned>(&self, collection: &str, filters: &[Filter]) -> Result<Vec<T>> {
        self.inner.query(collection, filters)
    }

    fn replace_where<T, F>(&self, collection: &str, predicate: F, records: &[T]) -> Result<usize>
    where
        T: Serialize + HasId,
        F: Fn(&Value) -> bool,
    {
        if collection == "reports" && self.fail_reports.load(Ordering::SeqCst) {
            return Err(SchedError::Storage("disk full writing reports".to_string()));
        }
        self.inner.replace_where(collection, predicate, records)
    }
}
