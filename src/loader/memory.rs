//! In-memory data source.

use std::sync::RwLock;

use async_trait::async_trait;

use super::{DataSource, Dataset};
use crate::domain::Scope;
use crate::error::{Result, SchedError};

/// Serves a dataset held in memory; the dataset can be swapped between runs
pub struct MemorySource {
    dataset: RwLock<Dataset>,
}

impl MemorySource {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset: RwLock::new(dataset),
        }
    }

    /// Replace the served dataset
    pub fn replace(&self, dataset: Dataset) -> Result<()> {
        let mut guard = self.dataset.write().map_err(|e| SchedError::Storage(e.to_string()))?;
        *guard = dataset;
        Ok(())
    }
}

#[async_trait]
impl DataSource for MemorySource {
    async fn load(&self, _scope: &Scope) -> Result<Dataset> {
        let guard = self.dataset.read().map_err(|e| SchedError::Storage(e.to_string()))?;
        Ok(guard.clone())
    }
}
