//! Client-side polling until a job reaches a terminal status.

use std::time::Duration;

use async_trait::async_trait;

use super::runner::JobRunner;
use crate::domain::StatusResponse;
use crate::error::Result;
use crate::loader::DataSource;
use crate::storage::Storage;

/// Anything that can answer a status poll
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn poll_status(&self, job_id: &str) -> Result<StatusResponse>;
}

#[async_trait]
impl<D: DataSource + 'static, S: Storage + 'static> StatusSource for JobRunner<D, S> {
    async fn poll_status(&self, job_id: &str) -> Result<StatusResponse> {
        self.status(job_id)
    }
}

/// Polling cadence and tolerance
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval: Duration,
    /// Consecutive transient errors tolerated before giving up
    pub max_retries: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            max_retries: 3,
        }
    }
}

/// Poll `job_id` at a fixed interval until it completes or fails.
///
/// Transient errors are retried up to `max_retries` times in a row; anything
/// else (including `NotFound`) is returned immediately.
pub async fn poll_until_terminal<P: StatusSource + ?Sized>(
    source: &P,
    job_id: &str,
    config: PollConfig,
) -> Result<StatusResponse> {
    let mut retries = 0;
    loop {
        match source.poll_status(job_id).await {
            Ok(status) if status.status.is_terminal() => return Ok(status),
            Ok(status) => {
                retries = 0;
                if let Some(progress) = status.progress {
                    log::debug!("Job {} {}: {}/{}", job_id, status.status, progress.placed, progress.total);
                }
            }
            Err(e) if e.is_transient() && retries < config.max_retries => {
                retries += 1;
                log::warn!("Transient error polling {} (attempt {}): {}", job_id, retries, e);
            }
            Err(e) => return Err(e),
        }
        tokio::time::sleep(config.interval).await;
    }
}
