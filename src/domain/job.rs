//! Generation job record and the request/response shapes around it.
//!
//! A job moves `queued -> running -> {completed | failed}` and becomes
//! immutable once it reaches a terminal status.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedError};
use crate::id::{generate_job_id, now_ms};

/// Lifecycle status of a generation job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted, not yet picked up
    Queued,
    /// Allocation in progress
    Running,
    /// Schedule generated and persisted
    Completed,
    /// Aborted; nothing from this run was persisted
    Failed,
}

impl JobStatus {
    /// Returns true if the job is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Returns true while the job holds its scope
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Submission payload: `{ examDays, startDate?, departments? }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub exam_days: i64,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// Departments to include; empty means all
    #[serde(default)]
    pub departments: Vec<String>,
}

impl GenerateRequest {
    pub fn new(exam_days: i64) -> Self {
        Self {
            exam_days,
            start_date: None,
            departments: Vec::new(),
        }
    }

    pub fn starting(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    pub fn for_departments(mut self, departments: Vec<String>) -> Self {
        self.departments = departments;
        self
    }
}

/// Submission response: `{ jobId }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub job_id: String,
}

/// Validated configuration the job was created with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    pub start_date: NaiveDate,
    pub exam_days: u32,
    pub departments: Vec<String>,
}

/// Terminal result payload: `{ scheduled, total, time }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub scheduled: usize,
    pub total: usize,
    pub time: String,
}

/// Placement progress of a running job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub placed: usize,
    pub total: usize,
}

/// Polling response: `{ status, result?, error?, progress? }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<JobProgress>,
}

/// A persisted generation job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationJob {
    pub id: String,
    pub status: JobStatus,
    pub config: JobConfig,
    /// Key of the scope this job replaces on completion
    pub scope_key: String,
    pub result: Option<JobSummary>,
    pub error: Option<String>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
}

impl GenerationJob {
    /// Create a new queued job
    pub fn new(config: JobConfig, scope_key: impl Into<String>) -> Self {
        Self {
            id: generate_job_id(),
            status: JobStatus::Queued,
            config,
            scope_key: scope_key.into(),
            result: None,
            error: None,
            created_at: now_ms(),
            started_at: None,
            completed_at: None,
        }
    }

    /// `queued -> running`
    pub fn start(&mut self) -> Result<()> {
        if self.status != JobStatus::Queued {
            return Err(SchedError::InvalidState(format!(
                "job {} cannot start from {}",
                self.id, self.status
            )));
        }
        self.status = JobStatus::Running;
        self.started_at = Some(now_ms());
        Ok(())
    }

    /// `running -> completed`
    pub fn complete(&mut self, summary: JobSummary) -> Result<()> {
        self.ensure_not_terminal()?;
        self.status = JobStatus::Completed;
        self.result = Some(summary);
        self.completed_at = Some(now_ms());
        Ok(())
    }

    /// `queued | running -> failed`
    pub fn fail(&mut self, message: impl Into<String>) -> Result<()> {
        self.ensure_not_terminal()?;
        self.status = JobStatus::Failed;
        self.error = Some(message.into());
        self.completed_at = Some(now_ms());
        Ok(())
    }

    fn ensure_not_terminal(&self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(SchedError::InvalidState(format!(
                "job {} is already {}",
                self.id, self.status
            )));
        }
        Ok(())
    }

    /// Build the polling view. Progress is dropped once terminal so that
    /// repeated polls of a finished job serialize identically.
    pub fn status_response(&self, progress: Option<JobProgress>) -> StatusResponse {
        StatusResponse {
            status: self.status,
            result: self.result.clone(),
            error: self.error.clone(),
            progress: if self.status.is_terminal() { None } else { progress },
        }
    }
}
