//! Result reporter: summary metrics for a generation run and an audit of
//! persisted schedules.

mod audit;
mod summary;

pub use audit::{ConflictSummary, ScheduleViolation, Severity, ViolationKind, audit_schedule, summarize_violations};
pub use summary::{ScheduleReport, ScheduleStatistics, format_elapsed, occupancy_rate};
