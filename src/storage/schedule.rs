//! Persisted jobs, exam assignments and generation reports.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::traits::{Filter, HasId, Storage};
use crate::domain::{ExamAssignment, GenerationJob, JobStatus, Scope, UnscheduledModule};
use crate::error::{Result, SchedError};
use crate::id::now_ms;
use crate::report::{ScheduleReport, ScheduleStatistics};

const JOBS: &str = "jobs";
const EXAMS: &str = "exams";
const REPORTS: &str = "reports";

/// Where a finished generation writes its schedule
pub trait ScheduleSink: Send + Sync {
    /// Replace every persisted assignment inside `scope` with `assignments`.
    /// Assignments outside the scope are left untouched. On error the
    /// scope's previous exams are kept.
    fn replace_scope(
        &self,
        scope: &Scope,
        assignments: &[ExamAssignment],
        unscheduled: &[UnscheduledModule],
        report: &ScheduleReport,
    ) -> Result<()>;
}

impl HasId for GenerationJob {
    fn id(&self) -> &str {
        &self.id
    }
}

/// One persisted exam
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamRecord {
    /// `{module_id}@{date}`
    pub id: String,
    /// Scope key of the generation that wrote it
    pub scope_key: String,
    #[serde(flatten)]
    pub assignment: ExamAssignment,
}

impl HasId for ExamRecord {
    fn id(&self) -> &str {
        &self.id
    }
}

impl ExamRecord {
    pub fn new(scope_key: &str, assignment: ExamAssignment) -> Self {
        Self {
            id: format!("{}@{}", assignment.module_id, assignment.date),
            scope_key: scope_key.to_string(),
            assignment,
        }
    }
}

/// Report of the latest generation for a scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    /// Scope key
    pub id: String,
    pub scope: Scope,
    pub report: ScheduleReport,
    pub unscheduled: Vec<UnscheduledModule>,
    pub created_at: i64,
}

impl HasId for ReportRecord {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Whether a persisted exam (as JSON) falls inside `scope`
fn exam_in_scope(scope: &Scope, record: &Value) -> bool {
    let department = record.get("department").and_then(Value::as_str).unwrap_or_default();
    let date = record.get("date").and_then(Value::as_str).unwrap_or_default();
    // ISO dates order lexically
    let first = scope.first_day.to_string();
    let last = scope.last_day.to_string();
    scope.includes_department(department) && date >= first.as_str() && date <= last.as_str()
}

fn report_overlaps(scope: &Scope, record: &Value) -> bool {
    record
        .get("scope")
        .and_then(|s| serde_json::from_value::<Scope>(s.clone()).ok())
        .map(|other| other.overlaps(scope))
        .unwrap_or(false)
}

fn sort_exams(exams: &mut [ExamAssignment]) {
    exams.sort_by(|a, b| {
        (a.date, a.start_time, &a.room_id, &a.module_id).cmp(&(b.date, b.start_time, &b.room_id, &b.module_id))
    });
}

/// Typed access to the scheduling collections of a [`Storage`]
pub struct ScheduleStore<S: Storage> {
    storage: Arc<S>,
}

impl<S: Storage> Clone for ScheduleStore<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<S: Storage> ScheduleStore<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub fn create_job(&self, job: &GenerationJob) -> Result<()> {
        self.storage.create(JOBS, job)
    }

    pub fn update_job(&self, job: &GenerationJob) -> Result<()> {
        self.storage.update(JOBS, job)
    }

    pub fn get_job(&self, id: &str) -> Result<Option<GenerationJob>> {
        self.storage.get(JOBS, id)
    }

    /// `NotFound` instead of `None`
    pub fn job(&self, id: &str) -> Result<GenerationJob> {
        self.get_job(id)?
            .ok_or_else(|| SchedError::NotFound(format!("job {}", id)))
    }

    /// All jobs, newest first
    pub fn list_jobs(&self) -> Result<Vec<GenerationJob>> {
        let mut jobs: Vec<GenerationJob> = self.storage.list(JOBS)?;
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(jobs)
    }

    pub fn jobs_with_status(&self, status: JobStatus) -> Result<Vec<GenerationJob>> {
        self.storage.query(JOBS, &[Filter::eq("status", status)])
    }

    /// Fail jobs a previous process left queued or running.
    ///
    /// Their in-memory task is gone, so they would otherwise hold their scope forever.
    pub fn fail_interrupted_jobs(&self) -> Result<Vec<String>> {
        let mut failed = Vec::new();
        for status in [JobStatus::Queued, JobStatus::Running] {
            for mut job in self.jobs_with_status(status)? {
                job.fail("interrupted by restart")?;
                self.update_job(&job)?;
                log::warn!("Marked interrupted job {} as failed", job.id);
                failed.push(job.id);
            }
        }
        Ok(failed)
    }

    /// Persisted exams, optionally limited to a scope, ordered by date, start time, room
    pub fn exams(&self, scope: Option<&Scope>) -> Result<Vec<ExamAssignment>> {
        let records: Vec<ExamRecord> = self.storage.list(EXAMS)?;
        let mut exams: Vec<ExamAssignment> = records
            .into_iter()
            .map(|r| r.assignment)
            .filter(|a| scope.map(|s| s.covers(&a.department, a.date)).unwrap_or(true))
            .collect();
        sort_exams(&mut exams);
        Ok(exams)
    }

    /// Persisted exams that share `scope`'s dates but belong to departments
    /// it leaves out. A run over `scope` must work around them.
    pub fn exams_held_outside(&self, scope: &Scope) -> Result<Vec<ExamAssignment>> {
        let records: Vec<ExamRecord> = self.storage.list(EXAMS)?;
        let mut exams: Vec<ExamAssignment> = records
            .into_iter()
            .map(|r| r.assignment)
            .filter(|a| a.date >= scope.first_day && a.date <= scope.last_day && !scope.includes_department(&a.department))
            .collect();
        sort_exams(&mut exams);
        Ok(exams)
    }

    pub fn exams_for_department(&self, department: &str) -> Result<Vec<ExamAssignment>> {
        let records: Vec<ExamRecord> = self.storage.query(EXAMS, &[Filter::eq("department", department)])?;
        Ok(records.into_iter().map(|r| r.assignment).collect())
    }

    pub fn reports(&self) -> Result<Vec<ReportRecord>> {
        let mut reports: Vec<ReportRecord> = self.storage.list(REPORTS)?;
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reports)
    }

    pub fn latest_report(&self) -> Result<Option<ReportRecord>> {
        Ok(self.reports()?.into_iter().next())
    }

    /// Dashboard figures from the latest generation, with the exam count
    /// taken from everything currently persisted
    pub fn statistics(&self) -> Result<Option<ScheduleStatistics>> {
        let Some(latest) = self.latest_report()? else {
            return Ok(None);
        };
        let mut stats = latest.report.statistics();
        stats.total_exams = self.exams(None)?.len();
        Ok(Some(stats))
    }
}

impl<S: Storage> ScheduleSink for ScheduleStore<S> {
    fn replace_scope(
        &self,
        scope: &Scope,
        assignments: &[ExamAssignment],
        unscheduled: &[UnscheduledModule],
        report: &ScheduleReport,
    ) -> Result<()> {
        let key = scope.key();
        let records: Vec<ExamRecord> = assignments
            .iter()
            .cloned()
            .map(|a| ExamRecord::new(&key, a))
            .collect();

        let previous: Vec<ExamRecord> = self
            .storage
            .list::<ExamRecord>(EXAMS)?
            .into_iter()
            .filter(|r| scope.covers(&r.assignment.department, r.assignment.date))
            .collect();

        let removed = self
            .storage
            .replace_where(EXAMS, |r| exam_in_scope(scope, r), &records)?;

        let report_record = ReportRecord {
            id: key.clone(),
            scope: scope.clone(),
            report: report.clone(),
            unscheduled: unscheduled.to_vec(),
            created_at: now_ms(),
        };
        if let Err(e) = self
            .storage
            .replace_where(REPORTS, |r| report_overlaps(scope, r), &[report_record])
        {
            // Put the scope's exams back so exams and report stay in step
            if let Err(undo) = self
                .storage
                .replace_where(EXAMS, |r| exam_in_scope(scope, r), &previous)
            {
                log::error!("Failed to restore exams for {}: {}", key, undo);
            } else {
                log::warn!("Restored {} exams for {} after report write failed", previous.len(), key);
            }
            return Err(e);
        }

        log::info!(
            "Replaced schedule for {}: removed {} exams, stored {}",
            key,
            removed,
            records.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobConfig, JobSummary, UnscheduledReason};
    use crate::storage::JsonlStorage;
    use crate::storage::faulty::FaultyStorage;
    use chrono::{NaiveDate, NaiveTime};
    use std::time::Duration;
    use tempfile::TempDir;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, day).unwrap()
    }

    fn exam(id: &str, department: &str, day: u32) -> ExamAssignment {
        ExamAssignment {
            module_id: id.into(),
            module_name: id.into(),
            formation_id: "F1".into(),
            department: department.into(),
            date: date(day),
            start_time: NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
            duration_minutes: 90,
            room_id: "R1".into(),
            professor_ids: vec![],
            day: 0,
            slot: 0,
            students: 20,
        }
    }

    fn report(assignments: &[ExamAssignment], unscheduled: &[UnscheduledModule]) -> ScheduleReport {
        ScheduleReport::from_parts(assignments, unscheduled, &[], 1, 1, Duration::from_millis(5))
    }

    fn store() -> (ScheduleStore<JsonlStorage>, TempDir) {
        let temp = TempDir::new().unwrap();
        let storage = JsonlStorage::new(temp.path()).unwrap();
        (ScheduleStore::new(Arc::new(storage)), temp)
    }

    fn job() -> GenerationJob {
        GenerationJob::new(
            JobConfig {
                start_date: date(19),
                exam_days: 5,
                departments: vec![],
            },
            "scope-test",
        )
    }

    #[test]
    fn test_job_round_trip() {
        let (store, _temp) = store();
        let mut job = job();
        store.create_job(&job).unwrap();
        job.start().unwrap();
        job.complete(JobSummary {
            scheduled: 1,
            total: 1,
            time: "0.00s".into(),
        })
        .unwrap();
        store.update_job(&job).unwrap();

        let loaded = store.job(&job.id).unwrap();
        assert_eq!(loaded, job);
        assert!(matches!(store.job("job-missing"), Err(SchedError::NotFound(_))));
    }

    #[test]
    fn test_fail_interrupted_jobs() {
        let (store, _temp) = store();
        let queued = job();
        let mut done = job();
        done.start().unwrap();
        done.fail("boom").unwrap();
        store.create_job(&queued).unwrap();
        store.create_job(&done).unwrap();

        let failed = store.fail_interrupted_jobs().unwrap();
        assert_eq!(failed, vec![queued.id.clone()]);
        let reloaded = store.job(&queued.id).unwrap();
        assert_eq!(reloaded.status, JobStatus::Failed);
        assert_eq!(store.job(&done.id).unwrap().error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_replace_scope_only_touches_scope() {
        let (store, _temp) = store();
        let cs_week = Scope::new(vec!["CS".into()], date(19), date(23));
        let first = vec![exam("M1", "CS", 19), exam("M2", "CS", 20)];
        store.replace_scope(&cs_week, &first, &[], &report(&first, &[])).unwrap();

        let math = Scope::new(vec!["MATH".into()], date(19), date(23));
        let other = vec![exam("X1", "MATH", 19)];
        store.replace_scope(&math, &other, &[], &report(&other, &[])).unwrap();

        let second = vec![exam("M3", "CS", 21)];
        let missing = vec![UnscheduledModule {
            module_id: "M4".into(),
            department: "CS".into(),
            reason: UnscheduledReason::NoRoomCapacity,
        }];
        store
            .replace_scope(&cs_week, &second, &missing, &report(&second, &missing))
            .unwrap();

        let ids: Vec<String> = store.exams(None).unwrap().into_iter().map(|e| e.module_id).collect();
        assert_eq!(ids, vec!["X1", "M3"]);
        assert_eq!(store.exams_for_department("CS").unwrap().len(), 1);
        assert_eq!(store.exams(Some(&math)).unwrap().len(), 1);
        assert_eq!(store.reports().unwrap().len(), 2);
    }

    #[test]
    fn test_statistics() {
        let (store, _temp) = store();
        assert_eq!(store.statistics().unwrap(), None);

        let scope = Scope::new(vec![], date(19), date(23));
        let exams = vec![exam("M1", "CS", 19)];
        let missing = vec![UnscheduledModule {
            module_id: "M2".into(),
            department: "MATH".into(),
            reason: UnscheduledReason::WindowExhausted,
        }];
        store.replace_scope(&scope, &exams, &missing, &report(&exams, &missing)).unwrap();

        let stats = store.statistics().unwrap().unwrap();
        assert_eq!(stats.total_exams, 1);
        assert_eq!(stats.unscheduled_by_department.get("MATH"), Some(&1));
        assert_eq!(stats.unscheduled_by_reason.get("window_exhausted"), Some(&1));
    }

    #[test]
    fn test_failed_report_write_keeps_previous_exams() {
        let temp = TempDir::new().unwrap();
        let storage = Arc::new(FaultyStorage::new(temp.path()).unwrap());
        let store = ScheduleStore::new(Arc::clone(&storage));
        let week = Scope::new(vec!["CS".into()], date(19), date(23));
        let first = vec![exam("M1", "CS", 19), exam("M2", "CS", 20)];
        store.replace_scope(&week, &first, &[], &report(&first, &[])).unwrap();

        storage.set_fail_reports(true);
        let second = vec![exam("M3", "CS", 21)];
        let result = store.replace_scope(&week, &second, &[], &report(&second, &[]));
        assert!(matches!(result, Err(SchedError::Storage(_))));

        let ids: Vec<String> = store.exams(None).unwrap().into_iter().map(|e| e.module_id).collect();
        assert_eq!(ids, vec!["M1", "M2"]);
        assert_eq!(store.reports().unwrap().len(), 1);
        assert_eq!(store.latest_report().unwrap().unwrap().report.scheduled, 2);
    }

    #[test]
    fn test_exams_held_outside_scope() {
        let (store, _temp) = store();
        let all = Scope::new(vec![], date(19), date(30));
        let exams = vec![
            exam("C1", "CS", 19),
            exam("X1", "MATH", 20),
            exam("X2", "MATH", 26),
            exam("Y1", "BIO", 21),
        ];
        store.replace_scope(&all, &exams, &[], &report(&exams, &[])).unwrap();

        let cs_week = Scope::new(vec!["CS".into()], date(19), date(23));
        let held: Vec<String> = store
            .exams_held_outside(&cs_week)
            .unwrap()
            .into_iter()
            .map(|e| e.module_id)
            .collect();
        assert_eq!(held, vec!["X1", "Y1"]);
        assert!(store.exams_held_outside(&Scope::new(vec![], date(19), date(23))).unwrap().is_empty());
    }
}
