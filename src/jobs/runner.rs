//! Job runner
//!
//! Accepts generation requests, guards scopes against overlapping runs and
//! drives each run on the tokio runtime: load, build the conflict graph,
//! allocate on the blocking pool, report, persist, finish.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate};
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tokio::task::JoinHandle;

use crate::allocator::{AllocationObserver, AllocationOutcome, AllocatorConfig, SlotAllocator};
use crate::conflict::ConflictGraph;
use crate::domain::{
    ExamWindow, GenerateRequest, GenerationJob, JobConfig, JobProgress, Scope, StatusResponse, SubmitResponse,
    next_monday,
};
use crate::error::{Result, SchedError};
use crate::loader::{DataSource, load_working_set};
use crate::report::ScheduleReport;
use crate::storage::{ScheduleSink, ScheduleStore, Storage};

/// Message recorded on jobs stopped through [`JobRunner::cancel`]
pub const CANCELLED_MESSAGE: &str = "generation cancelled";

/// Attempts at storing a job's terminal status before keeping it in memory
const RECORD_ATTEMPTS: u32 = 3;
const RECORD_BACKOFF: Duration = Duration::from_millis(50);

/// Configuration for the JobRunner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub allocator: AllocatorConfig,
    /// Upper bound on `examDays`
    pub max_exam_days: u32,
    /// Accept start dates before today
    pub allow_past_start: bool,
    pub skip_weekends: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            allocator: AllocatorConfig::default(),
            max_exam_days: 30,
            allow_past_start: false,
            skip_weekends: false,
        }
    }
}

impl RunnerConfig {
    pub fn with_allocator(mut self, allocator: AllocatorConfig) -> Self {
        self.allocator = allocator;
        self
    }

    pub fn with_max_exam_days(mut self, days: u32) -> Self {
        self.max_exam_days = days;
        self
    }

    pub fn with_past_start(mut self, allow: bool) -> Self {
        self.allow_past_start = allow;
        self
    }

    pub fn with_skip_weekends(mut self, skip: bool) -> Self {
        self.skip_weekends = skip;
        self
    }
}

/// In-memory state of a queued or running job
#[derive(Debug, Clone)]
struct ActiveJob {
    scope: Scope,
    cancel: Arc<AtomicBool>,
    placed: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
}

impl ActiveJob {
    fn new(scope: Scope) -> Self {
        Self {
            scope,
            cancel: Arc::new(AtomicBool::new(false)),
            placed: Arc::new(AtomicUsize::new(0)),
            total: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn progress(&self) -> JobProgress {
        JobProgress {
            placed: self.placed.load(Ordering::Relaxed),
            total: self.total.load(Ordering::Relaxed),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

/// Feeds allocator progress into the job's counters and stops it on cancel
struct JobObserver {
    cancel: Arc<AtomicBool>,
    placed: Arc<AtomicUsize>,
}

impl AllocationObserver for JobObserver {
    fn should_stop(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn on_module_done(&mut self, done: usize, _total: usize) {
        self.placed.store(done, Ordering::Relaxed);
    }
}

type Registry = Arc<Mutex<HashMap<String, ActiveJob>>>;

/// Finished jobs whose terminal status could not be stored yet
type Unrecorded = Arc<Mutex<HashMap<String, GenerationJob>>>;

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|e| SchedError::InvalidState(format!("job registry poisoned: {}", e)))
}

enum RunOutcome {
    Completed(ScheduleReport),
    Cancelled,
}

/// Runs schedule generations in the background
pub struct JobRunner<D: DataSource, S: Storage> {
    source: Arc<D>,
    store: ScheduleStore<S>,
    config: RunnerConfig,
    active: Registry,
    unrecorded: Unrecorded,
    /// Held-exam snapshot, allocation and persist run under this lock, so
    /// concurrent jobs on disjoint scopes still see each other's exams
    writer: Arc<AsyncMutex<()>>,
    handles: RwLock<HashMap<String, JoinHandle<()>>>,
}

impl<D: DataSource + 'static, S: Storage + 'static> JobRunner<D, S> {
    pub fn new(source: Arc<D>, storage: Arc<S>, config: RunnerConfig) -> Self {
        Self {
            source,
            store: ScheduleStore::new(storage),
            config,
            active: Arc::new(Mutex::new(HashMap::new())),
            unrecorded: Arc::new(Mutex::new(HashMap::new())),
            writer: Arc::new(AsyncMutex::new(())),
            handles: RwLock::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &ScheduleStore<S> {
        &self.store
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Fail jobs a previous process left behind
    pub fn recover(&self) -> Result<Vec<String>> {
        self.store.fail_interrupted_jobs()
    }

    /// Submit a generation, with today's local date as reference
    pub async fn generate(&self, request: GenerateRequest) -> Result<SubmitResponse> {
        self.generate_on(request, Local::now().date_naive()).await
    }

    /// Submit a generation as if today were `today`
    pub async fn generate_on(&self, request: GenerateRequest, today: NaiveDate) -> Result<SubmitResponse> {
        let job_config = self.validate(&request, today)?;
        let window = ExamWindow::new(job_config.start_date, job_config.exam_days)
            .skipping_weekends(self.config.skip_weekends);
        let scope = Scope::for_window(job_config.departments.clone(), &window);
        let job = GenerationJob::new(job_config, scope.key());
        let active = ActiveJob::new(scope.clone());

        self.flush_unrecorded()?;
        {
            let mut registry = lock(&self.active)?;
            if let Some((other, _)) = registry.iter().find(|(_, a)| a.scope.overlaps(&scope)) {
                return Err(SchedError::Conflict(format!(
                    "job {} is already generating an overlapping scope",
                    other
                )));
            }
            self.store.create_job(&job)?;
            registry.insert(job.id.clone(), active.clone());
        }

        tracing::info!(
            job_id = %job.id,
            scope = %job.scope_key,
            start = %scope.first_day,
            days = job.config.exam_days,
            "Generation queued"
        );

        let job_id = job.id.clone();
        let handle = tokio::spawn(run_job(
            JobContext {
                source: Arc::clone(&self.source),
                store: self.store.clone(),
                registry: Arc::clone(&self.active),
                unrecorded: Arc::clone(&self.unrecorded),
                writer: Arc::clone(&self.writer),
                allocator: self.config.allocator.clone(),
            },
            job,
            window,
            active,
        ));
        let mut handles = self.handles.write().await;
        handles.retain(|_, h| !h.is_finished());
        handles.insert(job_id.clone(), handle);

        Ok(SubmitResponse { job_id })
    }

    fn validate(&self, request: &GenerateRequest, today: NaiveDate) -> Result<JobConfig> {
        let max = i64::from(self.config.max_exam_days);
        if request.exam_days < 1 || request.exam_days > max {
            return Err(SchedError::Configuration(format!(
                "examDays must be between 1 and {}, got {}",
                max, request.exam_days
            )));
        }

        let start_date = request.start_date.unwrap_or_else(|| next_monday(today));
        if start_date < today && !self.config.allow_past_start {
            return Err(SchedError::Configuration(format!(
                "startDate {} is in the past",
                start_date
            )));
        }

        let departments = request
            .departments
            .iter()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .collect();

        Ok(JobConfig {
            start_date,
            exam_days: request.exam_days as u32,
            departments,
        })
    }

    /// Retry storing terminal statuses that failed to persist. Their scopes
    /// stay locked until this succeeds.
    fn flush_unrecorded(&self) -> Result<()> {
        let pending: Vec<GenerationJob> = lock(&self.unrecorded)?.values().cloned().collect();
        for job in pending {
            match self.store.update_job(&job) {
                Ok(()) => {
                    lock(&self.unrecorded)?.remove(&job.id);
                    lock(&self.active)?.remove(&job.id);
                    tracing::info!(job_id = %job.id, status = %job.status, "Recorded deferred job outcome");
                }
                Err(e) => tracing::warn!(job_id = %job.id, error = %e, "Job outcome still not recorded"),
            }
        }
        Ok(())
    }

    /// The job as this runner knows it, preferring an outcome not yet stored
    fn current_job(&self, job_id: &str) -> Result<GenerationJob> {
        if let Some(job) = lock(&self.unrecorded)?.get(job_id) {
            return Ok(job.clone());
        }
        self.store.job(job_id)
    }

    /// Current view of a job. Never triggers work.
    pub fn status(&self, job_id: &str) -> Result<StatusResponse> {
        if let Some(job) = lock(&self.unrecorded)?.get(job_id) {
            return Ok(job.status_response(None));
        }
        let job = self.store.job(job_id)?;
        let progress = lock(&self.active)?.get(job_id).map(ActiveJob::progress);
        Ok(job.status_response(progress))
    }

    /// Ask a queued or running job to stop. It fails with [`CANCELLED_MESSAGE`]
    /// at its next checkpoint and persists nothing.
    pub fn cancel(&self, job_id: &str) -> Result<()> {
        let job = self.current_job(job_id)?;
        if !job.status.is_terminal() {
            if let Some(active) = lock(&self.active)?.get(job_id) {
                active.cancel.store(true, Ordering::SeqCst);
                tracing::info!(job_id = %job_id, "Cancellation requested");
                return Ok(());
            }
        }
        Err(SchedError::InvalidState(format!("job {} is already {}", job_id, job.status)))
    }

    /// Wait for a job submitted through this runner to finish
    pub async fn wait(&self, job_id: &str) -> Result<GenerationJob> {
        let handle = self.handles.write().await.remove(job_id);
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(job_id = %job_id, error = ?e, "Job task panicked");
            }
        }
        self.current_job(job_id)
    }

    /// Number of queued or running jobs
    pub fn active_count(&self) -> usize {
        lock(&self.active).map(|r| r.len()).unwrap_or(0)
    }
}

/// Shared handles a spawned job needs
struct JobContext<D, S: Storage> {
    source: Arc<D>,
    store: ScheduleStore<S>,
    registry: Registry,
    unrecorded: Unrecorded,
    writer: Arc<AsyncMutex<()>>,
    allocator: AllocatorConfig,
}

/// Drive one job to a terminal status
async fn run_job<D: DataSource + 'static, S: Storage + 'static>(
    ctx: JobContext<D, S>,
    mut job: GenerationJob,
    window: ExamWindow,
    active: ActiveJob,
) {
    let job_id = job.id.clone();
    let store = ctx.store.clone();

    let outcome = if active.is_cancelled() {
        Ok(RunOutcome::Cancelled)
    } else {
        match job.start().and_then(|_| store.update_job(&job)) {
            Ok(()) => {
                tracing::info!(job_id = %job_id, "Generation started");
                // Inner task so a panic becomes a failed job instead of a stuck one
                let inner = tokio::spawn(execute(
                    Arc::clone(&ctx.source),
                    store.clone(),
                    Arc::clone(&ctx.writer),
                    ctx.allocator.clone(),
                    window,
                    active.clone(),
                ));
                match inner.await {
                    Ok(result) => result,
                    Err(e) => Err(SchedError::InvalidState(format!("generation task panicked: {}", e))),
                }
            }
            Err(e) => Err(e),
        }
    };

    let finished = match outcome {
        Ok(RunOutcome::Completed(report)) => {
            tracing::info!(
                job_id = %job_id,
                scheduled = report.scheduled,
                total = report.total,
                time = %report.time,
                "Generation completed"
            );
            job.complete(report.summary())
        }
        Ok(RunOutcome::Cancelled) => {
            tracing::warn!(job_id = %job_id, "Generation cancelled");
            job.fail(CANCELLED_MESSAGE)
        }
        Err(e) => {
            tracing::error!(job_id = %job_id, error = %e, "Generation failed");
            job.fail(e.to_string())
        }
    };

    let recorded = match finished {
        Ok(()) => record_outcome(&store, &job).await,
        Err(e) => {
            tracing::error!(job_id = %job_id, error = %e, "Invalid job transition");
            Ok(())
        }
    };

    if let Err(e) = recorded {
        // Scope stays locked until a later flush stores the outcome
        tracing::error!(job_id = %job_id, error = %e, "Failed to record job outcome");
        match lock(&ctx.unrecorded) {
            Ok(mut unrecorded) => {
                unrecorded.insert(job_id, job);
            }
            Err(e) => tracing::error!(job_id = %job_id, error = %e, "Failed to keep job outcome"),
        }
        return;
    }

    match lock(&ctx.registry) {
        Ok(mut registry) => {
            registry.remove(&job_id);
        }
        Err(e) => tracing::error!(job_id = %job_id, error = %e, "Failed to release scope"),
    }
}

/// Store a terminal status, retrying transient failures with a short backoff
async fn record_outcome<S: Storage>(store: &ScheduleStore<S>, job: &GenerationJob) -> Result<()> {
    let mut attempt = 1;
    loop {
        match store.update_job(job) {
            Ok(()) => return Ok(()),
            Err(e) if e.is_transient() && attempt < RECORD_ATTEMPTS => {
                tracing::warn!(job_id = %job.id, attempt, error = %e, "Retrying job outcome");
                tokio::time::sleep(RECORD_BACKOFF * attempt).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn execute<D: DataSource + 'static, S: Storage + 'static>(
    source: Arc<D>,
    store: ScheduleStore<S>,
    writer: Arc<AsyncMutex<()>>,
    allocator: AllocatorConfig,
    window: ExamWindow,
    active: ActiveJob,
) -> Result<RunOutcome> {
    let started = Instant::now();
    let working_set = load_working_set(source.as_ref(), &active.scope).await?;
    active.total.store(working_set.modules.len(), Ordering::Relaxed);

    allocator.template.validate()?;
    let slots_per_day = allocator.template.slots_per_day();

    let _writing = writer.lock().await;
    let held = store.exams_held_outside(&active.scope)?;
    tracing::debug!(held = held.len(), "Exams held by other departments");

    let observer_flags = (Arc::clone(&active.cancel), Arc::clone(&active.placed));
    let alloc_window = window.clone();
    let (outcome, working_set) = tokio::task::spawn_blocking(move || {
        let graph = ConflictGraph::from_working_set(&working_set);
        tracing::debug!(
            modules = graph.len(),
            hard_edges = graph.hard_edge_count(),
            soft_edges = graph.soft_edge_count(),
            "Conflict graph built"
        );
        let mut observer = JobObserver {
            cancel: observer_flags.0,
            placed: observer_flags.1,
        };
        let outcome = SlotAllocator::new(allocator).allocate_around(
            &working_set.modules,
            &working_set.rooms,
            &graph,
            &alloc_window,
            &held,
            &mut observer,
        );
        (outcome, working_set)
    })
    .await
    .map_err(|e| SchedError::InvalidState(format!("allocation task failed: {}", e)))?;

    let allocation = match outcome? {
        AllocationOutcome::Complete(allocation) => allocation,
        AllocationOutcome::Cancelled { .. } => return Ok(RunOutcome::Cancelled),
    };

    // Last checkpoint before anything is written
    if active.is_cancelled() {
        return Ok(RunOutcome::Cancelled);
    }

    let days = window.dates().len();
    let report = ScheduleReport::build(&allocation, &working_set.rooms, days, slots_per_day, started.elapsed());
    store.replace_scope(
        &active.scope,
        &allocation.assignments,
        &allocation.unscheduled,
        &report,
    )?;
    Ok(RunOutcome::Completed(report))
}
