use chrono::NaiveDate;
use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use examsched::conflict::ConflictGraph;
use examsched::domain::{ExamAssignment, GenerateRequest, JobStatus, Scope};
use examsched::jobs::{JobRunner, poll_until_terminal};
use examsched::loader::{DataSource, FileSource, build_working_set, integrity};
use examsched::report::{ScheduleViolation, Severity, audit_schedule, summarize_violations};
use examsched::storage::{DataDirLock, JsonlStorage, ScheduleStore};

mod cli;
mod config;

use cli::Cli;
use cli::commands::Commands;
use config::Config;

fn setup_logging(config: &Config) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("examsched")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("examsched.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // RUST_LOG wins over the configured level
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log_filter()))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn dataset_path(explicit: Option<&PathBuf>, config: &Config) -> Result<PathBuf> {
    explicit
        .cloned()
        .or_else(|| config.dataset.clone())
        .ok_or_else(|| eyre!("No dataset given: pass --data or set `dataset` in the config file"))
}

fn open_store(config: &Config) -> Result<ScheduleStore<JsonlStorage>> {
    let storage = JsonlStorage::new(&config.storage.data_dir)
        .context(format!("Failed to open storage at {}", config.storage.data_dir.display()))?;
    Ok(ScheduleStore::new(Arc::new(storage)))
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Generate {
            data,
            days,
            start,
            departments,
        } => handle_generate_command(data.as_ref(), *days, *start, departments, config).await,
        Commands::Status { id } => handle_status_command(id, config),
        Commands::Jobs => handle_jobs_command(config),
        Commands::Show { department } => handle_show_command(department.as_deref(), config),
        Commands::Stats { data } => handle_stats_command(data.as_ref(), config).await,
        Commands::Check { data } => handle_check_command(data.as_ref(), config).await,
        Commands::Audit { data } => handle_audit_command(data.as_ref(), config).await,
    }
}

async fn handle_generate_command(
    data: Option<&PathBuf>,
    days: i64,
    start: Option<NaiveDate>,
    departments: &[String],
    config: &Config,
) -> Result<()> {
    let path = dataset_path(data, config)?;
    // Held for the whole run: unfinished jobs found under it belong to no live process
    let _lock = DataDirLock::acquire(&config.storage.data_dir)
        .context("Failed to lock the data directory")?;
    let storage = Arc::new(JsonlStorage::new(&config.storage.data_dir).context("Failed to open storage")?);
    let runner = JobRunner::new(Arc::new(FileSource::new(&path)), storage, config.runner());

    let recovered = runner.recover()?;
    if !recovered.is_empty() {
        println!("{} {} interrupted job(s) marked failed", "Recovered:".yellow(), recovered.len());
    }

    let mut request = GenerateRequest::new(days).for_departments(departments.to_vec());
    if let Some(date) = start {
        request = request.starting(date);
    }

    let submitted = runner.generate(request).await?;
    println!("{} {}", "Submitted:".green(), submitted.job_id);

    let status = tokio::select! {
        status = poll_until_terminal(&runner, &submitted.job_id, config.poll()) => status?,
        _ = tokio::signal::ctrl_c() => {
            println!("{}", "Cancelling...".yellow());
            runner.cancel(&submitted.job_id)?;
            runner.wait(&submitted.job_id).await?;
            runner.status(&submitted.job_id)?
        }
    };

    match (status.status, status.result, status.error) {
        (JobStatus::Completed, Some(summary), _) => {
            println!(
                "{} {}/{} modules scheduled in {}",
                "Completed:".green(),
                summary.scheduled,
                summary.total,
                summary.time
            );
            if let Some(stats) = runner.store().statistics()? {
                for (reason, count) in &stats.unscheduled_by_reason {
                    println!("  {} {}: {}", "unscheduled".red(), reason, count);
                }
                println!("  occupancy: {:.1}%", stats.occupancy_rate);
            }
            Ok(())
        }
        (_, _, error) => Err(eyre!(
            "Job {} failed: {}",
            submitted.job_id,
            error.unwrap_or_else(|| "unknown error".to_string())
        )),
    }
}

fn handle_status_command(id: &str, config: &Config) -> Result<()> {
    info!("Getting status for job: {}", id);
    let store = open_store(config)?;
    let job = store.job(id)?;
    println!("{}", serde_json::to_string_pretty(&job.status_response(None))?);
    Ok(())
}

fn handle_jobs_command(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let jobs = store.list_jobs()?;
    if jobs.is_empty() {
        println!("{}", "No jobs".dimmed());
    }
    for job in jobs {
        let status = match job.status {
            JobStatus::Completed => job.status.to_string().green(),
            JobStatus::Failed => job.status.to_string().red(),
            _ => job.status.to_string().yellow(),
        };
        let detail = match (&job.result, &job.error) {
            (Some(summary), _) => format!("{}/{} in {}", summary.scheduled, summary.total, summary.time),
            (None, Some(error)) => error.clone(),
            (None, None) => String::new(),
        };
        println!(
            "{}  {:<9}  {} +{}d  {}",
            job.id, status, job.config.start_date, job.config.exam_days, detail
        );
    }
    Ok(())
}

fn handle_show_command(department: Option<&str>, config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let exams = match department {
        Some(d) => {
            let mut exams = store.exams_for_department(d)?;
            exams.sort_by(|a, b| (a.date, a.start_time, &a.room_id).cmp(&(b.date, b.start_time, &b.room_id)));
            exams
        }
        None => store.exams(None)?,
    };
    if exams.is_empty() {
        println!("{}", "No exams scheduled".dimmed());
    }
    for exam in exams {
        println!(
            "{} {}  {:<8} {:<10} {} ({} students)",
            exam.date,
            exam.start_time.format("%H:%M"),
            exam.room_id.cyan(),
            exam.module_id,
            exam.module_name,
            exam.students
        );
    }
    Ok(())
}

async fn handle_stats_command(data: Option<&PathBuf>, config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let Some(mut stats) = store.statistics()? else {
        println!("{}", "No schedule generated yet".dimmed());
        return Ok(());
    };
    match data.cloned().or_else(|| config.dataset.clone()) {
        Some(path) => {
            let (_, violations) = audit_persisted(&path, &store, config).await?;
            stats = stats.with_conflicts(&summarize_violations(&violations));
        }
        None => info!("No dataset configured, conflict counts left at zero"),
    }
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

/// Persisted exams and their violations against the dataset at `path`
async fn audit_persisted(
    path: &Path,
    store: &ScheduleStore<JsonlStorage>,
    config: &Config,
) -> Result<(Vec<ExamAssignment>, Vec<ScheduleViolation>)> {
    let everything = Scope::new(vec![], NaiveDate::MIN, NaiveDate::MAX);
    let dataset = FileSource::new(path)
        .load(&everything)
        .await
        .context(format!("Failed to read {}", path.display()))?;
    let working_set = build_working_set(dataset, &everything)?;
    let graph = ConflictGraph::from_working_set(&working_set);

    let exams = store.exams(None)?;
    let violations = audit_schedule(
        &exams,
        &working_set.rooms,
        &graph,
        config.scheduler.student_exclusion,
    );
    Ok((exams, violations))
}

async fn handle_check_command(data: Option<&PathBuf>, config: &Config) -> Result<()> {
    let path = dataset_path(data, config)?;
    let source = FileSource::new(&path);
    let dataset = source
        .load(&Scope::new(vec![], NaiveDate::MIN, NaiveDate::MAX))
        .await
        .context(format!("Failed to read {}", path.display()))?;

    let issues = integrity::find_issues(&dataset);
    if issues.is_empty() {
        println!(
            "{} {} modules, {} formations, {} rooms",
            "OK:".green(),
            dataset.modules.len(),
            dataset.formations.len(),
            dataset.rooms.len()
        );
        return Ok(());
    }
    for issue in &issues {
        println!("{} {}", "issue:".red(), issue.message);
    }
    Err(eyre!("{} integrity issue(s) in {}", issues.len(), path.display()))
}

async fn handle_audit_command(data: Option<&PathBuf>, config: &Config) -> Result<()> {
    let path = dataset_path(data, config)?;
    let store = open_store(config)?;
    let (exams, violations) = audit_persisted(&path, &store, config).await?;
    if violations.is_empty() {
        println!("{} {} exams, no violations", "OK:".green(), exams.len());
        return Ok(());
    }
    for violation in &violations {
        let severity = match violation.severity {
            Severity::Critical => violation.severity.to_string().red().bold(),
            Severity::High => violation.severity.to_string().red(),
            _ => violation.severity.to_string().yellow(),
        };
        println!("{:<8} {}", severity, violation);
    }
    let summary = summarize_violations(&violations);
    for (department, count) in &summary.by_department {
        println!("  {}: {}", department.cyan(), count);
    }
    Err(eyre!("{} violation(s) found", summary.total_conflicts))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(&config).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
