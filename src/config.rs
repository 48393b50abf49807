use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use examsched::allocator::{AllocatorConfig, StudentExclusion};
use examsched::domain::SlotTemplate;
use examsched::jobs::{PollConfig, RunnerConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    /// Dataset file used when `--data` is not given
    pub dataset: Option<PathBuf>,
    pub scheduler: SchedulerConfig,
    pub jobs: JobsConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub slots: SlotTemplate,
    pub student_exclusion: StudentExclusion,
    pub skip_weekends: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub max_exam_days: u32,
    pub allow_past_start: bool,
    pub poll_interval_ms: u64,
    pub poll_retries: u32,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_exam_days: 30,
            allow_past_start: false,
            poll_interval_ms: 250,
            poll_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("examsched"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            dataset: None,
            scheduler: SchedulerConfig::default(),
            jobs: JobsConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_name = env!("CARGO_PKG_NAME");
        let mut candidates = Vec::new();
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join(project_name).join(format!("{}.yml", project_name)));
        }
        candidates.push(PathBuf::from(format!("{}.yml", project_name)));

        for candidate in candidates.iter().filter(|p| p.exists()) {
            match Self::load_from_file(candidate) {
                Ok(config) => return Ok(config),
                Err(e) => log::warn!("Failed to load config from {}: {}", candidate.display(), e),
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config
            .scheduler
            .slots
            .validate()
            .context("Invalid slot template")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// env_logger filter for `log_level`, `info` when unset or blank
    pub fn log_filter(&self) -> String {
        self.log_level
            .as_deref()
            .map(str::trim)
            .filter(|level| !level.is_empty())
            .unwrap_or("info")
            .to_string()
    }

    pub fn allocator(&self) -> AllocatorConfig {
        AllocatorConfig {
            template: self.scheduler.slots.clone(),
            exclusion: self.scheduler.student_exclusion,
        }
    }

    pub fn runner(&self) -> RunnerConfig {
        RunnerConfig::default()
            .with_allocator(self.allocator())
            .with_max_exam_days(self.jobs.max_exam_days)
            .with_past_start(self.jobs.allow_past_start)
            .with_skip_weekends(self.scheduler.skip_weekends)
    }

    pub fn poll(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(self.jobs.poll_interval_ms),
            max_retries: self.jobs.poll_retries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.jobs.max_exam_days, 30);
        assert_eq!(config.scheduler.slots.slots_per_day(), 4);
        assert_eq!(config.scheduler.student_exclusion, StudentExclusion::Slot);
        assert!(config.storage.data_dir.ends_with("examsched"));
    }

    #[test]
    fn test_load_partial_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("examsched.yml");
        fs::write(
            &path,
            r#"
dataset: /srv/exams/dataset.yml
scheduler:
  student_exclusion: day
  skip_weekends: true
  slots:
    starts: ["09:00", "14:00"]
    duration_minutes: 120
jobs:
  max_exam_days: 14
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.dataset, Some(PathBuf::from("/srv/exams/dataset.yml")));
        assert_eq!(config.scheduler.student_exclusion, StudentExclusion::Day);
        assert_eq!(config.scheduler.slots.slots_per_day(), 2);
        assert_eq!(config.jobs.max_exam_days, 14);
        assert_eq!(config.jobs.poll_retries, 3);

        let runner = config.runner();
        assert_eq!(runner.max_exam_days, 14);
        assert!(runner.skip_weekends);
        assert_eq!(runner.allocator.template.duration_minutes, 120);
    }

    #[test]
    fn test_log_filter() {
        let mut config = Config::default();
        assert_eq!(config.log_filter(), "info");
        config.log_level = Some(" examsched=debug,warn ".to_string());
        assert_eq!(config.log_filter(), "examsched=debug,warn");
        config.log_level = Some("  ".to_string());
        assert_eq!(config.log_filter(), "info");
        config.log_level = None;
        assert_eq!(config.log_filter(), "info");
    }

    #[test]
    fn test_overlapping_slots_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.yml");
        fs::write(
            &path,
            "scheduler:\n  slots:\n    starts: [\"09:00\", \"09:30\"]\n    duration_minutes: 90\n",
        )
        .unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let missing = PathBuf::from("/nonexistent/examsched.yml");
        assert!(Config::load(Some(&missing)).is_err());
    }
}
