//! Dataset file source (YAML or JSON).

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{DataSource, Dataset};
use crate::domain::Scope;
use crate::error::Result;

/// Reads the dataset from a file on every load, so edits between runs are picked up.
/// Files ending in `.json` are parsed as JSON, anything else as YAML.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_json(&self) -> bool {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false)
    }
}

#[async_trait]
impl DataSource for FileSource {
    async fn load(&self, _scope: &Scope) -> Result<Dataset> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let dataset = if self.is_json() {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };
        log::debug!("Read dataset from {}", self.path.display());
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchedError;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn scope() -> Scope {
        let day = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        Scope::new(vec![], day, day)
    }

    #[tokio::test]
    async fn test_load_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("dataset.yml");
        std::fs::write(
            &path,
            r#"
formations:
  - { id: F1, name: L1 Info, department: CS, student_count: 40 }
modules:
  - { id: M1, name: Algo, formation_id: F1, professor_ids: [P1] }
professors:
  - { id: P1, name: Dupont, department: CS }
rooms:
  - { id: R1, name: Amphi A, capacity: 200, type: amphitheater, building: Main }
"#,
        )
        .unwrap();

        let dataset = FileSource::new(&path).load(&scope()).await.unwrap();
        assert_eq!(dataset.formations.len(), 1);
        assert_eq!(dataset.modules[0].professor_ids, vec!["P1".to_string()]);
        assert_eq!(dataset.rooms[0].capacity, 200);
        assert!(dataset.shared_enrollments.is_empty());
    }

    #[tokio::test]
    async fn test_load_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("dataset.json");
        std::fs::write(
            &path,
            r#"{"rooms": [{"id": "R1", "name": "Salle 1", "capacity": 30}]}"#,
        )
        .unwrap();

        let dataset = FileSource::new(&path).load(&scope()).await.unwrap();
        assert_eq!(dataset.rooms.len(), 1);
        assert!(dataset.modules.is_empty());
    }

    #[tokio::test]
    async fn test_missing_file() {
        let result = FileSource::new("/nonexistent/dataset.yml").load(&scope()).await;
        assert!(matches!(result, Err(SchedError::Io(_))));
    }
}
