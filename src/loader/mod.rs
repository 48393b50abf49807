//! Domain loader: reads modules, formations, professors and rooms from an
//! external data source and produces the working set for one generation run.
//!
//! Sources implement [`DataSource`]; [`load_working_set`] checks integrity,
//! filters modules by department scope and enriches each module with its
//! formation's student count and department.

mod file;
pub mod integrity;
mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{Formation, Module, Professor, Room, Scope, SharedEnrollment};
use crate::error::{Result, SchedError};

pub use file::FileSource;
pub use memory::MemorySource;

/// Raw data as a source hands it over
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dataset {
    pub formations: Vec<Formation>,
    pub modules: Vec<Module>,
    pub professors: Vec<Professor>,
    pub rooms: Vec<Room>,
    pub shared_enrollments: Vec<SharedEnrollment>,
}

/// Anything that can yield scheduling data for a scope
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch the dataset. Sources may pre-filter by scope but are not required to.
    async fn load(&self, scope: &Scope) -> Result<Dataset>;
}

/// In-memory input of one allocation pass
#[derive(Debug, Clone)]
pub struct WorkingSet {
    /// In-scope modules, enriched and sorted by id
    pub modules: Vec<Module>,
    pub formations: BTreeMap<String, Formation>,
    pub professors: BTreeMap<String, Professor>,
    pub rooms: Vec<Room>,
    pub shared_enrollments: Vec<SharedEnrollment>,
}

impl WorkingSet {
    pub fn module(&self, id: &str) -> Option<&Module> {
        self.modules
            .binary_search_by(|m| m.id.as_str().cmp(id))
            .ok()
            .map(|i| &self.modules[i])
    }
}

/// Load, check and enrich the working set for `scope`
pub async fn load_working_set<S: DataSource + ?Sized>(source: &S, scope: &Scope) -> Result<WorkingSet> {
    let dataset = source.load(scope).await?;
    build_working_set(dataset, scope)
}

/// Synchronous half of [`load_working_set`]
pub fn build_working_set(dataset: Dataset, scope: &Scope) -> Result<WorkingSet> {
    integrity::validate(&dataset)?;

    let mut formations: BTreeMap<String, Formation> = dataset
        .formations
        .into_iter()
        .map(|f| (f.id.clone(), Formation { module_count: 0, ..f }))
        .collect();

    for module in &dataset.modules {
        if let Some(formation) = formations.get_mut(&module.formation_id) {
            formation.module_count += 1;
        }
    }

    let mut modules = Vec::new();
    for mut module in dataset.modules {
        let formation = formations.get(&module.formation_id).ok_or_else(|| {
            SchedError::DataIntegrity(format!(
                "module '{}' references unknown formation '{}'",
                module.id, module.formation_id
            ))
        })?;
        if !scope.includes_department(&formation.department) {
            continue;
        }
        module.student_count = formation.student_count;
        module.department = formation.department.clone();
        modules.push(module);
    }
    modules.sort_by(|a, b| a.id.cmp(&b.id));

    let professors = dataset
        .professors
        .into_iter()
        .map(|p| (p.id.clone(), p))
        .collect();

    log::info!(
        "Loaded working set: {} modules, {} formations, {} rooms",
        modules.len(),
        formations.len(),
        dataset.rooms.len()
    );

    Ok(WorkingSet {
        modules,
        formations,
        professors,
        rooms: dataset.rooms,
        shared_enrollments: dataset.shared_enrollments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn scope(departments: Vec<String>) -> Scope {
        let day = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        Scope::new(departments, day, day)
    }

    fn dataset() -> Dataset {
        Dataset {
            formations: vec![
                Formation::new("F1", "L1 Info", "CS", 40),
                Formation::new("F2", "L1 Math", "MATH", 25),
            ],
            modules: vec![
                Module::new("M2", "Analyse", "F2"),
                Module::new("M1", "Algo", "F1"),
                Module::new("M3", "Systems", "F1"),
            ],
            professors: vec![],
            rooms: vec![Room::new("R1", "Salle 1", 50)],
            shared_enrollments: vec![],
        }
    }

    #[tokio::test]
    async fn test_load_enriches_modules() {
        let source = MemorySource::new(dataset());
        let ws = load_working_set(&source, &scope(vec![])).await.unwrap();
        assert_eq!(ws.modules.len(), 3);
        let ids: Vec<&str> = ws.modules.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["M1", "M2", "M3"]);
        let m1 = ws.module("M1").unwrap();
        assert_eq!(m1.student_count, 40);
        assert_eq!(m1.department, "CS");
        assert_eq!(ws.formations["F1"].module_count, 2);
    }

    #[tokio::test]
    async fn test_load_filters_by_department() {
        let source = MemorySource::new(dataset());
        let ws = load_working_set(&source, &scope(vec!["MATH".into()])).await.unwrap();
        assert_eq!(ws.modules.len(), 1);
        assert_eq!(ws.modules[0].id, "M2");
        assert_eq!(ws.modules[0].student_count, 25);
    }

    #[tokio::test]
    async fn test_load_rejects_bad_data() {
        let mut ds = dataset();
        ds.modules.push(Module::new("M9", "Ghost", "F404"));
        let source = MemorySource::new(ds);
        let result = load_working_set(&source, &scope(vec![])).await;
        assert!(matches!(result, Err(SchedError::DataIntegrity(_))));
    }

    #[test]
    fn test_module_lookup_missing() {
        let ws = build_working_set(dataset(), &scope(vec![])).unwrap();
        assert!(ws.module("M404").is_none());
    }
}
