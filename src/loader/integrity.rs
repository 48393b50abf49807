//! Structural integrity checks on a raw dataset.
//!
//! Detects:
//! - Duplicate IDs
//! - Rooms with zero capacity
//! - Modules referencing unknown formations, professors or prerequisites
//! - Self-referencing and cyclic prerequisite chains
//!
//! All problems are collected before failing so one run reports everything.

use std::collections::{BTreeMap, HashSet};

use super::Dataset;
use crate::error::{Result, SchedError};

/// Integrity problem categories
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityIssueKind {
    DuplicateId,
    InvalidCapacity,
    UnknownFormation,
    UnknownProfessor,
    UnknownPrerequisite,
    SelfPrerequisite,
    PrerequisiteCycle,
}

/// A single integrity problem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityIssue {
    pub kind: IntegrityIssueKind,
    pub message: String,
}

impl IntegrityIssue {
    fn new(kind: IntegrityIssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Collect every integrity issue in the dataset
pub fn find_issues(dataset: &Dataset) -> Vec<IntegrityIssue> {
    let mut issues = Vec::new();

    let formation_ids = collect_ids(dataset.formations.iter().map(|f| f.id.as_str()), "formation", &mut issues);
    let professor_ids = collect_ids(dataset.professors.iter().map(|p| p.id.as_str()), "professor", &mut issues);
    let module_ids = collect_ids(dataset.modules.iter().map(|m| m.id.as_str()), "module", &mut issues);
    collect_ids(dataset.rooms.iter().map(|r| r.id.as_str()), "room", &mut issues);

    for room in &dataset.rooms {
        if room.capacity == 0 {
            issues.push(IntegrityIssue::new(
                IntegrityIssueKind::InvalidCapacity,
                format!("room '{}' has zero capacity", room.id),
            ));
        }
    }

    for module in &dataset.modules {
        if !formation_ids.contains(module.formation_id.as_str()) {
            issues.push(IntegrityIssue::new(
                IntegrityIssueKind::UnknownFormation,
                format!("module '{}' references unknown formation '{}'", module.id, module.formation_id),
            ));
        }

        for professor in &module.professor_ids {
            if !professor_ids.contains(professor.as_str()) {
                issues.push(IntegrityIssue::new(
                    IntegrityIssueKind::UnknownProfessor,
                    format!("module '{}' references unknown professor '{}'", module.id, professor),
                ));
            }
        }

        if let Some(prereq) = &module.prerequisite_id {
            if prereq == &module.id {
                issues.push(IntegrityIssue::new(
                    IntegrityIssueKind::SelfPrerequisite,
                    format!("module '{}' lists itself as prerequisite", module.id),
                ));
            } else if !module_ids.contains(prereq.as_str()) {
                issues.push(IntegrityIssue::new(
                    IntegrityIssueKind::UnknownPrerequisite,
                    format!("module '{}' references unknown prerequisite '{}'", module.id, prereq),
                ));
            }
        }
    }

    for rule in &dataset.shared_enrollments {
        for formation in [&rule.formation_a, &rule.formation_b] {
            if !formation_ids.contains(formation.as_str()) {
                issues.push(IntegrityIssue::new(
                    IntegrityIssueKind::UnknownFormation,
                    format!("shared enrollment references unknown formation '{}'", formation),
                ));
            }
        }
    }

    for cycle in prerequisite_cycles(dataset) {
        issues.push(IntegrityIssue::new(
            IntegrityIssueKind::PrerequisiteCycle,
            format!("prerequisite cycle: {}", cycle.join(" -> ")),
        ));
    }

    issues
}

/// Fail with `DataIntegrity` if the dataset has any issue
pub fn validate(dataset: &Dataset) -> Result<()> {
    let issues = find_issues(dataset);
    if issues.is_empty() {
        return Ok(());
    }
    let messages: Vec<String> = issues.into_iter().map(|i| i.message).collect();
    Err(SchedError::DataIntegrity(messages.join("; ")))
}

fn collect_ids<'a>(
    ids: impl Iterator<Item = &'a str>,
    entity: &str,
    issues: &mut Vec<IntegrityIssue>,
) -> HashSet<&'a str> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            issues.push(IntegrityIssue::new(
                IntegrityIssueKind::DuplicateId,
                format!("duplicate {} id '{}'", entity, id),
            ));
        }
    }
    seen
}

/// Find prerequisite cycles of length >= 2.
///
/// Each module has at most one prerequisite, so following the chain from any
/// module either terminates or revisits a module on the current path.
/// Each cycle is reported once, rotated to start at its smallest id.
fn prerequisite_cycles(dataset: &Dataset) -> Vec<Vec<String>> {
    let next: BTreeMap<&str, &str> = dataset
        .modules
        .iter()
        .filter_map(|m| {
            m.prerequisite_id
                .as_deref()
                .filter(|p| *p != m.id)
                .map(|p| (m.id.as_str(), p))
        })
        .collect();

    let mut done: HashSet<&str> = HashSet::new();
    let mut cycles = Vec::new();

    for &start in next.keys() {
        if done.contains(start) {
            continue;
        }
        let mut path: Vec<&str> = Vec::new();
        let mut on_path: HashSet<&str> = HashSet::new();
        let mut current = Some(start);

        while let Some(node) = current {
            if done.contains(node) {
                break;
            }
            if on_path.contains(node) {
                let pos = path.iter().position(|n| *n == node).unwrap_or(0);
                let mut cycle: Vec<String> = path[pos..].iter().map(|s| s.to_string()).collect();
                if let Some(min_pos) = cycle
                    .iter()
                    .enumerate()
                    .min_by(|a, b| a.1.cmp(b.1))
                    .map(|(i, _)| i)
                {
                    cycle.rotate_left(min_pos);
                }
                cycle.push(cycle[0].clone());
                cycles.push(cycle);
                break;
            }
            path.push(node);
            on_path.insert(node);
            current = next.get(node).copied();
        }

        done.extend(path);
    }

    cycles
}
