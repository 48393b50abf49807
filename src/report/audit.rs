//! Re-checks a finished or persisted schedule against the hard constraints.
//!
//! Collects every violation rather than stopping at the first one, and
//! rolls them up per department and severity for the dashboards.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::allocator::StudentExclusion;
use crate::conflict::ConflictGraph;
use crate::domain::{ExamAssignment, Room};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    UnknownRoom,
    OverCapacity,
    RoomDoubleBooked,
    ProfessorDoubleBooked,
    StudentConflict,
}

impl ViolationKind {
    pub fn severity(self) -> Severity {
        match self {
            ViolationKind::RoomDoubleBooked | ViolationKind::StudentConflict => Severity::Critical,
            ViolationKind::ProfessorDoubleBooked | ViolationKind::OverCapacity => Severity::High,
            ViolationKind::UnknownRoom => Severity::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleViolation {
    pub kind: ViolationKind,
    pub severity: Severity,
    /// Modules involved, sorted
    pub modules: Vec<String>,
    /// Departments of those modules, sorted and unique
    pub departments: Vec<String>,
    pub message: String,
}

/// Violation counts for a schedule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictSummary {
    pub total_conflicts: usize,
    /// A violation spanning two departments counts for each
    pub by_department: BTreeMap<String, usize>,
    pub by_severity: BTreeMap<String, usize>,
}

pub fn summarize_violations(violations: &[ScheduleViolation]) -> ConflictSummary {
    let mut summary = ConflictSummary {
        total_conflicts: violations.len(),
        ..ConflictSummary::default()
    };
    for v in violations {
        for department in &v.departments {
            *summary.by_department.entry(department.clone()).or_insert(0) += 1;
        }
        *summary.by_severity.entry(v.severity.as_str().to_string()).or_insert(0) += 1;
    }
    summary
}

impl fmt::Display for ScheduleViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

type SlotKey = (NaiveDate, NaiveTime);

fn violation(kind: ViolationKind, a: &ExamAssignment, b: Option<&ExamAssignment>, message: String) -> ScheduleViolation {
    let involved: Vec<&ExamAssignment> = std::iter::once(a).chain(b).collect();
    let mut modules: Vec<String> = involved.iter().map(|e| e.module_id.clone()).collect();
    modules.sort();
    let mut departments: Vec<String> = involved.iter().map(|e| e.department.clone()).collect();
    departments.sort();
    departments.dedup();
    ScheduleViolation {
        kind,
        severity: kind.severity(),
        modules,
        departments,
        message,
    }
}

/// Find every hard-constraint violation in `assignments`.
///
/// `graph` supplies the student conflicts; modules it does not know are
/// treated as conflict-free.
pub fn audit_schedule(
    assignments: &[ExamAssignment],
    rooms: &[Room],
    graph: &ConflictGraph,
    exclusion: StudentExclusion,
) -> Vec<ScheduleViolation> {
    let rooms: BTreeMap<&str, &Room> = rooms.iter().map(|r| (r.id.as_str(), r)).collect();
    let mut violations = Vec::new();

    for a in assignments {
        match rooms.get(a.room_id.as_str()) {
            None => violations.push(violation(
                ViolationKind::UnknownRoom,
                a,
                None,
                format!("{} is placed in unknown room {}", a.module_id, a.room_id),
            )),
            Some(room) if !room.fits(a.students) => violations.push(violation(
                ViolationKind::OverCapacity,
                a,
                None,
                format!(
                    "{} has {} students but room {} seats {}",
                    a.module_id, a.students, room.id, room.capacity
                ),
            )),
            Some(_) => {}
        }
    }

    let mut by_slot: BTreeMap<SlotKey, Vec<&ExamAssignment>> = BTreeMap::new();
    let mut by_date: BTreeMap<NaiveDate, Vec<&ExamAssignment>> = BTreeMap::new();
    for a in assignments {
        by_slot.entry((a.date, a.start_time)).or_default().push(a);
        by_date.entry(a.date).or_default().push(a);
    }

    for ((date, start), exams) in &by_slot {
        for (i, a) in exams.iter().enumerate() {
            for b in &exams[i + 1..] {
                if a.room_id == b.room_id {
                    violations.push(violation(
                        ViolationKind::RoomDoubleBooked,
                        a,
                        Some(*b),
                        format!(
                            "room {} holds {} and {} on {} at {}",
                            a.room_id,
                            a.module_id,
                            b.module_id,
                            date,
                            start.format("%H:%M")
                        ),
                    ));
                }
                if let Some(p) = a.professor_ids.iter().find(|p| b.professor_ids.contains(p)) {
                    violations.push(violation(
                        ViolationKind::ProfessorDoubleBooked,
                        a,
                        Some(*b),
                        format!(
                            "professor {} supervises {} and {} on {} at {}",
                            p,
                            a.module_id,
                            b.module_id,
                            date,
                            start.format("%H:%M")
                        ),
                    ));
                }
            }
        }
    }

    let student_groups: Vec<&Vec<&ExamAssignment>> = match exclusion {
        StudentExclusion::Slot => by_slot.values().collect(),
        StudentExclusion::Day => by_date.values().collect(),
    };
    for exams in student_groups {
        for (i, a) in exams.iter().enumerate() {
            for b in &exams[i + 1..] {
                if graph.conflicts(&a.module_id, &b.module_id) {
                    violations.push(violation(
                        ViolationKind::StudentConflict,
                        a,
                        Some(*b),
                        format!(
                            "{} and {} share students and are both on {}",
                            a.module_id, b.module_id, a.date
                        ),
                    ));
                }
            }
        }
    }

    violations.sort_by(|x, y| x.kind.cmp(&y.kind).then_with(|| x.modules.cmp(&y.modules)));
    violations
}
