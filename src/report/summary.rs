//! Generation report.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | scheduled | Modules that received a placement |
//! | total | Modules in scope |
//! | time | Wall-clock generation time, `"{secs:.2}s"` |
//! | occupancy_rate | Σ placed students / (Σ room capacity × days × slots) |

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConflictSummary;
use crate::allocator::Allocation;
use crate::domain::{ExamAssignment, JobSummary, Room, UnscheduledModule};

/// Aggregated outcome of one generation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleReport {
    pub scheduled: usize,
    pub total: usize,
    pub time: String,
    pub elapsed_ms: u64,
    /// Seat usage over the whole window (0.0..1.0)
    pub occupancy_rate: f64,
    pub scheduled_by_department: BTreeMap<String, usize>,
    pub unscheduled_by_department: BTreeMap<String, usize>,
    /// Keyed by the snake_case reason name
    pub unscheduled_by_reason: BTreeMap<String, usize>,
}

/// Dashboard view of a persisted schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleStatistics {
    pub total_exams: usize,
    /// Percentage, one decimal
    pub occupancy_rate: f64,
    pub unscheduled_by_department: BTreeMap<String, usize>,
    pub unscheduled_by_reason: BTreeMap<String, usize>,
    /// Filled from an audit of the persisted schedule
    #[serde(default)]
    pub total_conflicts: usize,
    #[serde(default)]
    pub conflicts_by_department: BTreeMap<String, usize>,
}

impl ScheduleStatistics {
    pub fn with_conflicts(mut self, conflicts: &ConflictSummary) -> Self {
        self.total_conflicts = conflicts.total_conflicts;
        self.conflicts_by_department = conflicts.by_department.clone();
        self
    }
}

impl ScheduleReport {
    /// Compute the report for a finished allocation
    pub fn build(allocation: &Allocation, rooms: &[Room], days: usize, slots_per_day: usize, elapsed: Duration) -> Self {
        Self::from_parts(
            &allocation.assignments,
            &allocation.unscheduled,
            rooms,
            days,
            slots_per_day,
            elapsed,
        )
    }

    pub fn from_parts(
        assignments: &[ExamAssignment],
        unscheduled: &[UnscheduledModule],
        rooms: &[Room],
        days: usize,
        slots_per_day: usize,
        elapsed: Duration,
    ) -> Self {
        let mut scheduled_by_department = BTreeMap::new();
        for a in assignments {
            *scheduled_by_department.entry(a.department.clone()).or_insert(0) += 1;
        }

        let mut unscheduled_by_department = BTreeMap::new();
        let mut unscheduled_by_reason = BTreeMap::new();
        for u in unscheduled {
            *unscheduled_by_department.entry(u.department.clone()).or_insert(0) += 1;
            *unscheduled_by_reason.entry(u.reason.as_str().to_string()).or_insert(0) += 1;
        }

        let placed: u64 = assignments.iter().map(|a| u64::from(a.students)).sum();
        Self {
            scheduled: assignments.len(),
            total: assignments.len() + unscheduled.len(),
            time: format_elapsed(elapsed),
            elapsed_ms: elapsed.as_millis() as u64,
            occupancy_rate: occupancy_rate(placed, rooms, days, slots_per_day),
            scheduled_by_department,
            unscheduled_by_department,
            unscheduled_by_reason,
        }
    }

    /// The `{ scheduled, total, time }` payload stored on the job
    pub fn summary(&self) -> JobSummary {
        JobSummary {
            scheduled: self.scheduled,
            total: self.total,
            time: self.time.clone(),
        }
    }

    pub fn statistics(&self) -> ScheduleStatistics {
        ScheduleStatistics {
            total_exams: self.scheduled,
            occupancy_rate: (self.occupancy_rate * 1000.0).round() / 10.0,
            unscheduled_by_department: self.unscheduled_by_department.clone(),
            unscheduled_by_reason: self.unscheduled_by_reason.clone(),
            total_conflicts: 0,
            conflicts_by_department: BTreeMap::new(),
        }
    }
}

pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.2}s", elapsed.as_secs_f64())
}

/// Placed students over offered seats; zero when nothing is offered
pub fn occupancy_rate(placed_students: u64, rooms: &[Room], days: usize, slots_per_day: usize) -> f64 {
    let capacity: u64 = rooms.iter().map(|r| u64::from(r.capacity)).sum();
    let offered = capacity * days as u64 * slots_per_day as u64;
    if offered == 0 {
        return 0.0;
    }
    placed_students as f64 / offered as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UnscheduledReason;
    use chrono::{NaiveDate, NaiveTime};

    fn assignment(id: &str, department: &str, students: u32) -> ExamAssignment {
        ExamAssignment {
            module_id: id.into(),
            module_name: id.into(),
            formation_id: "F1".into(),
            department: department.into(),
            date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            start_time: NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
            duration_minutes: 90,
            room_id: "R1".into(),
            professor_ids: vec![],
            day: 0,
            slot: 0,
            students,
        }
    }

    fn missing(id: &str, department: &str, reason: UnscheduledReason) -> UnscheduledModule {
        UnscheduledModule {
            module_id: id.into(),
            department: department.into(),
            reason,
        }
    }

    fn allocation() -> Allocation {
        Allocation {
            assignments: vec![assignment("M1", "CS", 50), assignment("M2", "MATH", 30)],
            unscheduled: vec![
                missing("M3", "CS", UnscheduledReason::NoRoomCapacity),
                missing("M4", "CS", UnscheduledReason::WindowExhausted),
            ],
            order: vec!["M1".into(), "M2".into(), "M3".into(), "M4".into()],
        }
    }

    #[test]
    fn test_counts() {
        let rooms = vec![Room::new("R1", "A", 100)];
        let report = ScheduleReport::build(&allocation(), &rooms, 2, 2, Duration::from_millis(1234));
        assert_eq!(report.scheduled, 2);
        assert_eq!(report.total, 4);
        assert_eq!(report.time, "1.23s");
        assert_eq!(report.elapsed_ms, 1234);
        assert_eq!(report.scheduled_by_department.get("CS"), Some(&1));
        assert_eq!(report.unscheduled_by_department.get("CS"), Some(&2));
        assert_eq!(report.unscheduled_by_department.get("MATH"), None);
        assert_eq!(report.unscheduled_by_reason.get("no_room_capacity"), Some(&1));
        assert_eq!(report.unscheduled_by_reason.get("window_exhausted"), Some(&1));
    }

    #[test]
    fn test_occupancy_rate() {
        let rooms = vec![Room::new("R1", "A", 100), Room::new("R2", "B", 100)];
        // 80 placed students / (200 seats * 2 days * 2 slots)
        let report = ScheduleReport::build(&allocation(), &rooms, 2, 2, Duration::ZERO);
        assert!((report.occupancy_rate - 0.1).abs() < 1e-9);
        assert!((report.statistics().occupancy_rate - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_occupancy_without_rooms_is_zero() {
        assert_eq!(occupancy_rate(40, &[], 5, 4), 0.0);
        assert_eq!(occupancy_rate(40, &[Room::new("R1", "A", 10)], 0, 4), 0.0);
    }

    #[test]
    fn test_summary_and_statistics() {
        let report = ScheduleReport::build(&allocation(), &[], 1, 1, Duration::from_millis(10));
        let summary = report.summary();
        assert_eq!((summary.scheduled, summary.total), (2, 4));
        assert_eq!(summary.time, "0.01s");

        let stats = report.statistics();
        assert_eq!(stats.total_exams, 2);
        assert_eq!(stats.unscheduled_by_reason.len(), 2);
        assert_eq!(stats.total_conflicts, 0);
    }

    #[test]
    fn test_statistics_with_conflicts() {
        let report = ScheduleReport::build(&allocation(), &[], 1, 1, Duration::ZERO);
        let conflicts = ConflictSummary {
            total_conflicts: 2,
            by_department: BTreeMap::from([("CS".to_string(), 2), ("MATH".to_string(), 1)]),
            by_severity: BTreeMap::from([("critical".to_string(), 2)]),
        };
        let stats = report.statistics().with_conflicts(&conflicts);
        assert_eq!(stats.total_conflicts, 2);
        assert_eq!(stats.conflicts_by_department.get("MATH"), Some(&1));

        // statistics written before conflicts existed still load
        let old = r#"{"total_exams":1,"occupancy_rate":5.0,"unscheduled_by_department":{},"unscheduled_by_reason":{}}"#;
        let parsed: ScheduleStatistics = serde_json::from_str(old).unwrap();
        assert_eq!(parsed.total_conflicts, 0);
        assert!(parsed.conflicts_by_department.is_empty());
    }

    #[test]
    fn test_empty_allocation() {
        let empty = Allocation {
            assignments: vec![],
            unscheduled: vec![],
            order: vec![],
        };
        let report = ScheduleReport::build(&empty, &[Room::new("R1", "A", 10)], 5, 4, Duration::ZERO);
        assert_eq!((report.scheduled, report.total), (0, 0));
        assert_eq!(report.time, "0.00s");
        assert!(report.unscheduled_by_reason.is_empty());
    }
}
