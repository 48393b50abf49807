//! Allocator output: committed exam assignments and unscheduled modules.

use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// One committed exam: a module placed in a (day, slot, room) triple
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamAssignment {
    pub module_id: String,
    pub module_name: String,
    pub formation_id: String,
    pub department: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: u32,
    pub room_id: String,
    pub professor_ids: Vec<String>,
    /// Index of the exam day within the window
    pub day: usize,
    /// Index of the slot within the day template
    pub slot: usize,
    /// Seats taken, equal to the module's enrolled students
    pub students: u32,
}

/// Why the allocator could not place a module. This is an expected, reported
/// outcome, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnscheduledReason {
    /// No room is large enough for the module's students
    NoRoomCapacity,
    /// Every slot had a supervising professor already booked
    ProfessorConflict,
    /// Every slot (or day) already held a hard-conflicting exam
    StudentDayConflict,
    /// Catch-all: the window ran out of free rooms or reasons were mixed
    WindowExhausted,
}

impl UnscheduledReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnscheduledReason::NoRoomCapacity => "no_room_capacity",
            UnscheduledReason::ProfessorConflict => "professor_conflict",
            UnscheduledReason::StudentDayConflict => "student_day_conflict",
            UnscheduledReason::WindowExhausted => "window_exhausted",
        }
    }
}

impl fmt::Display for UnscheduledReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A module the allocator gave up on, with the recorded reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnscheduledModule {
    pub module_id: String,
    pub department: String,
    pub reason: UnscheduledReason,
}
