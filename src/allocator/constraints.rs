//! Constraint predicates consulted by the slot allocator.
//!
//! Each predicate takes the current partial schedule and a candidate
//! (day, slot, room) triple and returns [`Check::Ok`] or the reason the
//! triple is infeasible. Predicates never mutate state; only
//! [`ScheduleState::commit`] does.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::conflict::ConflictGraph;
use crate::domain::{Room, UnscheduledReason};

/// How far apart two hard-conflicting exams must be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StudentExclusion {
    /// Not in the same (day, slot)
    #[default]
    Slot,
    /// Not on the same day at all (one exam per student per day)
    Day,
}

/// A candidate placement: indices into the window days, the slot template and the room list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Triple {
    pub day: usize,
    pub slot: usize,
    pub room: usize,
}

impl Triple {
    pub fn new(day: usize, slot: usize, room: usize) -> Self {
        Self { day, slot, room }
    }
}

/// The module being placed, as the predicates see it
#[derive(Debug, Clone, Copy)]
pub struct Exam<'a> {
    /// Node index in the conflict graph
    pub index: usize,
    pub students: u32,
    pub professors: &'a [String],
}

/// Capacity already taken by an exam this pass does not place, such as a
/// persisted exam of a department outside the run's scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub day: usize,
    /// Every template slot the exam's time range touches
    pub slots: Vec<usize>,
    /// Index into the room list, if the room is known
    pub room: Option<usize>,
    pub professors: Vec<String>,
    /// Graph nodes that share students with the reserved exam
    pub peers: Vec<usize>,
}

/// Outcome of a single predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    Ok,
    Violation(UnscheduledReason),
}

impl Check {
    pub fn is_ok(&self) -> bool {
        matches!(self, Check::Ok)
    }
}

/// Partial assignment state built up during one allocation pass
#[derive(Debug)]
pub struct ScheduleState<'a> {
    graph: &'a ConflictGraph,
    rooms: &'a [Room],
    exclusion: StudentExclusion,
    booked_rooms: HashSet<Triple>,
    slot_exams: HashMap<(usize, usize), Vec<usize>>,
    day_exams: HashMap<usize, Vec<usize>>,
    busy_professors: HashSet<(usize, usize, String)>,
    /// Nodes kept out of a (day, slot) by reservations
    blocked_slots: HashSet<(usize, usize, usize)>,
    /// Nodes kept out of a day by reservations
    blocked_days: HashSet<(usize, usize)>,
    committed: usize,
}

impl<'a> ScheduleState<'a> {
    pub fn new(graph: &'a ConflictGraph, rooms: &'a [Room], exclusion: StudentExclusion) -> Self {
        Self {
            graph,
            rooms,
            exclusion,
            booked_rooms: HashSet::new(),
            slot_exams: HashMap::new(),
            day_exams: HashMap::new(),
            busy_professors: HashSet::new(),
            blocked_slots: HashSet::new(),
            blocked_days: HashSet::new(),
            committed: 0,
        }
    }

    pub fn rooms(&self) -> &[Room] {
        self.rooms
    }

    pub fn exclusion(&self) -> StudentExclusion {
        self.exclusion
    }

    pub fn committed(&self) -> usize {
        self.committed
    }

    pub fn is_room_booked(&self, at: Triple) -> bool {
        self.booked_rooms.contains(&at)
    }

    pub fn exams_in_slot(&self, day: usize, slot: usize) -> &[usize] {
        self.slot_exams.get(&(day, slot)).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn exams_on_day(&self, day: usize) -> &[usize] {
        self.day_exams.get(&day).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_professor_busy(&self, professor: &str, day: usize, slot: usize) -> bool {
        self.busy_professors.contains(&(day, slot, professor.to_string()))
    }

    /// Whether a reservation keeps graph node `index` out of this (day, slot),
    /// or out of the whole day under `StudentExclusion::Day`
    pub fn is_blocked(&self, index: usize, day: usize, slot: usize) -> bool {
        match self.exclusion {
            StudentExclusion::Slot => self.blocked_slots.contains(&(index, day, slot)),
            StudentExclusion::Day => self.blocked_days.contains(&(index, day)),
        }
    }

    /// Take the room, professors and student peers of an exam placed elsewhere
    pub fn reserve(&mut self, reservation: &Reservation) {
        let day = reservation.day;
        for &slot in &reservation.slots {
            if let Some(room) = reservation.room {
                self.booked_rooms.insert(Triple::new(day, slot, room));
            }
            for professor in &reservation.professors {
                self.busy_professors.insert((day, slot, professor.clone()));
            }
            for &peer in &reservation.peers {
                self.blocked_slots.insert((peer, day, slot));
            }
        }
        for &peer in &reservation.peers {
            self.blocked_days.insert((peer, day));
        }
    }

    /// Record a placement. Callers are expected to have run [`check_all`] first.
    pub fn commit(&mut self, exam: &Exam<'_>, at: Triple) {
        self.booked_rooms.insert(at);
        self.slot_exams.entry((at.day, at.slot)).or_default().push(exam.index);
        self.day_exams.entry(at.day).or_default().push(exam.index);
        for professor in exam.professors {
            self.busy_professors.insert((at.day, at.slot, professor.clone()));
        }
        self.committed += 1;
    }
}

/// Room holds every enrolled student
pub fn check_capacity(state: &ScheduleState<'_>, exam: &Exam<'_>, at: Triple) -> Check {
    match state.rooms.get(at.room) {
        Some(room) if room.fits(exam.students) => Check::Ok,
        _ => Check::Violation(UnscheduledReason::NoRoomCapacity),
    }
}

/// Room not already booked in this (day, slot)
pub fn check_room_free(state: &ScheduleState<'_>, at: Triple) -> Check {
    if state.is_room_booked(at) {
        Check::Violation(UnscheduledReason::WindowExhausted)
    } else {
        Check::Ok
    }
}

/// No hard-conflicting exam in the same slot (or day, under `StudentExclusion::Day`)
pub fn check_student_conflicts(state: &ScheduleState<'_>, exam: &Exam<'_>, at: Triple) -> Check {
    let placed = match state.exclusion {
        StudentExclusion::Slot => state.exams_in_slot(at.day, at.slot),
        StudentExclusion::Day => state.exams_on_day(at.day),
    };
    if state.is_blocked(exam.index, at.day, at.slot)
        || placed.iter().any(|&other| state.graph.conflicts_at(exam.index, other))
    {
        Check::Violation(UnscheduledReason::StudentDayConflict)
    } else {
        Check::Ok
    }
}

/// None of the exam's professors already supervises in this (day, slot)
pub fn check_professor_free(state: &ScheduleState<'_>, exam: &Exam<'_>, at: Triple) -> Check {
    if exam
        .professors
        .iter()
        .any(|p| state.is_professor_busy(p, at.day, at.slot))
    {
        Check::Violation(UnscheduledReason::ProfessorConflict)
    } else {
        Check::Ok
    }
}

/// Run every predicate in fixed order, returning the first violation
pub fn check_all(state: &ScheduleState<'_>, exam: &Exam<'_>, at: Triple) -> Check {
    let checks = [
        check_capacity(state, exam, at),
        check_room_free(state, at),
        check_student_conflicts(state, exam, at),
        check_professor_free(state, exam, at),
    ];
    checks.into_iter().find(|c| !c.is_ok()).unwrap_or(Check::Ok)
}
