//! Greedy most-constrained-first slot allocator.
//!
//! # Algorithm
//!
//! 1. Order modules once by descending hard-conflict degree, then descending
//!    size, then descending soft degree, then ascending id.
//! 2. For each module, scan days chronologically, then slots, then rooms by
//!    ascending capacity (ties by room id), skipping rooms that are too small.
//! 3. Commit the first triple that passes every constraint predicate.
//! 4. If none does, record the module as unscheduled and move on. Committed
//!    placements are never revisited.
//!
//! # Complexity
//! O(n * d * s * r) placement checks, where n=modules, d=days, s=slots/day,
//! r=rooms, plus the O(n^2) graph build upstream.

use std::cmp::Reverse;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::constraints::{
    Check, Exam, Reservation, ScheduleState, StudentExclusion, Triple, check_professor_free, check_room_free,
    check_student_conflicts,
};
use crate::conflict::ConflictGraph;
use crate::domain::{ExamAssignment, ExamWindow, Module, Room, SlotTemplate, UnscheduledModule, UnscheduledReason};
use crate::error::{Result, SchedError};

/// Allocator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AllocatorConfig {
    pub template: SlotTemplate,
    pub exclusion: StudentExclusion,
}

/// Hooks called between module placements
pub trait AllocationObserver {
    /// Checked before each module; returning true abandons the pass
    fn should_stop(&self) -> bool {
        false
    }

    /// Called after each module is placed or given up on
    fn on_module_done(&mut self, _done: usize, _total: usize) {}
}

/// Observer that never interrupts
#[derive(Debug, Default)]
pub struct NoopObserver;

impl AllocationObserver for NoopObserver {}

/// Output of a complete allocation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub assignments: Vec<ExamAssignment>,
    pub unscheduled: Vec<UnscheduledModule>,
    /// Module ids in the order they were processed
    pub order: Vec<String>,
}

impl Allocation {
    pub fn total(&self) -> usize {
        self.assignments.len() + self.unscheduled.len()
    }

    pub fn scheduled(&self) -> usize {
        self.assignments.len()
    }
}

/// Result of running the allocator with an observer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocationOutcome {
    /// Every module was processed
    Complete(Allocation),
    /// The observer asked to stop; partial placements are discarded
    Cancelled { processed: usize },
}

/// Single-pass greedy best-fit allocator
#[derive(Debug, Clone, Default)]
pub struct SlotAllocator {
    config: AllocatorConfig,
}

impl SlotAllocator {
    pub fn new(config: AllocatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Priority order over `modules` (indices), most constrained first
    pub fn priority_order(&self, modules: &[Module], graph: &ConflictGraph) -> Result<Vec<usize>> {
        let nodes = graph_nodes(modules, graph)?;
        let mut order: Vec<usize> = (0..modules.len()).collect();
        order.sort_by_key(|&i| {
            let node = nodes[i];
            (
                Reverse(graph.degree_at(node)),
                Reverse(modules[i].student_count),
                Reverse(graph.soft_degree_at(node)),
                modules[i].id.clone(),
            )
        });
        Ok(order)
    }

    /// Run a full pass without interruption
    pub fn allocate(
        &self,
        modules: &[Module],
        rooms: &[Room],
        graph: &ConflictGraph,
        window: &ExamWindow,
    ) -> Result<Allocation> {
        match self.allocate_with(modules, rooms, graph, window, &mut NoopObserver)? {
            AllocationOutcome::Complete(allocation) => Ok(allocation),
            AllocationOutcome::Cancelled { .. } => Err(SchedError::InvalidState(
                "allocation cancelled without a cancelling observer".into(),
            )),
        }
    }

    /// Run a pass, consulting `observer` between module placements.
    ///
    /// `graph` must have been built over `modules`.
    pub fn allocate_with<O: AllocationObserver + ?Sized>(
        &self,
        modules: &[Module],
        rooms: &[Room],
        graph: &ConflictGraph,
        window: &ExamWindow,
        observer: &mut O,
    ) -> Result<AllocationOutcome> {
        self.allocate_around(modules, rooms, graph, window, &[], observer)
    }

    /// Run a pass that works around `held` exams, which keep their room,
    /// professors and students busy but are not part of the output
    pub fn allocate_around<O: AllocationObserver + ?Sized>(
        &self,
        modules: &[Module],
        rooms: &[Room],
        graph: &ConflictGraph,
        window: &ExamWindow,
        held: &[ExamAssignment],
        observer: &mut O,
    ) -> Result<AllocationOutcome> {
        let template = &self.config.template;
        let nodes = graph_nodes(modules, graph)?;
        let order = self.priority_order(modules, graph)?;
        let dates = window.dates();
        let room_order = rooms_by_capacity(rooms);

        let mut state = ScheduleState::new(graph, rooms, self.config.exclusion);
        let reservations = self.reservations(held, rooms, graph, &dates);
        for reservation in &reservations {
            state.reserve(reservation);
        }
        if !reservations.is_empty() {
            log::debug!("Reserved {} exams held outside the pass", reservations.len());
        }
        let mut assignments = Vec::new();
        let mut unscheduled = Vec::new();
        let total = modules.len();

        for (done, &i) in order.iter().enumerate() {
            if observer.should_stop() {
                log::info!("Allocation stopped after {} of {} modules", done, total);
                return Ok(AllocationOutcome::Cancelled { processed: done });
            }

            let module = &modules[i];
            let exam = Exam {
                index: nodes[i],
                students: module.student_count,
                professors: &module.professor_ids,
            };

            match self.place(&state, &exam, &room_order, dates.len()) {
                Ok(at) => {
                    state.commit(&exam, at);
                    let start_time = template.start_of(at.slot).ok_or_else(|| {
                        SchedError::InvalidState(format!("slot {} outside template", at.slot))
                    })?;
                    assignments.push(ExamAssignment {
                        module_id: module.id.clone(),
                        module_name: module.name.clone(),
                        formation_id: module.formation_id.clone(),
                        department: module.department.clone(),
                        date: dates[at.day],
                        start_time,
                        duration_minutes: template.duration_minutes,
                        room_id: rooms[at.room].id.clone(),
                        professor_ids: module.professor_ids.clone(),
                        day: at.day,
                        slot: at.slot,
                        students: module.student_count,
                    });
                }
                Err(reason) => {
                    log::debug!("Module {} unscheduled: {}", module.id, reason);
                    unscheduled.push(UnscheduledModule {
                        module_id: module.id.clone(),
                        department: module.department.clone(),
                        reason,
                    });
                }
            }

            observer.on_module_done(done + 1, total);
        }

        log::info!(
            "Allocation finished: {} scheduled, {} unscheduled",
            assignments.len(),
            unscheduled.len()
        );

        Ok(AllocationOutcome::Complete(Allocation {
            assignments,
            unscheduled,
            order: order.iter().map(|&i| modules[i].id.clone()).collect(),
        }))
    }

    /// Map held exams that fall on a window date onto the pass's indices
    fn reservations(
        &self,
        held: &[ExamAssignment],
        rooms: &[Room],
        graph: &ConflictGraph,
        dates: &[NaiveDate],
    ) -> Vec<Reservation> {
        held.iter()
            .filter_map(|exam| {
                let day = dates.iter().position(|d| *d == exam.date)?;
                Some(Reservation {
                    day,
                    slots: self
                        .config
                        .template
                        .slots_overlapping(exam.start_time, exam.duration_minutes),
                    room: rooms.iter().position(|r| r.id == exam.room_id),
                    professors: exam.professor_ids.clone(),
                    peers: graph.peers_of_formation(&exam.formation_id),
                })
            })
            .collect()
    }

    /// First feasible triple for `exam`, or the reason there is none
    fn place(
        &self,
        state: &ScheduleState<'_>,
        exam: &Exam<'_>,
        room_order: &[usize],
        days: usize,
    ) -> std::result::Result<Triple, UnscheduledReason> {
        let rooms = state.rooms();
        let first_fit = room_order.partition_point(|&r| !rooms[r].fits(exam.students));
        let fitting = &room_order[first_fit..];
        if fitting.is_empty() {
            return Err(UnscheduledReason::NoRoomCapacity);
        }

        let mut slot_reasons = Vec::new();
        for day in 0..days {
            for slot in 0..self.config.template.slots_per_day() {
                // Student and professor checks do not depend on the room.
                let candidate = Triple::new(day, slot, fitting[0]);
                if let Check::Violation(reason) = check_student_conflicts(state, exam, candidate) {
                    slot_reasons.push(reason);
                    continue;
                }
                if let Check::Violation(reason) = check_professor_free(state, exam, candidate) {
                    slot_reasons.push(reason);
                    continue;
                }
                match fitting
                    .iter()
                    .map(|&room| Triple::new(day, slot, room))
                    .find(|at| check_room_free(state, *at).is_ok())
                {
                    Some(at) => return Ok(at),
                    None => slot_reasons.push(UnscheduledReason::WindowExhausted),
                }
            }
        }

        Err(summarize(&slot_reasons))
    }
}

/// Collapse per-slot failures into one reason: unanimous reasons are kept,
/// anything else (including an empty window) is `WindowExhausted`
fn summarize(slot_reasons: &[UnscheduledReason]) -> UnscheduledReason {
    match slot_reasons.split_first() {
        Some((first, rest)) if rest.iter().all(|r| r == first) => *first,
        _ => UnscheduledReason::WindowExhausted,
    }
}

/// Room indices by ascending capacity, ties broken by room id
fn rooms_by_capacity(rooms: &[Room]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..rooms.len()).collect();
    order.sort_by(|&a, &b| {
        rooms[a]
            .capacity
            .cmp(&rooms[b].capacity)
            .then_with(|| rooms[a].id.cmp(&rooms[b].id))
    });
    order
}

/// Graph node index of every module, in module order
fn graph_nodes(modules: &[Module], graph: &ConflictGraph) -> Result<Vec<usize>> {
    modules
        .iter()
        .map(|m| {
            graph.index_of(&m.id).ok_or_else(|| {
                SchedError::InvalidState(format!("module {} missing from conflict graph", m.id))
            })
        })
        .collect()
}
