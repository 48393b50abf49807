//! Allocator invariant tests over synthetic datasets
//!
//! Builds a campus-sized dataset with a small deterministic generator and
//! checks the placement invariants on the allocator output directly.

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveTime};
use examsched::allocator::{AllocatorConfig, SlotAllocator, StudentExclusion};
use examsched::conflict::ConflictGraph;
use examsched::domain::{
    ExamWindow, Formation, Module, Professor, Room, Scope, SharedEnrollment, SlotTemplate, UnscheduledReason,
};
use examsched::loader::{Dataset, build_working_set};
use examsched::report::audit_schedule;

/// Linear congruential generator, enough for reproducible fixtures
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) % bound
    }
}

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

fn campus(seed: u64) -> Dataset {
    let mut rng = Lcg(seed);
    let departments = ["CS", "MATH", "PHYS", "BIO"];
    let mut dataset = Dataset::default();

    for f in 0..16 {
        let department = departments[f % departments.len()];
        let students = 20 + rng.next(180) as u32;
        let formation_id = format!("F{:02}", f);
        dataset
            .formations
            .push(Formation::new(&formation_id, format!("Formation {}", f), department, students));

        for m in 0..(3 + rng.next(4)) {
            let mut module = Module::new(
                format!("{}-M{}", formation_id, m),
                format!("Module {} of {}", m, formation_id),
                &formation_id,
            );
            module = module.with_professor(format!("P{:02}", rng.next(12)));
            dataset.modules.push(module);
        }
    }

    for p in 0..12 {
        dataset
            .professors
            .push(Professor::new(format!("P{:02}", p), format!("Professor {}", p), departments[p % 4]));
    }

    dataset.shared_enrollments.push(SharedEnrollment::new("F00", "F04", 12));
    dataset.shared_enrollments.push(SharedEnrollment::new("F01", "F09", 5));

    for r in 0..6 {
        dataset
            .rooms
            .push(Room::new(format!("R{}", r), format!("Room {}", r), 40 + 30 * r as u32));
    }
    dataset
}

fn allocator(exclusion: StudentExclusion) -> SlotAllocator {
    SlotAllocator::new(AllocatorConfig {
        template: SlotTemplate::default(),
        exclusion,
    })
}

fn everything() -> Scope {
    Scope::new(vec![], monday(), monday())
}

#[test]
fn test_invariants_hold_on_synthetic_campus() {
    for seed in [1, 7, 42, 1234] {
        let working_set = build_working_set(campus(seed), &everything()).unwrap();
        let graph = ConflictGraph::from_working_set(&working_set);
        let window = ExamWindow::new(monday(), 4);

        for exclusion in [StudentExclusion::Slot, StudentExclusion::Day] {
            let result = allocator(exclusion)
                .allocate(&working_set.modules, &working_set.rooms, &graph, &window)
                .unwrap();

            assert_eq!(result.total(), working_set.modules.len(), "seed {}", seed);

            let mut rooms_used = HashSet::new();
            let mut professors_used = HashSet::new();
            for a in &result.assignments {
                let room = working_set.rooms.iter().find(|r| r.id == a.room_id).unwrap();
                assert!(room.capacity >= a.students, "capacity, seed {}", seed);
                assert!(rooms_used.insert((a.day, a.slot, a.room_id.clone())), "room, seed {}", seed);
                for p in &a.professor_ids {
                    assert!(professors_used.insert((a.day, a.slot, p.clone())), "professor, seed {}", seed);
                }
            }

            for (i, a) in result.assignments.iter().enumerate() {
                for b in &result.assignments[i + 1..] {
                    let together = match exclusion {
                        StudentExclusion::Slot => a.day == b.day && a.slot == b.slot,
                        StudentExclusion::Day => a.day == b.day,
                    };
                    assert!(
                        !(together && graph.conflicts(&a.module_id, &b.module_id)),
                        "{} and {} share students, seed {}",
                        a.module_id,
                        b.module_id,
                        seed
                    );
                }
            }

            let violations = audit_schedule(&result.assignments, &working_set.rooms, &graph, exclusion);
            assert!(violations.is_empty(), "seed {}: {:?}", seed, violations);
        }
    }
}

#[test]
fn test_allocation_is_deterministic() {
    let working_set = build_working_set(campus(99), &everything()).unwrap();
    let window = ExamWindow::new(monday(), 3);

    let first = {
        let graph = ConflictGraph::from_working_set(&working_set);
        allocator(StudentExclusion::Slot)
            .allocate(&working_set.modules, &working_set.rooms, &graph, &window)
            .unwrap()
    };
    let second = {
        let graph = ConflictGraph::from_working_set(&working_set);
        allocator(StudentExclusion::Slot)
            .allocate(&working_set.modules, &working_set.rooms, &graph, &window)
            .unwrap()
    };
    assert_eq!(first, second);
}

#[test]
fn test_input_order_does_not_change_result() {
    let dataset = campus(5);
    let mut reversed = dataset.clone();
    reversed.modules.reverse();
    reversed.rooms.reverse();
    let window = ExamWindow::new(monday(), 3);

    let run = |dataset: Dataset| {
        let working_set = build_working_set(dataset, &everything()).unwrap();
        let graph = ConflictGraph::from_working_set(&working_set);
        allocator(StudentExclusion::Slot)
            .allocate(&working_set.modules, &working_set.rooms, &graph, &window)
            .unwrap()
    };
    let a = run(dataset);
    let b = run(reversed);
    assert_eq!(a.assignments, b.assignments);
    assert_eq!(a.unscheduled, b.unscheduled);
}

#[test]
fn test_same_formation_pair_split_across_slots() {
    let mut dataset = Dataset::default();
    dataset.formations.push(Formation::new("A", "Formation A", "CS", 50));
    dataset.formations.push(Formation::new("B", "Formation B", "CS", 50));
    dataset.modules.push(Module::new("M1", "M1", "A"));
    dataset.modules.push(Module::new("M2", "M2", "A"));
    dataset.modules.push(Module::new("M3", "M3", "B"));
    dataset.rooms.push(Room::new("R1", "Room", 60));

    let working_set = build_working_set(dataset, &everything()).unwrap();
    let graph = ConflictGraph::from_working_set(&working_set);
    let template = SlotTemplate::uniform(NaiveTime::from_hms_opt(9, 0, 0).unwrap(), 2, 90);
    let result = SlotAllocator::new(AllocatorConfig {
        template,
        exclusion: StudentExclusion::Slot,
    })
    .allocate(&working_set.modules, &working_set.rooms, &graph, &ExamWindow::new(monday(), 1))
    .unwrap();

    let slot = |id: &str| result.assignments.iter().find(|a| a.module_id == id).map(|a| a.slot);
    assert!(slot("M1").is_some() && slot("M2").is_some());
    assert_ne!(slot("M1"), slot("M2"));
    // the single room is full in both slots
    assert_eq!(result.unscheduled.len(), 1);
    assert_eq!(result.unscheduled[0].module_id, "M3");
    assert_eq!(result.unscheduled[0].reason, UnscheduledReason::WindowExhausted);
}

#[test]
fn test_no_rooms_schedules_nothing() {
    let mut dataset = campus(3);
    dataset.rooms.clear();
    let working_set = build_working_set(dataset, &everything()).unwrap();
    let graph = ConflictGraph::from_working_set(&working_set);
    let result = allocator(StudentExclusion::Slot)
        .allocate(&working_set.modules, &working_set.rooms, &graph, &ExamWindow::new(monday(), 5))
        .unwrap();

    assert_eq!(result.scheduled(), 0);
    assert_eq!(result.unscheduled.len(), working_set.modules.len());
    assert!(
        result
            .unscheduled
            .iter()
            .all(|u| u.reason == UnscheduledReason::NoRoomCapacity)
    );
}
