//! Slot allocation: places every in-scope module into a (day, slot, room)
//! triple or reports why it could not.

pub mod constraints;
mod greedy;

pub use constraints::{
    Check, Exam, Reservation, ScheduleState, StudentExclusion, Triple, check_all, check_capacity, check_professor_free,
    check_room_free, check_student_conflicts,
};
pub use greedy::{Allocation, AllocationObserver, AllocationOutcome, AllocatorConfig, NoopObserver, SlotAllocator};
