//! examsched - greedy exam timetable generator
//!
//! Loads modules, formations, professors and rooms, derives which exams may
//! not share a slot, places every exam into a (day, slot, room) triple with a
//! most-constrained-first greedy pass, and runs each generation as a
//! background job whose status can be polled.

pub mod allocator;
pub mod conflict;
pub mod domain;
pub mod error;
pub mod id;
pub mod jobs;
pub mod loader;
pub mod report;
pub mod storage;

pub use error::{Result, SchedError};
