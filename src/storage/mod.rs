//! Persistence for jobs and generated schedules.
//!
//! [`Storage`] is a small collection/record abstraction; [`JsonlStorage`]
//! implements it over JSONL files. [`ScheduleStore`] layers the typed
//! scheduling collections on top and implements [`ScheduleSink`].

#[cfg(test)]
pub(crate) mod faulty;
mod jsonl;
mod lock;
mod schedule;
mod traits;

pub use jsonl::JsonlStorage;
pub use lock::{DataDirLock, LOCK_FILE};
pub use schedule::{ExamRecord, ReportRecord, ScheduleSink, ScheduleStore};
pub use traits::{Filter, FilterOp, HasId, Storage};
