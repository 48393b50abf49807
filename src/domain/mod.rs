//! Domain types for examsched
//!
//! - Entities: Module, Formation, Professor, Room (external data)
//! - Calendar: SlotTemplate, ExamWindow, Scope
//! - Assignment: ExamAssignment, UnscheduledModule, UnscheduledReason (allocator output)
//! - Job: GenerationJob and its request/status shapes

pub mod assignment;
pub mod calendar;
pub mod entities;
pub mod job;

pub use assignment::{ExamAssignment, UnscheduledModule, UnscheduledReason};
pub use calendar::{ExamWindow, Scope, SlotTemplate, next_monday};
pub use entities::{Formation, Module, Professor, Room, RoomType, SharedEnrollment};
pub use job::{
    GenerateRequest, GenerationJob, JobConfig, JobProgress, JobStatus, JobSummary, StatusResponse, SubmitResponse,
};
