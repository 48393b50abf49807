//! Asynchronous generation jobs: submission, scope locking, background
//! execution, status polling and cancellation.

mod poll;
mod runner;

pub use poll::{PollConfig, StatusSource, poll_until_terminal};
pub use runner::{CANCELLED_MESSAGE, JobRunner, RunnerConfig};
