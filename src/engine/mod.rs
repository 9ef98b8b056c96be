// src/engine/mod.rs

//! Orchestration engine.
//!
//! - [`launcher`] holds what every run of the process shares: the pools, the
//!   priority history and the coordinator thread.
//! - [`coordinator`] drives one run: registration, sorting, dispatch and the
//!   blocking wait on wait-tasks.
//! - `session` is the per-run state runners report completions to.

pub mod coordinator;
pub mod launcher;
mod session;

pub use coordinator::Coordinator;
pub use launcher::{Launcher, LauncherBuilder};

use crate::task::TaskKey;

/// Result of waiting for a run's wait-tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AwaitOutcome {
    Completed,
    /// The timeout elapsed; `pending` lists the wait-tasks still running.
    TimedOut { pending: Vec<TaskKey> },
}

impl AwaitOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, AwaitOutcome::Completed)
    }
}
