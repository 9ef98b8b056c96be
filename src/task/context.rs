// src/task/context.rs

//! What a running task body can see.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

use crate::exec::runner::Finisher;
use crate::types::TaskOutcome;

/// Cooperative cancellation flag shared by every runner of one coordinator run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

struct HandleInner {
    finisher: Finisher,
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        if !self.finisher.is_finished() {
            warn!(
                task = %self.finisher.key(),
                "every completion handle dropped without complete(); finishing implicitly"
            );
            self.finisher.finish(TaskOutcome::Abandoned);
        }
    }
}

/// Explicit completion signal for tasks with `needs_callback() == true`.
///
/// Clone it into whatever thread or callback finishes the work and call
/// [`complete`](Self::complete) once. Later calls are ignored.
#[derive(Clone)]
pub struct CompletionHandle {
    inner: Arc<HandleInner>,
}

impl CompletionHandle {
    pub(crate) fn new(finisher: Finisher) -> Self {
        Self {
            inner: Arc::new(HandleInner { finisher }),
        }
    }

    /// Signal that the task has finished. Returns `false` if it already had.
    pub fn complete(&self) -> bool {
        self.inner.finisher.finish(TaskOutcome::Success)
    }

    /// Signal that the task finished with an error. Dependents are still
    /// released.
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.inner
            .finisher
            .finish(TaskOutcome::Failed(reason.into()))
    }

    pub fn is_completed(&self) -> bool {
        self.inner.finisher.is_finished()
    }
}

impl std::fmt::Debug for CompletionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionHandle")
            .field("task", &self.inner.finisher.key())
            .field("completed", &self.is_completed())
            .finish()
    }
}

/// Passed to [`Task::run`](crate::task::Task::run).
#[derive(Debug, Clone)]
pub struct TaskContext {
    primary_process: bool,
    cancel: CancelToken,
    completion: Option<CompletionHandle>,
}

impl TaskContext {
    pub(crate) fn new(
        primary_process: bool,
        cancel: CancelToken,
        completion: Option<CompletionHandle>,
    ) -> Self {
        Self {
            primary_process,
            cancel,
            completion,
        }
    }

    pub fn is_primary_process(&self) -> bool {
        self.primary_process
    }

    /// Set once the coordinator has been cancelled. Long bodies should poll it.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Completion handle for explicit-completion tasks; `None` otherwise.
    pub fn completion(&self) -> Option<CompletionHandle> {
        self.completion.clone()
    }
}
