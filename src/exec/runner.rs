// src/exec/runner.rs

//! Execution of a single task.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use crate::task::slot::CompletionMode;
use crate::task::{CancelToken, CompletionHandle, TaskContext, TaskKey, TaskSlot};
use crate::types::TaskOutcome;

/// Receives completion bookkeeping for finished tasks: release dependents,
/// decrement the wait-count, report statistics.
pub trait CompletionSink: Send + Sync {
    fn task_finished(&self, slot: &Arc<TaskSlot>, outcome: TaskOutcome, elapsed: Duration);
}

/// Everything a runner needs from the run that dispatched it.
#[derive(Clone)]
pub struct RunEnv {
    pub sink: Arc<dyn CompletionSink>,
    pub cancel: CancelToken,
    pub primary_process: bool,
}

/// Performs completion bookkeeping for one task at most once.
#[derive(Clone)]
pub(crate) struct Finisher {
    slot: Arc<TaskSlot>,
    sink: Arc<dyn CompletionSink>,
    started: Instant,
}

impl Finisher {
    pub(crate) fn new(slot: Arc<TaskSlot>, sink: Arc<dyn CompletionSink>) -> Self {
        Self {
            slot,
            sink,
            started: Instant::now(),
        }
    }

    pub(crate) fn key(&self) -> &TaskKey {
        self.slot.key()
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.slot.is_finished()
    }

    /// Returns `false` if the task had already finished.
    pub(crate) fn finish(&self, outcome: TaskOutcome) -> bool {
        if !self.slot.try_finish() {
            debug!(task = %self.slot.key(), ?outcome, "task already finished; ignoring");
            return false;
        }
        let elapsed = match outcome {
            TaskOutcome::Skipped => Duration::ZERO,
            _ => self.started.elapsed(),
        };
        self.sink.task_finished(&self.slot, outcome, elapsed);
        true
    }
}

/// Runs one task: wait for dependencies, run the body and its tail, finish.
///
/// Whatever happens to the body (error, panic, never started because the
/// submission was aborted) the task is finished exactly once, so dependents
/// and the coordinator's wait never hang on it.
pub struct Runner {
    slot: Arc<TaskSlot>,
    env: RunEnv,
    executed: bool,
}

impl Runner {
    pub fn new(slot: Arc<TaskSlot>, env: RunEnv) -> Self {
        Self {
            slot,
            env,
            executed: false,
        }
    }

    pub fn key(&self) -> &TaskKey {
        self.slot.key()
    }

    pub fn run(mut self) {
        self.executed = true;
        let slot = Arc::clone(&self.slot);

        if slot.remaining_dependencies() > 0 {
            slot.set_waiting(true);
            let waited = slot.await_dependencies();
            slot.set_waiting(false);
            if waited.is_err() {
                info!(task = %slot.key(), "interrupted while waiting for dependencies");
                Finisher::new(slot, Arc::clone(&self.env.sink)).finish(TaskOutcome::Cancelled);
                return;
            }
        }

        let finisher = Finisher::new(Arc::clone(&slot), Arc::clone(&self.env.sink));
        if self.env.cancel.is_cancelled() {
            debug!(task = %slot.key(), "run cancelled before task started");
            finisher.finish(TaskOutcome::Cancelled);
            return;
        }

        let completion = match slot.completion_mode() {
            CompletionMode::Explicit => Some(CompletionHandle::new(finisher.clone())),
            CompletionMode::OnReturn => None,
        };
        let ctx = TaskContext::new(
            self.env.primary_process,
            self.env.cancel.clone(),
            completion.clone(),
        );

        debug!(task = %slot.key(), "task started");
        slot.set_running(true);
        let result = panic::catch_unwind(AssertUnwindSafe(|| -> anyhow::Result<()> {
            slot.task().run(&ctx)?;
            slot.task().tail(&ctx);
            Ok(())
        }));
        slot.set_running(false);
        drop(ctx);

        match result {
            Ok(Ok(())) => {
                if completion.is_none() {
                    finisher.finish(TaskOutcome::Success);
                }
                // Explicit tasks finish when the last handle completes or drops.
            }
            Ok(Err(err)) => {
                error!(task = %slot.key(), error = %format!("{err:#}"), "task failed");
                finisher.finish(TaskOutcome::Failed(format!("{err:#}")));
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(task = %slot.key(), panic = %message, "task panicked");
                finisher.finish(TaskOutcome::Panicked(message));
            }
        }
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        if !self.executed {
            debug!(task = %self.slot.key(), "runner dropped before running; finishing as cancelled");
            Finisher::new(Arc::clone(&self.slot), Arc::clone(&self.env.sink))
                .finish(TaskOutcome::Cancelled);
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
