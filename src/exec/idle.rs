// src/exec/idle.rs

//! Deferred tasks run one at a time when the host reports it is idle.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::errors::{LaunchError, Result};
use crate::exec::runner::{CompletionSink, Finisher, RunEnv, Runner};
use crate::stats::{TaskEvent, TaskListener};
use crate::task::{CancelToken, Task, TaskSlot};
use crate::types::TaskOutcome;

/// Forwards completions to the launcher's listener; deferred tasks have no
/// dependents or wait-count to update.
struct ListenerSink {
    listener: Option<Arc<dyn TaskListener>>,
}

impl CompletionSink for ListenerSink {
    fn task_finished(&self, slot: &Arc<TaskSlot>, outcome: TaskOutcome, elapsed: Duration) {
        debug!(task = %slot.key(), ?outcome, "deferred task finished");
        if let Some(listener) = &self.listener {
            listener.on_task_finished(&TaskEvent {
                key: slot.key().clone(),
                outcome,
                elapsed,
                thread: std::thread::current().name().map(str::to_string),
            });
        }
    }
}

/// Queue of deferred tasks, drained by the host's idle signal.
///
/// ```ignore
/// let mut idle = launcher.idle_runner();
/// idle.add_task(WarmCaches)?.add_task(PrefetchAvatars)?;
/// // from the host's idle hook:
/// let keep_hook = idle.on_idle();
/// ```
pub struct IdleRunner {
    queue: VecDeque<Arc<TaskSlot>>,
    env: RunEnv,
}

impl std::fmt::Debug for IdleRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdleRunner")
            .field("pending", &self.queue.len())
            .finish_non_exhaustive()
    }
}

impl IdleRunner {
    pub fn new(listener: Option<Arc<dyn TaskListener>>, primary_process: bool) -> Self {
        Self {
            queue: VecDeque::new(),
            env: RunEnv {
                sink: Arc::new(ListenerSink { listener }),
                cancel: CancelToken::new(),
                primary_process,
            },
        }
    }

    /// Queue a task. Deferred tasks cannot have dependencies: nothing would
    /// ever satisfy them.
    pub fn add_task(&mut self, task: impl Task) -> Result<&mut Self> {
        let slot = TaskSlot::new(Box::new(task))?;
        if !slot.dependencies().is_empty() {
            return Err(LaunchError::ConfigError(format!(
                "deferred task '{}' declares dependencies; idle tasks must be independent",
                slot.key()
            )));
        }
        self.queue.push_back(Arc::new(slot));
        Ok(self)
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Run the next queued task on the calling thread. Returns whether tasks
    /// remain, i.e. whether the host should keep calling on idle.
    pub fn on_idle(&mut self) -> bool {
        if let Some(slot) = self.queue.pop_front() {
            slot.mark_dispatched();
            Runner::new(slot, self.env.clone()).run();
        }
        !self.queue.is_empty()
    }

    /// Run every queued task now.
    pub fn drain(&mut self) {
        while self.on_idle() {}
    }

    /// Drop queued tasks; they are reported as cancelled.
    pub fn cancel(&mut self) {
        self.env.cancel.cancel();
        for slot in self.queue.drain(..) {
            Finisher::new(slot, Arc::clone(&self.env.sink)).finish(TaskOutcome::Cancelled);
        }
    }
}
