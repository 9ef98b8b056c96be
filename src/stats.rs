// src/stats.rs

//! Task completion events and a simple statistics collector.
//!
//! The scheduler reports every finished task to an optional
//! [`TaskListener`]. [`TaskStats`] is the bundled listener: it counts
//! completions, keeps per-task durations and, when enabled, snapshots the
//! count each time the host announces a new "situation" (e.g. "splash
//! shown", "first frame").

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::info;

use crate::task::TaskKey;
use crate::types::TaskOutcome;

/// One finished task.
#[derive(Debug, Clone)]
pub struct TaskEvent {
    pub key: TaskKey,
    pub outcome: TaskOutcome,
    /// Time from body start to completion (zero for skipped tasks).
    pub elapsed: Duration,
    /// Name of the thread that signalled completion, if it had one.
    pub thread: Option<String>,
}

/// Receives completion events. Called from whichever thread finished the
/// task, so implementations must be cheap and thread-safe.
pub trait TaskListener: Send + Sync {
    fn on_task_finished(&self, event: &TaskEvent);
}

/// Finished-task count recorded when the situation changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SituationRecord {
    pub situation: String,
    pub finished: usize,
}

#[derive(Debug, Default)]
pub struct TaskStats {
    enabled: bool,
    situation: Mutex<String>,
    since_last_situation: AtomicUsize,
    total: AtomicUsize,
    records: Mutex<Vec<SituationRecord>>,
    durations: Mutex<Vec<(TaskKey, TaskOutcome, Duration)>>,
}

impl TaskStats {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn current_situation(&self) -> String {
        self.situation.lock().clone()
    }

    /// Announce a new situation. When enabled, records how many tasks
    /// finished since the previous announcement and resets that counter.
    pub fn set_situation(&self, situation: impl Into<String>) {
        if !self.enabled {
            return;
        }
        let situation = situation.into();
        info!(situation = %situation, "launch situation changed");

        *self.situation.lock() = situation.clone();
        let finished = self.since_last_situation.swap(0, Ordering::SeqCst);
        self.records
            .lock()
            .push(SituationRecord { situation, finished });
    }

    pub fn records(&self) -> Vec<SituationRecord> {
        self.records.lock().clone()
    }

    pub fn finished_count(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Per-task outcomes and durations in completion order.
    pub fn durations(&self) -> Vec<(TaskKey, TaskOutcome, Duration)> {
        self.durations.lock().clone()
    }
}

impl TaskListener for TaskStats {
    fn on_task_finished(&self, event: &TaskEvent) {
        self.total.fetch_add(1, Ordering::SeqCst);
        self.since_last_situation.fetch_add(1, Ordering::SeqCst);
        self.durations
            .lock()
            .push((event.key.clone(), event.outcome.clone(), event.elapsed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str) -> TaskEvent {
        TaskEvent {
            key: TaskKey::named(name),
            outcome: TaskOutcome::Success,
            elapsed: Duration::from_millis(3),
            thread: None,
        }
    }

    #[test]
    fn situations_snapshot_and_reset_counts() {
        let stats = TaskStats::new(true);
        stats.on_task_finished(&event("a"));
        stats.on_task_finished(&event("b"));
        stats.set_situation("splash");
        stats.on_task_finished(&event("c"));
        stats.set_situation("home");

        assert_eq!(
            stats.records(),
            vec![
                SituationRecord {
                    situation: "splash".into(),
                    finished: 2
                },
                SituationRecord {
                    situation: "home".into(),
                    finished: 1
                },
            ]
        );
        assert_eq!(stats.current_situation(), "home");
        assert_eq!(stats.finished_count(), 3);
        assert_eq!(stats.durations().len(), 3);
    }

    #[test]
    fn disabled_stats_ignore_situations_but_still_count() {
        let stats = TaskStats::new(false);
        stats.on_task_finished(&event("a"));
        stats.set_situation("splash");
        assert!(stats.records().is_empty());
        assert_eq!(stats.current_situation(), "");
        assert_eq!(stats.finished_count(), 1);
    }
}
