// src/engine/session.rs

//! Per-run state shared between a coordinator and its runners.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::exec::runner::CompletionSink;
use crate::stats::{TaskEvent, TaskListener};
use crate::task::{Latch, TaskKey, TaskSlot};
use crate::types::TaskOutcome;

pub(crate) struct Session {
    /// Dependency key -> tasks that declared it.
    dependents: RwLock<HashMap<TaskKey, Vec<Arc<TaskSlot>>>>,
    finished: Mutex<HashSet<TaskKey>>,
    /// Wait-tasks not finished yet, in registration order.
    pending_wait: Mutex<Vec<TaskKey>>,
    wait_count: AtomicUsize,
    /// Sized to `wait_count` when the run starts.
    wait_latch: OnceLock<Latch>,
    listener: Option<Arc<dyn TaskListener>>,
}

impl Session {
    pub(crate) fn new(listener: Option<Arc<dyn TaskListener>>) -> Self {
        Self {
            dependents: RwLock::new(HashMap::new()),
            finished: Mutex::new(HashSet::new()),
            pending_wait: Mutex::new(Vec::new()),
            wait_count: AtomicUsize::new(0),
            wait_latch: OnceLock::new(),
            listener,
        }
    }

    /// Record the slot's dependency edges and wait-task status.
    pub(crate) fn register(&self, slot: &Arc<TaskSlot>) {
        {
            let finished = self.finished.lock();
            let mut dependents = self.dependents.write();
            for dep in slot.dependencies() {
                dependents
                    .entry(dep.clone())
                    .or_default()
                    .push(Arc::clone(slot));
                if finished.contains(dep) {
                    slot.satisfy();
                }
            }
        }

        if slot.is_wait_task() {
            self.pending_wait.lock().push(slot.key().clone());
            self.wait_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Dependents declared against `declared` actually wait on `resolved`.
    pub(crate) fn alias(&self, declared: &TaskKey, resolved: &TaskKey) {
        let mut dependents = self.dependents.write();
        if let Some(moved) = dependents.remove(declared) {
            dependents
                .entry(resolved.clone())
                .or_default()
                .extend(moved);
        }
    }

    /// Size the blocking-wait latch to the current wait-count. Later calls
    /// are no-ops.
    pub(crate) fn arm_wait_latch(&self) {
        let count = self.wait_count();
        if self.wait_latch.set(Latch::new(count)).is_err() {
            warn!("wait latch already armed; ignoring");
        }
    }

    pub(crate) fn wait_latch(&self) -> Option<&Latch> {
        self.wait_latch.get()
    }

    pub(crate) fn wait_count(&self) -> usize {
        self.wait_count.load(Ordering::SeqCst)
    }

    pub(crate) fn pending_wait_tasks(&self) -> Vec<TaskKey> {
        self.pending_wait.lock().clone()
    }

    pub(crate) fn finished_task_types(&self) -> HashSet<TaskKey> {
        self.finished.lock().clone()
    }

    pub(crate) fn dependents_of(&self, key: &TaskKey) -> Vec<Arc<TaskSlot>> {
        self.dependents
            .read()
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of the dependency map, for diagnostics.
    pub(crate) fn dependents_snapshot(&self) -> Vec<(TaskKey, Vec<TaskKey>)> {
        self.dependents
            .read()
            .iter()
            .map(|(dep, slots)| {
                (
                    dep.clone(),
                    slots.iter().map(|s| s.key().clone()).collect(),
                )
            })
            .collect()
    }

    /// Call `satisfy()` on every task that depends on `key`.
    pub(crate) fn satisfy_dependents(&self, key: &TaskKey) {
        for dependent in self.dependents_of(key) {
            dependent.satisfy();
            debug!(
                task = %dependent.key(),
                dependency = %key,
                remaining = dependent.remaining_dependencies(),
                "dependency satisfied"
            );
        }
    }

    /// Wait-task bookkeeping; idempotent per key and a no-op for tasks that
    /// are not wait-tasks. Returns whether anything changed.
    pub(crate) fn mark_task_done(&self, key: &TaskKey) -> bool {
        let removed = {
            let mut pending = self.pending_wait.lock();
            match pending.iter().position(|k| k == key) {
                Some(index) => {
                    pending.remove(index);
                    true
                }
                None => false,
            }
        };
        if !removed {
            return false;
        }

        self.finished.lock().insert(key.clone());
        self.wait_count.fetch_sub(1, Ordering::SeqCst);
        if let Some(latch) = self.wait_latch.get() {
            latch.count_down();
        }
        true
    }
}

impl CompletionSink for Session {
    fn task_finished(&self, slot: &Arc<TaskSlot>, outcome: TaskOutcome, elapsed: Duration) {
        self.satisfy_dependents(slot.key());

        match &outcome {
            TaskOutcome::Success => debug!(
                task = %slot.key(),
                elapsed_ms = elapsed.as_millis() as u64,
                "task finished"
            ),
            TaskOutcome::Skipped => info!(
                task = %slot.key(),
                "task restricted to the primary process; marked finished without running"
            ),
            other => info!(
                task = %slot.key(),
                outcome = ?other,
                elapsed_ms = elapsed.as_millis() as u64,
                "task finished without success; dependents released"
            ),
        }

        if let Some(listener) = &self.listener {
            listener.on_task_finished(&TaskEvent {
                key: slot.key().clone(),
                outcome,
                elapsed,
                thread: std::thread::current().name().map(str::to_string),
            });
        }

        // Last, so listeners have seen every wait-task once the wait returns.
        self.mark_task_done(slot.key());
    }
}
