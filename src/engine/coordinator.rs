// src/engine/coordinator.rs

//! One startup run: registration, sorting, dispatch and the blocking wait.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::dag::{TaskSorter, planned_order};
use crate::engine::AwaitOutcome;
use crate::engine::launcher::LauncherShared;
use crate::engine::session::Session;
use crate::errors::{LaunchError, Result};
use crate::exec::runner::{CompletionSink, Finisher, RunEnv, Runner};
use crate::exec::Submission;
use crate::task::slot::Execution;
use crate::task::{CancelToken, Task, TaskKey, TaskSlot};
use crate::types::TaskOutcome;

/// Drives one run of registered tasks. Created by
/// [`Launcher::create_coordinator`](crate::engine::Launcher::create_coordinator);
/// `start` and the await methods must be called on the launcher's thread.
pub struct Coordinator {
    shared: Arc<LauncherShared>,
    session: Arc<Session>,
    /// Registration order.
    registered: Vec<Arc<TaskSlot>>,
    keys: Vec<TaskKey>,
    /// Dispatch order, set by `start`.
    sorted: Vec<Arc<TaskSlot>>,
    depended: BTreeSet<usize>,
    submissions: Mutex<Vec<Submission>>,
    cancel: CancelToken,
    started: bool,
}

impl Coordinator {
    pub(crate) fn new(shared: Arc<LauncherShared>) -> Self {
        let session = Arc::new(Session::new(shared.listener.clone()));
        Self {
            shared,
            session,
            registered: Vec::new(),
            keys: Vec::new(),
            sorted: Vec::new(),
            depended: BTreeSet::new(),
            submissions: Mutex::new(Vec::new()),
            cancel: CancelToken::new(),
            started: false,
        }
    }

    pub fn add_task(&mut self, task: impl Task) -> Result<&mut Self> {
        self.add_boxed(Box::new(task))
    }

    pub fn add_boxed(&mut self, task: Box<dyn Task>) -> Result<&mut Self> {
        if self.started {
            return Err(LaunchError::AlreadyStarted);
        }
        let slot = Arc::new(TaskSlot::new(task)?);
        if self.keys.contains(slot.key()) {
            return Err(LaunchError::DuplicateTask(slot.key().to_string()));
        }

        self.session.register(&slot);
        debug!(
            task = %slot.key(),
            dependencies = slot.dependencies().len(),
            execution = ?slot.execution(),
            "task registered"
        );
        self.keys.push(slot.key().clone());
        self.registered.push(slot);
        Ok(self)
    }

    fn ensure_coordinator_thread(&self, operation: &'static str) -> Result<()> {
        if thread::current().id() != self.shared.coordinator_thread {
            return Err(LaunchError::OffCoordinatorThread { operation });
        }
        Ok(())
    }

    /// Sort, dispatch pool tasks, then run coordinator tasks serially on the
    /// calling thread. Returns once every coordinator task has run.
    pub fn start(&mut self) -> Result<()> {
        let started_at = Instant::now();
        self.ensure_coordinator_thread("start")?;
        if self.started {
            return Err(LaunchError::AlreadyStarted);
        }
        self.started = true;

        let debug_mode = self.shared.config.dispatch.debug;
        if debug_mode {
            self.log_dependents();
        }

        let outcome = TaskSorter::new(self.shared.history.clone()).sort(&self.registered, &self.keys)?;
        for (declared, resolved) in &outcome.aliases {
            self.session.alias(declared, resolved);
        }
        self.sorted = outcome.order;
        self.depended = outcome.depended;

        self.session.arm_wait_latch();
        info!(
            tasks = self.registered.len(),
            wait_tasks = self.session.wait_count(),
            "dispatching tasks"
        );

        let coordinator_tasks = self.dispatch();
        info!(
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            coordinator_tasks = coordinator_tasks.len(),
            "dispatch done; running coordinator tasks"
        );

        let env = self.run_env();
        for slot in coordinator_tasks {
            let task_started = Instant::now();
            let key = slot.key().clone();
            Runner::new(slot, env.clone()).run();
            if debug_mode {
                info!(
                    task = %key,
                    elapsed_ms = task_started.elapsed().as_millis() as u64,
                    "coordinator task cost"
                );
            }
        }
        Ok(())
    }

    fn run_env(&self) -> RunEnv {
        RunEnv {
            sink: Arc::clone(&self.session) as Arc<dyn CompletionSink>,
            cancel: self.cancel.clone(),
            primary_process: self.shared.config.dispatch.primary_process,
        }
    }

    /// Dispatch every not yet dispatched task in sorted order; returns the
    /// coordinator-affine ones for serial execution.
    fn dispatch(&self) -> Vec<Arc<TaskSlot>> {
        let env = self.run_env();
        let primary = env.primary_process;
        let mut coordinator_tasks = Vec::new();
        let mut submissions = self.submissions.lock();

        for slot in &self.sorted {
            if slot.is_dispatched() {
                continue;
            }
            slot.mark_dispatched();

            if !primary && slot.restrict_to_primary_process() {
                Finisher::new(Arc::clone(slot), Arc::clone(&env.sink)).finish(TaskOutcome::Skipped);
                continue;
            }

            match slot.execution() {
                Execution::Coordinator => coordinator_tasks.push(Arc::clone(slot)),
                Execution::Pool(kind) => {
                    let runner = Runner::new(Arc::clone(slot), env.clone());
                    let submission = self.shared.pools.submit(kind, move || runner.run());
                    if submission.pool() != Some(kind) {
                        debug!(task = %slot.key(), requested = %kind, "task left its requested pool");
                    }
                    submissions.push(submission);
                }
            }
        }
        coordinator_tasks
    }

    /// Block until every wait-task finished, up to the configured timeout.
    pub fn await_completion(&self) -> Result<AwaitOutcome> {
        self.await_completion_timeout(self.shared.config.dispatch.wait_timeout())
    }

    pub fn await_completion_timeout(&self, timeout: Duration) -> Result<AwaitOutcome> {
        self.ensure_coordinator_thread("await_completion")?;

        let count = self.session.wait_count();
        if self.shared.config.dispatch.debug {
            info!(still_waiting = count, "awaiting wait-tasks");
            for key in self.session.pending_wait_tasks() {
                info!(task = %key, "waiting on task");
            }
        }
        if count == 0 {
            return Ok(AwaitOutcome::Completed);
        }

        let Some(latch) = self.session.wait_latch() else {
            warn!(pending = count, "await called before start; nothing will finish");
            return Ok(AwaitOutcome::TimedOut {
                pending: self.session.pending_wait_tasks(),
            });
        };

        if latch.wait_timeout(timeout) {
            Ok(AwaitOutcome::Completed)
        } else {
            let pending = self.session.pending_wait_tasks();
            warn!(
                timeout_ms = timeout.as_millis() as u64,
                pending = ?pending,
                "timed out waiting for tasks"
            );
            Ok(AwaitOutcome::TimedOut { pending })
        }
    }

    /// Cancel the run: queued submissions are aborted and tasks waiting on
    /// dependencies are interrupted. Running bodies see
    /// `TaskContext::is_cancelled`.
    pub fn cancel(&self) {
        info!("cancelling run");
        self.cancel.cancel();
        for slot in &self.registered {
            slot.interrupt();
        }
        for submission in self.submissions.lock().drain(..) {
            submission.abort();
        }
    }

    /// Wait-task bookkeeping for `key`. Idempotent; ignores non-wait tasks.
    pub fn mark_task_done(&self, key: &TaskKey) -> bool {
        self.session.mark_task_done(key)
    }

    pub fn satisfy_dependents(&self, key: &TaskKey) {
        self.session.satisfy_dependents(key);
    }

    pub fn wait_count(&self) -> usize {
        self.session.wait_count()
    }

    pub fn finished_task_types(&self) -> HashSet<TaskKey> {
        self.session.finished_task_types()
    }

    pub fn pending_wait_tasks(&self) -> Vec<TaskKey> {
        self.session.pending_wait_tasks()
    }

    /// Dispatch order of the last `start`, including tasks promoted by
    /// earlier runs. Empty before `start`.
    pub fn sorted_order(&self) -> Vec<TaskKey> {
        self.sorted.iter().map(|slot| slot.key().clone()).collect()
    }

    /// Registration indices of tasks other tasks depend on.
    pub fn depended_indices(&self) -> &BTreeSet<usize> {
        &self.depended
    }

    /// Order the registered tasks would run in against an empty history.
    pub fn planned_order(&self) -> Result<Vec<TaskKey>> {
        planned_order(&self.registered, &self.keys)
    }

    pub fn registered(&self) -> &[TaskKey] {
        &self.keys
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    fn log_dependents(&self) {
        for (dependency, dependents) in self.session.dependents_snapshot() {
            let names: Vec<String> = dependents.iter().map(ToString::to_string).collect();
            info!(dependency = %dependency, dependents = ?names, "depended");
        }
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("registered", &self.keys)
            .field("started", &self.started)
            .field("wait_count", &self.session.wait_count())
            .finish()
    }
}
