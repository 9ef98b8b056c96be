// src/task/slot.rs

//! Registered form of a task.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::errors::{LaunchError, Result};
use crate::task::latch::{Interrupted, Latch};
use crate::task::{Task, TaskKey};
use crate::types::{Affinity, PoolKind};

/// Where the slot runs, resolved once at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    Coordinator,
    Pool(PoolKind),
}

/// How the slot signals completion, resolved once at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionMode {
    /// Completion bookkeeping runs when `run` returns.
    OnReturn,
    /// The body completes a [`CompletionHandle`](crate::task::CompletionHandle).
    Explicit,
}

/// A task plus its scheduling state.
///
/// The dependency countdown starts at the number of distinct dependencies.
/// Each dependency's runner calls [`satisfy`](Self::satisfy) once; the
/// slot's own runner blocks in [`await_dependencies`](Self::await_dependencies).
pub struct TaskSlot {
    task: Box<dyn Task>,
    key: TaskKey,
    dependencies: Vec<TaskKey>,
    execution: Execution,
    completion: CompletionMode,
    needs_wait: bool,
    run_as_soon: bool,
    primary_only: bool,
    remaining: Latch,
    waiting: AtomicBool,
    running: AtomicBool,
    finished: AtomicBool,
    dispatched: AtomicBool,
}

impl TaskSlot {
    /// Capture the task's declarations. Fails if the task lists itself as a
    /// dependency.
    pub fn new(task: Box<dyn Task>) -> Result<Self> {
        let key = task.key();

        let mut dependencies: Vec<TaskKey> = Vec::new();
        for dep in task.dependencies() {
            if dep == key {
                return Err(LaunchError::SelfDependency(key.to_string()));
            }
            if !dependencies.contains(&dep) {
                dependencies.push(dep);
            }
        }

        let execution = match task.affinity().pool() {
            Some(kind) => Execution::Pool(kind),
            None => Execution::Coordinator,
        };
        let completion = if task.needs_callback() {
            CompletionMode::Explicit
        } else {
            CompletionMode::OnReturn
        };

        Ok(Self {
            remaining: Latch::new(dependencies.len()),
            needs_wait: task.needs_wait(),
            run_as_soon: task.run_as_soon_as_possible(),
            primary_only: task.restrict_to_primary_process(),
            task,
            key,
            dependencies,
            execution,
            completion,
            waiting: AtomicBool::new(false),
            running: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            dispatched: AtomicBool::new(false),
        })
    }

    pub fn key(&self) -> &TaskKey {
        &self.key
    }

    pub fn task(&self) -> &dyn Task {
        self.task.as_ref()
    }

    pub fn dependencies(&self) -> &[TaskKey] {
        &self.dependencies
    }

    pub fn execution(&self) -> Execution {
        self.execution
    }

    pub fn affinity(&self) -> Affinity {
        match self.execution {
            Execution::Coordinator => Affinity::Coordinator,
            Execution::Pool(PoolKind::Io) => Affinity::Io,
            Execution::Pool(PoolKind::Cpu) => Affinity::Cpu,
        }
    }

    pub fn completion_mode(&self) -> CompletionMode {
        self.completion
    }

    pub fn needs_wait(&self) -> bool {
        self.needs_wait
    }

    /// Pool task the coordinator's blocking wait has to account for.
    pub fn is_wait_task(&self) -> bool {
        self.needs_wait && matches!(self.execution, Execution::Pool(_))
    }

    pub fn run_as_soon(&self) -> bool {
        self.run_as_soon
    }

    pub fn restrict_to_primary_process(&self) -> bool {
        self.primary_only
    }

    /// One dependency has finished.
    pub fn satisfy(&self) {
        self.remaining.count_down();
    }

    pub fn remaining_dependencies(&self) -> usize {
        self.remaining.count()
    }

    /// Block until every dependency has called [`satisfy`](Self::satisfy).
    pub fn await_dependencies(&self) -> std::result::Result<(), Interrupted> {
        self.remaining.wait()
    }

    /// Wake a runner blocked in `await_dependencies` (used by cancellation).
    pub fn interrupt(&self) {
        self.remaining.interrupt();
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn is_dispatched(&self) -> bool {
        self.dispatched.load(Ordering::SeqCst)
    }

    pub(crate) fn set_waiting(&self, value: bool) {
        self.waiting.store(value, Ordering::SeqCst);
    }

    pub(crate) fn set_running(&self, value: bool) {
        self.running.store(value, Ordering::SeqCst);
    }

    pub(crate) fn mark_dispatched(&self) {
        self.dispatched.store(true, Ordering::SeqCst);
    }

    /// Flip `finished`; returns `true` only for the first caller.
    pub(crate) fn try_finish(&self) -> bool {
        !self.finished.swap(true, Ordering::SeqCst)
    }
}

impl std::fmt::Debug for TaskSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSlot")
            .field("key", &self.key)
            .field("dependencies", &self.dependencies)
            .field("execution", &self.execution)
            .field("remaining", &self.remaining_dependencies())
            .field("finished", &self.is_finished())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskContext;

    struct Root;
    impl Task for Root {
        fn run(&self, _ctx: &TaskContext) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct Leaf;
    impl Task for Leaf {
        fn dependencies(&self) -> Vec<TaskKey> {
            vec![TaskKey::of::<Root>(), TaskKey::of::<Root>()]
        }
        fn affinity(&self) -> Affinity {
            Affinity::Cpu
        }
        fn needs_wait(&self) -> bool {
            true
        }
        fn run(&self, _ctx: &TaskContext) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct Narcissus;
    impl Task for Narcissus {
        fn dependencies(&self) -> Vec<TaskKey> {
            vec![TaskKey::of::<Narcissus>()]
        }
        fn run(&self, _ctx: &TaskContext) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn duplicate_dependencies_collapse_into_one_countdown_step() {
        let slot = TaskSlot::new(Box::new(Leaf)).unwrap();
        assert_eq!(slot.dependencies().len(), 1);
        assert_eq!(slot.remaining_dependencies(), 1);
        assert_eq!(slot.execution(), Execution::Pool(PoolKind::Cpu));
        assert!(slot.is_wait_task());

        slot.satisfy();
        assert_eq!(slot.remaining_dependencies(), 0);
        assert!(slot.await_dependencies().is_ok());
    }

    #[test]
    fn self_dependency_is_rejected_at_registration() {
        let err = TaskSlot::new(Box::new(Narcissus)).unwrap_err();
        assert!(matches!(err, LaunchError::SelfDependency(ref name) if name == "Narcissus"));
    }

    #[test]
    fn finish_flag_flips_once() {
        let slot = TaskSlot::new(Box::new(Root)).unwrap();
        assert!(slot.try_finish());
        assert!(!slot.try_finish());
        assert!(slot.is_finished());
    }
}
