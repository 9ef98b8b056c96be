// src/task/mod.rs

//! The unit-of-work contract.
//!
//! - [`Task`] is implemented by user code: dependencies, affinity, wait and
//!   completion policy, and the body.
//! - [`TaskKey`] is a task's identity. By default it is derived from the
//!   implementing type, so a type is registered at most once per run.
//! - [`slot`] holds the registered form of a task: its dependency countdown
//!   and state flags.
//! - [`context`] is what a running body sees: cancellation, process role and
//!   the explicit completion handle.
//! - [`latch`] is the countdown primitive underneath.

pub mod context;
pub mod latch;
pub mod slot;

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

pub use context::{CancelToken, CompletionHandle, TaskContext};
pub use latch::{Interrupted, Latch};
pub use slot::TaskSlot;

use crate::types::Affinity;

/// Identity of a task: the dependency-graph key.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum TaskKey {
    /// Derived from a Rust type.
    Type { id: TypeId, name: &'static str },
    /// Explicit name, for tasks described at runtime (e.g. plan files).
    Named(Arc<str>),
}

impl TaskKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        TaskKey::Type {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn named(name: impl Into<Arc<str>>) -> Self {
        TaskKey::Named(name.into())
    }

    /// Full name (the type path for type keys).
    pub fn name(&self) -> &str {
        match self {
            TaskKey::Type { name, .. } => name,
            TaskKey::Named(name) => name,
        }
    }

    /// Last path segment without generic arguments, e.g. `InitDb` for
    /// `app::startup::InitDb<Pg>`.
    pub fn simple_name(&self) -> &str {
        let name = self.name();
        let base = name.split('<').next().unwrap_or(name);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl fmt::Debug for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.simple_name())
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.simple_name())
    }
}

/// A schedulable unit of startup work.
///
/// Only [`Task::run`] is required. Everything else has the defaults of a
/// plain background task: no dependencies, I/O pool, not awaited, completes
/// when `run` returns, primary process only.
///
/// ```ignore
/// struct InitDb;
///
/// impl Task for InitDb {
///     fn dependencies(&self) -> Vec<TaskKey> {
///         vec![TaskKey::of::<LoadConfig>()]
///     }
///     fn needs_wait(&self) -> bool {
///         true
///     }
///     fn run(&self, _ctx: &TaskContext) -> anyhow::Result<()> {
///         connect()
///     }
/// }
/// ```
pub trait Task: Send + Sync + 'static {
    /// Dependency-graph identity. Override only for runtime-described tasks.
    fn key(&self) -> TaskKey {
        TaskKey::of::<Self>()
    }

    /// Tasks that must finish before this one starts. Must not change after
    /// registration.
    fn dependencies(&self) -> Vec<TaskKey> {
        Vec::new()
    }

    fn affinity(&self) -> Affinity {
        Affinity::Io
    }

    /// Whether `Coordinator::await_completion` waits for this task. Only
    /// meaningful for pool tasks; coordinator tasks are synchronous anyway.
    fn needs_wait(&self) -> bool {
        false
    }

    /// If true, the task signals completion through
    /// [`TaskContext::completion`] instead of by returning from `run`.
    fn needs_callback(&self) -> bool {
        false
    }

    /// Priority hint: dispatch ahead of other unconstrained tasks. Useful
    /// for slow tasks nothing depends on.
    fn run_as_soon_as_possible(&self) -> bool {
        false
    }

    /// If true, the body is skipped (but the task still counts as finished)
    /// when the launcher runs in a secondary process.
    fn restrict_to_primary_process(&self) -> bool {
        true
    }

    fn run(&self, ctx: &TaskContext) -> anyhow::Result<()>;

    /// Follow-up work run on the same thread right after `run` returns `Ok`,
    /// before the task counts as finished. Not called when `run` fails or
    /// panics. A panic here finishes the task as panicked.
    fn tail(&self, _ctx: &TaskContext) {}
}
