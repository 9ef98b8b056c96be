// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Where a task body executes.
///
/// - `Coordinator`: serially on the thread that initialized the launcher,
///   after every pool task has been submitted.
/// - `Io`: on the elastic I/O pool (default).
/// - `Cpu`: on the fixed-size CPU pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Affinity {
    Coordinator,
    #[default]
    Io,
    Cpu,
}

impl Affinity {
    /// The pool this affinity resolves to, or `None` for coordinator tasks.
    pub fn pool(self) -> Option<PoolKind> {
        match self {
            Affinity::Coordinator => None,
            Affinity::Io => Some(PoolKind::Io),
            Affinity::Cpu => Some(PoolKind::Cpu),
        }
    }
}

impl FromStr for Affinity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "coordinator" | "main" => Ok(Affinity::Coordinator),
            "io" => Ok(Affinity::Io),
            "cpu" => Ok(Affinity::Cpu),
            other => Err(format!(
                "invalid affinity: {other} (expected \"coordinator\", \"io\" or \"cpu\")"
            )),
        }
    }
}

/// The two bounded background pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    Io,
    Cpu,
}

impl PoolKind {
    /// The pool tried next when this one rejects a submission.
    pub fn other(self) -> PoolKind {
        match self {
            PoolKind::Io => PoolKind::Cpu,
            PoolKind::Cpu => PoolKind::Io,
        }
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolKind::Io => f.write_str("io"),
            PoolKind::Cpu => f.write_str("cpu"),
        }
    }
}

/// How a task finished, as reported to completion listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The body returned `Ok` (or signalled its completion handle).
    Success,
    /// The body returned an error.
    Failed(String),
    /// The body panicked.
    Panicked(String),
    /// Not executed: primary-process-only task in a secondary process.
    Skipped,
    /// Not executed (or interrupted while waiting) because the run was cancelled.
    Cancelled,
    /// Explicit-completion task whose handles were all dropped without completing.
    Abandoned,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success)
    }
}
