// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::types::Affinity;

/// Launcher settings: pool sizing, dispatch behaviour and statistics.
///
/// ```toml
/// [pools.io]
/// max_threads = 64
/// keep_alive_ms = 60000
///
/// [pools.cpu]
/// threads = 3
/// keep_alive_ms = 5000
///
/// [dispatch]
/// wait_timeout_ms = 10000
/// debug = false
/// primary_process = true
///
/// [stats]
/// enabled = true
/// ```
///
/// Every section and key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LaunchConfig {
    #[serde(default)]
    pub pools: PoolsSection,

    #[serde(default)]
    pub dispatch: DispatchSection,

    #[serde(default)]
    pub stats: StatsSection,
}

/// `[pools]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PoolsSection {
    #[serde(default)]
    pub io: IoPoolSection,

    #[serde(default)]
    pub cpu: CpuPoolSection,
}

/// `[pools.io]`: elastic pool for blocking I/O work.
#[derive(Debug, Clone, Deserialize)]
pub struct IoPoolSection {
    /// Upper bound on I/O threads; threads are created on demand.
    #[serde(default = "default_io_max_threads")]
    pub max_threads: usize,

    /// Idle I/O threads exit after this long.
    #[serde(default = "default_io_keep_alive_ms")]
    pub keep_alive_ms: u64,

    /// Submissions allowed to queue beyond `max_threads` before the pool
    /// rejects. `None` means unbounded.
    #[serde(default)]
    pub queue_capacity: Option<usize>,
}

fn default_io_max_threads() -> usize {
    512
}

fn default_io_keep_alive_ms() -> u64 {
    60_000
}

impl Default for IoPoolSection {
    fn default() -> Self {
        Self {
            max_threads: default_io_max_threads(),
            keep_alive_ms: default_io_keep_alive_ms(),
            queue_capacity: None,
        }
    }
}

/// `[pools.cpu]`: fixed-size pool for CPU-bound work.
#[derive(Debug, Clone, Deserialize)]
pub struct CpuPoolSection {
    /// Pool size. Defaults to `max(2, min(cpu_count - 1, 5))`.
    #[serde(default)]
    pub threads: Option<usize>,

    /// Idle CPU threads (including core ones) exit after this long.
    #[serde(default = "default_cpu_keep_alive_ms")]
    pub keep_alive_ms: u64,

    #[serde(default)]
    pub queue_capacity: Option<usize>,
}

fn default_cpu_keep_alive_ms() -> u64 {
    5_000
}

impl Default for CpuPoolSection {
    fn default() -> Self {
        Self {
            threads: None,
            keep_alive_ms: default_cpu_keep_alive_ms(),
            queue_capacity: None,
        }
    }
}

impl CpuPoolSection {
    /// Configured size, or the CPU-count based default.
    pub fn effective_threads(&self) -> usize {
        self.threads.unwrap_or_else(default_cpu_threads)
    }
}

/// At least two threads, at most five, preferring one less than the CPU
/// count so background work does not saturate the machine.
pub fn default_cpu_threads() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cpus.saturating_sub(1).clamp(2, 5)
}

/// `[dispatch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchSection {
    /// Default timeout for `Coordinator::await_completion`.
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,

    /// Extra dispatch diagnostics (dependency map, pending wait-tasks,
    /// per-task coordinator costs).
    #[serde(default)]
    pub debug: bool,

    /// Whether this process is the application's primary process. Tasks
    /// restricted to the primary process are skipped otherwise.
    #[serde(default = "default_primary_process")]
    pub primary_process: bool,
}

fn default_wait_timeout_ms() -> u64 {
    10_000
}

fn default_primary_process() -> bool {
    true
}

impl Default for DispatchSection {
    fn default() -> Self {
        Self {
            wait_timeout_ms: default_wait_timeout_ms(),
            debug: false,
            primary_process: default_primary_process(),
        }
    }
}

impl DispatchSection {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

/// `[stats]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsSection {
    /// Record per-situation completion counts.
    #[serde(default)]
    pub enabled: bool,
}

/// Plan file as read from TOML, before validation: settings plus
/// `[task.<name>]` sections.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPlanFile {
    #[serde(flatten)]
    pub settings: LaunchConfig,

    #[serde(default)]
    pub task: BTreeMap<String, TaskSpec>,
}

/// Validated plan file. Construct via `PlanFile::try_from(raw)` or
/// [`load_and_validate`](crate::config::load_and_validate).
#[derive(Debug, Clone)]
pub struct PlanFile {
    pub settings: LaunchConfig,

    /// Keys are task names; `after` entries refer to these.
    pub task: BTreeMap<String, TaskSpec>,
}

impl PlanFile {
    pub(crate) fn new_unchecked(settings: LaunchConfig, task: BTreeMap<String, TaskSpec>) -> Self {
        Self { settings, task }
    }
}

/// `[task.<name>]` section describing a scripted task.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskSpec {
    /// Tasks that must finish first.
    #[serde(default)]
    pub after: Vec<String>,

    #[serde(default)]
    pub affinity: Affinity,

    /// Simulated work duration.
    #[serde(default)]
    pub work_ms: u64,

    #[serde(default)]
    pub needs_wait: bool,

    #[serde(default)]
    pub run_as_soon: bool,

    /// `None` means the library default (primary process only).
    #[serde(default)]
    pub primary_only: Option<bool>,

    /// Complete through the completion handle from a helper thread.
    #[serde(default)]
    pub callback: bool,

    /// Return an error after the work instead of succeeding.
    #[serde(default)]
    pub fail: bool,
}

impl TaskSpec {
    pub fn effective_primary_only(&self) -> bool {
        self.primary_only.unwrap_or(true)
    }

    pub fn work(&self) -> Duration {
        Duration::from_millis(self.work_ms)
    }
}
