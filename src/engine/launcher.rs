// src/engine/launcher.rs

//! Library initialization: the state every run of the process shares.

use std::sync::Arc;
use std::thread::{self, ThreadId};

use tracing::info;

use crate::config::{LaunchConfig, validate_settings};
use crate::dag::PriorityHistory;
use crate::engine::coordinator::Coordinator;
use crate::errors::Result;
use crate::exec::{IdleRunner, WorkerPools};
use crate::stats::TaskListener;
use crate::types::PoolKind;

pub(crate) struct LauncherShared {
    pub(crate) config: LaunchConfig,
    pub(crate) pools: WorkerPools,
    pub(crate) history: PriorityHistory,
    pub(crate) listener: Option<Arc<dyn TaskListener>>,
    pub(crate) coordinator_thread: ThreadId,
}

/// Handle created once on the coordinator thread. Cheap to clone.
///
/// ```ignore
/// let launcher = Launcher::new(LaunchConfig::default())?;
/// let mut run = launcher.create_coordinator();
/// run.add_task(LoadConfig)?.add_task(OpenDatabase)?;
/// run.start()?;
/// run.await_completion()?;
/// ```
#[derive(Clone)]
pub struct Launcher {
    shared: Arc<LauncherShared>,
}

impl Launcher {
    /// Build a launcher whose coordinator thread is the calling thread.
    pub fn new(config: LaunchConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: LaunchConfig) -> LauncherBuilder {
        LauncherBuilder {
            config,
            history: None,
            listener: None,
        }
    }

    /// A fresh coordinator for one run.
    pub fn create_coordinator(&self) -> Coordinator {
        Coordinator::new(Arc::clone(&self.shared))
    }

    /// A queue for deferred, dependency-free tasks.
    pub fn idle_runner(&self) -> IdleRunner {
        IdleRunner::new(
            self.shared.listener.clone(),
            self.shared.config.dispatch.primary_process,
        )
    }

    pub fn config(&self) -> &LaunchConfig {
        &self.shared.config
    }

    pub fn pools(&self) -> &WorkerPools {
        &self.shared.pools
    }

    pub fn history(&self) -> &PriorityHistory {
        &self.shared.history
    }

    pub fn is_primary_process(&self) -> bool {
        self.shared.config.dispatch.primary_process
    }

    pub fn coordinator_thread(&self) -> ThreadId {
        self.shared.coordinator_thread
    }

    pub fn is_coordinator_thread(&self) -> bool {
        thread::current().id() == self.shared.coordinator_thread
    }
}

impl std::fmt::Debug for Launcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Launcher")
            .field("primary_process", &self.is_primary_process())
            .field("pools", &self.shared.pools)
            .field("history", &self.shared.history.len())
            .finish()
    }
}

pub struct LauncherBuilder {
    config: LaunchConfig,
    history: Option<PriorityHistory>,
    listener: Option<Arc<dyn TaskListener>>,
}

impl LauncherBuilder {
    /// Share a priority history with other launchers (tests mostly).
    pub fn history(mut self, history: PriorityHistory) -> Self {
        self.history = Some(history);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn TaskListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Fails with `ConfigError` for settings no pool can be built from.
    pub fn build(self) -> Result<Launcher> {
        validate_settings(&self.config)?;
        let pools = WorkerPools::from_config(&self.config.pools)?;
        info!(
            io_threads = pools.status(PoolKind::Io).max_threads,
            cpu_threads = pools.status(PoolKind::Cpu).max_threads,
            primary_process = self.config.dispatch.primary_process,
            "launcher initialized"
        );

        Ok(Launcher {
            shared: Arc::new(LauncherShared {
                config: self.config,
                pools,
                history: self.history.unwrap_or_default(),
                listener: self.listener,
                coordinator_thread: thread::current().id(),
            }),
        })
    }
}
