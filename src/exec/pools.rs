// src/exec/pools.rs

//! Background worker pools.
//!
//! Each pool is a tokio runtime used only for its blocking thread pool:
//! `spawn_blocking` gives us a FIFO queue, on-demand thread creation up to a
//! cap and idle-thread expiry, which is exactly the cached/fixed pool model
//! startup tasks want. No async work runs on these runtimes.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::config::model::PoolsSection;
use crate::errors::Result;
use crate::types::PoolKind;

/// Shape of one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSpec {
    pub max_threads: usize,
    pub keep_alive: Duration,
    /// Extra submissions allowed to wait beyond `max_threads`; `None` is
    /// unbounded.
    pub queue_capacity: Option<usize>,
}

impl PoolSpec {
    pub fn io_from(cfg: &PoolsSection) -> Self {
        Self {
            max_threads: cfg.io.max_threads,
            keep_alive: Duration::from_millis(cfg.io.keep_alive_ms),
            queue_capacity: cfg.io.queue_capacity,
        }
    }

    pub fn cpu_from(cfg: &PoolsSection) -> Self {
        Self {
            max_threads: cfg.cpu.effective_threads(),
            keep_alive: Duration::from_millis(cfg.cpu.keep_alive_ms),
            queue_capacity: cfg.cpu.queue_capacity,
        }
    }
}

#[derive(Debug, Default)]
struct PoolCounters {
    in_flight: AtomicUsize,
    active: AtomicUsize,
    peak_active: AtomicUsize,
}

/// Decrements `in_flight` when the job finishes or is dropped unstarted.
struct InFlightGuard(Arc<PoolCounters>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Tracks `active` while the job body runs.
struct ActiveGuard(Arc<PoolCounters>);

impl ActiveGuard {
    fn enter(counters: &Arc<PoolCounters>) -> Self {
        let now = counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak_active.fetch_max(now, Ordering::SeqCst);
        Self(Arc::clone(counters))
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Pool {
    kind: PoolKind,
    spec: PoolSpec,
    runtime: Option<Runtime>,
    counters: Arc<PoolCounters>,
}

impl Pool {
    fn build(kind: PoolKind, spec: PoolSpec) -> Result<Self> {
        let thread_seq = Arc::new(AtomicUsize::new(1));
        let runtime = Builder::new_current_thread()
            .max_blocking_threads(spec.max_threads)
            .thread_keep_alive(spec.keep_alive)
            .thread_name_fn(move || {
                let n = thread_seq.fetch_add(1, Ordering::SeqCst);
                format!("launchdag-{kind}-{n}")
            })
            .build()?;

        debug!(
            pool = %kind,
            max_threads = spec.max_threads,
            keep_alive_ms = spec.keep_alive.as_millis() as u64,
            queue_capacity = ?spec.queue_capacity,
            "worker pool created"
        );

        Ok(Self {
            kind,
            spec,
            runtime: Some(runtime),
            counters: Arc::new(PoolCounters::default()),
        })
    }

    /// Submit `job` unless the pool is saturated, in which case the job is
    /// handed back.
    fn try_submit<F>(&self, job: F) -> std::result::Result<JoinHandle<()>, F>
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(runtime) = self.runtime.as_ref() else {
            return Err(job);
        };

        if let Some(capacity) = self.spec.queue_capacity {
            let limit = self.spec.max_threads.saturating_add(capacity);
            if self.counters.in_flight.load(Ordering::SeqCst) >= limit {
                return Err(job);
            }
        }

        self.counters.in_flight.fetch_add(1, Ordering::SeqCst);
        let in_flight = InFlightGuard(Arc::clone(&self.counters));
        let counters = Arc::clone(&self.counters);

        Ok(runtime.spawn_blocking(move || {
            let _in_flight = in_flight;
            let _active = ActiveGuard::enter(&counters);
            job();
        }))
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            // Do not block the dropping thread on task bodies still running.
            runtime.shutdown_background();
        }
    }
}

/// Handle to a submitted job, retained for cancellation.
#[derive(Debug)]
pub enum Submission {
    Pool { kind: PoolKind, handle: JoinHandle<()> },
    AdHoc(std::thread::JoinHandle<()>),
    /// The ad hoc thread could not be spawned; the job was dropped.
    Lost,
}

impl Submission {
    /// Prevent the job from starting if it is still queued. Jobs already
    /// running are unaffected.
    pub fn abort(&self) {
        if let Submission::Pool { handle, .. } = self {
            handle.abort();
        }
    }

    pub fn pool(&self) -> Option<PoolKind> {
        match self {
            Submission::Pool { kind, .. } => Some(*kind),
            Submission::AdHoc(_) | Submission::Lost => None,
        }
    }
}

/// Point-in-time counters for one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub max_threads: usize,
    /// Submitted and not yet finished (queued + running).
    pub in_flight: usize,
    /// Currently executing a job.
    pub active: usize,
    /// Highest `active` ever observed.
    pub peak_active: usize,
}

/// The I/O and CPU pools plus the unbounded ad hoc fallback.
pub struct WorkerPools {
    io: Pool,
    cpu: Pool,
    adhoc_spawned: AtomicUsize,
}

impl WorkerPools {
    pub fn new(io: PoolSpec, cpu: PoolSpec) -> Result<Self> {
        Ok(Self {
            io: Pool::build(PoolKind::Io, io)?,
            cpu: Pool::build(PoolKind::Cpu, cpu)?,
            adhoc_spawned: AtomicUsize::new(0),
        })
    }

    pub fn from_config(cfg: &PoolsSection) -> Result<Self> {
        Self::new(PoolSpec::io_from(cfg), PoolSpec::cpu_from(cfg))
    }

    fn pool(&self, kind: PoolKind) -> &Pool {
        match kind {
            PoolKind::Io => &self.io,
            PoolKind::Cpu => &self.cpu,
        }
    }

    /// Submit `job` to `preferred`; if it rejects, to the other pool; if both
    /// reject, to a dedicated ad hoc thread so the job is never dropped.
    pub fn submit<F>(&self, preferred: PoolKind, job: F) -> Submission
    where
        F: FnOnce() + Send + 'static,
    {
        let job = match self.pool(preferred).try_submit(job) {
            Ok(handle) => {
                return Submission::Pool {
                    kind: preferred,
                    handle,
                };
            }
            Err(job) => job,
        };

        let fallback = preferred.other();
        warn!(pool = %preferred, fallback = %fallback, "pool saturated; trying the other pool");
        let job = match self.pool(fallback).try_submit(job) {
            Ok(handle) => {
                return Submission::Pool {
                    kind: fallback,
                    handle,
                };
            }
            Err(job) => job,
        };

        let n = self.adhoc_spawned.fetch_add(1, Ordering::SeqCst) + 1;
        warn!(
            pool = %preferred,
            adhoc_threads = n,
            "both pools saturated; running on an ad hoc thread"
        );
        match std::thread::Builder::new()
            .name(format!("launchdag-adhoc-{n}"))
            .spawn(job)
        {
            Ok(handle) => Submission::AdHoc(handle),
            Err(err) => {
                error!(error = %err, "failed to spawn ad hoc thread; job dropped");
                Submission::Lost
            }
        }
    }

    pub fn status(&self, kind: PoolKind) -> PoolStatus {
        let pool = self.pool(kind);
        PoolStatus {
            max_threads: pool.spec.max_threads,
            in_flight: pool.counters.in_flight.load(Ordering::SeqCst),
            active: pool.counters.active.load(Ordering::SeqCst),
            peak_active: pool.counters.peak_active.load(Ordering::SeqCst),
        }
    }

    /// Number of jobs that fell through to ad hoc threads.
    pub fn adhoc_spawned(&self) -> usize {
        self.adhoc_spawned.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for WorkerPools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPools")
            .field("io", &self.status(PoolKind::Io))
            .field("cpu", &self.status(PoolKind::Cpu))
            .field("adhoc_spawned", &self.adhoc_spawned())
            .finish()
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("kind", &self.kind)
            .field("spec", &self.spec)
            .finish()
    }
}
