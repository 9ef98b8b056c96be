// src/exec/mod.rs

//! Execution layer.
//!
//! - [`pools`] owns the I/O and CPU worker pools and the ad hoc fallback.
//! - [`runner`] executes one task and performs its completion bookkeeping
//!   through a [`CompletionSink`].
//! - [`idle`] runs deferred tasks one at a time on host idle signals.

pub mod idle;
pub mod pools;
pub mod runner;

pub use idle::IdleRunner;
pub use pools::{PoolSpec, PoolStatus, Submission, WorkerPools};
pub use runner::{CompletionSink, RunEnv, Runner};
