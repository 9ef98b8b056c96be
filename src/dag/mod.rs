// src/dag/mod.rs

//! Dependency graph and ordering.
//!
//! - [`graph`] holds the index-based dependency graph and its Kahn sort.
//! - [`sorter`] resolves task dependencies into that graph and applies the
//!   priority buckets plus the process-wide [`PriorityHistory`].

pub mod graph;
pub mod sorter;

pub use graph::{CycleError, DependencyGraph};
pub use sorter::{PriorityHistory, SortOutcome, TaskSorter, planned_order};
