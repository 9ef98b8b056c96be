// src/config/mod.rs

//! Configuration loading and validation for launchdag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`): launcher settings and
//!   scripted task plans.
//! - Load settings or a plan from disk (`loader.rs`).
//! - Validate invariants like pool sizes and plan DAG correctness
//!   (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_settings, settings_from_str};
pub use model::{
    CpuPoolSection, DispatchSection, IoPoolSection, LaunchConfig, PlanFile, PoolsSection,
    RawPlanFile, StatsSection, TaskSpec,
};
pub use validate::validate_settings;
