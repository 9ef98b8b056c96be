// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("{operation} must be called from the coordinator thread")]
    OffCoordinatorThread { operation: &'static str },

    #[error("Task not found: '{task}' depends on '{dependency}', which is not registered")]
    TaskNotFound { task: String, dependency: String },

    #[error("Task '{0}' cannot depend on itself")]
    SelfDependency(String),

    #[error("Task '{0}' is already registered with this coordinator")]
    DuplicateTask(String),

    #[error("Cycle detected in DAG: {0}")]
    DagCycle(String),

    #[error("coordinator has already been started; create a new one for each run")]
    AlreadyStarted,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LaunchError {
    /// Whether this error is a fatal configuration problem (bad graph or API
    /// misuse) rather than an environmental failure.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            LaunchError::ConfigError(_)
                | LaunchError::OffCoordinatorThread { .. }
                | LaunchError::TaskNotFound { .. }
                | LaunchError::SelfDependency(_)
                | LaunchError::DuplicateTask(_)
                | LaunchError::DagCycle(_)
                | LaunchError::AlreadyStarted
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, LaunchError>;
