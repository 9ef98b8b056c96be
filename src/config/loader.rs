// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{LaunchConfig, PlanFile, RawPlanFile};
use crate::config::validate::validate_settings;
use crate::errors::Result;

/// Load a plan file and return the raw `RawPlanFile`.
///
/// This only performs TOML deserialization; it does **not** check the task
/// graph. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawPlanFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let plan: RawPlanFile = toml::from_str(&contents)?;

    Ok(plan)
}

/// Load a plan file and validate it:
///
/// - settings sanity (non-zero pools and timeout),
/// - unknown or self-referencing `after` entries,
/// - dependency cycles.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<PlanFile> {
    let raw = load_from_path(&path)?;
    let plan = PlanFile::try_from(raw)?;
    Ok(plan)
}

/// Load only the launcher settings from a TOML file (any `[task.*]` sections
/// are ignored).
pub fn load_settings(path: impl AsRef<Path>) -> Result<LaunchConfig> {
    let raw = load_from_path(path)?;
    validate_settings(&raw.settings)?;
    Ok(raw.settings)
}

/// Parse and validate settings from a TOML string.
pub fn settings_from_str(contents: &str) -> Result<LaunchConfig> {
    let raw: RawPlanFile = toml::from_str(contents)?;
    validate_settings(&raw.settings)?;
    Ok(raw.settings)
}
