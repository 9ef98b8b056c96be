// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{LaunchConfig, PlanFile, RawPlanFile};
use crate::errors::{LaunchError, Result};

impl TryFrom<RawPlanFile> for PlanFile {
    type Error = crate::errors::LaunchError;

    fn try_from(raw: RawPlanFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_plan(&raw)?;
        Ok(PlanFile::new_unchecked(raw.settings, raw.task))
    }
}

fn validate_raw_plan(plan: &RawPlanFile) -> Result<()> {
    ensure_has_tasks(plan)?;
    validate_settings(&plan.settings)?;
    validate_task_dependencies(plan)?;
    validate_dag(plan)?;
    Ok(())
}

fn ensure_has_tasks(plan: &RawPlanFile) -> Result<()> {
    if plan.task.is_empty() {
        return Err(LaunchError::ConfigError(
            "plan must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

/// Sanity checks on launcher settings.
pub fn validate_settings(cfg: &LaunchConfig) -> Result<()> {
    if cfg.pools.io.max_threads == 0 {
        return Err(LaunchError::ConfigError(
            "[pools.io].max_threads must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.pools.cpu.threads == Some(0) {
        return Err(LaunchError::ConfigError(
            "[pools.cpu].threads must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.dispatch.wait_timeout_ms == 0 {
        return Err(LaunchError::ConfigError(
            "[dispatch].wait_timeout_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}

fn validate_task_dependencies(plan: &RawPlanFile) -> Result<()> {
    for (name, task) in plan.task.iter() {
        for dep in task.after.iter() {
            if dep == name {
                return Err(LaunchError::SelfDependency(name.clone()));
            }
            if !plan.task.contains_key(dep) {
                return Err(LaunchError::TaskNotFound {
                    task: name.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }
    Ok(())
}

fn validate_dag(plan: &RawPlanFile) -> Result<()> {
    // Edge direction: dep -> task
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in plan.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in plan.task.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(LaunchError::DagCycle(format!(
                "cycle detected in plan involving task '{}'",
                node
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::settings_from_str;

    #[test]
    fn defaults_apply_to_empty_settings() {
        let cfg = settings_from_str("").unwrap();
        assert_eq!(cfg.pools.io.max_threads, 512);
        assert_eq!(cfg.pools.cpu.keep_alive_ms, 5_000);
        assert_eq!(cfg.dispatch.wait_timeout_ms, 10_000);
        assert!(cfg.dispatch.primary_process);
        assert!(!cfg.dispatch.debug);
        let cpu = cfg.pools.cpu.effective_threads();
        assert!((2..=5).contains(&cpu));
    }

    #[test]
    fn zero_sized_cpu_pool_is_rejected() {
        let err = settings_from_str("[pools.cpu]\nthreads = 0\n").unwrap_err();
        assert!(matches!(err, LaunchError::ConfigError(msg) if msg.contains("[pools.cpu]")));
    }

    #[test]
    fn self_dependency_in_plan_is_rejected() {
        let raw: RawPlanFile = toml::from_str(
            r#"
[task.a]
after = ["a"]
"#,
        )
        .unwrap();
        assert!(matches!(
            PlanFile::try_from(raw),
            Err(LaunchError::SelfDependency(name)) if name == "a"
        ));
    }
}
