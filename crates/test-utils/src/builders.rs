#![allow(dead_code)]

use std::collections::BTreeMap;

use launchdag::config::{LaunchConfig, PlanFile, RawPlanFile, TaskSpec};
use launchdag::errors::Result;
use launchdag::types::Affinity;

/// Builder for `PlanFile` to simplify test setup.
pub struct PlanBuilder {
    plan: RawPlanFile,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self {
            plan: RawPlanFile {
                settings: LaunchConfig::default(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskSpec) -> Self {
        self.plan.task.insert(name.to_string(), task);
        self
    }

    pub fn cpu_threads(mut self, threads: usize) -> Self {
        self.plan.settings.pools.cpu.threads = Some(threads);
        self
    }

    pub fn io_threads(mut self, threads: usize) -> Self {
        self.plan.settings.pools.io.max_threads = threads;
        self
    }

    pub fn wait_timeout_ms(mut self, ms: u64) -> Self {
        self.plan.settings.dispatch.wait_timeout_ms = ms;
        self
    }

    pub fn secondary(mut self) -> Self {
        self.plan.settings.dispatch.primary_process = false;
        self
    }

    pub fn debug(mut self) -> Self {
        self.plan.settings.dispatch.debug = true;
        self
    }

    pub fn settings(&self) -> &LaunchConfig {
        &self.plan.settings
    }

    pub fn try_build(self) -> Result<PlanFile> {
        PlanFile::try_from(self.plan)
    }

    pub fn build(self) -> PlanFile {
        self.try_build()
            .expect("Failed to build valid plan from builder")
    }
}

impl Default for PlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskSpec`.
pub struct TaskSpecBuilder {
    task: TaskSpec,
}

impl TaskSpecBuilder {
    pub fn new(affinity: Affinity) -> Self {
        Self {
            task: TaskSpec {
                affinity,
                ..TaskSpec::default()
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn work_ms(mut self, ms: u64) -> Self {
        self.task.work_ms = ms;
        self
    }

    pub fn needs_wait(mut self) -> Self {
        self.task.needs_wait = true;
        self
    }

    pub fn run_as_soon(mut self) -> Self {
        self.task.run_as_soon = true;
        self
    }

    pub fn any_process(mut self) -> Self {
        self.task.primary_only = Some(false);
        self
    }

    pub fn callback(mut self) -> Self {
        self.task.callback = true;
        self
    }

    pub fn failing(mut self) -> Self {
        self.task.fail = true;
        self
    }

    pub fn build(self) -> TaskSpec {
        self.task
    }
}
