// src/plan.rs

//! Tasks described by a plan file instead of Rust types.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use tracing::debug;

use crate::config::{PlanFile, TaskSpec};
use crate::task::{CancelToken, Task, TaskContext, TaskKey};
use crate::types::Affinity;

const SLICE: Duration = Duration::from_millis(5);

/// A task whose body sleeps for `work_ms`, optionally failing or completing
/// from a helper thread.
#[derive(Debug, Clone)]
pub struct ScriptedTask {
    name: Arc<str>,
    after: Vec<TaskKey>,
    affinity: Affinity,
    work: Duration,
    needs_wait: bool,
    run_as_soon: bool,
    primary_only: bool,
    callback: bool,
    fail: bool,
}

impl ScriptedTask {
    pub fn from_spec(name: &str, spec: &TaskSpec) -> Self {
        Self {
            name: Arc::from(name),
            after: spec.after.iter().map(|d| TaskKey::named(d.as_str())).collect(),
            affinity: spec.affinity,
            work: spec.work(),
            needs_wait: spec.needs_wait,
            run_as_soon: spec.run_as_soon,
            primary_only: spec.effective_primary_only(),
            callback: spec.callback,
            fail: spec.fail,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One scripted task per `[task.NAME]` table, in name order.
pub fn tasks_from_plan(plan: &PlanFile) -> Vec<ScriptedTask> {
    plan.task
        .iter()
        .map(|(name, spec)| ScriptedTask::from_spec(name, spec))
        .collect()
}

/// Sleep for `work` in short slices; returns `false` if cancelled first.
fn simulate_work(work: Duration, cancel: &CancelToken) -> bool {
    // An unrepresentable deadline runs until cancelled.
    let deadline = Instant::now().checked_add(work);
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        match deadline {
            Some(deadline) if now >= deadline => return true,
            Some(deadline) => thread::sleep(SLICE.min(deadline - now)),
            None => thread::sleep(SLICE),
        }
    }
}

impl Task for ScriptedTask {
    fn key(&self) -> TaskKey {
        TaskKey::named(Arc::clone(&self.name))
    }

    fn dependencies(&self) -> Vec<TaskKey> {
        self.after.clone()
    }

    fn affinity(&self) -> Affinity {
        self.affinity
    }

    fn needs_wait(&self) -> bool {
        self.needs_wait
    }

    fn needs_callback(&self) -> bool {
        self.callback
    }

    fn run_as_soon_as_possible(&self) -> bool {
        self.run_as_soon
    }

    fn restrict_to_primary_process(&self) -> bool {
        self.primary_only
    }

    fn run(&self, ctx: &TaskContext) -> anyhow::Result<()> {
        if self.fail {
            bail!("task '{}' is configured to fail", self.name);
        }

        let Some(handle) = ctx.completion() else {
            if !simulate_work(self.work, ctx.cancel_token()) {
                bail!("task '{}' cancelled", self.name);
            }
            return Ok(());
        };

        let name = Arc::clone(&self.name);
        let work = self.work;
        let cancel = ctx.cancel_token().clone();
        thread::Builder::new()
            .name(format!("launchdag-callback-{name}"))
            .spawn(move || {
                if simulate_work(work, &cancel) {
                    debug!(task = %name, "callback completing");
                    handle.complete();
                } else {
                    handle.fail("cancelled");
                }
            })
            .with_context(|| format!("spawning callback thread for '{}'", self.name))?;
        Ok(())
    }
}
