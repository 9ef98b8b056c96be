// src/lib.rs

//! Dependency-aware startup task launcher.
//!
//! Tasks declare dependencies on other tasks and an affinity (coordinator
//! thread, I/O pool or CPU pool). A [`Coordinator`](engine::Coordinator)
//! sorts one run's tasks topologically, dispatches pool tasks eagerly (each
//! runner blocks until its own dependencies finish), runs coordinator tasks
//! serially on the calling thread and finally waits for the tasks flagged
//! `needs_wait`.

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod plan;
pub mod stats;
pub mod task;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{PlanFile, load_and_validate};
use crate::engine::{AwaitOutcome, Launcher};
use crate::plan::tasks_from_plan;
use crate::stats::{TaskListener, TaskStats};
use crate::task::{TaskKey, TaskSlot};
use crate::types::TaskOutcome;

pub use crate::engine::Coordinator;
pub use crate::errors::LaunchError;
pub use crate::task::{Task, TaskContext};
pub use crate::types::Affinity;

/// What a plan run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub outcome: AwaitOutcome,
    pub order: Vec<TaskKey>,
    /// Tasks finished by the time the wait returned, in completion order.
    pub finished: Vec<(TaskKey, TaskOutcome, Duration)>,
}

impl RunSummary {
    pub fn failures(&self) -> Vec<&TaskKey> {
        self.finished
            .iter()
            .filter(|(_, outcome, _)| {
                matches!(outcome, TaskOutcome::Failed(_) | TaskOutcome::Panicked(_))
            })
            .map(|(key, _, _)| key)
            .collect()
    }
}

/// High-level entry point used by `main.rs`.
pub fn run(args: CliArgs) -> Result<()> {
    let plan_path = PathBuf::from(&args.plan);
    let mut plan = load_and_validate(&plan_path)?;

    if args.secondary {
        plan.settings.dispatch.primary_process = false;
    }
    if let Some(ms) = args.timeout_ms {
        plan.settings.dispatch.wait_timeout_ms = ms;
    }

    if args.dry_run {
        print_dry_run(&plan)?;
        return Ok(());
    }

    let stats = Arc::new(TaskStats::new(plan.settings.stats.enabled));
    let summary = execute_plan(&plan, Arc::clone(&stats))?;
    if let Some(label) = args.situation {
        stats.set_situation(label);
    }

    print_summary(&summary, &stats);

    if let AwaitOutcome::TimedOut { pending } = &summary.outcome {
        let names: Vec<String> = pending.iter().map(ToString::to_string).collect();
        bail!("timed out waiting for [{}]", names.join(", "));
    }
    let failures = summary.failures();
    if !failures.is_empty() {
        let names: Vec<String> = failures.iter().map(ToString::to_string).collect();
        bail!("tasks failed: [{}]", names.join(", "));
    }
    Ok(())
}

/// Run every task of `plan` on a fresh launcher whose coordinator thread is
/// the calling thread.
pub fn execute_plan(plan: &PlanFile, stats: Arc<TaskStats>) -> Result<RunSummary> {
    let launcher = Launcher::builder(plan.settings.clone())
        .listener(Arc::clone(&stats) as Arc<dyn TaskListener>)
        .build()?;

    let mut coordinator = launcher.create_coordinator();
    for task in tasks_from_plan(plan) {
        coordinator.add_task(task)?;
    }

    info!(tasks = plan.task.len(), "starting plan");
    coordinator.start()?;
    let outcome = coordinator.await_completion()?;
    debug!(?outcome, "plan wait returned");

    Ok(RunSummary {
        outcome,
        order: coordinator.sorted_order(),
        finished: stats.durations(),
    })
}

/// Dispatch order the plan would use on a fresh process, without running.
pub fn dry_run_order(plan: &PlanFile) -> Result<Vec<TaskKey>> {
    let mut slots = Vec::with_capacity(plan.task.len());
    for task in tasks_from_plan(plan) {
        slots.push(Arc::new(TaskSlot::new(Box::new(task))?));
    }
    let keys: Vec<TaskKey> = slots.iter().map(|s| s.key().clone()).collect();
    Ok(dag::planned_order(&slots, &keys)?)
}

fn print_dry_run(plan: &PlanFile) -> Result<()> {
    let settings = &plan.settings;
    println!("launchdag dry-run");
    println!("  pools.io.max_threads = {}", settings.pools.io.max_threads);
    println!("  pools.cpu.threads = {}", settings.pools.cpu.effective_threads());
    println!("  dispatch.wait_timeout_ms = {}", settings.dispatch.wait_timeout_ms);
    println!("  dispatch.primary_process = {}", settings.dispatch.primary_process);
    println!();

    println!("dispatch order ({}):", plan.task.len());
    for (position, key) in dry_run_order(plan)?.iter().enumerate() {
        let Some(spec) = plan.task.get(key.name()) else {
            continue;
        };
        println!("  {:>2}. {key} [{:?}]", position + 1, spec.affinity);
        if !spec.after.is_empty() {
            println!("      after: {:?}", spec.after);
        }
        if spec.needs_wait {
            println!("      needs_wait: true");
        }
        if spec.run_as_soon {
            println!("      run_as_soon: true");
        }
        if !spec.effective_primary_only() {
            println!("      primary_only: false");
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}

fn print_summary(summary: &RunSummary, stats: &TaskStats) {
    match &summary.outcome {
        AwaitOutcome::Completed => println!("all wait-tasks finished"),
        AwaitOutcome::TimedOut { pending } => {
            println!("timed out; {} wait-task(s) pending", pending.len())
        }
    }
    for (key, outcome, elapsed) in &summary.finished {
        println!("  {key:<24} {outcome:?} in {} ms", elapsed.as_millis());
    }
    for record in stats.records() {
        println!("situation '{}': {} task(s) finished", record.situation, record.finished);
    }
}
