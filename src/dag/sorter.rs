// src/dag/sorter.rs

//! Priority-aware ordering of registered tasks.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::dag::graph::DependencyGraph;
use crate::errors::{LaunchError, Result};
use crate::task::{TaskKey, TaskSlot};

/// Process-lifetime list of tasks that were depended on or flagged
/// run-as-soon in any run sorted so far.
///
/// Every later ordering starts with this list, so frequently depended-on
/// tasks stay front-loaded for the life of the process. It only grows.
/// Cloning yields another handle to the same list; use
/// [`PriorityHistory::default`] for an isolated one.
#[derive(Debug, Clone, Default)]
pub struct PriorityHistory {
    promoted: Arc<Mutex<Vec<Arc<TaskSlot>>>>,
}

impl PriorityHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.promoted.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of the promoted tasks in discovery order.
    pub fn keys(&self) -> Vec<TaskKey> {
        self.promoted
            .lock()
            .iter()
            .map(|slot| slot.key().clone())
            .collect()
    }
}

/// Result of [`TaskSorter::sort`].
#[derive(Debug)]
pub struct SortOutcome {
    /// Promoted history (including this run's promotions) followed by this
    /// run's plain tasks.
    pub order: Vec<Arc<TaskSlot>>,
    /// Indices (into the input) of tasks at least one other task depends on.
    pub depended: BTreeSet<usize>,
    /// Dependencies that only matched by simple name: (declared, resolved).
    pub aliases: Vec<(TaskKey, TaskKey)>,
}

/// Builds the dependency graph for one run and stratifies its topological
/// order: depended-on tasks, then run-as-soon tasks, then everything else.
#[derive(Debug, Clone)]
pub struct TaskSorter {
    history: PriorityHistory,
}

impl TaskSorter {
    pub fn new(history: PriorityHistory) -> Self {
        Self { history }
    }

    pub fn history(&self) -> &PriorityHistory {
        &self.history
    }

    /// Sort `tasks` (registration order, with `keys[i] == tasks[i].key()`).
    ///
    /// The history lock is held for the whole call so concurrent sorts from
    /// different coordinators serialize.
    pub fn sort(&self, tasks: &[Arc<TaskSlot>], keys: &[TaskKey]) -> Result<SortOutcome> {
        let started = Instant::now();
        let mut promoted = self.history.promoted.lock();

        let mut depended: BTreeSet<usize> = BTreeSet::new();
        let mut aliases = Vec::new();
        let mut graph = DependencyGraph::new(tasks.len());

        for (i, task) in tasks.iter().enumerate() {
            if task.is_dispatched() || task.dependencies().is_empty() {
                continue;
            }

            for dep in task.dependencies() {
                let index = index_of_task(keys, dep).ok_or_else(|| LaunchError::TaskNotFound {
                    task: task.key().to_string(),
                    dependency: dep.to_string(),
                })?;
                if &keys[index] != dep && !aliases.iter().any(|(d, _)| d == dep) {
                    aliases.push((dep.clone(), keys[index].clone()));
                }
                depended.insert(index);
                graph.add_edge(index, i)?;
            }
        }

        let indices = graph.topological_sort().map_err(|cycle| {
            let names: Vec<String> = cycle
                .unresolved
                .iter()
                .map(|&i| keys[i].to_string())
                .collect();
            LaunchError::DagCycle(format!(
                "cycle detected among tasks [{}]",
                names.join(", ")
            ))
        })?;

        let mut depended_bucket = Vec::new();
        let mut run_as_soon_bucket = Vec::new();
        let mut plain_bucket = Vec::new();

        for index in indices {
            let task = &tasks[index];
            if depended.contains(&index) {
                depended_bucket.push(Arc::clone(task));
            } else if task.run_as_soon() {
                run_as_soon_bucket.push(Arc::clone(task));
            } else {
                plain_bucket.push(Arc::clone(task));
            }
        }

        promoted.extend(depended_bucket);
        promoted.extend(run_as_soon_bucket);

        let mut order = Vec::with_capacity(promoted.len() + plain_bucket.len());
        order.extend(promoted.iter().cloned());
        order.extend(plain_bucket);

        debug!(
            tasks = tasks.len(),
            edges = graph.edge_count(),
            promoted = promoted.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "sorted task graph"
        );

        Ok(SortOutcome {
            order,
            depended,
            aliases,
        })
    }
}

/// Index of `dep` in `keys`: exact key match first, then a scan by simple
/// name.
fn index_of_task(keys: &[TaskKey], dep: &TaskKey) -> Option<usize> {
    if let Some(index) = keys.iter().position(|k| k == dep) {
        return Some(index);
    }

    let index = keys
        .iter()
        .position(|k| k.simple_name() == dep.simple_name())?;
    warn!(
        dependency = dep.name(),
        resolved = keys[index].name(),
        "dependency resolved by name only; check the declared key"
    );
    Some(index)
}

/// Order `tasks` would be dispatched in against an empty history, without
/// touching any shared state. Used for dry runs.
pub fn planned_order(tasks: &[Arc<TaskSlot>], keys: &[TaskKey]) -> Result<Vec<TaskKey>> {
    let outcome = TaskSorter::new(PriorityHistory::new()).sort(tasks, keys)?;
    Ok(outcome
        .order
        .iter()
        .map(|slot| slot.key().clone())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Task, TaskContext};

    struct Probe {
        name: &'static str,
        deps: Vec<&'static str>,
        run_as_soon: bool,
    }

    impl Task for Probe {
        fn key(&self) -> TaskKey {
            TaskKey::named(self.name)
        }
        fn dependencies(&self) -> Vec<TaskKey> {
            self.deps.iter().map(|d| TaskKey::named(*d)).collect()
        }
        fn run_as_soon_as_possible(&self) -> bool {
            self.run_as_soon
        }
        fn run(&self, _ctx: &TaskContext) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn slots(spec: &[(&'static str, &[&'static str], bool)]) -> (Vec<Arc<TaskSlot>>, Vec<TaskKey>) {
        let slots: Vec<Arc<TaskSlot>> = spec
            .iter()
            .map(|(name, deps, soon)| {
                Arc::new(
                    TaskSlot::new(Box::new(Probe {
                        name: *name,
                        deps: deps.to_vec(),
                        run_as_soon: *soon,
                    }))
                    .unwrap(),
                )
            })
            .collect();
        let keys = slots.iter().map(|s| s.key().clone()).collect();
        (slots, keys)
    }

    fn names(order: &[Arc<TaskSlot>]) -> Vec<String> {
        order.iter().map(|s| s.key().to_string()).collect()
    }

    #[test]
    fn buckets_depended_then_run_as_soon_then_plain() {
        let (tasks, keys) = slots(&[
            ("plain", &[], false),
            ("soon", &[], true),
            ("child", &["base"], false),
            ("base", &[], false),
        ]);
        let sorter = TaskSorter::new(PriorityHistory::new());
        let outcome = sorter.sort(&tasks, &keys).unwrap();

        assert_eq!(names(&outcome.order), vec!["base", "soon", "plain", "child"]);
        assert_eq!(outcome.depended.iter().copied().collect::<Vec<_>>(), vec![3]);
        assert_eq!(sorter.history().keys(), vec![TaskKey::named("base"), TaskKey::named("soon")]);
    }

    #[test]
    fn history_is_prepended_to_later_runs() {
        let history = PriorityHistory::new();

        let (first, first_keys) = slots(&[("a", &[], false), ("b", &["a"], false)]);
        TaskSorter::new(history.clone()).sort(&first, &first_keys).unwrap();
        first[0].mark_dispatched();
        first[1].mark_dispatched();

        let (second, second_keys) = slots(&[("x", &[], false), ("y", &[], true)]);
        let outcome = TaskSorter::new(history.clone())
            .sort(&second, &second_keys)
            .unwrap();

        assert_eq!(names(&outcome.order), vec!["a", "y", "x"]);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn missing_dependency_is_fatal() {
        let (tasks, keys) = slots(&[("e", &["ghost"], false)]);
        let err = TaskSorter::new(PriorityHistory::new())
            .sort(&tasks, &keys)
            .unwrap_err();
        assert!(matches!(
            err,
            LaunchError::TaskNotFound { ref task, ref dependency } if task == "e" && dependency == "ghost"
        ));
    }

    #[test]
    fn cycle_is_fatal_and_leaves_history_untouched() {
        let history = PriorityHistory::new();
        let (tasks, keys) = slots(&[("a", &["b"], false), ("b", &["a"], false), ("c", &[], false)]);
        let err = TaskSorter::new(history.clone()).sort(&tasks, &keys).unwrap_err();
        match err {
            LaunchError::DagCycle(msg) => {
                assert!(msg.contains("[a, b]"), "{msg}");
            }
            other => panic!("expected DagCycle, got {other:?}"),
        }
        assert!(history.is_empty());
    }

    #[test]
    fn dependency_falls_back_to_simple_name() {
        struct Config;
        impl Task for Config {
            fn run(&self, _ctx: &TaskContext) -> anyhow::Result<()> {
                Ok(())
            }
        }

        let (mut tasks, mut keys) = slots(&[("needs_config", &["Config"], false)]);
        let config = Arc::new(TaskSlot::new(Box::new(Config)).unwrap());
        keys.push(config.key().clone());
        tasks.push(config);

        let outcome = TaskSorter::new(PriorityHistory::new())
            .sort(&tasks, &keys)
            .unwrap();
        assert_eq!(
            outcome.aliases,
            vec![(TaskKey::named("Config"), TaskKey::of::<Config>())]
        );

        let order = planned_order(&tasks, &keys).unwrap();
        assert_eq!(order[0], TaskKey::of::<Config>());
        assert_eq!(order[1], TaskKey::named("needs_config"));
    }
}
