// tests/property_ordering.rs

mod common;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use proptest::prelude::*;

use launchdag::dag::{PriorityHistory, TaskSorter};
use launchdag::task::{TaskKey, TaskSlot};
use launchdag::types::Affinity;
use launchdag_test_utils::probe::{ProbeTask, Timeline};

use common::{launcher, small_config};

/// Dependency lists for a random DAG: task `i` only depends on tasks `< i`,
/// which keeps it acyclic.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<BTreeSet<usize>>> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..4), num_tasks).prop_map(
            |raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(i, picks)| {
                        if i == 0 {
                            BTreeSet::new()
                        } else {
                            picks.into_iter().map(|p| p % i).collect()
                        }
                    })
                    .collect()
            },
        )
    })
}

fn name(i: usize) -> String {
    format!("task_{i}")
}

fn probes(deps: &[BTreeSet<usize>], timeline: &Arc<Timeline>, soon: &[bool]) -> Vec<ProbeTask> {
    deps.iter()
        .enumerate()
        .map(|(i, ds)| {
            let affinity = match i % 3 {
                0 => Affinity::Io,
                1 => Affinity::Cpu,
                _ => Affinity::Coordinator,
            };
            let mut probe = ProbeTask::new(&name(i), timeline).affinity(affinity).wait();
            if soon.get(i).copied().unwrap_or(false) {
                probe = probe.soon();
            }
            for d in ds {
                probe = probe.after(&name(*d));
            }
            probe
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn sorted_order_respects_every_edge(
        deps in dag_strategy(12),
        soon in proptest::collection::vec(any::<bool>(), 12),
    ) {
        let timeline = Timeline::new();
        let slots: Vec<Arc<TaskSlot>> = probes(&deps, &timeline, &soon)
            .into_iter()
            .map(|p| Arc::new(TaskSlot::new(Box::new(p)).unwrap()))
            .collect();
        let keys: Vec<TaskKey> = slots.iter().map(|s| s.key().clone()).collect();

        let outcome = TaskSorter::new(PriorityHistory::new()).sort(&slots, &keys).unwrap();
        prop_assert_eq!(outcome.order.len(), slots.len());

        let position: HashMap<TaskKey, usize> = outcome
            .order
            .iter()
            .enumerate()
            .map(|(pos, slot)| (slot.key().clone(), pos))
            .collect();
        for (i, ds) in deps.iter().enumerate() {
            for d in ds {
                prop_assert!(position[&keys[*d]] < position[&keys[i]]);
                prop_assert!(outcome.depended.contains(d));
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn no_task_starts_before_its_dependencies_end(deps in dag_strategy(10)) {
        let launcher = launcher(small_config());
        let timeline = Timeline::new();
        let mut run = launcher.create_coordinator();
        for probe in probes(&deps, &timeline, &[]) {
            run.add_task(probe).unwrap();
        }

        run.start().unwrap();
        prop_assert!(run.await_completion().unwrap().is_completed());
        prop_assert_eq!(timeline.completed(), deps.len());

        for (i, ds) in deps.iter().enumerate() {
            for d in ds {
                prop_assert!(timeline.ended_before_start(&name(*d), &name(i)));
            }
        }
    }
}
