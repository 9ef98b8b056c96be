// tests/pool_dispatch.rs

mod common;

use std::time::Duration;

use launchdag::engine::Launcher;
use launchdag::errors::LaunchError;
use launchdag::task::TaskKey;
use launchdag::types::{Affinity, PoolKind, TaskOutcome};
use launchdag_test_utils::eventually;
use launchdag_test_utils::probe::{ProbeTask, Timeline};

use common::{launcher, launcher_with_stats, small_config};

#[test]
fn cpu_pool_never_exceeds_its_thread_cap() {
    let mut cfg = small_config();
    cfg.pools.cpu.threads = Some(2);
    cfg.dispatch.wait_timeout_ms = 20_000;
    let launcher = launcher(cfg);
    let timeline = Timeline::new();
    let mut run = launcher.create_coordinator();

    for i in 0..50 {
        run.add_task(
            ProbeTask::new(&format!("cpu_{i}"), &timeline)
                .affinity(Affinity::Cpu)
                .wait()
                .work_ms(2),
        )
        .unwrap();
    }
    run.start().unwrap();
    assert!(run.await_completion().unwrap().is_completed());

    assert_eq!(timeline.completed(), 50);
    let status = launcher.pools().status(PoolKind::Cpu);
    assert!(status.peak_active <= 2, "peak {}", status.peak_active);
    assert_eq!(launcher.pools().adhoc_spawned(), 0);
    for entry in timeline.entries() {
        assert!(entry.thread.unwrap().starts_with("launchdag-cpu-"));
    }
}

#[test]
fn saturated_pools_fall_back_to_the_other_pool_then_adhoc() {
    let mut cfg = small_config();
    cfg.pools.cpu.threads = Some(1);
    cfg.pools.cpu.queue_capacity = Some(0);
    cfg.pools.io.max_threads = 1;
    cfg.pools.io.queue_capacity = Some(0);
    let launcher = launcher(cfg);
    let timeline = Timeline::new();
    let mut run = launcher.create_coordinator();

    for name in ["one", "two", "three"] {
        run.add_task(
            ProbeTask::new(name, &timeline)
                .affinity(Affinity::Cpu)
                .wait()
                .work_ms(150),
        )
        .unwrap();
    }
    run.start().unwrap();
    assert!(run.await_completion().unwrap().is_completed());

    let mut threads: Vec<String> = timeline
        .entries()
        .into_iter()
        .map(|e| e.thread.unwrap())
        .collect();
    threads.sort();
    assert!(threads[0].starts_with("launchdag-adhoc-"), "{threads:?}");
    assert!(threads[1].starts_with("launchdag-cpu-"), "{threads:?}");
    assert!(threads[2].starts_with("launchdag-io-"), "{threads:?}");
    assert_eq!(launcher.pools().adhoc_spawned(), 1);
}

#[test]
fn cancel_finishes_queued_and_waiting_tasks_as_cancelled() {
    let mut cfg = small_config();
    cfg.pools.io.max_threads = 1;
    let (launcher, stats) = launcher_with_stats(cfg);
    let timeline = Timeline::new();
    let mut run = launcher.create_coordinator();

    run.add_task(ProbeTask::new("busy", &timeline).wait().work_ms(2_000))
        .unwrap()
        .add_task(ProbeTask::new("queued", &timeline).wait())
        .unwrap()
        .add_task(
            ProbeTask::new("blocked", &timeline)
                .affinity(Affinity::Cpu)
                .after("busy")
                .wait(),
        )
        .unwrap();
    run.start().unwrap();
    assert!(eventually(Duration::from_secs(2), || timeline.has_started("busy")));

    run.cancel();
    assert!(
        run.await_completion_timeout(Duration::from_secs(5))
            .unwrap()
            .is_completed()
    );

    assert!(!timeline.has_started("queued"));
    assert!(!timeline.has_started("blocked"));

    let outcome_of = |name: &str| {
        stats
            .durations()
            .into_iter()
            .find(|(key, _, _)| key == &TaskKey::named(name))
            .map(|(_, outcome, _)| outcome)
    };
    assert_eq!(outcome_of("queued"), Some(TaskOutcome::Cancelled));
    assert_eq!(outcome_of("blocked"), Some(TaskOutcome::Cancelled));
    // The running body observed the token and returned early.
    assert_eq!(outcome_of("busy"), Some(TaskOutcome::Success));
}

#[test]
fn zero_sized_pools_are_rejected_at_launcher_build() {
    let mut cfg = small_config();
    cfg.pools.cpu.threads = Some(0);
    match Launcher::new(cfg) {
        Err(LaunchError::ConfigError(msg)) => assert!(msg.contains("[pools.cpu]"), "{msg}"),
        other => panic!("Expected ConfigError, got: {other:?}"),
    }

    let mut cfg = small_config();
    cfg.pools.io.max_threads = 0;
    match Launcher::builder(cfg).build() {
        Err(LaunchError::ConfigError(msg)) => assert!(msg.contains("[pools.io]"), "{msg}"),
        other => panic!("Expected ConfigError, got: {other:?}"),
    }
}
