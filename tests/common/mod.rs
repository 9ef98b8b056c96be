#![allow(dead_code)]

use std::sync::Arc;

use launchdag::config::LaunchConfig;
use launchdag::engine::Launcher;
use launchdag::stats::{TaskListener, TaskStats};

pub use launchdag_test_utils::init_tracing;

/// Settings with small pools so tests don't spawn hundreds of threads.
pub fn small_config() -> LaunchConfig {
    let mut cfg = LaunchConfig::default();
    cfg.pools.io.max_threads = 8;
    cfg.pools.cpu.threads = Some(2);
    cfg.dispatch.wait_timeout_ms = 5_000;
    cfg
}

pub fn launcher(cfg: LaunchConfig) -> Launcher {
    init_tracing();
    Launcher::new(cfg).expect("launcher builds")
}

/// Launcher plus a stats listener receiving every completion.
pub fn launcher_with_stats(cfg: LaunchConfig) -> (Launcher, Arc<TaskStats>) {
    init_tracing();
    let stats = Arc::new(TaskStats::new(true));
    let launcher = Launcher::builder(cfg)
        .listener(Arc::clone(&stats) as Arc<dyn TaskListener>)
        .build()
        .expect("launcher builds");
    (launcher, stats)
}

pub fn names(keys: &[launchdag::task::TaskKey]) -> Vec<String> {
    keys.iter().map(ToString::to_string).collect()
}
