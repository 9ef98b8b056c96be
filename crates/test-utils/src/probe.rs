#![allow(dead_code)]

//! A configurable task that records when and where it ran.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use launchdag::task::{Task, TaskContext, TaskKey};
use launchdag::types::Affinity;

/// One recorded execution.
#[derive(Debug, Clone)]
pub struct Entry {
    pub name: String,
    pub thread: Option<String>,
    pub started: Instant,
    pub ended: Instant,
}

/// Shared recorder for probe executions.
#[derive(Debug, Default)]
pub struct Timeline {
    entries: Mutex<Vec<Entry>>,
    started: Mutex<Vec<String>>,
}

impl Timeline {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn begin(&self, name: &str) {
        self.started.lock().push(name.to_string());
    }

    fn record(&self, entry: Entry) {
        self.entries.lock().push(entry);
    }

    /// Completed executions in completion order.
    pub fn entries(&self) -> Vec<Entry> {
        self.entries.lock().clone()
    }

    pub fn entry(&self, name: &str) -> Option<Entry> {
        self.entries.lock().iter().find(|e| e.name == name).cloned()
    }

    /// Names of bodies that began, in start order.
    pub fn started(&self) -> Vec<String> {
        self.started.lock().clone()
    }

    pub fn has_started(&self, name: &str) -> bool {
        self.started.lock().iter().any(|n| n == name)
    }

    pub fn completed(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether `first` ended no later than `second` started.
    pub fn ended_before_start(&self, first: &str, second: &str) -> bool {
        match (self.entry(first), self.entry(second)) {
            (Some(a), Some(b)) => a.ended <= b.started,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behaviour {
    Succeed,
    Fail,
    Panic,
}

/// Task with a name-based key whose hooks are set by builder methods.
#[derive(Debug, Clone)]
pub struct ProbeTask {
    name: String,
    deps: Vec<TaskKey>,
    affinity: Affinity,
    needs_wait: bool,
    callback: bool,
    run_as_soon: bool,
    primary_only: bool,
    work: Duration,
    behaviour: Behaviour,
    timeline: Arc<Timeline>,
}

impl ProbeTask {
    pub fn new(name: &str, timeline: &Arc<Timeline>) -> Self {
        Self {
            name: name.to_string(),
            deps: Vec::new(),
            affinity: Affinity::Io,
            needs_wait: false,
            callback: false,
            run_as_soon: false,
            primary_only: true,
            work: Duration::ZERO,
            behaviour: Behaviour::Succeed,
            timeline: Arc::clone(timeline),
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.deps.push(TaskKey::named(dep));
        self
    }

    pub fn after_key(mut self, dep: TaskKey) -> Self {
        self.deps.push(dep);
        self
    }

    pub fn affinity(mut self, affinity: Affinity) -> Self {
        self.affinity = affinity;
        self
    }

    pub fn wait(mut self) -> Self {
        self.needs_wait = true;
        self
    }

    pub fn callback(mut self) -> Self {
        self.callback = true;
        self
    }

    pub fn soon(mut self) -> Self {
        self.run_as_soon = true;
        self
    }

    pub fn any_process(mut self) -> Self {
        self.primary_only = false;
        self
    }

    pub fn work_ms(mut self, ms: u64) -> Self {
        self.work = Duration::from_millis(ms);
        self
    }

    pub fn failing(mut self) -> Self {
        self.behaviour = Behaviour::Fail;
        self
    }

    pub fn panicking(mut self) -> Self {
        self.behaviour = Behaviour::Panic;
        self
    }
}

fn sleep_unless_cancelled(work: Duration, ctx_cancelled: impl Fn() -> bool) {
    let deadline = Instant::now() + work;
    while Instant::now() < deadline && !ctx_cancelled() {
        thread::sleep(Duration::from_millis(1));
    }
}

impl Task for ProbeTask {
    fn key(&self) -> TaskKey {
        TaskKey::named(self.name.as_str())
    }

    fn dependencies(&self) -> Vec<TaskKey> {
        self.deps.clone()
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
        let started = Instant::now();
        self.timeline.begin(&self.name);

        if let Some(handle) = ctx.completion() {
            let name = self.name.clone();
            let work = self.work;
            let timeline = Arc::clone(&self.timeline);
            let cancel = ctx.cancel_token().clone();
            thread::spawn(move || {
                sleep_unless_cancelled(work, || cancel.is_cancelled());
                timeline.record(Entry {
                    name,
                    thread: thread::current().name().map(str::to_string),
                    started,
                    ended: Instant::now(),
                });
                handle.complete();
            });
            return Ok(());
        }

        sleep_unless_cancelled(self.work, || ctx.is_cancelled());
        let thread_name = thread::current().name().map(str::to_string);
        self.timeline.record(Entry {
            name: self.name.clone(),
            thread: thread_name,
            started,
            ended: Instant::now(),
        });

        match self.behaviour {
            Behaviour::Succeed => Ok(()),
            Behaviour::Fail => anyhow::bail!("probe '{}' failed on purpose", self.name),
            Behaviour::Panic => panic!("probe '{}' panicked on purpose", self.name),
        }
    }
}
