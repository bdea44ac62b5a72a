//! Common utilities for maintenance integration tests

#![allow(dead_code)]

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

use tabletd::{MaintenanceConfig, MaintenanceError, MaintenanceResult, StorageMaintenance};

/// Collaborator that counts calls per thread and can be scripted to fail,
/// panic or block.
pub struct MockEngine {
    calls: Mutex<HashMap<String, usize>>,
    sweeps: AtomicUsize,
    sweep_usage: f64,
    disk_stat_failures: Vec<usize>,
    panicking_thread: Option<String>,
    blocked: Option<(String, Receiver<()>)>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
            sweeps: AtomicUsize::new(0),
            sweep_usage: 0.5,
            disk_stat_failures: Vec::new(),
            panicking_thread: None,
            blocked: None,
        }
    }

    pub fn with_sweep_usage(mut self, usage: f64) -> Self {
        self.sweep_usage = usage;
        self
    }

    /// Fail the disk stat pass on the given (1-based) iterations.
    pub fn failing_disk_stat_on(mut self, iterations: Vec<usize>) -> Self {
        self.disk_stat_failures = iterations;
        self
    }

    pub fn panicking_on(mut self, thread_name: &str) -> Self {
        self.panicking_thread = Some(thread_name.to_string());
        self
    }

    /// Block the first pass of `thread_name` until the returned sender is
    /// used or dropped.
    pub fn blocking(mut self, thread_name: &str) -> (Self, Sender<()>) {
        let (tx, rx) = channel::bounded(1);
        self.blocked = Some((thread_name.to_string(), rx));
        (self, tx)
    }

    /// Calls made from the thread named `worker`.
    pub fn calls(&self, worker: &str) -> usize {
        self.calls.lock().get(worker).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    pub fn sweeps(&self) -> usize {
        self.sweeps.load(Ordering::SeqCst)
    }

    fn enter(&self) -> (String, usize) {
        let name = thread::current().name().unwrap_or("unnamed").to_string();
        let call = {
            let mut calls = self.calls.lock();
            let count = calls.entry(name.clone()).or_insert(0);
            *count += 1;
            *count
        };

        if self.panicking_thread.as_deref() == Some(name.as_str()) {
            panic!("{name} pass {call} exploded");
        }
        if let Some((blocked, rx)) = &self.blocked {
            if *blocked == name && call == 1 {
                let _ = rx.recv();
            }
        }
        (name, call)
    }
}

impl StorageMaintenance for MockEngine {
    fn perform_base_compaction(&self) -> MaintenanceResult<()> {
        self.enter();
        Err(MaintenanceError::NoCandidate)
    }

    fn perform_cumulative_compaction(&self) -> MaintenanceResult<()> {
        self.enter();
        Ok(())
    }

    fn start_trash_sweep(&self) -> MaintenanceResult<f64> {
        self.enter();
        self.sweeps.fetch_add(1, Ordering::SeqCst);
        Ok(self.sweep_usage)
    }

    fn start_disk_stat_monitor(&self) -> MaintenanceResult<()> {
        let (_, call) = self.enter();
        if self.disk_stat_failures.contains(&call) {
            return Err(MaintenanceError::failed(-7, format!("disk stat iteration {call}")));
        }
        Ok(())
    }

    fn start_delete_unused_index(&self) -> MaintenanceResult<()> {
        self.enter();
        Ok(())
    }

    fn start_clean_fd_cache(&self) -> MaintenanceResult<()> {
        self.enter();
        Ok(())
    }
}

/// Every fixed interval set to one scheduler second.
pub fn fast_config(base_threads: u32, cumulative_threads: u32) -> MaintenanceConfig {
    MaintenanceConfig {
        base_compaction_num_threads: base_threads,
        cumulative_compaction_num_threads: cumulative_threads,
        base_compaction_check_interval_seconds: 1,
        cumulative_compaction_check_interval_seconds: 1,
        max_garbage_sweep_interval: 600,
        min_garbage_sweep_interval: 5,
        disk_stat_monitor_interval: 1,
        unused_index_monitor_interval: 1,
        file_descriptor_cache_clean_interval: 1,
    }
}

/// Poll `cond` until it holds, failing the test after ten seconds.
pub fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(2));
    }
}

/// Counts WARN events.
#[derive(Clone, Default)]
pub struct WarnCounter(Arc<AtomicUsize>);

impl WarnCounter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Run `f` under a subscriber that counts warnings. Threads started inside
/// `f` keep reporting to the same counter.
pub fn with_warn_counter<R>(f: impl FnOnce() -> R) -> (R, WarnCounter) {
    let counter = WarnCounter::default();
    let subscriber = tracing_subscriber::registry().with(counter.clone());
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, counter)
}
