//! The generic maintenance loop: run a pass, wait, repeat.

use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::shutdown::ShutdownSignal;
use super::stats::LoopStats;
use crate::core::{MaintenanceError, MaintenanceResult};

/// Failure code reported when a pass panics.
pub const PANIC_FAILURE_CODE: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopKind {
    TrashSweep,
    DiskStatMonitor,
    UnusedIndex,
    BaseCompaction,
    CumulativeCompaction,
    FdCacheClean,
}

impl LoopKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TrashSweep => "trash-sweeper",
            Self::DiskStatMonitor => "disk-stat-monitor",
            Self::UnusedIndex => "unused-index",
            Self::BaseCompaction => "base-compaction",
            Self::CumulativeCompaction => "cumulative-compaction",
            Self::FdCacheClean => "fd-cache-clean",
        }
    }
}

impl fmt::Display for LoopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One kind of periodic maintenance work plus its timing.
pub trait MaintenanceTask: Send + 'static {
    fn kind(&self) -> LoopKind;

    /// Wait before the very first pass. Loops that sleep before working
    /// return `Some`.
    fn initial_wait(&mut self) -> Option<Duration> {
        None
    }

    /// Run one pass against the collaborator.
    fn run_pass(&mut self) -> MaintenanceResult<()>;

    /// Wait after a pass, whatever its outcome.
    fn next_wait(&mut self) -> Duration;
}

/// Drives a [`MaintenanceTask`] until shutdown is signalled.
///
/// A failed or panicking pass is logged and counted; the loop still waits the
/// full interval and then runs the next pass. There is at most one pass in
/// flight per loop.
pub struct MaintenanceLoop<T> {
    name: String,
    task: T,
    stats: Arc<LoopStats>,
    shutdown: ShutdownSignal,
}

impl<T: MaintenanceTask> MaintenanceLoop<T> {
    pub fn new(name: impl Into<String>, task: T, shutdown: ShutdownSignal) -> Self {
        let name = name.into();
        let stats = Arc::new(LoopStats::new(name.clone(), task.kind()));
        Self {
            name,
            task,
            stats,
            shutdown,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> LoopKind {
        self.task.kind()
    }

    pub fn stats(&self) -> Arc<LoopStats> {
        Arc::clone(&self.stats)
    }

    /// Run until shutdown. Only returns once the signal has been observed.
    pub fn run(mut self) {
        info!(worker = %self.name, "Maintenance loop started");

        let mut running = match self.task.initial_wait() {
            Some(wait) => self.pause(wait),
            None => true,
        };

        while running {
            let started = Instant::now();
            let result = self.run_pass_contained();
            self.stats.record_pass(started.elapsed(), result.as_ref().map(|_| ()));

            match result {
                Ok(()) => debug!(worker = %self.name, "Maintenance pass finished"),
                Err(err) => warn!(
                    worker = %self.name,
                    code = err.code(),
                    "Maintenance pass failed, continuing with next round: {}",
                    err
                ),
            }

            let wait = self.task.next_wait();
            running = self.pause(wait);
        }

        self.stats.mark_stopped();
        info!(worker = %self.name, "Maintenance loop stopped");
    }

    fn run_pass_contained(&mut self) -> MaintenanceResult<()> {
        let task = &mut self.task;
        match panic::catch_unwind(AssertUnwindSafe(|| task.run_pass())) {
            Ok(result) => result,
            Err(payload) => Err(MaintenanceError::failed(
                PANIC_FAILURE_CODE,
                format!("pass panicked: {}", panic_message(payload.as_ref())),
            )),
        }
    }

    /// Returns `false` once shutdown has been requested.
    fn pause(&self, wait: Duration) -> bool {
        self.stats.record_wait(wait);
        !self.shutdown.wait(wait)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maintenance::shutdown::shutdown_channel;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    /// Fails on every pass listed in `fail_on` (1-based) and panics on
    /// `panic_on`.
    struct ScriptedTask {
        calls: Arc<AtomicUsize>,
        fail_on: Vec<usize>,
        panic_on: Option<usize>,
        initial: Option<Duration>,
        wait: Duration,
    }

    impl ScriptedTask {
        fn new(calls: Arc<AtomicUsize>) -> Self {
            Self {
                calls,
                fail_on: Vec::new(),
                panic_on: None,
                initial: None,
                wait: Duration::from_millis(1),
            }
        }
    }

    impl MaintenanceTask for ScriptedTask {
        fn kind(&self) -> LoopKind {
            LoopKind::DiskStatMonitor
        }

        fn initial_wait(&mut self) -> Option<Duration> {
            self.initial
        }

        fn run_pass(&mut self) -> MaintenanceResult<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.panic_on == Some(call) {
                panic!("collaborator exploded");
            }
            if self.fail_on.contains(&call) {
                return Err(MaintenanceError::failed(-3, format!("pass {call}")));
            }
            Ok(())
        }

        fn next_wait(&mut self) -> Duration {
            self.wait
        }
    }

    fn wait_for(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_failed_pass_does_not_stop_loop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut task = ScriptedTask::new(Arc::clone(&calls));
        task.fail_on = vec![3];
        let (trigger, signal) = shutdown_channel();
        let maintenance_loop = MaintenanceLoop::new("disk-stat-monitor", task, signal);
        let stats = maintenance_loop.stats();

        let handle = thread::spawn(move || maintenance_loop.run());
        wait_for(|| stats.passes() >= 6);
        trigger.trigger();
        handle.join().unwrap();

        assert_eq!(stats.failures(), 1);
        assert!(stats.snapshot().last_error.unwrap().contains("pass 3"));
        assert!(stats.is_stopped());
        // every pass is followed by exactly one wait
        assert_eq!(stats.waits(), stats.passes());
    }

    #[test]
    fn test_panicking_pass_is_contained() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut task = ScriptedTask::new(Arc::clone(&calls));
        task.panic_on = Some(2);
        let (trigger, signal) = shutdown_channel();
        let maintenance_loop = MaintenanceLoop::new("disk-stat-monitor", task, signal);
        let stats = maintenance_loop.stats();

        let handle = thread::spawn(move || maintenance_loop.run());
        wait_for(|| stats.passes() >= 4);
        trigger.trigger();
        handle.join().unwrap();

        assert_eq!(stats.failures(), 1);
        assert!(stats
            .snapshot()
            .last_error
            .unwrap()
            .contains("collaborator exploded"));
    }

    #[test]
    fn test_initial_wait_precedes_first_pass() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut task = ScriptedTask::new(Arc::clone(&calls));
        task.initial = Some(Duration::from_secs(60));
        let (trigger, signal) = shutdown_channel();
        let maintenance_loop = MaintenanceLoop::new("fd-cache-clean", task, signal);
        let stats = maintenance_loop.stats();

        let handle = thread::spawn(move || maintenance_loop.run());
        wait_for(|| stats.waits() == 1);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        trigger.trigger();
        handle.join().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(stats.last_wait(), Duration::from_secs(60));
        assert!(stats.is_stopped());
    }

    #[test]
    fn test_shutdown_interrupts_long_wait() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut task = ScriptedTask::new(Arc::clone(&calls));
        task.wait = Duration::from_secs(3600);
        let (trigger, signal) = shutdown_channel();
        let maintenance_loop = MaintenanceLoop::new("unused-index", task, signal);
        let stats = maintenance_loop.stats();

        let handle = thread::spawn(move || maintenance_loop.run());
        wait_for(|| stats.waits() == 1);
        let started = Instant::now();
        trigger.trigger();
        handle.join().unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(stats.passes(), 1);
    }
}
