//! Per-loop counters.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use super::task::LoopKind;
use crate::core::MaintenanceError;

/// Live statistics of one maintenance loop, updated by the loop thread only.
#[derive(Debug)]
pub struct LoopStats {
    worker: String,
    kind: LoopKind,
    passes: AtomicU64,
    failures: AtomicU64,
    last_pass_duration_ms: AtomicU64,
    last_wait_ms: AtomicU64,
    waits: AtomicU64,
    stopped: AtomicBool,
    last_error: Mutex<Option<String>>,
    last_pass_at: Mutex<Option<DateTime<Utc>>>,
}

/// Point-in-time copy of [`LoopStats`].
#[derive(Debug, Clone, Serialize)]
pub struct LoopStatsSnapshot {
    pub worker: String,
    pub kind: LoopKind,
    pub passes: u64,
    pub failures: u64,
    pub waits: u64,
    pub last_pass_duration_ms: u64,
    pub last_wait_ms: u64,
    pub last_error: Option<String>,
    pub last_pass_at: Option<DateTime<Utc>>,
    pub stopped: bool,
}

impl LoopStats {
    pub fn new(worker: impl Into<String>, kind: LoopKind) -> Self {
        Self {
            worker: worker.into(),
            kind,
            passes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            last_pass_duration_ms: AtomicU64::new(0),
            last_wait_ms: AtomicU64::new(0),
            waits: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
            last_error: Mutex::new(None),
            last_pass_at: Mutex::new(None),
        }
    }

    pub fn worker(&self) -> &str {
        &self.worker
    }

    pub fn kind(&self) -> LoopKind {
        self.kind
    }

    /// Passes run so far, failed ones included.
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Acquire)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Acquire)
    }

    pub fn waits(&self) -> u64 {
        self.waits.load(Ordering::Acquire)
    }

    pub fn last_wait(&self) -> Duration {
        Duration::from_millis(self.last_wait_ms.load(Ordering::Acquire))
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub(crate) fn record_pass(&self, elapsed: Duration, outcome: Result<(), &MaintenanceError>) {
        *self.last_pass_at.lock() = Some(Utc::now());
        self.last_pass_duration_ms
            .store(elapsed.as_millis() as u64, Ordering::Release);
        if let Err(err) = outcome {
            *self.last_error.lock() = Some(err.to_string());
            self.failures.fetch_add(1, Ordering::AcqRel);
        }
        self.passes.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_wait(&self, wait: Duration) {
        self.last_wait_ms
            .store(wait.as_millis() as u64, Ordering::Release);
        self.waits.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn mark_stopped(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn snapshot(&self) -> LoopStatsSnapshot {
        LoopStatsSnapshot {
            worker: self.worker.clone(),
            kind: self.kind,
            passes: self.passes(),
            failures: self.failures(),
            waits: self.waits(),
            last_pass_duration_ms: self.last_pass_duration_ms.load(Ordering::Acquire),
            last_wait_ms: self.last_wait_ms.load(Ordering::Acquire),
            last_error: self.last_error.lock().clone(),
            last_pass_at: *self.last_pass_at.lock(),
            stopped: self.is_stopped(),
        }
    }
}
