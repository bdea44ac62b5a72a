//! Fixed-interval loops: disk stat monitor, unused index eviction and file
//! descriptor cache cleaning.

use std::sync::Arc;
use std::time::Duration;

use super::task::{LoopKind, MaintenanceTask};
use crate::core::MaintenanceResult;
use crate::storage::StorageMaintenance;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodicJob {
    DiskStatMonitor,
    UnusedIndex,
    FdCacheClean,
}

impl PeriodicJob {
    pub fn kind(&self) -> LoopKind {
        match self {
            Self::DiskStatMonitor => LoopKind::DiskStatMonitor,
            Self::UnusedIndex => LoopKind::UnusedIndex,
            Self::FdCacheClean => LoopKind::FdCacheClean,
        }
    }

    /// The fd cache is cleaned one interval after start; the monitors run
    /// right away.
    fn waits_first(&self) -> bool {
        matches!(self, Self::FdCacheClean)
    }
}

pub struct PeriodicTask {
    job: PeriodicJob,
    engine: Arc<dyn StorageMaintenance>,
    interval: Duration,
}

impl PeriodicTask {
    pub fn new(job: PeriodicJob, engine: Arc<dyn StorageMaintenance>, interval: Duration) -> Self {
        Self {
            job,
            engine,
            interval,
        }
    }
}

impl MaintenanceTask for PeriodicTask {
    fn kind(&self) -> LoopKind {
        self.job.kind()
    }

    fn initial_wait(&mut self) -> Option<Duration> {
        self.job.waits_first().then_some(self.interval)
    }

    fn run_pass(&mut self) -> MaintenanceResult<()> {
        match self.job {
            PeriodicJob::DiskStatMonitor => self.engine.start_disk_stat_monitor(),
            PeriodicJob::UnusedIndex => self.engine.start_delete_unused_index(),
            PeriodicJob::FdCacheClean => self.engine.start_clean_fd_cache(),
        }
    }

    fn next_wait(&mut self) -> Duration {
        self.interval
    }
}
