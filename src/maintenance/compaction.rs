//! Compaction worker pools.
//!
//! Each tier gets its own set of independent loops. Workers of a tier share
//! nothing at this layer; keeping two workers off the same tablet is the
//! compaction collaborator's job (see `TabletClaims`).

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::launcher::{launch_loop, WorkerHandle, WorkerLauncher};
use super::shutdown::ShutdownSignal;
use super::task::{LoopKind, MaintenanceLoop, MaintenanceTask};
use crate::core::{CompactionTier, EngineResult, MaintenanceError, MaintenanceResult};
use crate::storage::{ResourceGroup, StorageMaintenance};

/// One compaction worker: bind to the resource group, compact, sleep.
pub struct CompactionPass {
    tier: CompactionTier,
    worker: usize,
    engine: Arc<dyn StorageMaintenance>,
    resource_group: Arc<dyn ResourceGroup>,
    interval: Duration,
}

impl CompactionPass {
    pub fn new(
        tier: CompactionTier,
        worker: usize,
        engine: Arc<dyn StorageMaintenance>,
        resource_group: Arc<dyn ResourceGroup>,
        interval: Duration,
    ) -> Self {
        Self {
            tier,
            worker,
            engine,
            resource_group,
            interval,
        }
    }
}

impl MaintenanceTask for CompactionPass {
    fn kind(&self) -> LoopKind {
        match self.tier {
            CompactionTier::Base => LoopKind::BaseCompaction,
            CompactionTier::Cumulative => LoopKind::CumulativeCompaction,
        }
    }

    fn run_pass(&mut self) -> MaintenanceResult<()> {
        // The resource group may not exist when the thread starts, so bind
        // on every pass.
        if let Err(err) = self.resource_group.apply_system_cgroup() {
            warn!(
                tier = %self.tier,
                worker = self.worker,
                code = err.code(),
                "Failed to bind compaction thread to system resource group: {}",
                err
            );
        }

        match self.engine.perform_compaction(self.tier) {
            Err(MaintenanceError::NoCandidate) => {
                debug!(tier = %self.tier, worker = self.worker, "No tablet to compact");
                Ok(())
            }
            other => other,
        }
    }

    fn next_wait(&mut self) -> Duration {
        self.interval
    }
}

/// Size and cadence of one tier's pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionPoolPlan {
    pub tier: CompactionTier,
    pub threads: usize,
    pub interval: Duration,
}

/// Start every worker of a pool. Zero threads starts nothing.
///
/// On a launch failure the workers already started stay in `workers` so the
/// caller can stop them.
pub fn launch_compaction_pool(
    plan: CompactionPoolPlan,
    engine: &Arc<dyn StorageMaintenance>,
    resource_group: &Arc<dyn ResourceGroup>,
    launcher: &dyn WorkerLauncher,
    shutdown: &ShutdownSignal,
    workers: &mut Vec<WorkerHandle>,
) -> EngineResult<()> {
    if plan.threads == 0 {
        info!(tier = %plan.tier, "Compaction pool disabled, no workers configured");
        return Ok(());
    }

    info!(
        tier = %plan.tier,
        threads = plan.threads,
        interval_ms = plan.interval.as_millis() as u64,
        "Starting compaction pool"
    );
    for worker in 0..plan.threads {
        let task = CompactionPass::new(
            plan.tier,
            worker,
            Arc::clone(engine),
            Arc::clone(resource_group),
            plan.interval,
        );
        let name = format!("{}-compaction-{}", plan.tier, worker);
        let maintenance_loop = MaintenanceLoop::new(name, task, shutdown.clone());
        workers.push(launch_loop(launcher, maintenance_loop)?);
    }
    Ok(())
}
