//! Trash sweep loop with a disk-usage driven interval.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::interval::{scaled, SweepBounds, INITIAL_SWEEP_USAGE};
use super::task::{LoopKind, MaintenanceTask};
use crate::core::{EngineState, MaintenanceError, MaintenanceResult};
use crate::storage::StorageMaintenance;

/// Sleeps, sweeps, and feeds the usage ratio the sweep reports into the next
/// wait. Until a sweep succeeds the disk is assumed full.
pub struct TrashSweepTask {
    engine: Arc<dyn StorageMaintenance>,
    state: Arc<EngineState>,
    bounds: SweepBounds,
    unit: Duration,
    usage: f64,
}

impl TrashSweepTask {
    pub fn new(
        engine: Arc<dyn StorageMaintenance>,
        state: Arc<EngineState>,
        bounds: SweepBounds,
        unit: Duration,
    ) -> Self {
        Self {
            engine,
            state,
            bounds,
            unit,
            usage: INITIAL_SWEEP_USAGE,
        }
    }

    /// Usage ratio the next wait is computed from.
    pub fn usage(&self) -> f64 {
        self.usage
    }

    /// Seconds until the next sweep.
    pub fn current_wait_secs(&self) -> u64 {
        self.bounds.interval_secs(self.usage)
    }

    fn current_wait(&self) -> Duration {
        let secs = self.current_wait_secs();
        debug!(usage = self.usage, secs, "Next trash sweep scheduled");
        scaled(secs, self.unit)
    }
}

impl MaintenanceTask for TrashSweepTask {
    fn kind(&self) -> LoopKind {
        LoopKind::TrashSweep
    }

    fn initial_wait(&mut self) -> Option<Duration> {
        Some(self.current_wait())
    }

    fn run_pass(&mut self) -> MaintenanceResult<()> {
        let reported = self.engine.start_trash_sweep()?;
        if reported.is_nan() {
            // keep the previous usage, like a failed sweep
            return Err(MaintenanceError::InvalidUsage(reported));
        }

        let usage = reported.clamp(0.0, 1.0);
        if usage != reported {
            warn!(reported, clamped = usage, "Trash sweep reported usage outside [0, 1]");
        }
        self.usage = usage;
        self.state.disk_usage().set(usage);
        Ok(())
    }

    fn next_wait(&mut self) -> Duration {
        self.current_wait()
    }
}
