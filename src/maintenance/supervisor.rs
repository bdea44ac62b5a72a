/*
 * Copyright 2025 Vijaykumar Singh
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Engine supervisor: starts every background maintenance loop of a node.
//!
//! Six categories of workers are started, in this order:
//! - trash sweeper (1)
//! - disk stat monitor (1)
//! - unused index evictor (1)
//! - base compaction pool (`base_compaction_num_threads`)
//! - cumulative compaction pool (`cumulative_compaction_num_threads`)
//! - file descriptor cache cleaner (1)
//!
//! Startup either launches all of them or none: if a thread cannot be
//! created, the workers already running are stopped and joined, and the
//! error is returned so the engine does not report ready.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::compaction::{launch_compaction_pool, CompactionPoolPlan};
use super::interval::{scaled, IntervalCorrection, MaintenanceSchedule};
use super::launcher::{launch_loop, ThreadLauncher, WorkerHandle, WorkerLauncher};
use super::periodic::{PeriodicJob, PeriodicTask};
use super::shutdown::{shutdown_channel, ShutdownSignal, ShutdownTrigger};
use super::stats::LoopStatsSnapshot;
use super::task::{LoopKind, MaintenanceLoop};
use super::trash::TrashSweepTask;
use crate::core::{CompactionTier, EngineError, EngineResult, EngineState, MaintenanceConfig};
use crate::storage::{NoResourceGroup, ResourceGroup, StorageMaintenance};

/// Builder for [`EngineSupervisor`].
pub struct EngineSupervisorBuilder {
    config: MaintenanceConfig,
    state: Option<Arc<EngineState>>,
    resource_group: Arc<dyn ResourceGroup>,
    launcher: Arc<dyn WorkerLauncher>,
    time_unit: Duration,
}

impl EngineSupervisorBuilder {
    pub fn new(config: MaintenanceConfig) -> Self {
        Self {
            config,
            state: None,
            resource_group: Arc::new(NoResourceGroup),
            launcher: Arc::new(ThreadLauncher::default()),
            time_unit: Duration::from_secs(1),
        }
    }

    /// Share an existing engine state instead of creating a fresh one.
    pub fn with_state(mut self, state: Arc<EngineState>) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_resource_group(mut self, resource_group: Arc<dyn ResourceGroup>) -> Self {
        self.resource_group = resource_group;
        self
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn WorkerLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Real duration of one configured second. Defaults to one second.
    pub fn with_time_unit(mut self, time_unit: Duration) -> Self {
        self.time_unit = time_unit;
        self
    }

    /// Validate the configuration and start every maintenance loop.
    pub fn start(self, engine: Arc<dyn StorageMaintenance>) -> EngineResult<EngineSupervisor> {
        if self.time_unit.is_zero() {
            return Err(EngineError::Config(
                "maintenance time unit must be positive".to_string(),
            ));
        }

        let schedule = MaintenanceSchedule::resolve(&self.config);
        let state = self.state.clone().unwrap_or_else(EngineState::new);
        let (trigger, signal) = shutdown_channel();
        let mut workers = Vec::with_capacity(self.config.worker_count());

        info!(
            workers = self.config.worker_count(),
            base_threads = schedule.base_compaction_threads,
            cumulative_threads = schedule.cumulative_compaction_threads,
            "Starting background maintenance workers"
        );

        if let Err(err) = self.launch_all(&schedule, &engine, &state, &signal, &mut workers) {
            error!(
                started = workers.len(),
                "Failed to start background maintenance, stopping started workers: {}", err
            );
            trigger.trigger();
            for worker in workers {
                if let Err(join_err) = worker.join() {
                    error!("{}", join_err);
                }
            }
            return Err(err);
        }

        info!(workers = workers.len(), "Background maintenance workers started");
        Ok(EngineSupervisor {
            workers,
            trigger,
            state,
            schedule,
        })
    }

    fn launch_all(
        &self,
        schedule: &MaintenanceSchedule,
        engine: &Arc<dyn StorageMaintenance>,
        state: &Arc<EngineState>,
        signal: &ShutdownSignal,
        workers: &mut Vec<WorkerHandle>,
    ) -> EngineResult<()> {
        let launcher = self.launcher.as_ref();
        let unit = self.time_unit;

        let sweeper = TrashSweepTask::new(
            Arc::clone(engine),
            Arc::clone(state),
            schedule.sweep,
            unit,
        );
        workers.push(launch_loop(
            launcher,
            MaintenanceLoop::new(LoopKind::TrashSweep.as_str(), sweeper, signal.clone()),
        )?);

        for (job, secs) in [
            (PeriodicJob::DiskStatMonitor, schedule.disk_stat_interval),
            (PeriodicJob::UnusedIndex, schedule.unused_index_interval),
        ] {
            workers.push(self.launch_periodic(job, secs, engine, signal)?);
        }

        for (tier, threads, secs) in [
            (
                CompactionTier::Base,
                schedule.base_compaction_threads,
                schedule.base_compaction_interval,
            ),
            (
                CompactionTier::Cumulative,
                schedule.cumulative_compaction_threads,
                schedule.cumulative_compaction_interval,
            ),
        ] {
            let plan = CompactionPoolPlan {
                tier,
                threads,
                interval: scaled(secs, unit),
            };
            launch_compaction_pool(
                plan,
                engine,
                &self.resource_group,
                launcher,
                signal,
                workers,
            )?;
        }

        workers.push(self.launch_periodic(
            PeriodicJob::FdCacheClean,
            schedule.fd_cache_interval,
            engine,
            signal,
        )?);
        Ok(())
    }

    fn launch_periodic(
        &self,
        job: PeriodicJob,
        secs: u64,
        engine: &Arc<dyn StorageMaintenance>,
        signal: &ShutdownSignal,
    ) -> EngineResult<WorkerHandle> {
        let task = PeriodicTask::new(job, Arc::clone(engine), scaled(secs, self.time_unit));
        launch_loop(
            self.launcher.as_ref(),
            MaintenanceLoop::new(job.kind().as_str(), task, signal.clone()),
        )
    }
}

/// Owner of all running maintenance loops.
///
/// Loops run until [`EngineSupervisor::shutdown`] is called, then stop at
/// their next wait. Dropping the supervisor without a shutdown detaches the
/// loops: they keep running for the rest of the process.
#[must_use = "dropping the supervisor detaches its loops; call `shutdown` to stop them"]
pub struct EngineSupervisor {
    workers: Vec<WorkerHandle>,
    trigger: ShutdownTrigger,
    state: Arc<EngineState>,
    schedule: MaintenanceSchedule,
}

impl EngineSupervisor {
    pub fn builder(config: MaintenanceConfig) -> EngineSupervisorBuilder {
        EngineSupervisorBuilder::new(config)
    }

    /// Start with default launcher, no resource group and real seconds.
    pub fn start(
        config: MaintenanceConfig,
        engine: Arc<dyn StorageMaintenance>,
    ) -> EngineResult<Self> {
        Self::builder(config).start(engine)
    }

    pub fn workers(&self) -> &[WorkerHandle] {
        &self.workers
    }

    pub fn workers_of(&self, kind: LoopKind) -> impl Iterator<Item = &WorkerHandle> {
        self.workers.iter().filter(move |w| w.kind() == kind)
    }

    pub fn state(&self) -> &Arc<EngineState> {
        &self.state
    }

    pub fn schedule(&self) -> &MaintenanceSchedule {
        &self.schedule
    }

    /// Configuration values that were replaced at startup.
    pub fn corrections(&self) -> &[IntervalCorrection] {
        &self.schedule.corrections
    }

    pub fn stats(&self) -> Vec<LoopStatsSnapshot> {
        self.workers.iter().map(|w| w.stats().snapshot()).collect()
    }

    /// Signal every loop to stop and wait for all of them.
    ///
    /// A loop blocked inside a collaborator call is only joined once that
    /// call returns.
    pub fn shutdown(mut self) -> EngineResult<()> {
        let workers = std::mem::take(&mut self.workers);
        info!(workers = workers.len(), "Stopping background maintenance workers");
        self.trigger.trigger();

        let mut first_error = None;
        for worker in workers {
            if let Err(err) = worker.join() {
                error!("{}", err);
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => {
                info!("Background maintenance workers stopped");
                Ok(())
            }
        }
    }
}

impl Drop for EngineSupervisor {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            warn!(
                workers = self.workers.len(),
                "Supervisor dropped without shutdown, maintenance workers keep running detached"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MaintenanceError, MaintenanceResult};
    use crate::maintenance::launcher::WorkerBody;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread::JoinHandle;

    struct IdleEngine;

    impl StorageMaintenance for IdleEngine {
        fn perform_base_compaction(&self) -> MaintenanceResult<()> {
            Err(MaintenanceError::NoCandidate)
        }
        fn perform_cumulative_compaction(&self) -> MaintenanceResult<()> {
            Err(MaintenanceError::NoCandidate)
        }
        fn start_trash_sweep(&self) -> MaintenanceResult<f64> {
            Ok(0.5)
        }
        fn start_disk_stat_monitor(&self) -> MaintenanceResult<()> {
            Ok(())
        }
        fn start_delete_unused_index(&self) -> MaintenanceResult<()> {
            Ok(())
        }
        fn start_clean_fd_cache(&self) -> MaintenanceResult<()> {
            Ok(())
        }
    }

    /// Launches threads normally until `fail_at` launches have happened.
    struct FlakyLauncher {
        inner: ThreadLauncher,
        launched: AtomicUsize,
        fail_at: usize,
    }

    impl WorkerLauncher for FlakyLauncher {
        fn launch(&self, name: &str, body: WorkerBody) -> io::Result<JoinHandle<()>> {
            if self.launched.fetch_add(1, Ordering::SeqCst) == self.fail_at {
                return Err(io::Error::new(
                    io::ErrorKind::WouldBlock,
                    "Resource temporarily unavailable",
                ));
            }
            self.inner.launch(name, body)
        }
    }

    fn config(base: u32, cumulative: u32) -> MaintenanceConfig {
        MaintenanceConfig {
            base_compaction_num_threads: base,
            cumulative_compaction_num_threads: cumulative,
            ..MaintenanceConfig::default()
        }
    }

    #[test]
    fn test_starts_every_category_in_order() {
        let supervisor = EngineSupervisor::builder(config(2, 1))
            .with_time_unit(Duration::from_millis(1))
            .start(Arc::new(IdleEngine))
            .unwrap();

        let names: Vec<_> = supervisor.workers().iter().map(|w| w.name().to_string()).collect();
        assert_eq!(
            names,
            vec![
                "trash-sweeper",
                "disk-stat-monitor",
                "unused-index",
                "base-compaction-0",
                "base-compaction-1",
                "cumulative-compaction-0",
                "fd-cache-clean",
            ]
        );
        assert!(supervisor.corrections().is_empty());
        supervisor.shutdown().unwrap();
    }

    #[test]
    fn test_zero_sized_pools_start_no_compaction_workers() {
        let supervisor = EngineSupervisor::builder(config(0, 0))
            .with_time_unit(Duration::from_millis(1))
            .start(Arc::new(IdleEngine))
            .unwrap();

        assert_eq!(supervisor.workers().len(), 4);
        assert_eq!(supervisor.workers_of(LoopKind::BaseCompaction).count(), 0);
        assert_eq!(supervisor.workers_of(LoopKind::CumulativeCompaction).count(), 0);
        supervisor.shutdown().unwrap();
    }

    #[test]
    fn test_spawn_failure_aborts_startup_and_stops_started_workers() {
        let launcher = Arc::new(FlakyLauncher {
            inner: ThreadLauncher::default(),
            launched: AtomicUsize::new(0),
            // trash, disk stat, unused index, base-0 start; base-1 fails
            fail_at: 4,
        });
        let result = EngineSupervisor::builder(config(3, 2))
            .with_launcher(launcher.clone())
            .with_time_unit(Duration::from_millis(1))
            .start(Arc::new(IdleEngine));

        match result {
            Err(EngineError::WorkerSpawn { worker, .. }) => {
                assert_eq!(worker, "base-compaction-1")
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("startup should fail"),
        }
        // nothing after the failing worker was attempted
        assert_eq!(launcher.launched.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_zero_time_unit_is_rejected() {
        let result = EngineSupervisor::builder(config(1, 1))
            .with_time_unit(Duration::ZERO)
            .start(Arc::new(IdleEngine));
        assert!(matches!(result, Err(EngineError::Config(_))));
    }
}
