//! Background maintenance of a storage node.
//!
//! The [`EngineSupervisor`] owns one thread per maintenance loop. Each loop
//! is a [`MaintenanceLoop`] driving a [`MaintenanceTask`]:
//!
//! - `trash` - trash sweep with a disk-usage driven interval
//! - `periodic` - disk stat monitor, unused index eviction, fd cache cleaning
//! - `compaction` - base and cumulative compaction pools
//!
//! Intervals are validated once at startup by [`MaintenanceSchedule`].

pub mod compaction;
pub mod interval;
pub mod launcher;
pub mod periodic;
pub mod shutdown;
pub mod stats;
pub mod supervisor;
pub mod task;
pub mod trash;

pub use compaction::{launch_compaction_pool, CompactionPass, CompactionPoolPlan};
pub use interval::{sweep_ratio, IntervalCorrection, MaintenanceSchedule, SweepBounds};
pub use launcher::{launch_loop, ThreadLauncher, WorkerBody, WorkerHandle, WorkerLauncher};
pub use periodic::{PeriodicJob, PeriodicTask};
pub use shutdown::{shutdown_channel, ShutdownSignal, ShutdownTrigger};
pub use stats::{LoopStats, LoopStatsSnapshot};
pub use supervisor::{EngineSupervisor, EngineSupervisorBuilder};
pub use task::{LoopKind, MaintenanceLoop, MaintenanceTask, PANIC_FAILURE_CODE};
pub use trash::TrashSweepTask;
