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

//! Storage-side collaborators driven by the maintenance scheduler.
//!
//! The scheduler only decides *when* these run. What a compaction pass picks,
//! how the trash directory is walked or how the fd cache is evicted lives
//! behind these traits.

pub mod disk;

pub use disk::DiskUsageProbe;

use crate::core::{CompactionTier, MaintenanceResult};

/// Maintenance entry points of a storage engine.
///
/// Every method is called from a dedicated maintenance thread, one call in
/// flight per loop. Compaction methods are called concurrently by all workers
/// of a tier: an implementation must make sure two workers never compact the
/// same tablet at once, e.g. by holding a claim from
/// [`EngineState::compaction_claims`](crate::core::EngineState::compaction_claims)
/// for the duration of the pass.
pub trait StorageMaintenance: Send + Sync + 'static {
    /// One base compaction pass. Tablet selection is up to the engine.
    fn perform_base_compaction(&self) -> MaintenanceResult<()>;

    /// One cumulative compaction pass.
    fn perform_cumulative_compaction(&self) -> MaintenanceResult<()>;

    /// Sweep expired snapshot and trash data. Returns the disk usage ratio
    /// in `[0, 1]` observed after the sweep.
    fn start_trash_sweep(&self) -> MaintenanceResult<f64>;

    /// Refresh disk health statistics.
    fn start_disk_stat_monitor(&self) -> MaintenanceResult<()>;

    /// Evict indexes no live version references any more.
    fn start_delete_unused_index(&self) -> MaintenanceResult<()>;

    /// Evict stale entries from the file descriptor cache.
    fn start_clean_fd_cache(&self) -> MaintenanceResult<()>;

    fn perform_compaction(&self, tier: CompactionTier) -> MaintenanceResult<()> {
        match tier {
            CompactionTier::Base => self.perform_base_compaction(),
            CompactionTier::Cumulative => self.perform_cumulative_compaction(),
        }
    }
}

/// Binds the calling thread to the process's system resource group.
///
/// Called at the start of every compaction pass, because the group may not
/// exist yet when the compaction threads are started. Must be idempotent.
pub trait ResourceGroup: Send + Sync + 'static {
    fn apply_system_cgroup(&self) -> MaintenanceResult<()>;
}

/// Resource group binding for nodes that run without cgroups.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoResourceGroup;

impl ResourceGroup for NoResourceGroup {
    fn apply_system_cgroup(&self) -> MaintenanceResult<()> {
        Ok(())
    }
}
