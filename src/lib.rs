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

//! # tabletd - background maintenance for a columnar storage node
//!
//! A storage node keeps its tablets healthy with a handful of long-running
//! loops: compaction of rowset versions, trash sweeping, disk statistics,
//! eviction of unused index caches and file descriptor cache cleaning.
//!
//! ## Layout
//!
//! - [`core`]: configuration, errors, shared engine state, storage vocabulary
//! - [`storage`]: the collaborator interface the loops call into
//! - [`maintenance`]: loops, interval policy, worker pools and the supervisor
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use tabletd::{Config, EngineSupervisor, StorageMaintenance};
//!
//! fn run(engine: Arc<dyn StorageMaintenance>) -> tabletd::EngineResult<()> {
//!     let config = Config::load_or_default(Path::new("config.toml"))?;
//!     let supervisor = EngineSupervisor::start(config.maintenance, engine)?;
//!     // ... serve requests ...
//!     supervisor.shutdown()
//! }
//! ```

pub mod core;
pub mod maintenance;
pub mod storage;

#[cfg(test)]
mod test_util;

pub use core::*;
pub use maintenance::{EngineSupervisor, EngineSupervisorBuilder, LoopKind, LoopStatsSnapshot};
pub use storage::{DiskUsageProbe, NoResourceGroup, ResourceGroup, StorageMaintenance};
