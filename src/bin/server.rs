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

//! tabletd server - runs the background maintenance loops of a storage node

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use tabletd::{
    Config, DiskUsageProbe, EngineState, EngineSupervisor, MaintenanceResult, StorageMaintenance,
};

#[derive(Parser)]
#[command(name = "tabletd-server")]
#[command(about = "Background maintenance scheduler for a columnar storage node")]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Overrides `[node].data_dirs`; may be given more than once
    #[arg(short, long)]
    data_dir: Vec<PathBuf>,

    /// Overrides `[logging].level`, e.g. `debug` or `tabletd=trace`
    #[arg(short, long)]
    log_level: Option<String>,

    #[arg(long)]
    node_id: Option<String>,
}

/// Storage collaborator backed by the local filesystem. Only disk usage is
/// real; passes with nothing to act on are logged.
struct LocalStorage {
    probe: DiskUsageProbe,
    state: Arc<EngineState>,
}

impl StorageMaintenance for LocalStorage {
    fn perform_base_compaction(&self) -> MaintenanceResult<()> {
        debug!("Base compaction pass: no tablets registered");
        Ok(())
    }

    fn perform_cumulative_compaction(&self) -> MaintenanceResult<()> {
        debug!("Cumulative compaction pass: no tablets registered");
        Ok(())
    }

    fn start_trash_sweep(&self) -> MaintenanceResult<f64> {
        let usage = self.probe.sample()?;
        info!(usage, "Trash sweep finished");
        Ok(usage)
    }

    fn start_disk_stat_monitor(&self) -> MaintenanceResult<()> {
        let usage = self.probe.sample()?;
        debug!(
            usage,
            schema_changes = self.state.schema_change().get(),
            "Disk stat refreshed"
        );
        Ok(())
    }

    fn start_delete_unused_index(&self) -> MaintenanceResult<()> {
        debug!("Unused index pass: index cache empty");
        Ok(())
    }

    fn start_clean_fd_cache(&self) -> MaintenanceResult<()> {
        debug!("File descriptor cache pass: cache empty");
        Ok(())
    }
}

fn init_tracing(config: &Config, override_level: Option<&str>) {
    let filter = match override_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.logging.with_target)
        .with_file(config.logging.with_file_line)
        .with_line_number(config.logging.with_file_line)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if !args.data_dir.is_empty() {
        config.node.data_dirs = args.data_dir;
    }
    if let Some(node_id) = args.node_id {
        config.node.node_id = node_id;
    }

    init_tracing(&config, args.log_level.as_deref());
    info!(
        node_id = %config.node.node_id,
        "Starting tabletd with config: {:?}",
        config.maintenance
    );

    let state = EngineState::new();
    let storage = Arc::new(LocalStorage {
        probe: DiskUsageProbe::new(config.node.data_dirs.clone()),
        state: Arc::clone(&state),
    });

    let supervisor = EngineSupervisor::builder(config.maintenance.clone())
        .with_state(state)
        .start(storage)
        .context("starting background maintenance")?;
    for correction in supervisor.corrections() {
        info!("Config corrected at startup: {:?}", correction);
    }
    info!(workers = supervisor.workers().len(), "tabletd ready");

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Received shutdown signal, stopping maintenance...");

    let stats = serde_json::to_string_pretty(&supervisor.stats())?;
    info!("Maintenance stats at shutdown:\n{}", stats);

    match tokio::task::spawn_blocking(move || supervisor.shutdown()).await? {
        Ok(()) => info!("tabletd stopped"),
        Err(e) => {
            error!("Error during shutdown: {}", e);
            return Err(e.into());
        }
    }
    Ok(())
}
