use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use super::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub node: NodeConfig,
    pub maintenance: MaintenanceConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub node_id: String,
    pub data_dirs: Vec<PathBuf>,
}

/// Background maintenance settings.
///
/// Intervals are in seconds and deliberately signed: a zero or negative value
/// is not a parse error, it is corrected by the interval policy at loop start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub base_compaction_num_threads: u32,
    pub cumulative_compaction_num_threads: u32,
    pub base_compaction_check_interval_seconds: i64,
    pub cumulative_compaction_check_interval_seconds: i64,
    pub max_garbage_sweep_interval: i64,
    pub min_garbage_sweep_interval: i64,
    pub disk_stat_monitor_interval: i64,
    pub unused_index_monitor_interval: i64,
    pub file_descriptor_cache_clean_interval: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub with_target: bool,
    pub with_file_line: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: "node-1".to_string(),
            data_dirs: vec![PathBuf::from("./data/storage")],
        }
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            base_compaction_num_threads: 1,
            cumulative_compaction_num_threads: 1,
            base_compaction_check_interval_seconds: 60,
            cumulative_compaction_check_interval_seconds: 10,
            max_garbage_sweep_interval: 86400,
            min_garbage_sweep_interval: 180,
            disk_stat_monitor_interval: 5,
            unused_index_monitor_interval: 30,
            file_descriptor_cache_clean_interval: 3600,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_target: true,
            with_file_line: false,
        }
    }
}

impl MaintenanceConfig {
    /// Total number of maintenance threads this configuration starts.
    pub fn worker_count(&self) -> usize {
        // trash sweeper, disk stat monitor, unused index, fd cache
        4 + self.base_compaction_num_threads as usize
            + self.cumulative_compaction_num_threads as usize
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> EngineResult<Self> {
        Ok(toml::from_str::<Config>(content)?)
    }

    pub fn from_file(path: &Path) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load `path` when it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> EngineResult<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            info!(
                "Configuration file {} not found, using defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }
}
