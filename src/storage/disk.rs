//! Disk usage sampling for the data directories of a node.

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use sysinfo::Disks;
use tracing::debug;

use crate::core::{MaintenanceError, MaintenanceResult};

/// Space figures of one mounted filesystem.
#[derive(Debug, Clone, PartialEq)]
pub struct MountUsage {
    pub mount_point: PathBuf,
    pub total_bytes: u64,
    pub available_bytes: u64,
}

impl MountUsage {
    pub fn usage_ratio(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        let used = self.total_bytes.saturating_sub(self.available_bytes);
        (used as f64 / self.total_bytes as f64).clamp(0.0, 1.0)
    }
}

/// Samples the usage ratio of the fullest filesystem that holds one of the
/// configured data directories.
pub struct DiskUsageProbe {
    data_dirs: Vec<PathBuf>,
    disks: Mutex<Disks>,
}

impl DiskUsageProbe {
    pub fn new(data_dirs: Vec<PathBuf>) -> Self {
        Self {
            data_dirs,
            disks: Mutex::new(Disks::new_with_refreshed_list()),
        }
    }

    pub fn data_dirs(&self) -> &[PathBuf] {
        &self.data_dirs
    }

    /// Current usage ratio in `[0, 1]`.
    pub fn sample(&self) -> MaintenanceResult<f64> {
        let mounts: Vec<MountUsage> = {
            let mut disks = self.disks.lock();
            disks.refresh_list();
            disks
                .list()
                .iter()
                .map(|disk| MountUsage {
                    mount_point: disk.mount_point().to_path_buf(),
                    total_bytes: disk.total_space(),
                    available_bytes: disk.available_space(),
                })
                .collect()
        };

        let usage = highest_usage(&self.data_dirs, &mounts)?;
        debug!("Sampled disk usage {:.3} over {} data dirs", usage, self.data_dirs.len());
        Ok(usage)
    }
}

/// Mount holding `path`: the one with the longest mount point prefix.
pub fn mount_for_path<'a>(path: &Path, mounts: &'a [MountUsage]) -> Option<&'a MountUsage> {
    mounts
        .iter()
        .filter(|m| path.starts_with(&m.mount_point))
        .max_by_key(|m| m.mount_point.components().count())
}

/// Highest usage ratio across the mounts that hold `data_dirs`.
pub fn highest_usage(data_dirs: &[PathBuf], mounts: &[MountUsage]) -> MaintenanceResult<f64> {
    let mut highest: Option<f64> = None;
    for dir in data_dirs {
        let path = dir.canonicalize().unwrap_or_else(|_| dir.clone());
        if let Some(mount) = mount_for_path(&path, mounts) {
            let ratio = mount.usage_ratio();
            highest = Some(highest.map_or(ratio, |h| h.max(ratio)));
        }
    }
    highest.ok_or_else(|| {
        MaintenanceError::Io(format!(
            "no mounted filesystem found for data dirs {:?}",
            data_dirs
        ))
    })
}
