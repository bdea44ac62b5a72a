//! Interval policy for the maintenance loops.
//!
//! Every configured interval goes through this module exactly once, when the
//! supervisor starts. Invalid settings are replaced by their documented
//! fallback and reported with a single warning; loops never see an invalid
//! value and never re-validate per iteration.

use serde::Serialize;
use std::f64::consts::{FRAC_PI_2, PI};
use std::time::Duration;
use tracing::warn;

use crate::core::MaintenanceConfig;

pub const FALLBACK_COMPACTION_INTERVAL_SECS: u64 = 1;
pub const FALLBACK_DISK_STAT_INTERVAL_SECS: u64 = 1;
pub const FALLBACK_UNUSED_INDEX_INTERVAL_SECS: u64 = 1;
pub const FALLBACK_FD_CACHE_INTERVAL_SECS: u64 = 3600;
pub const FALLBACK_MIN_SWEEP_INTERVAL_SECS: u64 = 1;

/// Usage assumed before the first sweep has reported anything. Full disk,
/// so the first sweep comes after the minimum interval.
pub const INITIAL_SWEEP_USAGE: f64 = 1.0;

/// A configuration value replaced at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum IntervalCorrection {
    Fixed {
        setting: &'static str,
        configured: i64,
        applied: u64,
    },
    SweepBounds {
        configured_min: i64,
        configured_max: i64,
        applied: SweepBounds,
    },
}

/// Validate a fixed loop interval in seconds.
///
/// Returns the configured value when positive, otherwise `fallback` together
/// with the correction, after logging one warning.
pub fn fixed_interval(
    setting: &'static str,
    configured: i64,
    fallback: u64,
) -> (u64, Option<IntervalCorrection>) {
    if configured > 0 {
        return (configured as u64, None);
    }
    warn!(
        setting,
        configured, fallback, "Illegal maintenance interval config, force set to fallback"
    );
    (
        fallback,
        Some(IntervalCorrection::Fixed {
            setting,
            configured,
            applied: fallback,
        }),
    )
}

/// Bounds of the adaptive trash sweep interval, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepBounds {
    pub min: u64,
    pub max: u64,
}

impl SweepBounds {
    /// Validate `min_garbage_sweep_interval` / `max_garbage_sweep_interval`.
    ///
    /// Valid means `min > 0 && max >= min`. Otherwise `min` becomes 1 and
    /// `max` is raised to at least `min`.
    pub fn resolve(configured_min: i64, configured_max: i64) -> (Self, Option<IntervalCorrection>) {
        if configured_min > 0 && configured_max >= configured_min {
            let bounds = Self {
                min: configured_min as u64,
                max: configured_max as u64,
            };
            return (bounds, None);
        }

        let min = FALLBACK_MIN_SWEEP_INTERVAL_SECS;
        let max = if configured_max >= min as i64 {
            configured_max as u64
        } else {
            min
        };
        let bounds = Self { min, max };
        warn!(
            configured_min,
            configured_max,
            applied_min = bounds.min,
            applied_max = bounds.max,
            "Illegal garbage sweep interval config, force reset"
        );
        (
            bounds,
            Some(IntervalCorrection::SweepBounds {
                configured_min,
                configured_max,
                applied: bounds,
            }),
        )
    }

    /// Seconds to wait before the next sweep given the last usage ratio.
    ///
    /// Below ~60% usage the wait stays close to `max`; between 60% and 75%
    /// it falls steeply; from ~80% on it sits at `min`.
    pub fn interval_secs(&self, usage: f64) -> u64 {
        let candidate = (self.max as f64 * sweep_ratio(usage)) as u64;
        candidate.max(self.min)
    }
}

/// Fraction of the maximum sweep interval to wait at `usage` (a ratio in
/// `[0, 1]`). Peaks at about 0.986 for an empty disk; the clamp only bounds
/// inputs outside `[0, 1]`.
pub fn sweep_ratio(usage: f64) -> f64 {
    let percent = usage * 100.0;
    let ratio = (1.1 * (FRAC_PI_2 - (percent / 5.0 - 14.0).atan()) - 0.28) / PI;
    ratio.clamp(0.0, 1.0)
}

/// Wait length of `secs` scheduler seconds, where one second lasts `unit`.
pub fn scaled(secs: u64, unit: Duration) -> Duration {
    unit.saturating_mul(u32::try_from(secs).unwrap_or(u32::MAX))
}

/// All loop intervals of a node, validated once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaintenanceSchedule {
    pub base_compaction_threads: usize,
    pub cumulative_compaction_threads: usize,
    pub base_compaction_interval: u64,
    pub cumulative_compaction_interval: u64,
    pub sweep: SweepBounds,
    pub disk_stat_interval: u64,
    pub unused_index_interval: u64,
    pub fd_cache_interval: u64,
    pub corrections: Vec<IntervalCorrection>,
}

impl MaintenanceSchedule {
    pub fn resolve(config: &MaintenanceConfig) -> Self {
        let mut corrections = Vec::new();
        let mut fixed = |setting, configured, fallback| {
            let (secs, correction) = fixed_interval(setting, configured, fallback);
            corrections.extend(correction);
            secs
        };

        let base_compaction_interval = fixed(
            "base_compaction_check_interval_seconds",
            config.base_compaction_check_interval_seconds,
            FALLBACK_COMPACTION_INTERVAL_SECS,
        );
        let cumulative_compaction_interval = fixed(
            "cumulative_compaction_check_interval_seconds",
            config.cumulative_compaction_check_interval_seconds,
            FALLBACK_COMPACTION_INTERVAL_SECS,
        );
        let disk_stat_interval = fixed(
            "disk_stat_monitor_interval",
            config.disk_stat_monitor_interval,
            FALLBACK_DISK_STAT_INTERVAL_SECS,
        );
        let unused_index_interval = fixed(
            "unused_index_monitor_interval",
            config.unused_index_monitor_interval,
            FALLBACK_UNUSED_INDEX_INTERVAL_SECS,
        );
        let fd_cache_interval = fixed(
            "file_descriptor_cache_clean_interval",
            config.file_descriptor_cache_clean_interval,
            FALLBACK_FD_CACHE_INTERVAL_SECS,
        );

        let (sweep, correction) = SweepBounds::resolve(
            config.min_garbage_sweep_interval,
            config.max_garbage_sweep_interval,
        );
        corrections.extend(correction);

        Self {
            base_compaction_threads: config.base_compaction_num_threads as usize,
            cumulative_compaction_threads: config.cumulative_compaction_num_threads as usize,
            base_compaction_interval,
            cumulative_compaction_interval,
            sweep,
            disk_stat_interval,
            unused_index_interval,
            fd_cache_interval,
            corrections,
        }
    }
}
