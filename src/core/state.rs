//! Process-wide engine state shared between the maintenance scheduler and its
//! sibling subsystems.
//!
//! One `EngineState` is created at startup and handed around as an
//! `Arc<EngineState>`; nothing here is a free-standing global.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use super::types::{CompactionTier, TabletInfo};

#[derive(Debug, Default)]
pub struct EngineState {
    schema_change: SchemaChangeCounter,
    disk_usage: DiskUsageGauge,
    claims: Arc<TabletClaims>,
}

impl EngineState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of schema-change operations currently running.
    pub fn schema_change(&self) -> &SchemaChangeCounter {
        &self.schema_change
    }

    /// Disk usage ratio last reported by the trash sweeper.
    pub fn disk_usage(&self) -> &DiskUsageGauge {
        &self.disk_usage
    }

    /// Per-tier tablet claims that compaction collaborators take before
    /// compacting a tablet.
    pub fn compaction_claims(&self) -> &Arc<TabletClaims> {
        &self.claims
    }
}

/// Counter of concurrently active schema-change operations, read elsewhere
/// as a throttling signal.
#[derive(Debug, Default)]
pub struct SchemaChangeCounter {
    active: AtomicU32,
}

impl SchemaChangeCounter {
    pub fn get(&self) -> u32 {
        self.active.load(Ordering::Acquire)
    }

    /// Returns the count after the increment.
    pub fn increment(&self) -> u32 {
        self.active.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Returns the count after the decrement. Never drops below zero.
    pub fn decrement(&self) -> u32 {
        match self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(prev) => prev - 1,
            Err(_) => 0,
        }
    }

    /// Count one schema change for as long as the guard lives.
    pub fn enter(&self) -> SchemaChangeGuard<'_> {
        self.increment();
        SchemaChangeGuard { counter: self }
    }
}

pub struct SchemaChangeGuard<'a> {
    counter: &'a SchemaChangeCounter,
}

impl Drop for SchemaChangeGuard<'_> {
    fn drop(&mut self) {
        self.counter.decrement();
    }
}

/// Latest disk usage ratio, stored as `f64` bits. `None` until the first
/// successful sweep.
#[derive(Debug)]
pub struct DiskUsageGauge {
    bits: AtomicU64,
}

const NO_SAMPLE: u64 = u64::MAX;

impl Default for DiskUsageGauge {
    fn default() -> Self {
        Self {
            bits: AtomicU64::new(NO_SAMPLE),
        }
    }
}

impl DiskUsageGauge {
    pub fn get(&self) -> Option<f64> {
        match self.bits.load(Ordering::Acquire) {
            NO_SAMPLE => None,
            bits => Some(f64::from_bits(bits)),
        }
    }

    pub fn set(&self, usage: f64) {
        self.bits.store(usage.to_bits(), Ordering::Release);
    }
}

/// Exclusive claims on `(tier, tablet)` pairs.
///
/// Several compaction workers of one tier run without coordination in the
/// scheduler; a collaborator must hold a claim on a tablet while compacting
/// it so two workers never compact the same tablet at once.
#[derive(Debug, Default)]
pub struct TabletClaims {
    held: Mutex<BTreeSet<(CompactionTier, TabletInfo)>>,
}

impl TabletClaims {
    /// Claim `tablet` for `tier`, or `None` when another worker holds it.
    pub fn try_claim(
        self: &Arc<Self>,
        tier: CompactionTier,
        tablet: TabletInfo,
    ) -> Option<TabletClaim> {
        if self.held.lock().insert((tier, tablet)) {
            Some(TabletClaim {
                claims: Arc::clone(self),
                tier,
                tablet,
            })
        } else {
            None
        }
    }

    pub fn is_claimed(&self, tier: CompactionTier, tablet: &TabletInfo) -> bool {
        self.held.lock().contains(&(tier, *tablet))
    }

    pub fn len(&self) -> usize {
        self.held.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Released on drop.
#[derive(Debug)]
pub struct TabletClaim {
    claims: Arc<TabletClaims>,
    tier: CompactionTier,
    tablet: TabletInfo,
}

impl TabletClaim {
    pub fn tablet(&self) -> TabletInfo {
        self.tablet
    }

    pub fn tier(&self) -> CompactionTier {
        self.tier
    }
}

impl Drop for TabletClaim {
    fn drop(&mut self) {
        self.claims.held.lock().remove(&(self.tier, self.tablet));
    }
}
