//! Heap layout consumed by the remembered sets.
//!
//! The heap is divided into:
//! - Old regions: unit-aligned regions owning lazily allocated slot tables
//! - New space: semi-space young generation

mod new_space;
mod region;
mod region_list;

pub use new_space::{NewSpace, YoungGeneration};
pub use region::{Region, RegionId, RegionInfo, RegionKind, SlotTable, TableCounters};
pub use region_list::{RegionEnumerator, RegionList, RegionLookup, RegionScope};

use crate::barrier::{PointerDirection, RememberedSet, SlotValidity};
use crate::config::RemsetConfig;
use crate::error::HeapError;
use crate::stats::{RemsetStats, ScanSummary};

/// Old regions plus the young generation.
pub struct Heap {
    /// Configuration parameters.
    config: RemsetConfig,

    /// Old-generation regions.
    regions: RegionList,

    /// Young generation.
    new_space: NewSpace,

    /// Scan statistics.
    stats: RemsetStats,
}

impl Heap {
    /// Create a heap with the given configuration.
    pub fn new(config: RemsetConfig) -> Result<Self, HeapError> {
        config.validate()?;

        let regions = RegionList::new(config.unit_size);
        let new_space = NewSpace::new(config.new_space_size)?;

        Ok(Self {
            config,
            regions,
            new_space,
            stats: RemsetStats::new(),
        })
    }

    /// Create a heap with default configuration.
    pub fn with_defaults() -> Result<Self, HeapError> {
        Self::new(RemsetConfig::default())
    }

    /// Reserve a new old-generation region of `unit_count` units.
    pub fn add_region(&mut self, kind: RegionKind, unit_count: usize) -> Result<RegionId, HeapError> {
        self.regions.add(kind, unit_count)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the configuration.
    pub fn config(&self) -> &RemsetConfig {
        &self.config
    }

    /// Get the old regions.
    pub fn regions(&self) -> &RegionList {
        &self.regions
    }

    /// Get mutable access to the old regions.
    pub fn regions_mut(&mut self) -> &mut RegionList {
        &mut self.regions
    }

    /// Get a region by id.
    pub fn region(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(id)
    }

    /// Get a region mutably by id.
    pub fn region_mut(&mut self, id: RegionId) -> Option<&mut Region> {
        self.regions.get_mut(id)
    }

    /// Get the young generation.
    pub fn new_space(&self) -> &NewSpace {
        &self.new_space
    }

    /// Get mutable access to the young generation.
    pub fn new_space_mut(&mut self) -> &mut NewSpace {
        &mut self.new_space
    }

    /// Borrow regions mutably and the young generation shared at once.
    ///
    /// Scans over old-to-new slots need both: the regions for their tables,
    /// the new space for membership queries and to-space allocation.
    pub fn split_for_scan(&mut self) -> (&mut RegionList, &NewSpace) {
        (&mut self.regions, &self.new_space)
    }

    // =========================================================================
    // Stale Slots
    // =========================================================================

    /// Drop every `D` slot that `validity` rejects, then record the scan.
    ///
    /// With `verify_slots` set, the surviving slots are re-checked and any
    /// invalid one panics.
    pub fn clear_invalid_slots<D, V>(&mut self, validity: &V) -> ScanSummary
    where
        D: PointerDirection,
        V: SlotValidity + ?Sized,
    {
        let summary = RememberedSet::<D>::clear_invalid_slots(&mut self.regions, validity);
        if self.config.verify_slots {
            RememberedSet::<D>::verify_valid_slots(&mut self.regions, validity);
        }
        self.stats.record_scan(&summary);
        summary
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Get scan statistics.
    pub fn stats(&self) -> &RemsetStats {
        &self.stats
    }

    /// Fold a scan result into the statistics.
    pub fn record_scan(&self, summary: &ScanSummary) {
        self.stats.record_scan(summary);
    }
}
