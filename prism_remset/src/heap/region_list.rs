//! Region registry and scoped enumeration.

use super::region::{Region, RegionId, RegionKind};
use crate::address::Address;
use crate::error::HeapError;
use crate::slots::TYPED_SLOT_MAX_OFFSET;

use rustc_hash::FxHashMap;

/// Which regions a scan visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionScope {
    /// Every region.
    All,
    /// Every region except code regions.
    AllButCode,
    /// Every region except fixed-metadata regions.
    AllButFixedMetadata,
}

impl RegionScope {
    /// Check if a region of `kind` is in scope.
    #[inline]
    pub fn includes(self, kind: RegionKind) -> bool {
        match self {
            RegionScope::All => true,
            RegionScope::AllButCode => kind != RegionKind::Code,
            RegionScope::AllButFixedMetadata => kind != RegionKind::FixedMetadata,
        }
    }
}

/// Source of regions for heap-wide scans.
pub trait RegionEnumerator {
    /// Call `f` on every region in `scope`.
    fn for_each_region_mut<F>(&mut self, scope: RegionScope, f: F)
    where
        F: FnMut(&mut Region);
}

/// Address-to-region resolution.
pub trait RegionLookup {
    /// Find the region containing `addr`.
    fn region_containing_mut(&mut self, addr: Address) -> Option<&mut Region>;
}

/// All old-generation regions of a heap.
pub struct RegionList {
    regions: Vec<Region>,
    /// Unit base address -> owning region.
    units: FxHashMap<usize, RegionId>,
    unit_size: usize,
}

impl RegionList {
    /// Create an empty list of regions built from `unit_size` units.
    pub fn new(unit_size: usize) -> Self {
        debug_assert!(unit_size.is_power_of_two());
        Self {
            regions: Vec::new(),
            units: FxHashMap::default(),
            unit_size,
        }
    }

    /// Reserve and register a new region.
    pub fn add(&mut self, kind: RegionKind, unit_count: usize) -> Result<RegionId, HeapError> {
        let size = unit_count.saturating_mul(self.unit_size);
        if size > TYPED_SLOT_MAX_OFFSET {
            return Err(HeapError::RegionTooLarge { size });
        }

        let id = RegionId(self.regions.len() as u32);
        let region = Region::new(id, kind, unit_count, self.unit_size)?;

        let base = region.base_address().as_usize();
        for unit in 0..unit_count {
            self.units.insert(base + unit * self.unit_size, id);
        }
        self.regions.push(region);
        Ok(id)
    }

    /// Get a region by id.
    #[inline]
    pub fn get(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(id.index())
    }

    /// Get a region mutably by id.
    #[inline]
    pub fn get_mut(&mut self, id: RegionId) -> Option<&mut Region> {
        self.regions.get_mut(id.index())
    }

    /// Find the id of the region containing `addr`.
    #[inline]
    pub fn region_of(&self, addr: Address) -> Option<RegionId> {
        let unit_base = addr.align_down(self.unit_size).as_usize();
        self.units.get(&unit_base).copied()
    }

    /// Find the region containing `addr`.
    #[inline]
    pub fn region_containing(&self, addr: Address) -> Option<&Region> {
        self.region_of(addr).and_then(|id| self.get(id))
    }

    /// Iterate over all regions.
    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    /// Number of regions.
    #[inline]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Check if there are no regions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Unit size shared by every region.
    #[inline]
    pub fn unit_size(&self) -> usize {
        self.unit_size
    }
}

impl RegionEnumerator for RegionList {
    fn for_each_region_mut<F>(&mut self, scope: RegionScope, mut f: F)
    where
        F: FnMut(&mut Region),
    {
        for region in self.regions.iter_mut() {
            if scope.includes(region.kind()) {
                f(region);
            }
        }
    }
}

impl RegionLookup for RegionList {
    fn region_containing_mut(&mut self, addr: Address) -> Option<&mut Region> {
        let id = self.region_of(addr)?;
        self.get_mut(id)
    }
}
