//! Heap regions and their lazily allocated slot tables.
//!
//! A region is one or more units of `unit_size` bytes, aligned to the unit
//! size. Besides its memory it may own three tables, each created on first
//! use and dropped once empty:
//!
//! - old-to-old slots (raw pointers into evacuation candidates)
//! - old-to-new slots (raw pointers into the young generation)
//! - typed old-to-old slots (pointers embedded in code)

use crate::address::{Address, WORD_SIZE};
use crate::error::HeapError;
use crate::slots::{SlotSetArray, TypedSlotSet};

use std::alloc::Layout;
use std::ptr::NonNull;
use tracing::trace;

/// Identifier of a region within its [`RegionList`](super::RegionList).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(pub(crate) u32);

impl RegionId {
    /// Index of the region in its list.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What a region holds.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    /// Ordinary tenured objects.
    OldData = 0,
    /// Generated code. Never holds young-generation pointers.
    Code = 1,
    /// Fixed-layout metadata (maps, shapes). Never holds typed slots.
    FixedMetadata = 2,
    /// A single object larger than one unit.
    LargeObject = 3,
}

/// Which untyped table an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotTable {
    /// Slots pointing into evacuation candidates.
    OldToOld,
    /// Slots pointing into the young generation.
    OldToNew,
}

/// Allocation history of one table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounters {
    /// Times the table was created.
    pub allocations: u32,
    /// Times the table was dropped.
    pub releases: u32,
}

/// Identity and extent of a region, detached from its tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionInfo {
    /// Region identifier.
    pub id: RegionId,
    /// Region kind.
    pub kind: RegionKind,
    /// First byte of the region.
    pub base: Address,
    /// Size in bytes.
    pub size: usize,
}

impl RegionInfo {
    /// Check if an address lies within the region.
    #[inline]
    pub fn contains(&self, addr: Address) -> bool {
        addr >= self.base && addr.as_usize() < self.base.as_usize() + self.size
    }
}

/// Zeroed, unit-aligned backing memory of a region.
struct RegionMemory {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl RegionMemory {
    fn new(size: usize, align: usize) -> Result<Self, HeapError> {
        let layout =
            Layout::from_size_align(size, align).map_err(|_| HeapError::RegionAllocation { size })?;
        // SAFETY: `size` is non-zero; callers reject empty regions.
        let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or(HeapError::RegionAllocation { size })?;
        Ok(Self { ptr, layout })
    }

    #[inline]
    fn base(&self) -> Address {
        Address::from_ptr(self.ptr.as_ptr())
    }

    #[inline]
    fn words(&self) -> &[usize] {
        // SAFETY: the allocation is zero-initialised, word-aligned and
        // exactly `layout.size()` bytes long.
        unsafe {
            std::slice::from_raw_parts(self.ptr.as_ptr() as *const usize, self.layout.size() / WORD_SIZE)
        }
    }

    #[inline]
    fn words_mut(&mut self) -> &mut [usize] {
        // SAFETY: as above; `&mut self` guarantees exclusive access.
        unsafe {
            std::slice::from_raw_parts_mut(self.ptr.as_ptr() as *mut usize, self.layout.size() / WORD_SIZE)
        }
    }
}

impl Drop for RegionMemory {
    fn drop(&mut self) {
        // SAFETY: allocated in `new` with this exact layout.
        unsafe { std::alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

// Safety: RegionMemory exclusively owns its allocation.
unsafe impl Send for RegionMemory {}

/// A region of the old generation.
pub struct Region {
    info: RegionInfo,
    unit_size: usize,
    memory: RegionMemory,

    old_to_old: Option<Box<SlotSetArray>>,
    old_to_new: Option<Box<SlotSetArray>>,
    typed_old_to_old: Option<Box<TypedSlotSet>>,

    old_to_old_counters: TableCounters,
    old_to_new_counters: TableCounters,
    typed_counters: TableCounters,

    /// Set while the compactor plans to move this region's objects.
    evacuation_candidate: bool,
}

impl Region {
    /// Reserve a region of `unit_count` units.
    pub fn new(
        id: RegionId,
        kind: RegionKind,
        unit_count: usize,
        unit_size: usize,
    ) -> Result<Self, HeapError> {
        if unit_count == 0 {
            return Err(HeapError::EmptyRegion);
        }
        let size = unit_count
            .checked_mul(unit_size)
            .ok_or(HeapError::RegionAllocation { size: usize::MAX })?;
        let memory = RegionMemory::new(size, unit_size)?;

        Ok(Self {
            info: RegionInfo {
                id,
                kind,
                base: memory.base(),
                size,
            },
            unit_size,
            memory,
            old_to_old: None,
            old_to_new: None,
            typed_old_to_old: None,
            old_to_old_counters: TableCounters::default(),
            old_to_new_counters: TableCounters::default(),
            typed_counters: TableCounters::default(),
            evacuation_candidate: false,
        })
    }

    // =========================================================================
    // Geometry
    // =========================================================================

    /// Region identifier.
    #[inline]
    pub fn id(&self) -> RegionId {
        self.info.id
    }

    /// Region kind.
    #[inline]
    pub fn kind(&self) -> RegionKind {
        self.info.kind
    }

    /// Identity and extent.
    #[inline]
    pub fn info(&self) -> RegionInfo {
        self.info
    }

    /// First byte of the region.
    #[inline]
    pub fn base_address(&self) -> Address {
        self.info.base
    }

    /// One past the last byte of the region.
    #[inline]
    pub fn end_address(&self) -> Address {
        self.info.base.add(self.info.size)
    }

    /// Size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.info.size
    }

    /// Size of one unit.
    #[inline]
    pub fn unit_size(&self) -> usize {
        self.unit_size
    }

    /// Number of units.
    #[inline]
    pub fn unit_count(&self) -> usize {
        self.info.size / self.unit_size
    }

    /// Check if an address lies within the region.
    #[inline]
    pub fn contains(&self, addr: Address) -> bool {
        self.info.contains(addr)
    }

    /// Region-relative offset of an address inside the region.
    #[inline]
    pub fn offset_of(&self, addr: Address) -> usize {
        debug_assert!(self.contains(addr), "{addr:?} outside region {:?}", self.info.id);
        addr.offset_from(self.info.base)
    }

    /// Address of a region-relative offset.
    #[inline]
    pub fn address_at(&self, offset: usize) -> Address {
        debug_assert!(offset < self.info.size);
        self.info.base.add(offset)
    }

    // =========================================================================
    // Memory
    // =========================================================================

    #[inline]
    fn word_index(&self, addr: Address) -> usize {
        debug_assert!(addr.is_aligned(WORD_SIZE), "unaligned slot {addr:?}");
        self.offset_of(addr) / WORD_SIZE
    }

    /// Read the word stored at `addr`.
    #[inline]
    pub fn load(&self, addr: Address) -> Address {
        Address::new(self.memory.words()[self.word_index(addr)])
    }

    /// Write a word at `addr`.
    ///
    /// This is a raw store; callers pair it with a write barrier.
    #[inline]
    pub fn store(&mut self, addr: Address, value: Address) {
        let index = self.word_index(addr);
        self.memory.words_mut()[index] = value.as_usize();
    }

    // =========================================================================
    // Evacuation
    // =========================================================================

    /// Check if the compactor is going to evacuate this region.
    #[inline]
    pub fn is_evacuation_candidate(&self) -> bool {
        self.evacuation_candidate
    }

    /// Mark or unmark this region for evacuation.
    pub fn set_evacuation_candidate(&mut self, candidate: bool) {
        self.evacuation_candidate = candidate;
    }

    // =========================================================================
    // Untyped Tables
    // =========================================================================

    fn table_field(&mut self, table: SlotTable) -> (&mut Option<Box<SlotSetArray>>, &mut TableCounters) {
        match table {
            SlotTable::OldToOld => (&mut self.old_to_old, &mut self.old_to_old_counters),
            SlotTable::OldToNew => (&mut self.old_to_new, &mut self.old_to_new_counters),
        }
    }

    /// Get a table if it exists.
    #[inline]
    pub fn slot_set(&self, table: SlotTable) -> Option<&SlotSetArray> {
        match table {
            SlotTable::OldToOld => self.old_to_old.as_deref(),
            SlotTable::OldToNew => self.old_to_new.as_deref(),
        }
    }

    /// Get a table mutably if it exists.
    #[inline]
    pub fn slot_set_mut(&mut self, table: SlotTable) -> Option<&mut SlotSetArray> {
        self.table_field(table).0.as_deref_mut()
    }

    /// Get a table, creating it if absent.
    pub fn allocate_slot_set(&mut self, table: SlotTable) -> &mut SlotSetArray {
        let (unit_count, unit_size, id) = (self.unit_count(), self.unit_size, self.info.id);
        let (field, counters) = self.table_field(table);
        if field.is_none() {
            counters.allocations += 1;
            trace!(region = id.0, ?table, "allocated slot table");
        }
        field.get_or_insert_with(|| Box::new(SlotSetArray::new(unit_count, unit_size)))
    }

    /// Drop a table and all its slots.
    pub fn release_slot_set(&mut self, table: SlotTable) {
        let id = self.info.id;
        let (field, counters) = self.table_field(table);
        if field.take().is_some() {
            counters.releases += 1;
            trace!(region = id.0, ?table, "released slot table");
        }
    }

    /// Allocation history of an untyped table.
    pub fn slot_set_counters(&self, table: SlotTable) -> TableCounters {
        match table {
            SlotTable::OldToOld => self.old_to_old_counters,
            SlotTable::OldToNew => self.old_to_new_counters,
        }
    }

    /// Borrow a table together with the region memory, for scanning.
    pub(crate) fn scan_view(
        &mut self,
        table: SlotTable,
    ) -> Option<(RegionInfo, &mut SlotSetArray, &mut [usize])> {
        let slots = match table {
            SlotTable::OldToOld => self.old_to_old.as_deref_mut()?,
            SlotTable::OldToNew => self.old_to_new.as_deref_mut()?,
        };
        Some((self.info, slots, self.memory.words_mut()))
    }

    // =========================================================================
    // Typed Table
    // =========================================================================

    /// Get the typed table if it exists.
    #[inline]
    pub fn typed_slot_set(&self) -> Option<&TypedSlotSet> {
        self.typed_old_to_old.as_deref()
    }

    /// Get the typed table mutably if it exists.
    #[inline]
    pub fn typed_slot_set_mut(&mut self) -> Option<&mut TypedSlotSet> {
        self.typed_old_to_old.as_deref_mut()
    }

    /// Get the typed table, creating it if absent.
    pub fn allocate_typed_slot_set(&mut self) -> &mut TypedSlotSet {
        if self.typed_old_to_old.is_none() {
            self.typed_counters.allocations += 1;
            trace!(region = self.info.id.0, "allocated typed slot table");
        }
        self.typed_old_to_old.get_or_insert_with(Box::default)
    }

    /// Drop the typed table.
    pub fn release_typed_slot_set(&mut self) {
        if self.typed_old_to_old.take().is_some() {
            self.typed_counters.releases += 1;
            trace!(region = self.info.id.0, "released typed slot table");
        }
    }

    /// Allocation history of the typed table.
    pub fn typed_slot_set_counters(&self) -> TableCounters {
        self.typed_counters
    }
}

// Safety: Region owns its memory and tables outright.
unsafe impl Send for Region {}
