//! Bucketed bitmap of untyped slot offsets.
//!
//! One bit per word-aligned slot in a region unit. Bits are grouped into
//! cells of 32, and cells into buckets of 32. Buckets are allocated on the
//! first insert that touches them and freed again as soon as they are
//! observed empty, so a mostly-empty unit costs one pointer per bucket.
//!
//! ```text
//! unit:     [ bucket 0 ][ bucket 1 ][ bucket 2 ] ...   (8KB of slots each on 64-bit)
//! bucket:   [ cell 0 ][ cell 1 ] ... [ cell 31 ]       (32 x u32)
//! cell:     bit i  <=>  slot at offset (bucket*1024 + cell*32 + i) * WORD_SIZE
//! ```

use super::SlotCallbackResult;
use crate::address::{WORD_SIZE, WORD_SIZE_LOG2};

use smallvec::SmallVec;

/// Bits in one cell.
pub const BITS_PER_CELL: usize = 32;

/// Cells in one bucket.
pub const CELLS_PER_BUCKET: usize = 32;

/// Slots covered by one bucket.
pub const BITS_PER_BUCKET: usize = BITS_PER_CELL * CELLS_PER_BUCKET;

type Bucket = Box<[u32; CELLS_PER_BUCKET]>;

/// Slot offsets recorded for one region unit.
///
/// Offsets are unit-relative byte offsets. They must be word-aligned and
/// below the unit size.
pub struct SlotSet {
    buckets: Box<[Option<Bucket>]>,
    unit_size: usize,
}

impl SlotSet {
    /// Create an empty slot set for a unit of `unit_size` bytes.
    pub fn new(unit_size: usize) -> Self {
        let slots = unit_size / WORD_SIZE;
        let bucket_count = slots.div_ceil(BITS_PER_BUCKET);
        Self {
            buckets: (0..bucket_count).map(|_| None).collect(),
            unit_size,
        }
    }

    #[inline]
    fn slot_index(&self, offset: u32) -> usize {
        let offset = offset as usize;
        debug_assert!(offset < self.unit_size, "offset {offset:#x} outside unit");
        debug_assert!(offset % WORD_SIZE == 0, "unaligned slot offset {offset:#x}");
        offset >> WORD_SIZE_LOG2
    }

    #[inline]
    fn split(slot: usize) -> (usize, usize, u32) {
        let bucket = slot / BITS_PER_BUCKET;
        let cell = (slot % BITS_PER_BUCKET) / BITS_PER_CELL;
        let bit = (slot % BITS_PER_CELL) as u32;
        (bucket, cell, bit)
    }

    /// Record a slot. Recording an offset twice is a no-op.
    #[inline]
    pub fn insert(&mut self, offset: u32) {
        let (bucket, cell, bit) = Self::split(self.slot_index(offset));
        let cells = self.buckets[bucket].get_or_insert_with(|| Box::new([0; CELLS_PER_BUCKET]));
        cells[cell] |= 1 << bit;
    }

    /// Forget a slot if it is recorded.
    #[inline]
    pub fn remove(&mut self, offset: u32) {
        let (bucket, cell, bit) = Self::split(self.slot_index(offset));
        if let Some(cells) = &mut self.buckets[bucket] {
            cells[cell] &= !(1 << bit);
        }
    }

    /// Check whether a slot is recorded.
    #[inline]
    pub fn contains(&self, offset: u32) -> bool {
        let (bucket, cell, bit) = Self::split(self.slot_index(offset));
        self.buckets[bucket]
            .as_ref()
            .is_some_and(|cells| cells[cell] & (1 << bit) != 0)
    }

    /// Forget every slot with an offset in `[start, end)`.
    ///
    /// Buckets left empty are freed.
    pub fn remove_range(&mut self, start: u32, end: u32) {
        debug_assert!(start <= end, "malformed range {start:#x}..{end:#x}");
        debug_assert!(end as usize <= self.unit_size, "range end {end:#x} outside unit");

        // Slot s lies in the range iff start <= s * WORD_SIZE < end.
        let first = (start as usize).div_ceil(WORD_SIZE);
        let last = (end as usize).div_ceil(WORD_SIZE);

        let mut slot = first;
        while slot < last {
            let bucket = slot / BITS_PER_BUCKET;
            let bucket_start = bucket * BITS_PER_BUCKET;
            let bucket_end = bucket_start + BITS_PER_BUCKET;
            let stop = last.min(bucket_end);

            if slot == bucket_start && stop == bucket_end {
                self.buckets[bucket] = None;
            } else if let Some(cells) = &mut self.buckets[bucket] {
                clear_bits(cells, slot - bucket_start, stop - bucket_start);
                if cells.iter().all(|&c| c == 0) {
                    self.buckets[bucket] = None;
                }
            }
            slot = stop;
        }
    }

    /// Visit every recorded slot, dropping the ones the callback rejects.
    ///
    /// Returns the number of slots retained. Buckets that end up empty are
    /// freed.
    pub fn iterate<F>(&mut self, mut callback: F) -> usize
    where
        F: FnMut(u32) -> SlotCallbackResult,
    {
        let mut retained = 0;
        for (bucket_index, bucket) in self.buckets.iter_mut().enumerate() {
            let Some(cells) = bucket else { continue };

            let mut in_bucket = 0;
            for (cell_index, cell) in cells.iter_mut().enumerate() {
                let mut pending = *cell;
                while pending != 0 {
                    let bit = pending.trailing_zeros();
                    pending &= pending - 1;

                    let slot = bucket_index * BITS_PER_BUCKET
                        + cell_index * BITS_PER_CELL
                        + bit as usize;
                    let offset = (slot << WORD_SIZE_LOG2) as u32;
                    match callback(offset) {
                        SlotCallbackResult::Keep => in_bucket += 1,
                        SlotCallbackResult::Remove => *cell &= !(1 << bit),
                    }
                }
            }

            if in_bucket == 0 {
                *bucket = None;
            }
            retained += in_bucket;
        }
        retained
    }

    /// Number of recorded slots.
    pub fn len(&self) -> usize {
        self.buckets
            .iter()
            .flatten()
            .flat_map(|cells| cells.iter())
            .map(|cell| cell.count_ones() as usize)
            .sum()
    }

    /// Check if no slot is recorded.
    pub fn is_empty(&self) -> bool {
        self.buckets
            .iter()
            .flatten()
            .all(|cells| cells.iter().all(|&c| c == 0))
    }

    /// Number of buckets currently allocated.
    pub fn allocated_buckets(&self) -> usize {
        self.buckets.iter().filter(|b| b.is_some()).count()
    }

    /// Size of the unit this set covers.
    #[inline]
    pub fn unit_size(&self) -> usize {
        self.unit_size
    }
}

/// Clear bits `[from, to)` of a bucket.
fn clear_bits(cells: &mut [u32; CELLS_PER_BUCKET], from: usize, to: usize) {
    let mut bit = from;
    while bit < to {
        let cell = bit / BITS_PER_CELL;
        let stop = to.min((cell + 1) * BITS_PER_CELL);
        let width = stop - bit;
        let mask = if width == BITS_PER_CELL {
            u32::MAX
        } else {
            ((1u32 << width) - 1) << (bit % BITS_PER_CELL)
        };
        cells[cell] &= !mask;
        bit = stop;
    }
}

// =============================================================================
// Per-region array
// =============================================================================

/// One [`SlotSet`] per unit of a region.
///
/// Offsets taken and produced here are region-relative. Almost every region
/// is a single unit, so the array keeps one set inline.
pub struct SlotSetArray {
    units: SmallVec<[SlotSet; 1]>,
    unit_size: usize,
}

impl SlotSetArray {
    /// Create empty sets for `unit_count` units of `unit_size` bytes.
    pub fn new(unit_count: usize, unit_size: usize) -> Self {
        debug_assert!(unit_count > 0);
        Self {
            units: (0..unit_count).map(|_| SlotSet::new(unit_size)).collect(),
            unit_size,
        }
    }

    #[inline]
    fn locate(&self, offset: usize) -> (usize, u32) {
        let unit = offset / self.unit_size;
        debug_assert!(unit < self.units.len(), "offset {offset:#x} outside region");
        (unit, (offset % self.unit_size) as u32)
    }

    /// Record a region-relative slot offset.
    #[inline]
    pub fn insert(&mut self, offset: usize) {
        let (unit, local) = self.locate(offset);
        self.units[unit].insert(local);
    }

    /// Forget a region-relative slot offset.
    #[inline]
    pub fn remove(&mut self, offset: usize) {
        let (unit, local) = self.locate(offset);
        self.units[unit].remove(local);
    }

    /// Check whether a region-relative slot offset is recorded.
    #[inline]
    pub fn contains(&self, offset: usize) -> bool {
        let (unit, local) = self.locate(offset);
        self.units[unit].contains(local)
    }

    /// Forget every slot in the region-relative range `[start, end)`.
    /// The range may cross unit boundaries.
    pub fn remove_range(&mut self, start: usize, end: usize) {
        debug_assert!(end <= self.units.len() * self.unit_size);
        let mut cursor = start;
        while cursor < end {
            let unit = cursor / self.unit_size;
            let unit_base = unit * self.unit_size;
            let stop = end.min(unit_base + self.unit_size);
            self.units[unit].remove_range((cursor - unit_base) as u32, (stop - unit_base) as u32);
            cursor = stop;
        }
    }

    /// Visit every slot across all units with its region-relative offset.
    ///
    /// Returns the total number of slots retained.
    pub fn iterate<F>(&mut self, mut callback: F) -> usize
    where
        F: FnMut(usize) -> SlotCallbackResult,
    {
        let unit_size = self.unit_size;
        self.units
            .iter_mut()
            .enumerate()
            .map(|(unit, set)| {
                let unit_base = unit * unit_size;
                set.iterate(|local| callback(unit_base + local as usize))
            })
            .sum()
    }

    /// Number of recorded slots.
    pub fn len(&self) -> usize {
        self.units.iter().map(SlotSet::len).sum()
    }

    /// Check if no slot is recorded.
    pub fn is_empty(&self) -> bool {
        self.units.iter().all(SlotSet::is_empty)
    }

    /// Number of units covered.
    #[inline]
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }
}
