//! Remembered sets: per-region indexes of slots crossing a tracked boundary.
//!
//! A remembered set records the slots (pointer locations) in old regions
//! that point across a boundary, so a collection rescans only those slots
//! instead of the whole old generation:
//!
//! - [`OldToNew`]: slots pointing into the young generation; the roots of a
//!   scavenge.
//! - [`OldToOld`]: slots pointing into evacuation candidates; fixed up after
//!   compaction moves their targets. Also tracks typed slots embedded in code.
//!
//! # Design
//!
//! The set itself holds no state. Each region owns its tables, which are
//! allocated by the first insert and released by the first scan that finds
//! them empty. Scans are handed the regions explicitly, so a remembered set
//! is fully determined by the regions it is given.
//!
//! Preconditions are checked with debug assertions only.

use super::direction::{OldToNew, OldToOld, PointerDirection};
use crate::address::{Address, WORD_SIZE};
use crate::heap::{
    Region, RegionEnumerator, RegionInfo, RegionScope, SlotTable, YoungGeneration,
};
use crate::slots::{SlotCallbackResult, SlotType, TYPED_SLOT_MAX_OFFSET};
use crate::stats::{ScanSummary, ScanTimer};

use std::marker::PhantomData;
use tracing::debug;

/// A recorded slot, handed to scan callbacks.
///
/// Gives in-place access to the word stored in the slot, so a callback can
/// update a pointer to an object that has moved.
pub struct Slot<'a> {
    region: RegionInfo,
    offset: usize,
    word: &'a mut usize,
}

impl<'a> Slot<'a> {
    /// Address of the slot.
    #[inline]
    pub fn address(&self) -> Address {
        self.region.base.add(self.offset)
    }

    /// Region-relative offset of the slot.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Region holding the slot.
    #[inline]
    pub fn region(&self) -> &RegionInfo {
        &self.region
    }

    /// Pointer currently stored in the slot.
    #[inline]
    pub fn load(&self) -> Address {
        Address::new(*self.word)
    }

    /// Overwrite the pointer stored in the slot.
    #[inline]
    pub fn store(&mut self, value: Address) {
        *self.word = value.as_usize();
    }
}

/// Decides whether a recorded slot still lies inside a live object.
///
/// Supplied by the marking subsystem after a full liveness pass, while mark
/// bits are still intact.
pub trait SlotValidity {
    /// Check if `slot` in `region` is still a valid pointer slot.
    fn is_valid_slot(&self, region: &RegionInfo, slot: Address) -> bool;
}

impl<F> SlotValidity for F
where
    F: Fn(&RegionInfo, Address) -> bool,
{
    #[inline]
    fn is_valid_slot(&self, region: &RegionInfo, slot: Address) -> bool {
        self(region, slot)
    }
}

/// Remembered set for pointer direction `D`.
///
/// Typed operations and [`clear_all`](RememberedSet::clear_all) exist only
/// for [`OldToOld`]; the evacuation wrapper exists only for [`OldToNew`].
/// Misuse does not compile:
///
/// ```compile_fail
/// use prism_remset::barrier::{OldToNew, RememberedSet};
/// use prism_remset::heap::Region;
/// use prism_remset::slots::SlotType;
/// use prism_remset::Address;
///
/// fn record(region: &mut Region, slot: Address) {
///     RememberedSet::<OldToNew>::insert_typed(region, SlotType::CodeTarget, slot);
/// }
/// ```
pub struct RememberedSet<D: PointerDirection> {
    _direction: PhantomData<fn() -> D>,
}

/// Remembered set of old-to-old slots.
pub type OldToOldRememberedSet = RememberedSet<OldToOld>;

/// Remembered set of old-to-new slots.
pub type OldToNewRememberedSet = RememberedSet<OldToNew>;

impl<D: PointerDirection> RememberedSet<D> {
    /// Record `slot`, which must lie in `region`.
    ///
    /// The region must be one this direction scans. Allocates the region's
    /// table on first use. Idempotent.
    #[inline]
    pub fn insert(region: &mut Region, slot: Address) {
        debug_assert!(region.contains(slot), "{slot:?} outside region {:?}", region.id());
        debug_assert!(
            Self::records_into(region),
            "{} slot {slot:?} in unscanned {:?} region",
            D::NAME,
            region.kind()
        );
        let offset = region.offset_of(slot);
        region.allocate_slot_set(D::TABLE).insert(offset);
    }

    /// Check if `region` is visited by scans of this direction.
    #[inline]
    pub fn records_into(region: &Region) -> bool {
        D::SCAN_SCOPE.includes(region.kind())
    }

    /// Forget `slot` if recorded. Absence is not an error.
    #[inline]
    pub fn remove(region: &mut Region, slot: Address) {
        debug_assert!(region.contains(slot), "{slot:?} outside region {:?}", region.id());
        let offset = region.offset_of(slot);
        if let Some(slots) = region.slot_set_mut(D::TABLE) {
            slots.remove(offset);
        }
    }

    /// Forget every recorded slot in `[start, end)`.
    ///
    /// Requires `start < end <= region end`.
    pub fn remove_range(region: &mut Region, start: Address, end: Address) {
        let base = region.base_address();
        let size = region.size();
        if let Some(slots) = region.slot_set_mut(D::TABLE) {
            let start_offset = start.offset_from(base);
            let end_offset = end.offset_from(base);
            debug_assert!(start_offset < end_offset, "empty range {start:?}..{end:?}");
            debug_assert!(end_offset <= size, "range end {end:?} outside region");
            slots.remove_range(start_offset, end_offset);
        }
    }

    /// Check if `slot` is recorded.
    pub fn contains(region: &Region, slot: Address) -> bool {
        region
            .slot_set(D::TABLE)
            .is_some_and(|slots| slots.contains(region.offset_of(slot)))
    }

    /// Number of slots recorded in `region`.
    pub fn len(region: &Region) -> usize {
        region.slot_set(D::TABLE).map_or(0, |slots| slots.len())
    }

    /// Scan every recorded slot in the direction's scope.
    ///
    /// The callback may rewrite the slot in place and decides whether the
    /// slot stays recorded. A region whose table retains nothing has the
    /// table released before the scan moves on.
    pub fn iterate<E, F>(regions: &mut E, mut callback: F) -> ScanSummary
    where
        E: RegionEnumerator + ?Sized,
        F: FnMut(&mut Slot<'_>) -> SlotCallbackResult,
    {
        let timer = ScanTimer::start();
        let mut summary = ScanSummary::default();
        regions.for_each_region_mut(D::SCAN_SCOPE, |region| {
            Self::scan_region(region, &mut callback, &mut summary);
        });
        summary.elapsed = timer.stop();

        debug!(
            direction = D::NAME,
            regions = summary.regions_scanned,
            visited = summary.slots_visited,
            retained = summary.slots_retained,
            released = summary.tables_released,
            elapsed = ?summary.elapsed,
            "remembered set scan"
        );
        summary
    }

    /// Scan the slots of a single region.
    ///
    /// Lets a collector partition regions between tasks. Returns the number
    /// of slots retained.
    pub fn iterate_region<F>(region: &mut Region, mut callback: F) -> usize
    where
        F: FnMut(&mut Slot<'_>) -> SlotCallbackResult,
    {
        let mut summary = ScanSummary::default();
        Self::scan_region(region, &mut callback, &mut summary);
        summary.slots_retained
    }

    fn scan_region<F>(region: &mut Region, callback: &mut F, summary: &mut ScanSummary)
    where
        F: FnMut(&mut Slot<'_>) -> SlotCallbackResult,
    {
        let Some((info, slots, words)) = region.scan_view(D::TABLE) else {
            return;
        };

        let mut visited = 0;
        let retained = slots.iterate(|offset| {
            visited += 1;
            let mut slot = Slot {
                region: info,
                offset,
                word: &mut words[offset / WORD_SIZE],
            };
            callback(&mut slot)
        });

        summary.regions_scanned += 1;
        summary.slots_visited += visited;
        summary.slots_retained += retained;
        if retained == 0 {
            region.release_slot_set(D::TABLE);
            summary.tables_released += 1;
        }
    }

    /// Drop every slot that is no longer inside a live object.
    ///
    /// Must run after marking completes and before sweeping, while mark bits
    /// are still intact.
    pub fn clear_invalid_slots<E, V>(regions: &mut E, validity: &V) -> ScanSummary
    where
        E: RegionEnumerator + ?Sized,
        V: SlotValidity + ?Sized,
    {
        Self::iterate(regions, |slot| {
            SlotCallbackResult::keep_if(validity.is_valid_slot(slot.region(), slot.address()))
        })
    }

    /// Assert that every recorded slot is valid.
    ///
    /// # Panics
    ///
    /// On the first invalid slot.
    pub fn verify_valid_slots<E, V>(regions: &mut E, validity: &V)
    where
        E: RegionEnumerator + ?Sized,
        V: SlotValidity + ?Sized,
    {
        Self::iterate(regions, |slot| {
            assert!(
                validity.is_valid_slot(slot.region(), slot.address()),
                "invalid {} slot {} in region {:?}",
                D::NAME,
                slot.address(),
                slot.region().id,
            );
            SlotCallbackResult::Keep
        });
    }
}

// =============================================================================
// Old-to-New
// =============================================================================

impl RememberedSet<OldToNew> {
    /// Scan old-to-new slots for a scavenge.
    ///
    /// For each slot pointing into from-space, `callback(slot, target)` is
    /// expected to evacuate `target` and update the slot. The slot stays
    /// recorded only if it then points into to-space. Slots whose target
    /// died, or that never pointed into from-space, are dropped. A scavenge
    /// thereby prunes stale entries as a side effect.
    pub fn iterate_with_wrapper<E, Y, F>(regions: &mut E, young: &Y, mut callback: F) -> ScanSummary
    where
        E: RegionEnumerator + ?Sized,
        Y: YoungGeneration + ?Sized,
        F: FnMut(&mut Slot<'_>, Address),
    {
        Self::iterate(regions, |slot| Self::evacuation_wrapper(young, slot, &mut callback))
    }

    fn evacuation_wrapper<Y, F>(young: &Y, slot: &mut Slot<'_>, callback: &mut F) -> SlotCallbackResult
    where
        Y: YoungGeneration + ?Sized,
        F: FnMut(&mut Slot<'_>, Address),
    {
        let target = slot.load();
        if young.in_from_space(target) {
            callback(slot, target);
            // Still pointing into to-space means the target was evacuated.
            // Otherwise the target died, or the slot itself sits in memory
            // that was just freed.
            return SlotCallbackResult::keep_if(young.in_to_space(slot.load()));
        }
        debug_assert!(
            !young.in_new_space(target),
            "old-to-new slot {} points into to-space",
            slot.address()
        );
        SlotCallbackResult::Remove
    }
}

// =============================================================================
// Old-to-Old (typed slots and bulk clear)
// =============================================================================

/// Regions a typed scan visits.
const TYPED_SCAN_SCOPE: RegionScope = RegionScope::AllButFixedMetadata;

impl RememberedSet<OldToOld> {
    /// Check if `region` is visited by typed scans.
    #[inline]
    pub fn records_typed_into(region: &Region) -> bool {
        TYPED_SCAN_SCOPE.includes(region.kind())
    }

    /// Record a typed slot, which must lie in `region`.
    ///
    /// Fixed-metadata regions never embed typed slots and are rejected.
    pub fn insert_typed(region: &mut Region, slot_type: SlotType, slot: Address) {
        debug_assert!(region.contains(slot), "{slot:?} outside region {:?}", region.id());
        debug_assert!(
            Self::records_typed_into(region),
            "typed slot {slot:?} in unscanned {:?} region",
            region.kind()
        );
        let offset = region.offset_of(slot);
        debug_assert!(offset < TYPED_SLOT_MAX_OFFSET);
        region
            .allocate_typed_slot_set()
            .insert(slot_type, offset as u32);
    }

    /// Forget every typed slot in `[start, end)`, whatever its tag.
    ///
    /// Requires `start < end <= region end`.
    pub fn remove_range_typed(region: &mut Region, start: Address, end: Address) {
        let base = region.base_address();
        let size = region.size();
        if let Some(slots) = region.typed_slot_set_mut() {
            let start_offset = start.offset_from(base);
            let end_offset = end.offset_from(base);
            debug_assert!(start_offset < end_offset, "empty range {start:?}..{end:?}");
            debug_assert!(end_offset <= size, "range end {end:?} outside region");
            slots.iterate(|_, offset| {
                let offset = offset as usize;
                SlotCallbackResult::keep_if(!(start_offset <= offset && offset < end_offset))
            });
        }
    }

    /// Number of typed slots recorded in `region`.
    pub fn len_typed(region: &Region) -> usize {
        region.typed_slot_set().map_or(0, |slots| slots.len())
    }

    /// Scan every typed slot.
    ///
    /// Fixed-metadata regions are skipped; they never embed typed slots.
    /// Tables that retain nothing are released.
    pub fn iterate_typed<E, F>(regions: &mut E, mut callback: F) -> ScanSummary
    where
        E: RegionEnumerator + ?Sized,
        F: FnMut(SlotType, Address) -> SlotCallbackResult,
    {
        let timer = ScanTimer::start();
        let mut summary = ScanSummary::default();
        regions.for_each_region_mut(TYPED_SCAN_SCOPE, |region| {
            let base = region.base_address();
            let Some(slots) = region.typed_slot_set_mut() else {
                return;
            };

            let mut visited = 0;
            let retained = slots.iterate(|slot_type, offset| {
                visited += 1;
                callback(slot_type, base.add(offset as usize))
            });

            summary.regions_scanned += 1;
            summary.slots_visited += visited;
            summary.slots_retained += retained;
            if retained == 0 {
                region.release_typed_slot_set();
                summary.tables_released += 1;
            }
        });
        summary.elapsed = timer.stop();

        debug!(
            direction = "typed_old_to_old",
            regions = summary.regions_scanned,
            visited = summary.slots_visited,
            retained = summary.slots_retained,
            released = summary.tables_released,
            elapsed = ?summary.elapsed,
            "remembered set scan"
        );
        summary
    }

    /// Drop every old-to-old and typed old-to-old table, heap-wide.
    ///
    /// Used when a full collection invalidates all incremental bookkeeping.
    pub fn clear_all<E>(regions: &mut E)
    where
        E: RegionEnumerator + ?Sized,
    {
        let mut released = 0usize;
        regions.for_each_region_mut(RegionScope::All, |region| {
            if region.slot_set(SlotTable::OldToOld).is_some() {
                released += 1;
            }
            if region.typed_slot_set().is_some() {
                released += 1;
            }
            region.release_slot_set(SlotTable::OldToOld);
            region.release_typed_slot_set();
        });
        debug!(released, "cleared all old-to-old slots");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::{NewSpace, RegionKind, RegionList, RegionId};

    const UNIT: usize = 16 * 1024;

    fn keep_all(_: &mut Slot<'_>) -> SlotCallbackResult {
        SlotCallbackResult::Keep
    }

    fn list_with(kinds: &[RegionKind]) -> (RegionList, Vec<RegionId>) {
        let mut list = RegionList::new(UNIT);
        let ids = kinds
            .iter()
            .map(|&kind| list.add(kind, 1).expect("add region"))
            .collect();
        (list, ids)
    }

    fn region(list: &mut RegionList, id: RegionId) -> &mut Region {
        list.get_mut(id).expect("missing region")
    }

    fn slot_at(list: &RegionList, id: RegionId, offset: usize) -> Address {
        list.get(id).expect("missing region").base_address().add(offset)
    }

    fn visited_offsets<D: PointerDirection>(list: &mut RegionList) -> Vec<usize> {
        let mut seen = Vec::new();
        RememberedSet::<D>::iterate(list, |slot| {
            seen.push(slot.offset());
            SlotCallbackResult::Keep
        });
        seen
    }

    #[test]
    fn test_insert_twice_visits_once() {
        let (mut list, ids) = list_with(&[RegionKind::OldData]);
        let slot = slot_at(&list, ids[0], 0x40);
        OldToNewRememberedSet::insert(region(&mut list, ids[0]), slot);
        OldToNewRememberedSet::insert(region(&mut list, ids[0]), slot);

        let summary = OldToNewRememberedSet::iterate(&mut list, keep_all);
        assert_eq!(summary.slots_visited, 1);
        assert_eq!(summary.slots_retained, 1);
    }

    #[test]
    fn test_insert_then_remove() {
        let (mut list, ids) = list_with(&[RegionKind::OldData]);
        let slot = slot_at(&list, ids[0], 0x40);
        OldToOldRememberedSet::insert(region(&mut list, ids[0]), slot);
        OldToOldRememberedSet::remove(region(&mut list, ids[0]), slot);
        assert_eq!(OldToOldRememberedSet::iterate(&mut list, keep_all).slots_visited, 0);
    }

    #[test]
    fn test_remove_without_table_is_noop() {
        let (mut list, ids) = list_with(&[RegionKind::OldData]);
        let slot = slot_at(&list, ids[0], 0x40);
        OldToNewRememberedSet::remove(region(&mut list, ids[0]), slot);
        let base = slot_at(&list, ids[0], 0);
        OldToNewRememberedSet::remove_range(region(&mut list, ids[0]), base, base.add(UNIT));
        assert!(region(&mut list, ids[0]).slot_set(SlotTable::OldToNew).is_none());
    }

    #[test]
    fn test_remove_range() {
        let (mut list, ids) = list_with(&[RegionKind::OldData]);
        for offset in [8, 48, 200] {
            let slot = slot_at(&list, ids[0], offset);
            OldToNewRememberedSet::insert(region(&mut list, ids[0]), slot);
        }
        let (start, end) = (slot_at(&list, ids[0], 40), slot_at(&list, ids[0], 104));
        OldToNewRememberedSet::remove_range(region(&mut list, ids[0]), start, end);
        assert_eq!(visited_offsets::<OldToNew>(&mut list), vec![8, 200]);
    }

    #[test]
    fn test_remove_range_to_region_end() {
        let (mut list, ids) = list_with(&[RegionKind::OldData]);
        let last = slot_at(&list, ids[0], UNIT - 8);
        OldToOldRememberedSet::insert(region(&mut list, ids[0]), last);
        let (start, end) = (slot_at(&list, ids[0], 0), slot_at(&list, ids[0], 0).add(UNIT));
        OldToOldRememberedSet::remove_range(region(&mut list, ids[0]), start, end);
        assert_eq!(OldToOldRememberedSet::len(region(&mut list, ids[0])), 0);
    }

    #[test]
    fn test_directions_are_independent() {
        let (mut list, ids) = list_with(&[RegionKind::OldData]);
        let slot = slot_at(&list, ids[0], 0x80);
        OldToOldRememberedSet::insert(region(&mut list, ids[0]), slot);
        assert!(OldToOldRememberedSet::contains(region(&mut list, ids[0]), slot));
        assert!(!OldToNewRememberedSet::contains(region(&mut list, ids[0]), slot));
    }

    #[test]
    fn test_remove_all_releases_table_once() {
        let (mut list, ids) = list_with(&[RegionKind::OldData]);
        let slot = slot_at(&list, ids[0], 0x10);
        OldToNewRememberedSet::insert(region(&mut list, ids[0]), slot);

        let summary = OldToNewRememberedSet::iterate(&mut list, |_| SlotCallbackResult::Remove);
        assert_eq!(summary.tables_released, 1);

        let summary = OldToNewRememberedSet::iterate(&mut list, keep_all);
        assert_eq!(summary.slots_visited, 0);
        assert_eq!(summary.regions_scanned, 0);

        let counters = region(&mut list, ids[0]).slot_set_counters(SlotTable::OldToNew);
        assert_eq!(counters.allocations, 1);
        assert_eq!(counters.releases, 1);
    }

    #[test]
    fn test_empty_table_released_by_scan() {
        let (mut list, ids) = list_with(&[RegionKind::OldData]);
        let slot = slot_at(&list, ids[0], 0x10);
        OldToNewRememberedSet::insert(region(&mut list, ids[0]), slot);
        OldToNewRememberedSet::remove(region(&mut list, ids[0]), slot);
        // Removal alone keeps the table; the next scan reclaims it.
        assert!(region(&mut list, ids[0]).slot_set(SlotTable::OldToNew).is_some());
        let summary = OldToNewRememberedSet::iterate(&mut list, keep_all);
        assert_eq!(summary.tables_released, 1);
        assert!(region(&mut list, ids[0]).slot_set(SlotTable::OldToNew).is_none());
    }

    #[test]
    fn test_direction_scopes() {
        let kinds = [RegionKind::OldData, RegionKind::Code, RegionKind::FixedMetadata];
        let (mut list, ids) = list_with(&kinds);
        for &id in &ids {
            let slot = slot_at(&list, id, 0x20);
            let r = region(&mut list, id);
            if OldToNewRememberedSet::records_into(r) {
                OldToNewRememberedSet::insert(r, slot);
            }
            OldToOldRememberedSet::insert(r, slot);
        }
        assert!(!OldToNewRememberedSet::records_into(region(&mut list, ids[1])));
        assert_eq!(OldToNewRememberedSet::iterate(&mut list, keep_all).slots_visited, 2);
        assert_eq!(OldToOldRememberedSet::iterate(&mut list, keep_all).slots_visited, 3);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "unscanned Code region")]
    fn test_old_to_new_insert_into_code_region_panics() {
        let (mut list, ids) = list_with(&[RegionKind::Code]);
        let slot = slot_at(&list, ids[0], 0x20);
        OldToNewRememberedSet::insert(region(&mut list, ids[0]), slot);
    }

    #[test]
    fn test_callback_updates_slot_in_place() {
        let (mut list, ids) = list_with(&[RegionKind::OldData]);
        let slot = slot_at(&list, ids[0], 0x30);
        region(&mut list, ids[0]).store(slot, Address::new(0x1000));
        OldToOldRememberedSet::insert(region(&mut list, ids[0]), slot);

        OldToOldRememberedSet::iterate(&mut list, |s| {
            let moved = s.load().add(0x100);
            s.store(moved);
            SlotCallbackResult::Keep
        });
        assert_eq!(region(&mut list, ids[0]).load(slot), Address::new(0x1100));
    }

    #[test]
    fn test_multi_unit_region() {
        let mut list = RegionList::new(UNIT);
        let id = list.add(RegionKind::LargeObject, 3).expect("add region");
        for offset in [8, UNIT + 8, 2 * UNIT + 8] {
            let slot = slot_at(&list, id, offset);
            OldToNewRememberedSet::insert(region(&mut list, id), slot);
        }
        assert_eq!(
            visited_offsets::<OldToNew>(&mut list),
            vec![8, UNIT + 8, 2 * UNIT + 8]
        );
    }

    #[test]
    fn test_iterate_region() {
        let (mut list, ids) = list_with(&[RegionKind::OldData]);
        for offset in [0x10, 0x20] {
            let slot = slot_at(&list, ids[0], offset);
            OldToNewRememberedSet::insert(region(&mut list, ids[0]), slot);
        }
        let retained = OldToNewRememberedSet::iterate_region(region(&mut list, ids[0]), |s| {
            SlotCallbackResult::keep_if(s.offset() == 0x10)
        });
        assert_eq!(retained, 1);
    }

    #[test]
    fn test_evacuation_wrapper() {
        let (mut list, ids) = list_with(&[RegionKind::OldData]);
        let young = NewSpace::new(4096).expect("new space");

        let survivor = young.alloc(16).expect("alloc");
        let dying = young.alloc(16).expect("alloc");
        let old_target = slot_at(&list, ids[0], 0x800);

        let slots: Vec<Address> = [0x10, 0x20, 0x30]
            .iter()
            .map(|&offset| slot_at(&list, ids[0], offset))
            .collect();
        for (&slot, target) in slots.iter().zip([survivor, dying, old_target]) {
            let r = region(&mut list, ids[0]);
            r.store(slot, target);
            OldToNewRememberedSet::insert(r, slot);
        }

        let mut evacuated = Vec::new();
        let summary = OldToNewRememberedSet::iterate_with_wrapper(&mut list, &young, |slot, target| {
            if target == survivor {
                let copy = young.alloc_to_space(16).expect("to-space alloc");
                slot.store(copy);
                evacuated.push(slot.address());
            }
        });

        assert_eq!(summary.slots_visited, 3);
        assert_eq!(summary.slots_retained, 1);
        assert_eq!(evacuated, vec![slots[0]]);
        let r = region(&mut list, ids[0]);
        assert!(OldToNewRememberedSet::contains(r, slots[0]));
        assert!(!OldToNewRememberedSet::contains(r, slots[1]));
        assert!(!OldToNewRememberedSet::contains(r, slots[2]));
    }

    #[test]
    fn test_typed_round_trip() {
        let (mut list, ids) = list_with(&[RegionKind::Code]);
        let slot = slot_at(&list, ids[0], 0x44);
        OldToOldRememberedSet::insert_typed(region(&mut list, ids[0]), SlotType::CodeTarget, slot);

        let mut seen = Vec::new();
        let summary = OldToOldRememberedSet::iterate_typed(&mut list, |t, addr| {
            seen.push((t, addr));
            SlotCallbackResult::Keep
        });
        assert_eq!(seen, vec![(SlotType::CodeTarget, slot)]);
        assert_eq!(summary.slots_retained, 1);
    }

    #[test]
    fn test_typed_scope_excludes_fixed_metadata() {
        let (mut list, ids) = list_with(&[RegionKind::Code, RegionKind::FixedMetadata]);
        assert!(OldToOldRememberedSet::records_typed_into(region(&mut list, ids[0])));
        assert!(!OldToOldRememberedSet::records_typed_into(region(&mut list, ids[1])));

        let slot = slot_at(&list, ids[0], 0x8);
        OldToOldRememberedSet::insert_typed(region(&mut list, ids[0]), SlotType::EmbeddedObject, slot);
        let summary = OldToOldRememberedSet::iterate_typed(&mut list, |_, _| SlotCallbackResult::Keep);
        assert_eq!(summary.slots_visited, 1);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "unscanned FixedMetadata region")]
    fn test_insert_typed_into_fixed_metadata_panics() {
        let (mut list, ids) = list_with(&[RegionKind::FixedMetadata]);
        let slot = slot_at(&list, ids[0], 0x8);
        OldToOldRememberedSet::insert_typed(region(&mut list, ids[0]), SlotType::EmbeddedObject, slot);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "outside region")]
    fn test_remove_range_typed_past_region_end_panics() {
        let (mut list, ids) = list_with(&[RegionKind::Code]);
        let slot = slot_at(&list, ids[0], 0x8);
        OldToOldRememberedSet::insert_typed(region(&mut list, ids[0]), SlotType::CodeTarget, slot);
        let (start, end) = (slot_at(&list, ids[0], 0), slot_at(&list, ids[0], UNIT + 8));
        OldToOldRememberedSet::remove_range_typed(region(&mut list, ids[0]), start, end);
    }

    #[test]
    fn test_typed_release_on_empty() {
        let (mut list, ids) = list_with(&[RegionKind::Code]);
        let slot = slot_at(&list, ids[0], 0x8);
        OldToOldRememberedSet::insert_typed(region(&mut list, ids[0]), SlotType::CodeEntry, slot);
        let summary = OldToOldRememberedSet::iterate_typed(&mut list, |_, _| SlotCallbackResult::Remove);
        assert_eq!(summary.tables_released, 1);
        assert!(region(&mut list, ids[0]).typed_slot_set().is_none());
    }

    #[test]
    fn test_remove_range_typed_ignores_tag() {
        let (mut list, ids) = list_with(&[RegionKind::Code]);
        let kinds = [SlotType::CodeTarget, SlotType::EmbeddedObject, SlotType::CellTarget];
        for (i, kind) in kinds.into_iter().enumerate() {
            let slot = slot_at(&list, ids[0], 0x100 * (i + 1));
            OldToOldRememberedSet::insert_typed(region(&mut list, ids[0]), kind, slot);
        }
        let (start, end) = (slot_at(&list, ids[0], 0x100), slot_at(&list, ids[0], 0x300));
        OldToOldRememberedSet::remove_range_typed(region(&mut list, ids[0]), start, end);
        assert_eq!(OldToOldRememberedSet::len_typed(region(&mut list, ids[0])), 1);
    }

    #[test]
    fn test_clear_all() {
        let (mut list, ids) = list_with(&[RegionKind::OldData, RegionKind::Code]);
        for &id in &ids {
            let slot = slot_at(&list, id, 0x18);
            OldToOldRememberedSet::insert(region(&mut list, id), slot);
            OldToOldRememberedSet::insert_typed(region(&mut list, id), SlotType::Object, slot);
        }
        let slot = slot_at(&list, ids[0], 0x18);
        OldToNewRememberedSet::insert(region(&mut list, ids[0]), slot);

        OldToOldRememberedSet::clear_all(&mut list);

        assert_eq!(OldToOldRememberedSet::iterate(&mut list, keep_all).slots_visited, 0);
        let typed = OldToOldRememberedSet::iterate_typed(&mut list, |_, _| SlotCallbackResult::Keep);
        assert_eq!(typed.slots_visited, 0);
        // Old-to-new bookkeeping is untouched.
        assert_eq!(OldToNewRememberedSet::iterate(&mut list, keep_all).slots_visited, 1);
    }

    #[test]
    fn test_clear_invalid_slots() {
        let (mut list, ids) = list_with(&[RegionKind::OldData]);
        for offset in [0x10, 0x200, 0x400] {
            let slot = slot_at(&list, ids[0], offset);
            OldToNewRememberedSet::insert(region(&mut list, ids[0]), slot);
        }
        let base = slot_at(&list, ids[0], 0);
        // Pretend only the object covering [0x100, 0x300) is live.
        let live = move |_: &RegionInfo, slot: Address| {
            let offset = slot.offset_from(base);
            (0x100..0x300).contains(&offset)
        };

        let summary = OldToNewRememberedSet::clear_invalid_slots(&mut list, &live);
        assert_eq!(summary.slots_retained, 1);
        OldToNewRememberedSet::verify_valid_slots(&mut list, &live);
        assert_eq!(visited_offsets::<OldToNew>(&mut list), vec![0x200]);
    }

    #[test]
    #[should_panic(expected = "invalid old_to_new slot")]
    fn test_verify_valid_slots_panics_on_stale_slot() {
        let (mut list, ids) = list_with(&[RegionKind::OldData]);
        let slot = slot_at(&list, ids[0], 0x10);
        OldToNewRememberedSet::insert(region(&mut list, ids[0]), slot);
        OldToNewRememberedSet::verify_valid_slots(&mut list, &|_: &RegionInfo, _: Address| false);
    }
}
