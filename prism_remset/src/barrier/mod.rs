//! Remembered sets and the write barriers that feed them.
//!
//! Write barriers record slots in old regions whose pointer crosses a
//! tracked boundary. Without them, a scavenge would have to scan the whole
//! old generation to find references into the young generation, and a
//! compaction would have to scan it to find references into the regions it
//! evacuates.
//!
//! Relocation passes record into a private [`SlotRecordingBuffer`] instead,
//! and drain it into the old-to-old sets once the pass is over.

mod direction;
mod recording_buffer;
mod remembered_set;

pub use direction::{OldToNew, OldToOld, PointerDirection};
pub use recording_buffer::{DrainSummary, RecordedSlot, SlotRecordingBuffer, DEFAULT_NODE_CAPACITY};
pub use remembered_set::{
    OldToNewRememberedSet, OldToOldRememberedSet, RememberedSet, Slot, SlotValidity,
};

use crate::address::Address;
use crate::heap::{RegionList, RegionLookup, YoungGeneration};
use crate::slots::SlotType;

// =============================================================================
// Write Barriers
// =============================================================================

/// Write barrier for pointer stores.
///
/// Call this after storing `value` into `slot`.
///
/// - Old-to-new: `value` is in the young generation.
/// - Old-to-old: `value` lies on an evacuation candidate.
///
/// Stores outside old regions record nothing. Neither do old-to-old stores
/// into an evacuation candidate itself.
///
/// Code never holds young pointers. Such a store trips a debug assertion and
/// is dropped in release builds.
///
/// # Example
///
/// ```ignore
/// region.store(slot, value);
/// record_write(&mut regions, &new_space, slot, value);
/// ```
#[inline]
pub fn record_write<Y>(regions: &mut RegionList, young: &Y, slot: Address, value: Address)
where
    Y: YoungGeneration + ?Sized,
{
    if young.in_new_space(value) {
        // Old→Young reference
        if let Some(region) = regions.region_containing_mut(slot) {
            let scanned = OldToNewRememberedSet::records_into(region);
            debug_assert!(scanned, "young pointer stored into {:?} region at {slot:?}", region.kind());
            if scanned {
                OldToNewRememberedSet::insert(region, slot);
            }
        }
        return;
    }

    if !points_into_candidate(regions, value) {
        return;
    }
    if let Some(region) = regions.region_containing_mut(slot) {
        if !region.is_evacuation_candidate() {
            OldToOldRememberedSet::insert(region, slot);
        }
    }
}

/// Write barrier for pointers embedded in code.
///
/// Records `slot` as a typed old-to-old slot when `target` lies on an
/// evacuation candidate. Slots in fixed-metadata regions trip a debug
/// assertion and are dropped in release builds.
#[inline]
pub fn record_typed_write(regions: &mut RegionList, slot_type: SlotType, slot: Address, target: Address) {
    if !points_into_candidate(regions, target) {
        return;
    }
    if let Some(region) = regions.region_containing_mut(slot) {
        let scanned = OldToOldRememberedSet::records_typed_into(region);
        debug_assert!(scanned, "typed slot {slot:?} in {:?} region", region.kind());
        if scanned && !region.is_evacuation_candidate() {
            OldToOldRememberedSet::insert_typed(region, slot_type, slot);
        }
    }
}

/// Relocation-pass analogue of [`record_write`].
///
/// Appends to the task's buffer instead of the shared tables. Returns `true`
/// if the slot was recorded.
#[inline]
pub fn record_slot_in_buffer(
    buffer: &mut SlotRecordingBuffer,
    regions: &RegionList,
    slot: Address,
    value: Address,
) -> bool {
    let record = points_into_candidate(regions, value) && !points_into_candidate(regions, slot);
    if record {
        buffer.record(slot);
    }
    record
}

/// Relocation-pass analogue of [`record_typed_write`].
#[inline]
pub fn record_typed_slot_in_buffer(
    buffer: &mut SlotRecordingBuffer,
    regions: &RegionList,
    slot_type: SlotType,
    slot: Address,
    target: Address,
) -> bool {
    let record = points_into_candidate(regions, target) && !points_into_candidate(regions, slot);
    if record {
        buffer.record_typed(slot_type, slot);
    }
    record
}

#[inline]
fn points_into_candidate(regions: &RegionList, addr: Address) -> bool {
    regions
        .region_containing(addr)
        .is_some_and(|region| region.is_evacuation_candidate())
}

// =============================================================================
// Tests
// =============================================================================
