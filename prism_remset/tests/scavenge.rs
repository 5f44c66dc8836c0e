//! Old-to-new remembered set across scavenges.

use prism_remset::barrier::{record_write, OldToNewRememberedSet};
use prism_remset::heap::{Heap, RegionId, RegionKind, SlotTable, YoungGeneration};
use prism_remset::{Address, RemsetConfig};

use std::sync::atomic::Ordering;

const OBJECT_SIZE: usize = 32;

fn heap_with_region(kind: RegionKind) -> (Heap, RegionId) {
    let mut heap = Heap::new(RemsetConfig::small_regions()).expect("heap");
    let id = heap.add_region(kind, 1).expect("region");
    (heap, id)
}

fn old_slot(heap: &Heap, id: RegionId, offset: usize) -> Address {
    heap.region(id).expect("missing region").base_address().add(offset)
}

/// Store `value` into `slot` and run the write barrier.
fn write(heap: &mut Heap, id: RegionId, slot: Address, value: Address) {
    heap.region_mut(id).expect("missing region").store(slot, value);
    let (regions, young) = heap.split_for_scan();
    record_write(regions, young, slot, value);
}

/// Scavenge, evacuating every from-space target in `survivors`.
///
/// Returns the new location of each survivor.
fn scavenge(heap: &mut Heap, survivors: &[Address]) -> Vec<(Address, Address)> {
    let mut moved: Vec<(Address, Address)> = Vec::new();
    let summary = {
        let (regions, young) = heap.split_for_scan();
        OldToNewRememberedSet::iterate_with_wrapper(regions, young, |slot, target| {
            let existing = moved.iter().find(|(from, _)| *from == target).map(|&(_, copy)| copy);
            if let Some(copy) = existing {
                slot.store(copy);
            } else if survivors.contains(&target) {
                let copy = young.alloc_to_space(OBJECT_SIZE).expect("to-space exhausted");
                moved.push((target, copy));
                slot.store(copy);
            }
        })
    };
    heap.record_scan(&summary);
    heap.new_space_mut().swap_spaces();
    moved
}

#[test]
fn survivor_slots_are_retained_and_updated() {
    let (mut heap, id) = heap_with_region(RegionKind::OldData);
    let survivor = heap.new_space().alloc(OBJECT_SIZE).expect("alloc");
    let garbage = heap.new_space().alloc(OBJECT_SIZE).expect("alloc");

    let keep = old_slot(&heap, id, 0x100);
    let shared = old_slot(&heap, id, 0x108);
    let dead = old_slot(&heap, id, 0x200);
    write(&mut heap, id, keep, survivor);
    write(&mut heap, id, shared, survivor);
    write(&mut heap, id, dead, garbage);

    let moved = scavenge(&mut heap, &[survivor]);
    assert_eq!(moved.len(), 1);
    let copy = moved[0].1;

    let region = heap.region(id).expect("missing region");
    assert_eq!(region.load(keep), copy);
    assert_eq!(region.load(shared), copy);
    assert!(OldToNewRememberedSet::contains(region, keep));
    assert!(OldToNewRememberedSet::contains(region, shared));
    assert!(!OldToNewRememberedSet::contains(region, dead));

    // After the swap the survivor sits in from-space, ready for the next cycle.
    assert!(heap.new_space().in_from_space(copy));
}

#[test]
fn promoted_targets_are_pruned() {
    let (mut heap, id) = heap_with_region(RegionKind::OldData);
    let object = heap.new_space().alloc(OBJECT_SIZE).expect("alloc");
    let slot = old_slot(&heap, id, 0x40);
    write(&mut heap, id, slot, object);

    let moved = scavenge(&mut heap, &[object]);
    let copy = moved[0].1;

    // Second cycle: the object is promoted instead of copied.
    let promoted = old_slot(&heap, id, 0x1000);
    {
        let (regions, young) = heap.split_for_scan();
        let summary = OldToNewRememberedSet::iterate_with_wrapper(regions, young, |slot, target| {
            assert_eq!(target, copy);
            slot.store(promoted);
        });
        assert_eq!(summary.slots_visited, 1);
        assert_eq!(summary.slots_retained, 0);
        assert_eq!(summary.tables_released, 1);
    }

    let region = heap.region(id).expect("missing region");
    assert_eq!(region.load(slot), promoted);
    assert!(region.slot_set(SlotTable::OldToNew).is_none());
    let counters = region.slot_set_counters(SlotTable::OldToNew);
    assert_eq!((counters.allocations, counters.releases), (1, 1));
}

#[test]
fn stale_old_pointer_is_dropped() {
    let (mut heap, id) = heap_with_region(RegionKind::OldData);
    let young = heap.new_space().alloc(OBJECT_SIZE).expect("alloc");
    let slot = old_slot(&heap, id, 0x80);
    write(&mut heap, id, slot, young);

    // The mutator overwrites the field with an old pointer; no barrier removes
    // the stale entry, the next scavenge does.
    let old_target = old_slot(&heap, id, 0x800);
    heap.region_mut(id).expect("missing region").store(slot, old_target);

    let mut called = false;
    let (regions, new_space) = heap.split_for_scan();
    let summary = OldToNewRememberedSet::iterate_with_wrapper(regions, new_space, |_, _| called = true);
    assert!(!called);
    assert_eq!(summary.slots_removed(), 1);
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "young pointer stored into Code region")]
fn young_store_into_code_panics() {
    let (mut heap, code) = heap_with_region(RegionKind::Code);
    let young = heap.new_space().alloc(OBJECT_SIZE).expect("alloc");
    let slot = old_slot(&heap, code, 0x10);
    write(&mut heap, code, slot, young);
}

#[test]
#[cfg(not(debug_assertions))]
fn young_store_into_code_leaves_no_table() {
    let (mut heap, code) = heap_with_region(RegionKind::Code);
    let young = heap.new_space().alloc(OBJECT_SIZE).expect("alloc");
    let slot = old_slot(&heap, code, 0x10);
    write(&mut heap, code, slot, young);

    let region = heap.region(code).expect("missing region");
    assert!(region.slot_set(SlotTable::OldToNew).is_none());
    assert_eq!(region.slot_set_counters(SlotTable::OldToNew).allocations, 0);
}

#[test]
fn stats_accumulate_over_cycles() {
    let (mut heap, id) = heap_with_region(RegionKind::OldData);
    let object = heap.new_space().alloc(OBJECT_SIZE).expect("alloc");
    let slot = old_slot(&heap, id, 0x40);
    write(&mut heap, id, slot, object);

    let moved = scavenge(&mut heap, &[object]);
    scavenge(&mut heap, &[moved[0].1]);
    scavenge(&mut heap, &[]);

    let stats = heap.stats();
    assert_eq!(stats.scans.load(Ordering::Relaxed), 3);
    assert_eq!(stats.slots_visited.load(Ordering::Relaxed), 3);
    assert_eq!(stats.slots_retained.load(Ordering::Relaxed), 2);
    assert_eq!(stats.tables_released.load(Ordering::Relaxed), 1);
}
