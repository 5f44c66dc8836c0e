//! Prism Remembered Sets
//!
//! Per-region indexes of pointer slots that cross a tracked boundary, so a
//! collection rescans only those slots instead of the whole heap.
//!
//! # Architecture
//!
//! - **Slot sets** ([`slots`]): a bucketed bitmap per fixed-size unit of a
//!   region for plain pointer slots, and a chunked log of tagged offsets for
//!   pointers embedded in code.
//!
//! - **Regions** ([`heap`]): unit-aligned old-generation regions. Each owns up
//!   to three lazily allocated tables (old-to-old, old-to-new, typed
//!   old-to-old). A table exists once a slot is recorded and is released by
//!   the first scan that finds it empty.
//!
//! - **Remembered sets** ([`barrier::RememberedSet`]): a facade per pointer
//!   direction. The direction is a type parameter, so typed operations and
//!   bulk clear only exist for old-to-old, and the evacuation wrapper only
//!   for old-to-new.
//!
//! - **Recording buffer** ([`barrier::SlotRecordingBuffer`]): append-only log
//!   a relocation task fills privately and drains at the end of the pass.
//!
//! # Usage
//!
//! ```
//! use prism_remset::barrier::{record_write, OldToNewRememberedSet};
//! use prism_remset::heap::{Heap, RegionKind};
//! use prism_remset::RemsetConfig;
//!
//! let mut heap = Heap::new(RemsetConfig::small_regions()).unwrap();
//! let id = heap.add_region(RegionKind::OldData, 1).unwrap();
//!
//! let young = heap.new_space().alloc(16).unwrap();
//! let slot = heap.region(id).unwrap().base_address().add(0x40);
//! heap.region_mut(id).unwrap().store(slot, young);
//!
//! let (regions, new_space) = heap.split_for_scan();
//! record_write(regions, new_space, slot, young);
//!
//! let summary = OldToNewRememberedSet::iterate_with_wrapper(regions, new_space, |slot, _| {
//!     let copy = new_space.alloc_to_space(16).unwrap();
//!     slot.store(copy);
//! });
//! assert_eq!(summary.slots_retained, 1);
//! ```
//!
//! # Safety
//!
//! The remembered sets perform no synchronization. Callers guarantee that
//! no mutator inserts into a region while a scan of that region runs.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod address;
pub mod barrier;
pub mod config;
pub mod error;
pub mod heap;
pub mod slots;
pub mod stats;

// Re-exports for convenient access
pub use address::Address;
pub use barrier::{
    OldToNew, OldToNewRememberedSet, OldToOld, OldToOldRememberedSet, RememberedSet,
    SlotRecordingBuffer,
};
pub use config::RemsetConfig;
pub use error::{ConfigError, HeapError};
pub use heap::Heap;
pub use slots::{SlotCallbackResult, SlotType};
pub use stats::{RemsetStats, ScanSummary};
