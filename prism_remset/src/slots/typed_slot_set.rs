//! Typed slots: pointers embedded in encodings that are not a plain word.
//!
//! Each entry packs a [`SlotType`] tag and a region-relative offset into one
//! `u32`. Entries live in fixed-capacity chunks. Removal overwrites an entry
//! with a cleared marker, and chunks that hold only cleared entries are
//! freed during iteration.

use super::SlotCallbackResult;

/// Bits reserved for the tag.
const TYPE_BITS: u32 = 3;

/// Bits available for the offset.
const OFFSET_BITS: u32 = u32::BITS - TYPE_BITS;

/// Offsets must be strictly below this bound.
pub const TYPED_SLOT_MAX_OFFSET: usize = 1 << OFFSET_BITS;

/// Tag value of an entry that has been removed.
const CLEARED_TAG: u32 = (1 << TYPE_BITS) - 1;

/// Entries per chunk.
const CHUNK_CAPACITY: usize = 512;

/// How a typed slot encodes its target.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SlotType {
    /// Object pointer embedded in an instruction stream.
    EmbeddedObject = 0,
    /// Plain object pointer recorded through the typed path.
    Object = 1,
    /// Pointer to a code object that was relocated.
    RelocatedCodeObject = 2,
    /// Target of a property cell reference.
    CellTarget = 3,
    /// Pc-relative call or jump target.
    CodeTarget = 4,
    /// Entry address of a code object.
    CodeEntry = 5,
    /// Patched debug break target.
    DebugTarget = 6,
}

impl SlotType {
    /// Number of distinct tags.
    pub const COUNT: usize = 7;

    /// All tags, in encoding order.
    pub const ALL: [SlotType; SlotType::COUNT] = [
        SlotType::EmbeddedObject,
        SlotType::Object,
        SlotType::RelocatedCodeObject,
        SlotType::CellTarget,
        SlotType::CodeTarget,
        SlotType::CodeEntry,
        SlotType::DebugTarget,
    ];

    #[inline]
    fn from_bits(bits: u32) -> Option<SlotType> {
        Self::ALL.get(bits as usize).copied()
    }
}

#[inline]
fn encode(slot_type: SlotType, offset: u32) -> u32 {
    ((slot_type as u32) << OFFSET_BITS) | offset
}

#[inline]
fn decode(entry: u32) -> Option<(SlotType, u32)> {
    let tag = entry >> OFFSET_BITS;
    let offset = entry & (TYPED_SLOT_MAX_OFFSET as u32 - 1);
    SlotType::from_bits(tag).map(|t| (t, offset))
}

const CLEARED: u32 = CLEARED_TAG << OFFSET_BITS;

/// Set of (tag, offset) pairs for one region.
///
/// Inserting the same pair twice stores it twice.
#[derive(Default)]
pub struct TypedSlotSet {
    chunks: Vec<Vec<u32>>,
}

impl TypedSlotSet {
    /// Create an empty typed slot set.
    pub fn new() -> Self {
        Self { chunks: Vec::new() }
    }

    /// Record a typed slot at a region-relative offset.
    pub fn insert(&mut self, slot_type: SlotType, offset: u32) {
        debug_assert!(
            (offset as usize) < TYPED_SLOT_MAX_OFFSET,
            "typed slot offset {offset:#x} out of range"
        );
        let entry = encode(slot_type, offset);
        match self.chunks.last_mut() {
            Some(chunk) if chunk.len() < CHUNK_CAPACITY => chunk.push(entry),
            _ => {
                let mut chunk = Vec::with_capacity(CHUNK_CAPACITY);
                chunk.push(entry);
                self.chunks.push(chunk);
            }
        }
    }

    /// Visit every live entry, clearing the ones the callback rejects.
    ///
    /// Returns the number of entries retained. Chunks left without live
    /// entries are freed.
    pub fn iterate<F>(&mut self, mut callback: F) -> usize
    where
        F: FnMut(SlotType, u32) -> SlotCallbackResult,
    {
        let mut retained = 0;
        self.chunks.retain_mut(|chunk| {
            let mut live = 0;
            for entry in chunk.iter_mut() {
                let Some((slot_type, offset)) = decode(*entry) else {
                    continue;
                };
                match callback(slot_type, offset) {
                    SlotCallbackResult::Keep => live += 1,
                    SlotCallbackResult::Remove => *entry = CLEARED,
                }
            }
            retained += live;
            live > 0
        });
        retained
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.chunks
            .iter()
            .flatten()
            .filter(|&&entry| decode(entry).is_some())
            .count()
    }

    /// Check if there are no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of chunks currently allocated.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}
