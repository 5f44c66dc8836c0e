//! Slot recording buffer for relocation passes.
//!
//! A relocation task appends the slots it touches here instead of writing
//! into shared remembered-set tables, then drains the buffer once the pass
//! is over. Appends are bump allocation into the head node; a full head is
//! never resized, a fresh node is chained in front of it:
//!
//! ```text
//! head -> [e e e e e . .] -> [e e e e e e e] -> [e e e e e e e]
//!          newest                                oldest
//! ```
//!
//! Capacity is counted in words. An untyped entry costs one word, a typed
//! entry two (tag plus address), and a typed entry never straddles nodes.

use super::remembered_set::OldToOldRememberedSet;
use crate::address::Address;
use crate::config::RemsetConfig;
use crate::heap::RegionLookup;
use crate::slots::SlotType;

use tracing::{debug, warn};

/// Default node capacity in words.
pub const DEFAULT_NODE_CAPACITY: usize = 16 * 1024;

/// One recorded slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordedSlot {
    /// A plain pointer slot.
    Untyped(Address),
    /// A slot whose pointer is embedded in a non-trivial encoding.
    Typed(SlotType, Address),
}

impl RecordedSlot {
    /// Slot address.
    #[inline]
    pub fn address(self) -> Address {
        match self {
            RecordedSlot::Untyped(addr) | RecordedSlot::Typed(_, addr) => addr,
        }
    }

    #[inline]
    fn words(self) -> usize {
        match self {
            RecordedSlot::Untyped(_) => 1,
            RecordedSlot::Typed(..) => 2,
        }
    }
}

/// Fixed-capacity node of the chain.
struct Node {
    entries: Vec<RecordedSlot>,
    words: usize,
}

impl Node {
    fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            words: 0,
        }
    }

    #[inline]
    fn has_room(&self, words: usize, capacity: usize) -> bool {
        self.words + words <= capacity
    }
}

/// Counts from draining a buffer into the remembered sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    /// Untyped slots inserted.
    pub untyped: usize,
    /// Typed slots inserted.
    pub typed: usize,
    /// Entries whose region could not be resolved.
    pub unresolved: usize,
}

/// Append-only log of slots recorded during one relocation pass.
///
/// Owned by a single relocation task. Concurrent tasks use one buffer each.
pub struct SlotRecordingBuffer {
    /// Node chain; the last node is the head.
    nodes: Vec<Node>,
    node_capacity: usize,
    len: usize,
}

impl SlotRecordingBuffer {
    /// Create an empty buffer with nodes of `node_capacity` words.
    pub fn new(node_capacity: usize) -> Self {
        debug_assert!(node_capacity >= 2, "a typed entry must fit in one node");
        Self {
            nodes: Vec::new(),
            node_capacity,
            len: 0,
        }
    }

    /// Create an empty buffer sized by the configuration.
    pub fn with_config(config: &RemsetConfig) -> Self {
        Self::new(config.recording_node_capacity)
    }

    /// Record an untyped slot.
    #[inline]
    pub fn record(&mut self, slot: Address) {
        self.push(RecordedSlot::Untyped(slot));
    }

    /// Record a typed slot. The pair is appended as one entry.
    #[inline]
    pub fn record_typed(&mut self, slot_type: SlotType, slot: Address) {
        self.push(RecordedSlot::Typed(slot_type, slot));
    }

    fn push(&mut self, entry: RecordedSlot) {
        // Addresses this small cannot be heap slots.
        debug_assert!(
            entry.address().as_usize() >= SlotType::COUNT,
            "bogus slot address {:?}",
            entry.address()
        );
        let words = entry.words();
        let capacity = self.node_capacity;
        if !self.nodes.last().is_some_and(|head| head.has_room(words, capacity)) {
            self.nodes.push(Node::new(capacity));
        }
        if let Some(head) = self.nodes.last_mut() {
            head.entries.push(entry);
            head.words += words;
            self.len += 1;
        }
    }

    /// Iterate every entry, newest node first.
    ///
    /// Order within a node is insertion order. Order across nodes is not.
    pub fn entries(&self) -> impl Iterator<Item = RecordedSlot> + '_ {
        self.nodes
            .iter()
            .rev()
            .flat_map(|node| node.entries.iter().copied())
    }

    /// Dispatch every entry to `untyped` or `typed`.
    pub fn iterate<U, T>(&self, mut untyped: U, mut typed: T)
    where
        U: FnMut(Address),
        T: FnMut(SlotType, Address),
    {
        for entry in self.entries() {
            match entry {
                RecordedSlot::Untyped(slot) => untyped(slot),
                RecordedSlot::Typed(slot_type, slot) => typed(slot_type, slot),
            }
        }
    }

    /// Insert every entry into the old-to-old remembered sets of its region.
    ///
    /// Entries outside any region, and typed entries in regions typed scans
    /// skip, are counted as unresolved and dropped.
    pub fn drain_into_old_to_old<L>(self, regions: &mut L) -> DrainSummary
    where
        L: RegionLookup + ?Sized,
    {
        let mut summary = DrainSummary::default();
        for entry in self.entries() {
            let Some(region) = regions.region_containing_mut(entry.address()) else {
                summary.unresolved += 1;
                continue;
            };
            match entry {
                RecordedSlot::Untyped(slot) => {
                    OldToOldRememberedSet::insert(region, slot);
                    summary.untyped += 1;
                }
                RecordedSlot::Typed(_, _) if !OldToOldRememberedSet::records_typed_into(region) => {
                    summary.unresolved += 1;
                }
                RecordedSlot::Typed(slot_type, slot) => {
                    OldToOldRememberedSet::insert_typed(region, slot_type, slot);
                    summary.typed += 1;
                }
            }
        }

        if summary.unresolved > 0 {
            warn!(
                unresolved = summary.unresolved,
                "dropped recorded slots outside scanned regions"
            );
        }
        debug!(
            untyped = summary.untyped,
            typed = summary.typed,
            nodes = self.nodes.len(),
            "drained slot recording buffer"
        );
        summary
    }

    /// Number of recorded entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if nothing has been recorded.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of nodes in the chain.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Node capacity in words.
    #[inline]
    pub fn node_capacity(&self) -> usize {
        self.node_capacity
    }
}

impl Default for SlotRecordingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_NODE_CAPACITY)
    }
}
