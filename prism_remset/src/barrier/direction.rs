//! Pointer directions a remembered set can track.
//!
//! The direction is a type parameter of [`RememberedSet`](super::RememberedSet),
//! so direction-specific operations only exist on the matching type.

use crate::heap::{RegionScope, SlotTable};

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::OldToOld {}
    impl Sealed for super::OldToNew {}
}

/// A tracked pointer direction.
pub trait PointerDirection: sealed::Sealed + 'static {
    /// Per-region table this direction records into.
    const TABLE: SlotTable;
    /// Regions an untyped scan visits.
    const SCAN_SCOPE: RegionScope;
    /// Name used in logs.
    const NAME: &'static str;
}

/// Slots in old regions pointing into evacuation candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OldToOld {}

/// Slots in old regions pointing into the young generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OldToNew {}

impl PointerDirection for OldToOld {
    const TABLE: SlotTable = SlotTable::OldToOld;
    const SCAN_SCOPE: RegionScope = RegionScope::All;
    const NAME: &'static str = "old_to_old";
}

impl PointerDirection for OldToNew {
    const TABLE: SlotTable = SlotTable::OldToNew;
    // Code regions never hold young-generation pointers.
    const SCAN_SCOPE: RegionScope = RegionScope::AllButCode;
    const NAME: &'static str = "old_to_new";
}
