//! Per-region slot containers.
//!
//! - [`SlotSet`] / [`SlotSetArray`]: bitmap of word-aligned raw pointer slots
//! - [`TypedSlotSet`]: tagged slots embedded in generated code

mod slot_set;
mod typed_slot_set;

pub use slot_set::{SlotSet, SlotSetArray, BITS_PER_BUCKET, BITS_PER_CELL, CELLS_PER_BUCKET};
pub use typed_slot_set::{SlotType, TypedSlotSet, TYPED_SLOT_MAX_OFFSET};

/// Verdict of a slot filtering callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotCallbackResult {
    /// Leave the slot recorded.
    Keep,
    /// Drop the slot from its table.
    Remove,
}

impl SlotCallbackResult {
    /// `Keep` when `keep` holds, `Remove` otherwise.
    #[inline]
    pub fn keep_if(keep: bool) -> Self {
        if keep {
            SlotCallbackResult::Keep
        } else {
            SlotCallbackResult::Remove
        }
    }
}
