//! Semi-space young generation.
//!
//! The new space has two halves:
//! - from-space: objects allocated since the last scavenge
//! - to-space: evacuation target during a scavenge
//!
//! A scavenge copies live from-space objects into to-space, then the halves
//! swap roles. Allocation is bump-pointer in either half:
//! ```text
//! alloc_ptr += size;
//! return alloc_ptr - size;
//! ```

use crate::address::{Address, WORD_SIZE};
use crate::error::HeapError;

use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicPtr, Ordering};

/// Membership queries on the young generation.
///
/// This is all the old-to-new evacuation wrapper needs from the heap.
pub trait YoungGeneration {
    /// Check if an address lies in the half being evacuated.
    fn in_from_space(&self, addr: Address) -> bool;

    /// Check if an address lies in the evacuation target half.
    fn in_to_space(&self, addr: Address) -> bool;

    /// Check if an address lies anywhere in the young generation.
    fn in_new_space(&self, addr: Address) -> bool {
        self.in_from_space(addr) || self.in_to_space(addr)
    }
}

/// One half of the new space.
struct SemiSpace {
    start: *mut u8,
    end: *mut u8,
    alloc_ptr: AtomicPtr<u8>,
    layout: Layout,
}

impl SemiSpace {
    fn new(size: usize) -> Result<Self, HeapError> {
        let layout = Layout::from_size_align(size, WORD_SIZE)
            .map_err(|_| HeapError::RegionAllocation { size })?;

        // SAFETY: size is validated non-zero by the configuration.
        let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
        if ptr.is_null() {
            return Err(HeapError::RegionAllocation { size });
        }

        // SAFETY: the allocation is `size` bytes long.
        let end = unsafe { ptr.add(size) };

        Ok(Self {
            start: ptr,
            end,
            alloc_ptr: AtomicPtr::new(ptr),
            layout,
        })
    }

    /// Try to allocate `size` bytes.
    #[inline]
    fn alloc(&self, size: usize) -> Option<NonNull<u8>> {
        loop {
            let current = self.alloc_ptr.load(Ordering::Relaxed);
            if (self.end as usize) - (current as usize) < size {
                return None; // Space exhausted
            }
            // SAFETY: checked above that `size` bytes remain.
            let new_ptr = unsafe { current.add(size) };

            if self
                .alloc_ptr
                .compare_exchange_weak(current, new_ptr, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return NonNull::new(current);
            }
        }
    }

    #[inline]
    fn contains(&self, addr: Address) -> bool {
        let addr = addr.as_usize();
        addr >= self.start as usize && addr < self.end as usize
    }

    #[inline]
    fn allocated(&self) -> usize {
        let current = self.alloc_ptr.load(Ordering::Relaxed);
        (current as usize).saturating_sub(self.start as usize)
    }

    fn reset(&self) {
        self.alloc_ptr.store(self.start, Ordering::Release);

        #[cfg(debug_assertions)]
        // SAFETY: the whole space is owned by us and no longer referenced.
        unsafe {
            std::ptr::write_bytes(self.start, 0, self.layout.size());
        }
    }
}

impl Drop for SemiSpace {
    fn drop(&mut self) {
        // SAFETY: allocated in `new` with this exact layout.
        unsafe { std::alloc::dealloc(self.start, self.layout) }
    }
}

// Safety: the bump pointer is atomic and the memory is exclusively owned.
unsafe impl Send for SemiSpace {}
unsafe impl Sync for SemiSpace {}

/// Young generation with semi-space copying collection.
pub struct NewSpace {
    from_space: SemiSpace,
    to_space: SemiSpace,
    size: usize,
}

impl NewSpace {
    /// Create a new space with two semi-spaces of `size` bytes.
    pub fn new(size: usize) -> Result<Self, HeapError> {
        Ok(Self {
            from_space: SemiSpace::new(size)?,
            to_space: SemiSpace::new(size)?,
            size,
        })
    }

    /// Allocate in from-space (mutator allocation).
    #[inline]
    pub fn alloc(&self, size: usize) -> Option<Address> {
        self.from_space.alloc(size).map(|p| Address::from_ptr(p.as_ptr()))
    }

    /// Allocate in to-space (evacuation during a scavenge).
    #[inline]
    pub fn alloc_to_space(&self, size: usize) -> Option<Address> {
        self.to_space.alloc(size).map(|p| Address::from_ptr(p.as_ptr()))
    }

    /// Bytes allocated in from-space.
    #[inline]
    pub fn allocated(&self) -> usize {
        self.from_space.allocated()
    }

    /// Bytes evacuated into to-space so far.
    #[inline]
    pub fn evacuated(&self) -> usize {
        self.to_space.allocated()
    }

    /// Size of each semi-space.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Swap halves after a scavenge.
    ///
    /// To-space (holding survivors) becomes from-space; the old from-space
    /// is reset and becomes the next to-space.
    pub fn swap_spaces(&mut self) {
        self.from_space.reset();
        std::mem::swap(&mut self.from_space, &mut self.to_space);
    }
}

impl YoungGeneration for NewSpace {
    #[inline]
    fn in_from_space(&self, addr: Address) -> bool {
        self.from_space.contains(addr)
    }

    #[inline]
    fn in_to_space(&self, addr: Address) -> bool {
        self.to_space.contains(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_space_creation() {
        let space = NewSpace::new(4096).expect("Failed to create new space");
        assert_eq!(space.size(), 4096);
        assert_eq!(space.allocated(), 0);
    }

    #[test]
    fn test_bump_allocation() {
        let space = NewSpace::new(4096).expect("Failed to create new space");
        let a = space.alloc(64).expect("Alloc 1 failed");
        let b = space.alloc(64).expect("Alloc 2 failed");
        assert_eq!(b.offset_from(a), 64);
        assert_eq!(space.allocated(), 128);
    }

    #[test]
    fn test_exhaustion() {
        let space = NewSpace::new(128).expect("Failed to create new space");
        assert!(space.alloc(64).is_some());
        assert!(space.alloc(64).is_some());
        assert!(space.alloc(8).is_none());
    }

    #[test]
    fn test_membership() {
        let space = NewSpace::new(4096).expect("Failed to create new space");
        let young = space.alloc(32).expect("Alloc failed");
        let survivor = space.alloc_to_space(32).expect("ToSpace alloc failed");

        assert!(space.in_from_space(young));
        assert!(!space.in_to_space(young));
        assert!(space.in_to_space(survivor));
        assert!(space.in_new_space(survivor));
        assert!(!space.in_new_space(Address::new(0x10)));
    }

    #[test]
    fn test_swap() {
        let mut space = NewSpace::new(4096).expect("Failed to create new space");
        let survivor = space.alloc_to_space(32).expect("ToSpace alloc failed");
        space.swap_spaces();
        assert!(space.in_from_space(survivor));
        assert_eq!(space.evacuated(), 0);
    }
}
