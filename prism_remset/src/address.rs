//! Machine addresses inside the managed heap.
//!
//! `Address` is a plain word-sized value. Tables never store addresses
//! directly: they store offsets relative to the region that owns the slot,
//! and only turn them back into addresses while that region is in hand.

use std::fmt;

/// Size of a machine word (and of a pointer slot) in bytes.
pub const WORD_SIZE: usize = std::mem::size_of::<usize>();

/// Log2 of [`WORD_SIZE`].
pub const WORD_SIZE_LOG2: u32 = WORD_SIZE.trailing_zeros();

/// A machine address.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(usize);

impl Address {
    /// The null address.
    pub const NULL: Address = Address(0);

    /// Wrap a raw address value.
    #[inline]
    pub const fn new(raw: usize) -> Self {
        Address(raw)
    }

    /// Address of a raw pointer.
    #[inline]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Address(ptr as usize)
    }

    /// Raw address value.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Check for the null address.
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Address `bytes` past this one.
    #[inline]
    pub const fn add(self, bytes: usize) -> Address {
        Address(self.0 + bytes)
    }

    /// Byte distance from `base` to this address.
    ///
    /// `base` must not be above `self`.
    #[inline]
    pub fn offset_from(self, base: Address) -> usize {
        debug_assert!(self.0 >= base.0, "{self:?} is below base {base:?}");
        self.0 - base.0
    }

    /// Round down to a multiple of `align` (a power of two).
    #[inline]
    pub const fn align_down(self, align: usize) -> Address {
        Address(self.0 & !(align - 1))
    }

    /// Check alignment to `align` (a power of two).
    #[inline]
    pub const fn is_aligned(self, align: usize) -> bool {
        self.0 & (align - 1) == 0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({:#x})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<usize> for Address {
    #[inline]
    fn from(raw: usize) -> Self {
        Address(raw)
    }
}

impl From<Address> for usize {
    #[inline]
    fn from(addr: Address) -> Self {
        addr.0
    }
}
