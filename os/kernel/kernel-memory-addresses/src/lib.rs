//! # Physical Memory Address Types
//!
//! Strongly typed wrappers for physical addresses and page arithmetic used by
//! the page and pool allocators.
//!
//! ## Overview
//!
//! | Concept | Description |
//! |---------|-------------|
//! | [`PhysicalAddress`] | A raw 64-bit physical address (RAM or MMIO). |
//! | [`PageSize`] | Marker trait carrying the page [`SIZE`](PageSize::SIZE) and [`SHIFT`](PageSize::SHIFT). |
//! | [`Size4K`] | The 4 KiB base page frame managed by the page allocator. |
//!
//! Page counts are plain `u64` values; [`pages_for_bytes`] and
//! [`bytes_for_pages`] convert between byte lengths and page counts.
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let pa = PhysicalAddress::new(0x0010_2042);
//! assert_eq!(pa.align_down::<Size4K>().as_u64(), 0x0010_2000);
//! assert_eq!(pa.align_up::<Size4K>().as_u64(), 0x0010_3000);
//! assert_eq!(pages_for_bytes::<Size4K>(4097), 2);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

use core::fmt;
use core::hash::Hash;
use core::ops::{Add, AddAssign};

/// Sealed trait pattern to restrict `PageSize` impls to our markers.
mod sealed {
    pub trait Sealed {}
}

/// Marker trait for supported page sizes.
pub trait PageSize:
    sealed::Sealed + Clone + Copy + Eq + PartialEq + Ord + PartialOrd + Hash + fmt::Debug
{
    /// Page size in bytes (power of two).
    const SIZE: u64;
    /// log2(SIZE), i.e., number of low bits used for the offset.
    const SHIFT: u32;
    /// Mask selecting the in-page offset bits.
    const MASK: u64 = Self::SIZE - 1;
}

/// 4 KiB page (4096 bytes).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Size4K;
impl sealed::Sealed for Size4K {}
impl PageSize for Size4K {
    const SIZE: u64 = 4096;
    const SHIFT: u32 = 12;
}

/// Number of `S` pages needed to hold `bytes` bytes (rounded up).
#[inline]
#[must_use]
pub const fn pages_for_bytes<S: PageSize>(bytes: u64) -> u64 {
    (bytes >> S::SHIFT) + if bytes & S::MASK == 0 { 0 } else { 1 }
}

/// Number of bytes covered by `pages` pages of size `S`.
#[inline]
#[must_use]
pub const fn bytes_for_pages<S: PageSize>(pages: u64) -> u64 {
    pages << S::SHIFT
}

/// Physical memory address.
///
/// Carries intent: the allocators hand out and take back physical addresses,
/// and only a `PhysMapper` (see `kernel-alloc`) turns them into
/// dereferenceable pointers.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(u64);

impl PhysicalAddress {
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self::new(0)
    }

    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Whether the address sits on an `S` page boundary.
    #[inline]
    #[must_use]
    pub const fn is_aligned<S: PageSize>(self) -> bool {
        self.0 & S::MASK == 0
    }

    /// Align down to page boundary `S`.
    #[inline]
    #[must_use]
    pub const fn align_down<S: PageSize>(self) -> Self {
        Self(self.0 & !S::MASK)
    }

    /// Align up to page boundary `S`, saturating at the last page boundary
    /// of the address space.
    #[inline]
    #[must_use]
    pub const fn align_up<S: PageSize>(self) -> Self {
        match self.0.checked_add(S::MASK) {
            Some(v) => Self(v & !S::MASK),
            None => Self(u64::MAX & !S::MASK),
        }
    }

    /// The address `pages` pages of size `S` above this one.
    #[inline]
    #[must_use]
    pub const fn add_pages<S: PageSize>(self, pages: u64) -> Self {
        Self(self.0 + bytes_for_pages::<S>(pages))
    }

    /// Number of whole `S` pages between `self` and a higher address `end`.
    #[inline]
    #[must_use]
    pub const fn pages_until<S: PageSize>(self, end: Self) -> u64 {
        (end.0 - self.0) >> S::SHIFT
    }

    #[inline]
    #[must_use]
    pub const fn checked_add(self, rhs: u64) -> Option<Self> {
        match self.0.checked_add(rhs) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA(0x{:016X})", self.0)
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl fmt::LowerHex for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl From<u64> for PhysicalAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl From<PhysicalAddress> for u64 {
    #[inline]
    fn from(a: PhysicalAddress) -> Self {
        a.as_u64()
    }
}

impl Add<u64> for PhysicalAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<u64> for PhysicalAddress {
    #[inline]
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}
