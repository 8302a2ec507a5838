//! # Physical Memory Mapper
//!
//! The allocators track memory by **physical** address but have to write
//! bookkeeping into the memory itself (free-region nodes, pool headers). A
//! [`PhysMapper`] converts between the two views.
//!
//! ## HHDM
//! With a higher-half direct map every physical address `pa` is visible at
//! `offset + pa`. The bootloader picks the offset, so [`HhdmPhysMapper`]
//! takes it at construction. Host tests use the same type with the address
//! of a page-aligned buffer as offset, which makes that buffer appear as
//! physical memory starting at address zero.

use kernel_memory_addresses::PhysicalAddress;

/// Converts physical addresses to pointers in the current address space and back.
///
/// Implementations must be pure translations: `virt_to_phys(phys_to_virt(pa)) == pa`
/// for every address the allocators manage.
pub trait PhysMapper {
    /// A pointer through which `pa` can be accessed.
    ///
    /// Producing the pointer is safe; dereferencing it is only sound if the
    /// mapping actually covers `pa`.
    fn phys_to_virt<T>(&self, pa: PhysicalAddress) -> *mut T;

    /// The physical address behind a pointer produced by [`phys_to_virt`](Self::phys_to_virt).
    fn virt_to_phys<T>(&self, ptr: *const T) -> PhysicalAddress;
}

impl<M: PhysMapper + ?Sized> PhysMapper for &M {
    #[inline]
    fn phys_to_virt<T>(&self, pa: PhysicalAddress) -> *mut T {
        (**self).phys_to_virt(pa)
    }

    #[inline]
    fn virt_to_phys<T>(&self, ptr: *const T) -> PhysicalAddress {
        (**self).virt_to_phys(ptr)
    }
}

/// [`PhysMapper`] for kernels with a higher-half direct map (HHDM).
///
/// # Safety
/// - The HHDM mapping must be present and cover the referenced physical range.
/// - The returned pointer must only be used for valid, mapped, and writable memory.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct HhdmPhysMapper {
    offset: u64,
}

impl HhdmPhysMapper {
    #[must_use]
    pub const fn new(offset: u64) -> Self {
        Self { offset }
    }

    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }
}

impl PhysMapper for HhdmPhysMapper {
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    fn phys_to_virt<T>(&self, pa: PhysicalAddress) -> *mut T {
        self.offset.wrapping_add(pa.as_u64()) as usize as *mut T
    }

    #[inline]
    fn virt_to_phys<T>(&self, ptr: *const T) -> PhysicalAddress {
        PhysicalAddress::new((ptr as usize as u64).wrapping_sub(self.offset))
    }
}
