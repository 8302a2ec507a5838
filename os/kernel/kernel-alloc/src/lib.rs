//! # Kernel Memory Allocation
//!
//! Physical page allocation and the small-object pool built on top of it.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Pool Allocator                      │
//! │    • 64 B .. 2 KiB power-of-two size classes        │
//! │    • 8-byte block header, lazy binary splitting     │
//! │    • page-backed blocks for anything larger         │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ PageSource
//! ┌─────────────────▼───────────────────────────────────┐
//! │                 Page Allocator                      │
//! │    • address-ordered list of free page runs         │
//! │    • carves from the top, optional max address      │
//! │    • merges neighbors on free                       │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ PhysMapper
//! ┌─────────────────▼───────────────────────────────────┐
//! │                 Physical Memory                     │
//! │    • reached through the HHDM                       │
//! │    • seeded from the boot memory map                │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Bookkeeping lives in the managed memory
//! Neither allocator owns storage. Free page runs carry their own list node
//! in their first bytes, free pool blocks carry their list
//! link behind the block header ([`pool`]). Everything the allocators touch
//! is therefore reached through a [`PhysMapper`], which is also what lets
//! the host tests run them over an ordinary heap buffer.
//!
//! ## Concurrency
//! Each allocator guards its lists with a [`kernel_sync::SpinMutex`]. When
//! a class runs dry, the pool asks for a page with its own lock held; the
//! page lock is taken and released entirely inside that nested call, so it
//! is never held when the pool returns. Lock order is always pool, then
//! pages: the page allocator never calls into the pool, and page-sized
//! allocations and frees go to the page allocator without the pool lock.
//!
//! ## Usage
//! ```
//! use kernel_alloc::{HhdmPhysMapper, PageAllocator, PoolAllocator};
//! use kernel_memory_addresses::PhysicalAddress;
//! use std::alloc::{Layout, alloc_zeroed, dealloc};
//!
//! let layout = Layout::from_size_align(16 * 4096, 4096).unwrap();
//! let arena = unsafe { alloc_zeroed(layout) };
//!
//! let pages = PageAllocator::new(HhdmPhysMapper::new(arena as u64));
//! unsafe { pages.import_region(PhysicalAddress::zero(), 16) };
//!
//! let pool = PoolAllocator::new(&pages);
//! let p = pool.allocate(100).unwrap();
//! unsafe { pool.free(p.as_ptr()) };
//!
//! unsafe { dealloc(arena, layout) };
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod free_list;
pub mod global;
pub mod page_alloc;
pub mod phys_mapper;
pub mod pool;

use core::ptr::NonNull;

pub use free_list::Region;
pub use page_alloc::{ImportSummary, PageAllocator};
pub use phys_mapper::{HhdmPhysMapper, PhysMapper};
pub use pool::PoolAllocator;

/// Whole pages, addressed through the current address space.
///
/// This is the interface the pool allocator consumes; [`PageAllocator`]
/// implements it by translating through its [`PhysMapper`].
pub trait PageSource {
    /// `count` contiguous pages, or `None` if exhausted.
    fn allocate_pages(&self, count: u64) -> Option<NonNull<u8>>;

    /// Gives back `count` pages at `ptr`.
    ///
    /// # Safety
    /// `ptr` and `count` must describe pages obtained from
    /// [`allocate_pages`](Self::allocate_pages) that are no longer used.
    unsafe fn free_pages(&self, ptr: NonNull<u8>, count: u64);
}

impl<P: PageSource + ?Sized> PageSource for &P {
    fn allocate_pages(&self, count: u64) -> Option<NonNull<u8>> {
        (**self).allocate_pages(count)
    }

    unsafe fn free_pages(&self, ptr: NonNull<u8>, count: u64) {
        unsafe { (**self).free_pages(ptr, count) }
    }
}
