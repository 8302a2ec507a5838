//! # Kernel-wide allocator instances
//!
//! The kernel owns exactly one [`PageAllocator`] and one [`PoolAllocator`]
//! on top of it. Both are published through [`init`] once the boot memory
//! map and the HHDM offset are known; until then [`pages`] and [`pool`]
//! return `None` and [`KernelHeap`] fails every allocation.

use crate::page_alloc::{ImportSummary, PageAllocator};
use crate::phys_mapper::HhdmPhysMapper;
use crate::pool::PoolAllocator;
use core::alloc::{GlobalAlloc, Layout};
use core::ptr;
use kernel_info::boot::MemoryMapEntry;
use kernel_sync::SyncOnceCell;
use log::info;

pub type KernelPageAllocator = PageAllocator<HhdmPhysMapper>;
pub type KernelPool = PoolAllocator<&'static KernelPageAllocator>;

static PAGES: SyncOnceCell<KernelPageAllocator> = SyncOnceCell::new();
static POOL: SyncOnceCell<KernelPool> = SyncOnceCell::new();

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum InitError {
    #[error("kernel allocators are already initialized")]
    AlreadyInitialized,
}

/// Creates the kernel allocators and feeds them the boot memory map.
///
/// # Errors
/// [`InitError::AlreadyInitialized`] on every call after the first.
///
/// # Safety
/// - Physical memory must be mapped at `hhdm_offset`.
/// - Every usable entry in `entries` must be unused memory.
pub unsafe fn init(
    hhdm_offset: u64,
    entries: &[MemoryMapEntry],
) -> Result<ImportSummary, InitError> {
    let pages = PAGES
        .set(PageAllocator::new(HhdmPhysMapper::new(hhdm_offset)))
        .map_err(|_| InitError::AlreadyInitialized)?;
    let summary = unsafe { pages.import_memory_map(entries) };
    POOL.set(PoolAllocator::new(pages))
        .map_err(|_| InitError::AlreadyInitialized)?;

    info!(
        "kernel allocators ready: {} page(s) in {} region(s)",
        summary.pages(),
        summary.regions
    );
    Ok(summary)
}

/// The kernel page allocator, once [`init`] has run.
#[must_use]
pub fn pages() -> Option<&'static KernelPageAllocator> {
    PAGES.get()
}

/// The kernel pool allocator, once [`init`] has run.
#[must_use]
pub fn pool() -> Option<&'static KernelPool> {
    POOL.get()
}

/// [`GlobalAlloc`] front for the kernel pool, suitable for
/// `#[global_allocator]`.
pub struct KernelHeap;

unsafe impl GlobalAlloc for KernelHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        match pool() {
            Some(pool) => unsafe { pool.alloc(layout) },
            None => ptr::null_mut(),
        }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        match pool() {
            Some(pool) => unsafe { pool.alloc_zeroed(layout) },
            None => ptr::null_mut(),
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if let Some(pool) = pool() {
            unsafe { pool.dealloc(ptr, layout) }
        }
    }
}
