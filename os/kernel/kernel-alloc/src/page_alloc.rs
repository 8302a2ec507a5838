//! # Physical Page Allocator
//!
//! Hands out runs of contiguous 4 KiB pages from an address-ordered list of
//! free runs ([`FreeRegionList`]). The list nodes live inside the free memory
//! itself, so the allocator needs no storage of its own.
//!
//! ## Allocation
//! The list is scanned from the **highest** run downward. The first run that
//! is large enough and whose first `count` pages lie at or below the caller's
//! ceiling is used, and pages are carved from the **top** of the part of
//! that run below the ceiling:
//!
//! ```text
//!  run:  |<----------------------- pages ------------------------->|
//!        |<------ bottom ------>|<-- count -->|<--- above max ---->|
//!        ^ base                 ^ returned    ^ max + 1 (rounded)
//! ```
//!
//! Whatever lies above the ceiling becomes a run of its own, whatever lies
//! below the returned pages stays in the original node. Low memory is
//! therefore consumed last, which keeps it around for DMA-limited callers.
//!
//! ## Freeing
//! A freed run is linked in address order and merged with a predecessor that
//! ends exactly at its base and a successor that starts exactly at its end.
//! Frees that would overlap an existing free run are refused and logged.

use crate::PageSource;
use crate::free_list::{FreeRegionList, Region};
use crate::phys_mapper::PhysMapper;
use core::ptr::NonNull;
use kernel_info::boot::MemoryMapEntry;
use kernel_memory_addresses::{PageSize, PhysicalAddress, Size4K, bytes_for_pages};
use kernel_sync::SpinMutex;
use log::{debug, error, info, trace};

/// What [`PageAllocator::import_memory_map`] added to the allocator.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ImportSummary {
    /// Usable entries that contributed at least one page.
    pub regions: usize,
    /// Total bytes added, in whole pages.
    pub bytes: u64,
}

impl ImportSummary {
    #[must_use]
    pub const fn pages(&self) -> u64 {
        self.bytes >> Size4K::SHIFT
    }
}

/// Physical page allocator over a [`FreeRegionList`].
///
/// All list manipulation happens under an internal spin lock; the allocator
/// can be shared freely between CPUs.
pub struct PageAllocator<M: PhysMapper> {
    mapper: M,
    regions: SpinMutex<FreeRegionList>,
}

impl<M: PhysMapper> PageAllocator<M> {
    /// An allocator with no free memory. Feed it with
    /// [`import_memory_map`](Self::import_memory_map) or
    /// [`import_region`](Self::import_region).
    #[must_use]
    pub const fn new(mapper: M) -> Self {
        Self {
            mapper,
            regions: SpinMutex::new(FreeRegionList::new()),
        }
    }

    /// The mapper through which free runs are accessed.
    #[must_use]
    pub const fn mapper(&self) -> &M {
        &self.mapper
    }

    /// Allocates `count` contiguous pages anywhere in physical memory.
    ///
    /// Returns the page-aligned physical base, or `None` if `count` is zero
    /// or no free run is large enough.
    pub fn allocate(&self, count: u64) -> Option<PhysicalAddress> {
        self.allocate_below(count, u64::MAX)
    }

    /// Allocates `count` contiguous pages whose last byte is at or below
    /// `max_address`.
    pub fn allocate_below(&self, count: u64, max_address: u64) -> Option<PhysicalAddress> {
        if count == 0 {
            return None;
        }
        let span = count.checked_mul(Size4K::SIZE)?;
        let m = &self.mapper;
        let mut regions = self.regions.lock();

        let mut cursor = regions.last();
        while let Some(node) = cursor {
            // SAFETY: `node` came from the list and the lock is held.
            let pages = unsafe { regions.pages(m, node) };
            let fits = pages >= count
                && node
                    .as_u64()
                    .checked_add(span - 1)
                    .is_some_and(|last| last <= max_address);
            if fits {
                // SAFETY: as above; `carve` keeps the list ordered.
                let base = unsafe { Self::carve(&mut regions, m, node, pages, count, max_address) };
                trace!("allocated {count} page(s) at {base:#x} (max {max_address:#x})");
                return Some(base);
            }
            cursor = unsafe { regions.prev(m, node) };
        }

        debug!("no run of {count} free page(s) at or below {max_address:#x}");
        None
    }

    /// Takes `count` pages off the top of the part of `node` that lies at
    /// or below `max_address`.
    ///
    /// # Safety
    /// `node` must be a listed run of `pages >= count` pages whose first
    /// `count` pages end at or below `max_address`.
    unsafe fn carve(
        regions: &mut FreeRegionList,
        m: &M,
        node: PhysicalAddress,
        pages: u64,
        count: u64,
        max_address: u64,
    ) -> PhysicalAddress {
        let reachable = (u128::from(max_address) + 1 - u128::from(node.as_u64())) >> Size4K::SHIFT;
        let top = u64::try_from(reachable).map_or(pages, |r| r.min(pages));

        unsafe {
            if top < pages {
                regions.insert_after(m, node, node.add_pages::<Size4K>(top), pages - top);
            }

            let bottom = top - count;
            if bottom > 0 {
                regions.set_pages(m, node, bottom);
            } else {
                regions.remove(m, node);
            }
            node.add_pages::<Size4K>(bottom)
        }
    }

    /// Returns `count` pages starting at `base` to the allocator.
    ///
    /// A zero `count` is ignored. A run that overlaps memory already on the
    /// free list is refused with an error log; the list is left unchanged.
    ///
    /// # Safety
    /// `[base, base + count * 4096)` must be page aligned, mapped through
    /// the allocator's mapper, and no longer in use. Normally it is a run
    /// earlier returned by [`allocate`](Self::allocate).
    pub unsafe fn free(&self, base: PhysicalAddress, count: u64) {
        if count == 0 {
            return;
        }
        debug_assert!(base.is_aligned::<Size4K>(), "unaligned free at {base:#x}");

        let Some(end) = count
            .checked_mul(Size4K::SIZE)
            .and_then(|bytes| base.checked_add(bytes))
        else {
            error!("refusing to free {count} page(s) at {base:#x}: run wraps the address space");
            return;
        };

        let m = &self.mapper;
        let mut regions = self.regions.lock();

        unsafe {
            let mut next = regions.first();
            while let Some(n) = next {
                if n > base {
                    break;
                }
                next = regions.next(m, n);
            }
            let prev = match next {
                Some(n) => regions.prev(m, n),
                None => regions.last(),
            };

            if let Some(p) = prev
                && p.add_pages::<Size4K>(regions.pages(m, p)) > base
            {
                error!("refusing to free {count} page(s) at {base:#x}: overlaps free run at {p:#x}");
                return;
            }
            if let Some(n) = next
                && end > n
            {
                error!("refusing to free {count} page(s) at {base:#x}: overlaps free run at {n:#x}");
                return;
            }

            regions.insert_before(m, next, base, count);
            let merged = match prev {
                Some(p) => Self::merge_with_next(&mut regions, m, p),
                None => base,
            };
            Self::merge_with_next(&mut regions, m, merged);
        }
        trace!("freed {count} page(s) at {base:#x}");
    }

    /// Absorbs the successor of `node` if it starts where `node` ends.
    ///
    /// Returns the node that now ends the merged run: `node` if it absorbed
    /// its successor, otherwise the successor (or `node` if there is none).
    unsafe fn merge_with_next(
        regions: &mut FreeRegionList,
        m: &M,
        node: PhysicalAddress,
    ) -> PhysicalAddress {
        unsafe {
            let Some(next) = regions.next(m, node) else {
                return node;
            };
            let pages = regions.pages(m, node);
            if node.add_pages::<Size4K>(pages) != next {
                return next;
            }
            let merged = pages + regions.pages(m, next);
            regions.remove(m, next);
            regions.set_pages(m, node, merged);
            node
        }
    }

    /// Adds a run of free pages, merging it with adjacent runs.
    ///
    /// # Safety
    /// Same as [`free`](Self::free).
    pub unsafe fn import_region(&self, base: PhysicalAddress, pages: u64) {
        unsafe { self.free(base, pages) }
    }

    /// Adds every usable entry of a boot memory map.
    ///
    /// Each entry is logged. Usable entries are shrunk to whole pages (base
    /// rounded up, end rounded down); entries that do not cover a single
    /// whole page, and all non-usable entries, are skipped.
    ///
    /// # Safety
    /// Every usable entry must describe memory that is actually unused and
    /// reachable through the allocator's mapper.
    pub unsafe fn import_memory_map(&self, entries: &[MemoryMapEntry]) -> ImportSummary {
        info!("Initializing memory map:");
        let mut summary = ImportSummary::default();

        for entry in entries {
            info!("\t{entry}");
            if !entry.kind.is_usable() {
                continue;
            }

            let start = PhysicalAddress::new(entry.base).align_up::<Size4K>();
            let end = PhysicalAddress::new(entry.end()).align_down::<Size4K>();
            if end <= start {
                debug!("\tskipping {entry}: no whole page");
                continue;
            }

            let pages = start.pages_until::<Size4K>(end);
            unsafe { self.import_region(start, pages) };
            summary.regions += 1;
            summary.bytes += bytes_for_pages::<Size4K>(pages);
        }

        info!("Total memory map size: {}", summary.bytes);
        summary
    }

    /// Sum of all free pages.
    pub fn free_page_count(&self) -> u64 {
        let regions = self.regions.lock();
        regions.iter(&self.mapper).map(|r| r.pages).sum()
    }

    /// Number of disjoint free runs.
    pub fn region_count(&self) -> usize {
        self.regions.lock().len()
    }

    /// Calls `f` for every free run, lowest address first, with the lock held.
    ///
    /// `f` must not call back into this allocator.
    pub fn visit_regions(&self, mut f: impl FnMut(Region)) {
        let regions = self.regions.lock();
        for region in regions.iter(&self.mapper) {
            f(region);
        }
    }
}

impl<M: PhysMapper> PageSource for PageAllocator<M> {
    fn allocate_pages(&self, count: u64) -> Option<NonNull<u8>> {
        let base = self.allocate(count)?;
        NonNull::new(self.mapper.phys_to_virt(base))
    }

    unsafe fn free_pages(&self, ptr: NonNull<u8>, count: u64) {
        let base = self.mapper.virt_to_phys(ptr.as_ptr());
        unsafe { self.free(base, count) }
    }
}
