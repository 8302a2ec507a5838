#![allow(dead_code)]

use kernel_alloc::{HhdmPhysMapper, PageAllocator};
use kernel_memory_addresses::PhysicalAddress;
use std::alloc::{Layout, alloc_zeroed, dealloc};

pub const PAGE: u64 = 4096;

/// A page-aligned heap buffer posing as physical memory starting at 0.
pub struct Arena {
    base: *mut u8,
    layout: Layout,
}

impl Arena {
    pub fn new(pages: usize) -> Self {
        let layout = Layout::from_size_align(pages * PAGE as usize, PAGE as usize).unwrap();
        let base = unsafe { alloc_zeroed(layout) };
        assert!(!base.is_null());
        Self { base, layout }
    }

    pub fn mapper(&self) -> HhdmPhysMapper {
        HhdmPhysMapper::new(self.base as u64)
    }

    pub fn pages(&self) -> u64 {
        self.layout.size() as u64 / PAGE
    }

    /// An allocator that owns nothing yet.
    pub fn empty_allocator(&self) -> PageAllocator<HhdmPhysMapper> {
        PageAllocator::new(self.mapper())
    }

    /// An allocator that owns the whole arena as a single run.
    pub fn allocator(&self) -> PageAllocator<HhdmPhysMapper> {
        let pages = self.empty_allocator();
        unsafe { pages.import_region(PhysicalAddress::zero(), self.pages()) };
        pages
    }

    /// Whether `ptr..ptr+len` lies inside the arena.
    pub fn contains(&self, ptr: *const u8, len: usize) -> bool {
        let start = self.base as usize;
        let end = start + self.layout.size();
        (ptr as usize) >= start && (ptr as usize) + len <= end
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        unsafe { dealloc(self.base, self.layout) }
    }
}

pub fn pa(v: u64) -> PhysicalAddress {
    PhysicalAddress::new(v)
}

/// Free runs as `(base, pages)`, lowest first.
pub fn runs(pages: &PageAllocator<HhdmPhysMapper>) -> Vec<(u64, u64)> {
    let mut out = Vec::new();
    pages.visit_regions(|r| out.push((r.base.as_u64(), r.pages)));
    out
}
