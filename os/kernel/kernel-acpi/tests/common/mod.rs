#![allow(dead_code)]

use kernel_alloc::{HhdmPhysMapper, PageAllocator, PoolAllocator};
use kernel_memory_addresses::PhysicalAddress;
use kernel_sync::Clock;
use kernel_sync::irq::{InterruptControl, InterruptState};
use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

pub const PAGE: usize = 4096;

/// A page-aligned heap buffer posing as physical memory starting at 0.
pub struct Arena {
    base: *mut u8,
    layout: Layout,
}

impl Arena {
    pub fn new(pages: usize) -> Self {
        let layout = Layout::from_size_align(pages * PAGE, PAGE).unwrap();
        let base = unsafe { alloc_zeroed(layout) };
        assert!(!base.is_null());
        Self { base, layout }
    }

    pub fn base(&self) -> *mut u8 {
        self.base
    }

    /// A page allocator owning the whole arena.
    pub fn allocator(&self) -> PageAllocator<HhdmPhysMapper> {
        let pages = PageAllocator::new(HhdmPhysMapper::new(self.base as u64));
        let count = (self.layout.size() / PAGE) as u64;
        unsafe { pages.import_region(PhysicalAddress::zero(), count) };
        pages
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        unsafe { dealloc(self.base, self.layout) }
    }
}

pub type Pool<'a> = PoolAllocator<&'a PageAllocator<HhdmPhysMapper>>;

/// 100 ns ticks since construction; yields the thread between polls.
pub struct HostClock {
    start: Instant,
}

impl HostClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for HostClock {
    fn ticks(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_nanos() / 100).unwrap()
    }

    fn relax(&self) {
        std::thread::yield_now();
    }
}

/// Records the interrupt flag of a pretend CPU; halting panics.
pub struct FakeCpu {
    enabled: AtomicBool,
}

impl FakeCpu {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
        }
    }

    pub fn interrupts_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

impl InterruptControl for FakeCpu {
    fn save_and_disable(&self) -> InterruptState {
        let was = self.enabled.swap(false, Ordering::SeqCst);
        InterruptState::new().with_interrupts_enabled(was)
    }

    fn restore(&self, state: InterruptState) {
        if state.interrupts_enabled() {
            self.enabled.store(true, Ordering::SeqCst);
        }
    }

    fn halt(&self) -> ! {
        panic!("cpu halted");
    }
}
