use crate::ServiceError;
use crate::firmware::FirmwareRequest;
use crate::handles::{EventHandle, Handle, MutexHandle, SpinlockHandle};
use crate::raw_memory::{self, AccessWidth};
use core::ptr::{self, NonNull};
use kernel_alloc::pool::POOL_ALIGN;
use kernel_alloc::{PageAllocator, PageSource, PhysMapper, PoolAllocator};
use kernel_memory_addresses::PhysicalAddress;
use kernel_sync::clock::{self, Clock, Timeout};
use kernel_sync::irq::{InterruptControl, InterruptState};
use kernel_sync::{Event, Spinlock, TimedMutex};
use log::{debug, error, trace};

/// Everything the firmware interpreter may ask of the kernel, bundled.
///
/// - `M` maps the physical memory the allocators and raw accessors touch,
/// - `C` is the tick source for timed waits,
/// - `I` masks interrupts for spinlocks and halts on fatal requests.
pub struct HostServices<'k, M: PhysMapper, C: Clock, I: InterruptControl> {
    pages: &'k PageAllocator<M>,
    pool: &'k PoolAllocator<&'k PageAllocator<M>>,
    clock: C,
    irq: I,
}

impl<'k, M: PhysMapper, C: Clock, I: InterruptControl> HostServices<'k, M, C, I> {
    #[must_use]
    pub const fn new(
        pages: &'k PageAllocator<M>,
        pool: &'k PoolAllocator<&'k PageAllocator<M>>,
        clock: C,
        irq: I,
    ) -> Self {
        Self {
            pages,
            pool,
            clock,
            irq,
        }
    }

    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    #[must_use]
    pub const fn interrupts(&self) -> &I {
        &self.irq
    }

    // Memory

    /// Pool allocation; `None` on exhaustion.
    pub fn alloc(&self, size: usize) -> Option<NonNull<u8>> {
        self.pool.allocate(size)
    }

    /// Zeroed pool allocation of `count * size` bytes; `None` on overflow
    /// or exhaustion.
    pub fn calloc(&self, count: usize, size: usize) -> Option<NonNull<u8>> {
        self.pool.allocate_zeroed(count, size)
    }

    /// # Safety
    /// `ptr` must be null or a live pointer from [`alloc`](Self::alloc) or
    /// [`calloc`](Self::calloc).
    pub unsafe fn free(&self, ptr: *mut u8) {
        unsafe { self.pool.free(ptr) }
    }

    // Pages

    pub fn alloc_pages(&self, count: u64) -> Option<NonNull<u8>> {
        self.pages.allocate_pages(count)
    }

    /// Pages whose last byte lies at or below `max_address`, for devices
    /// with a limited DMA reach such as
    /// [`ISA_DMA_LIMIT`](kernel_info::memory::ISA_DMA_LIMIT) or
    /// [`DMA32_LIMIT`](kernel_info::memory::DMA32_LIMIT).
    pub fn alloc_pages_below(&self, count: u64, max_address: u64) -> Option<NonNull<u8>> {
        let base = self.pages.allocate_below(count, max_address)?;
        NonNull::new(self.pages.mapper().phys_to_virt(base))
    }

    /// # Safety
    /// `ptr` and `count` must match an earlier page allocation.
    pub unsafe fn free_pages(&self, ptr: NonNull<u8>, count: u64) {
        unsafe { self.pages.free_pages(ptr, count) }
    }

    // Time

    /// Current tick count (100 ns units).
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.clock.ticks()
    }

    pub fn stall(&self, micros: u64) {
        clock::stall(&self.clock, micros);
    }

    pub fn sleep(&self, millis: u64) {
        clock::sleep(&self.clock, millis);
    }

    // Synchronization objects

    fn create<T>(&self, object: T) -> Result<Handle<'k, T>, ServiceError> {
        const { assert!(align_of::<T>() <= POOL_ALIGN) };
        let slot = self
            .pool
            .allocate(size_of::<T>())
            .ok_or(ServiceError::OutOfMemory)?
            .cast::<T>();
        // SAFETY: fresh, suitably aligned pool block of at least `size_of::<T>()` bytes.
        unsafe {
            slot.write(object);
            Ok(Handle::new(slot.as_ref()))
        }
    }

    unsafe fn destroy<T>(&self, handle: Handle<'k, T>) {
        let object = handle.as_ptr().cast_mut();
        unsafe {
            ptr::drop_in_place(object);
            self.pool.free(object.cast());
        }
    }

    /// # Errors
    /// [`ServiceError::OutOfMemory`] if the pool is exhausted.
    pub fn create_mutex(&self) -> Result<MutexHandle<'k>, ServiceError> {
        let handle = self.create(TimedMutex::new())?;
        trace!("created mutex {handle:?}");
        Ok(handle)
    }

    /// # Safety
    /// The mutex must be unlocked and no copy of `handle` may be used afterwards.
    pub unsafe fn destroy_mutex(&self, handle: MutexHandle<'k>) {
        unsafe { self.destroy(handle) }
    }

    /// Tries to take the mutex until `timeout` runs out.
    #[must_use]
    pub fn acquire_mutex(&self, handle: MutexHandle<'k>, timeout: Timeout) -> bool {
        handle.get().acquire(&self.clock, timeout)
    }

    /// # Safety
    /// The caller must hold the mutex.
    pub unsafe fn release_mutex(&self, handle: MutexHandle<'k>) {
        unsafe { handle.get().release() }
    }

    /// # Errors
    /// [`ServiceError::OutOfMemory`] if the pool is exhausted.
    pub fn create_spinlock(&self) -> Result<SpinlockHandle<'k>, ServiceError> {
        let handle = self.create(Spinlock::new())?;
        trace!("created spinlock {handle:?}");
        Ok(handle)
    }

    /// # Safety
    /// The lock must be released and no copy of `handle` may be used afterwards.
    pub unsafe fn destroy_spinlock(&self, handle: SpinlockHandle<'k>) {
        unsafe { self.destroy(handle) }
    }

    /// Masks interrupts and spins until the lock is taken.
    ///
    /// The returned state must be passed back to [`unlock_spinlock`](Self::unlock_spinlock).
    #[must_use]
    pub fn lock_spinlock(&self, handle: SpinlockHandle<'k>) -> InterruptState {
        handle.get().lock(&self.irq)
    }

    /// # Safety
    /// The caller must hold the lock, and `saved` must come from the matching
    /// [`lock_spinlock`](Self::lock_spinlock).
    pub unsafe fn unlock_spinlock(&self, handle: SpinlockHandle<'k>, saved: InterruptState) {
        unsafe { handle.get().unlock(&self.irq, saved) }
    }

    /// # Errors
    /// [`ServiceError::OutOfMemory`] if the pool is exhausted.
    pub fn create_event(&self) -> Result<EventHandle<'k>, ServiceError> {
        let handle = self.create(Event::new())?;
        trace!("created event {handle:?}");
        Ok(handle)
    }

    /// # Safety
    /// No copy of `handle` may be used afterwards, and nobody may be waiting on it.
    pub unsafe fn destroy_event(&self, handle: EventHandle<'k>) {
        unsafe { self.destroy(handle) }
    }

    /// Consumes one signal, waiting up to `timeout` for one to arrive.
    #[must_use]
    pub fn wait_event(&self, handle: EventHandle<'k>, timeout: Timeout) -> bool {
        handle.get().wait(&self.clock, timeout)
    }

    pub fn signal_event(&self, handle: EventHandle<'k>) {
        handle.get().signal();
    }

    pub fn reset_event(&self, handle: EventHandle<'k>) {
        handle.get().reset();
    }

    // Raw physical memory

    /// Reads `width` bytes (1, 2, 4 or 8) of physical memory at `address`.
    ///
    /// # Errors
    /// [`ServiceError::InvalidArgument`] for any other width.
    ///
    /// # Safety
    /// `address` must be mapped by the direct map and aligned to `width`.
    pub unsafe fn raw_memory_read(
        &self,
        address: PhysicalAddress,
        width: u8,
    ) -> Result<u64, ServiceError> {
        let width = AccessWidth::try_from(width)?;
        let ptr = self.pages.mapper().phys_to_virt::<u8>(address);
        Ok(unsafe { raw_memory::read(ptr, width) })
    }

    /// Writes the low `width` bytes (1, 2, 4 or 8) of `value` to physical
    /// memory at `address`.
    ///
    /// # Errors
    /// [`ServiceError::InvalidArgument`] for any other width; nothing is written.
    ///
    /// # Safety
    /// `address` must be mapped by the direct map, aligned to `width`, and
    /// not memory the kernel relies on.
    pub unsafe fn raw_memory_write(
        &self,
        address: PhysicalAddress,
        width: u8,
        value: u64,
    ) -> Result<(), ServiceError> {
        let width = AccessWidth::try_from(width)?;
        let ptr = self.pages.mapper().phys_to_virt::<u8>(address);
        unsafe { raw_memory::write(ptr, width, value) };
        Ok(())
    }

    // Firmware requests

    /// Acts on an AML `Fatal` or `BreakPoint`.
    ///
    /// A fatal request does not return: the processor is halted.
    pub fn handle_firmware_request(&self, request: FirmwareRequest) {
        match request {
            FirmwareRequest::Fatal { kind, code, arg } => {
                error!(
                    target: crate::firmware::LOG_TARGET,
                    "Fatal firmware error: type {kind:#x}, code {code:#x}, arg {arg:#x}"
                );
                self.irq.halt();
            }
            FirmwareRequest::Breakpoint { context } => {
                debug!(target: crate::firmware::LOG_TARGET, "Breakpoint (context {context:#x})");
            }
        }
    }
}
