mod common;

use common::{Arena, FakeCpu, HostClock, PAGE};
use kernel_acpi::{FirmwareRequest, HostServices, ServiceError};
use kernel_alloc::PoolAllocator;
use kernel_info::memory::{DMA32_LIMIT, ISA_DMA_LIMIT, NO_LIMIT};
use kernel_memory_addresses::PhysicalAddress;
use kernel_sync::Timeout;
use kernel_sync::clock::TICKS_PER_MILLISECOND;
use std::sync::Barrier;
use std::thread;

#[test]
fn memory_service_round_trip() {
    let arena = Arena::new(4);
    let pages = arena.allocator();
    let pool = PoolAllocator::new(&pages);
    let host = HostServices::new(&pages, &pool, HostClock::new(), FakeCpu::new());

    let p = host.alloc(40).unwrap();
    unsafe { p.write_bytes(0x5A, 40) };
    unsafe { host.free(p.as_ptr()) };

    let z = host.calloc(10, 4).unwrap();
    assert_eq!(z, p);
    let bytes = unsafe { std::slice::from_raw_parts(z.as_ptr(), 40) };
    assert!(bytes.iter().all(|&b| b == 0));

    assert!(host.calloc(usize::MAX, 16).is_none());
    unsafe { host.free(std::ptr::null_mut()) };
}

#[test]
fn page_service_respects_the_ceiling() {
    let arena = Arena::new(8);
    let pages = arena.allocator();
    let pool = PoolAllocator::new(&pages);
    let host = HostServices::new(&pages, &pool, HostClock::new(), FakeCpu::new());

    let low = host.alloc_pages_below(1, 2 * PAGE as u64 - 1).unwrap();
    assert_eq!(low.as_ptr(), arena.base().wrapping_add(PAGE));

    let high = host.alloc_pages(2).unwrap();
    assert_eq!(high.as_ptr(), arena.base().wrapping_add(6 * PAGE));

    assert!(host.alloc_pages_below(1, PAGE as u64 - 2).is_none());

    unsafe {
        host.free_pages(low, 1);
        host.free_pages(high, 2);
    }
    assert_eq!(pages.free_page_count(), 8);
    assert_eq!(pages.region_count(), 1);
}

#[test]
fn page_service_honours_dma_limits() {
    // 16 MiB plus four pages, so the ISA limit splits the only region.
    let total = usize::try_from(ISA_DMA_LIMIT + 1).unwrap() / PAGE + 4;
    let arena = Arena::new(total);
    let pages = arena.allocator();
    let pool = PoolAllocator::new(&pages);
    let host = HostServices::new(&pages, &pool, HostClock::new(), FakeCpu::new());

    let isa = host.alloc_pages_below(2, ISA_DMA_LIMIT).unwrap();
    assert_eq!(isa.as_ptr(), arena.base().wrapping_add(total * PAGE - 6 * PAGE));
    assert_eq!(pages.region_count(), 2);

    let dma32 = host.alloc_pages_below(1, DMA32_LIMIT).unwrap();
    assert_eq!(dma32.as_ptr(), arena.base().wrapping_add(total * PAGE - PAGE));

    let any = host.alloc_pages_below(1, NO_LIMIT).unwrap();
    assert_eq!(any.as_ptr(), arena.base().wrapping_add(total * PAGE - 2 * PAGE));

    unsafe {
        host.free_pages(dma32, 1);
        host.free_pages(isa, 2);
        host.free_pages(any, 1);
    }
    assert_eq!(pages.free_page_count(), total as u64);
    assert_eq!(pages.region_count(), 1);
}

#[test]
fn second_acquire_times_out() {
    let arena = Arena::new(1);
    let pages = arena.allocator();
    let pool = PoolAllocator::new(&pages);
    let host = HostServices::new(&pages, &pool, HostClock::new(), FakeCpu::new());

    let m = host.create_mutex().unwrap();
    assert!(host.acquire_mutex(m, Timeout::IMMEDIATE));

    let start = host.ticks();
    assert!(!host.acquire_mutex(m, Timeout::from_millis(5)));
    assert!(host.ticks() - start >= 5 * TICKS_PER_MILLISECOND);

    unsafe { host.release_mutex(m) };
    assert!(host.acquire_mutex(m, Timeout::from_millis(5)));
    unsafe {
        host.release_mutex(m);
        host.destroy_mutex(m);
    }
}

#[test]
fn mutex_handoff_between_threads() {
    let arena = Arena::new(1);
    let pages = arena.allocator();
    let pool = PoolAllocator::new(&pages);
    let host = HostServices::new(&pages, &pool, HostClock::new(), FakeCpu::new());
    let m = host.create_mutex().unwrap();
    let barrier = Barrier::new(2);

    assert!(host.acquire_mutex(m, Timeout::Forever));
    thread::scope(|s| {
        s.spawn(|| {
            barrier.wait();
            assert!(host.acquire_mutex(m, Timeout::from_millis(u16::MAX)));
            unsafe { host.release_mutex(m) };
        });
        barrier.wait();
        host.sleep(2);
        unsafe { host.release_mutex(m) };
    });

    assert!(!m.get().is_locked());
    unsafe { host.destroy_mutex(m) };
}

#[test]
fn spinlock_masks_interrupts_while_held() {
    let arena = Arena::new(1);
    let pages = arena.allocator();
    let pool = PoolAllocator::new(&pages);
    let host = HostServices::new(&pages, &pool, HostClock::new(), FakeCpu::new());

    let l = host.create_spinlock().unwrap();
    let saved = host.lock_spinlock(l);
    assert!(saved.interrupts_enabled());
    assert!(!host.interrupts().interrupts_enabled());
    assert!(l.get().is_locked());

    unsafe { host.unlock_spinlock(l, saved) };
    assert!(host.interrupts().interrupts_enabled());
    assert!(!l.get().is_locked());
    unsafe { host.destroy_spinlock(l) };
}

#[test]
fn event_counts_signals() {
    const N: usize = 5;

    let arena = Arena::new(1);
    let pages = arena.allocator();
    let pool = PoolAllocator::new(&pages);
    let host = HostServices::new(&pages, &pool, HostClock::new(), FakeCpu::new());

    let e = host.create_event().unwrap();
    for _ in 0..N {
        host.signal_event(e);
    }
    for _ in 0..N {
        assert!(host.wait_event(e, Timeout::IMMEDIATE));
    }
    assert!(!host.wait_event(e, Timeout::from_millis(3)));

    host.signal_event(e);
    host.signal_event(e);
    host.reset_event(e);
    assert!(!host.wait_event(e, Timeout::IMMEDIATE));
    unsafe { host.destroy_event(e) };
}

#[test]
fn event_wakes_a_waiting_thread() {
    let arena = Arena::new(1);
    let pages = arena.allocator();
    let pool = PoolAllocator::new(&pages);
    let host = HostServices::new(&pages, &pool, HostClock::new(), FakeCpu::new());
    let e = host.create_event().unwrap();

    thread::scope(|s| {
        let waiter = s.spawn(|| host.wait_event(e, Timeout::Forever));
        host.sleep(2);
        host.signal_event(e);
        assert!(waiter.join().unwrap());
    });
    assert_eq!(e.get().pending(), 0);
}

#[test]
fn handles_come_from_the_pool() {
    let arena = Arena::new(1);
    let pages = arena.allocator();
    let pool = PoolAllocator::new(&pages);
    let host = HostServices::new(&pages, &pool, HostClock::new(), FakeCpu::new());

    let a = host.create_event().unwrap();
    let b = host.create_event().unwrap();
    assert_ne!(a, b);
    let spare = pool.free_blocks(0);

    unsafe { host.destroy_event(a) };
    assert_eq!(pool.free_blocks(0), spare + 1);
    unsafe { host.destroy_event(b) };
}

#[test]
fn creation_fails_when_the_pool_is_exhausted() {
    let arena = Arena::new(1);
    let pages = arena.allocator();
    let pool = PoolAllocator::new(&pages);
    let host = HostServices::new(&pages, &pool, HostClock::new(), FakeCpu::new());

    let _a = host.alloc(2000).unwrap();
    let _b = host.alloc(2000).unwrap();

    assert_eq!(host.create_mutex(), Err(ServiceError::OutOfMemory));
    assert_eq!(host.create_spinlock(), Err(ServiceError::OutOfMemory));
    assert_eq!(host.create_event(), Err(ServiceError::OutOfMemory));
}

#[test]
fn raw_memory_access_goes_through_the_direct_map() {
    let arena = Arena::new(1);
    let pages = arena.allocator();
    let pool = PoolAllocator::new(&pages);
    let host = HostServices::new(&pages, &pool, HostClock::new(), FakeCpu::new());
    let at = PhysicalAddress::new(0x100);

    unsafe {
        host.raw_memory_write(at, 8, 0).unwrap();
        host.raw_memory_write(at, 4, 0xDEAD_BEEF_CAFE_F00D).unwrap();
        assert_eq!(host.raw_memory_read(at, 8), Ok(0xCAFE_F00D));
        assert_eq!(host.raw_memory_read(at, 1), Ok(0x0D));
        assert_eq!(host.raw_memory_read(at, 2), Ok(0xF00D));
        assert_eq!(arena.base().add(0x100).read(), 0x0D);

        assert_eq!(host.raw_memory_read(at, 3), Err(ServiceError::InvalidArgument));
        assert_eq!(
            host.raw_memory_write(at, 16, u64::MAX),
            Err(ServiceError::InvalidArgument)
        );
        assert_eq!(host.raw_memory_read(at, 8), Ok(0xCAFE_F00D));
    }
}

#[test]
fn sleep_and_stall_take_at_least_their_time() {
    let arena = Arena::new(1);
    let pages = arena.allocator();
    let pool = PoolAllocator::new(&pages);
    let host = HostServices::new(&pages, &pool, HostClock::new(), FakeCpu::new());

    let start = host.ticks();
    host.sleep(2);
    host.stall(300);
    assert!(host.ticks() - start >= 2 * TICKS_PER_MILLISECOND + 3_000);
}

#[test]
fn breakpoint_request_continues() {
    let arena = Arena::new(1);
    let pages = arena.allocator();
    let pool = PoolAllocator::new(&pages);
    let host = HostServices::new(&pages, &pool, HostClock::new(), FakeCpu::new());

    host.handle_firmware_request(FirmwareRequest::Breakpoint { context: 0x1234 });
}

#[test]
#[should_panic(expected = "cpu halted")]
fn fatal_request_halts() {
    let arena = Arena::new(1);
    let pages = arena.allocator();
    let pool = PoolAllocator::new(&pages);
    let host = HostServices::new(&pages, &pool, HostClock::new(), FakeCpu::new());

    host.handle_firmware_request(FirmwareRequest::Fatal {
        kind: 1,
        code: 0xBAD,
        arg: 0,
    });
}
