mod common;

use common::{Arena, PAGE};
use core::alloc::{GlobalAlloc, Layout};
use kernel_alloc::PoolAllocator;
use kernel_alloc::pool::{HEADER_SIZE, MAX_POOL_SIZE, POOL_CLASSES};
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn header_records_the_smallest_fitting_class() {
    let arena = Arena::new(16);
    let pages = arena.allocator();
    let pool = PoolAllocator::new(&pages);

    for size in [1, 8, 56, 57, 64, 100, 120, 121, 500, 1000, 1016, 1500, 2040] {
        let p = pool.allocate(size).unwrap();
        let block = unsafe { pool.usable_size(p) } + HEADER_SIZE;
        assert!(block.is_power_of_two(), "size {size}: block {block}");
        assert!(block >= size + HEADER_SIZE, "size {size}: block {block}");
        assert!(block / 2 < (size + HEADER_SIZE).max(64), "size {size}: block {block}");
        unsafe { pool.free(p.as_ptr()) };
    }
}

#[test]
fn payloads_are_eight_byte_aligned() {
    let arena = Arena::new(4);
    let pages = arena.allocator();
    let pool = PoolAllocator::new(&pages);

    for size in [0, 1, 13, 200, 3000] {
        let p = pool.allocate(size).unwrap();
        assert_eq!(p.as_ptr() as usize % 8, 0);
        assert!(arena.contains(p.as_ptr(), size));
    }
}

#[test]
fn zero_size_gets_the_smallest_block() {
    let arena = Arena::new(1);
    let pages = arena.allocator();
    let pool = PoolAllocator::new(&pages);

    let p = pool.allocate(0).unwrap();
    assert_eq!(unsafe { pool.usable_size(p) }, 64 - HEADER_SIZE);
}

#[test]
fn freed_block_is_reused_first() {
    let arena = Arena::new(2);
    let pages = arena.allocator();
    let pool = PoolAllocator::new(&pages);

    let _keep = pool.allocate(100).unwrap();
    let p = pool.allocate(100).unwrap();
    unsafe { pool.free(p.as_ptr()) };
    assert_eq!(pool.allocate(110), Some(p));
}

#[test]
fn one_page_serves_three_classes() {
    let arena = Arena::new(1);
    let pages = arena.allocator();
    let pool = PoolAllocator::new(&pages);

    let a = pool.allocate(64).unwrap();
    let b = pool.allocate(128).unwrap();
    let c = pool.allocate(256).unwrap();
    assert_eq!(pages.free_page_count(), 0);

    let addrs: HashSet<_> = [a, b, c].iter().map(|p| p.as_ptr() as usize).collect();
    assert_eq!(addrs.len(), 3);

    // The first split left spare 128 B, 1 KiB and 2 KiB blocks behind.
    assert_eq!(pool.free_blocks(0), 0);
    assert_eq!(pool.free_blocks(1), 1);
    assert_eq!(pool.free_blocks(4), 1);
    assert_eq!(pool.free_blocks(POOL_CLASSES - 1), 1);
}

#[test]
fn exhausted_pages_fail_the_request() {
    let arena = Arena::new(1);
    let pages = arena.allocator();
    let pool = PoolAllocator::new(&pages);

    let _half = pool.allocate(2000).unwrap();
    let _other = pool.allocate(2000).unwrap();
    assert!(pool.allocate(2000).is_none());
    assert!(pool.allocate(10).is_none());
}

#[test]
fn freed_pool_blocks_do_not_return_pages() {
    let arena = Arena::new(1);
    let pages = arena.allocator();
    let pool = PoolAllocator::new(&pages);

    let p = pool.allocate(10).unwrap();
    unsafe { pool.free(p.as_ptr()) };
    assert_eq!(pages.free_page_count(), 0);
    assert_eq!(pool.free_blocks(0), 2);
}

#[test]
fn large_requests_take_whole_pages_and_give_them_back() {
    let arena = Arena::new(8);
    let pages = arena.allocator();
    let pool = PoolAllocator::new(&pages);

    let one = pool.allocate(MAX_POOL_SIZE).unwrap();
    assert_eq!(pages.free_page_count(), 7);
    assert_eq!(unsafe { pool.usable_size(one) }, PAGE as usize - HEADER_SIZE);

    let three = pool.allocate(2 * PAGE as usize).unwrap();
    assert_eq!(pages.free_page_count(), 4);

    unsafe {
        pool.free(three.as_ptr());
        pool.free(one.as_ptr());
    }
    assert_eq!(pages.free_page_count(), 8);
    assert_eq!(pages.region_count(), 1);
}

#[test]
fn zeroed_allocation_is_zero() {
    let arena = Arena::new(2);
    let pages = arena.allocator();
    let pool = PoolAllocator::new(&pages);

    let dirty = pool.allocate(200).unwrap();
    unsafe {
        dirty.write_bytes(0xAB, 200);
        pool.free(dirty.as_ptr());
    }

    let p = pool.allocate_zeroed(25, 8).unwrap();
    assert_eq!(p, dirty);
    let bytes = unsafe { std::slice::from_raw_parts(p.as_ptr(), 200) };
    assert!(bytes.iter().all(|&b| b == 0));
}

#[test]
fn zeroed_allocation_overflow_is_refused() {
    let arena = Arena::new(1);
    let pages = arena.allocator();
    let pool = PoolAllocator::new(&pages);

    assert!(pool.allocate_zeroed(usize::MAX, 2).is_none());
    assert!(pool.allocate_zeroed(usize::MAX / 2 + 1, 2).is_none());
    assert!(pool.allocate(usize::MAX).is_none());
    assert_eq!(pages.free_page_count(), 1);
}

#[test]
fn free_null_is_ignored() {
    let arena = Arena::new(1);
    let pages = arena.allocator();
    let pool = PoolAllocator::new(&pages);
    unsafe { pool.free(std::ptr::null_mut()) };
    assert_eq!(pool.free_blocks(0), 0);
}

#[test]
fn global_alloc_refuses_strict_alignment() {
    let arena = Arena::new(2);
    let pages = arena.allocator();
    let pool = PoolAllocator::new(&pages);

    unsafe {
        let layout = Layout::from_size_align(48, 8).unwrap();
        let p = pool.alloc(layout);
        assert!(!p.is_null());
        pool.dealloc(p, layout);

        let strict = Layout::from_size_align(48, 64).unwrap();
        assert!(pool.alloc(strict).is_null());

        let zeroed = pool.alloc_zeroed(Layout::from_size_align(300, 4).unwrap());
        assert!(!zeroed.is_null());
        assert!(std::slice::from_raw_parts(zeroed, 300).iter().all(|&b| b == 0));
    }
}

#[test]
fn concurrent_pool_use_hands_out_distinct_blocks() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 64;

    let arena = Arena::new(64);
    let pages = Box::leak(Box::new(arena.allocator()));
    let pool = Arc::new(PoolAllocator::new(&*pages));
    let barrier = Arc::new(Barrier::new(THREADS));

    let mut handles = Vec::new();
    for t in 0..THREADS {
        let pool = Arc::clone(&pool);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            let size = 24 << (t % 4);
            let mut mine = Vec::new();
            for i in 0..PER_THREAD {
                let p = pool.allocate(size).unwrap();
                unsafe { p.write_bytes(t as u8, size) };
                mine.push(p.as_ptr() as usize);
                if i % 3 == 0 {
                    let victim = mine.swap_remove(0);
                    unsafe { pool.free(victim as *mut u8) };
                }
            }
            mine
        }));
    }

    let mut seen = HashSet::new();
    for h in handles {
        for addr in h.join().unwrap() {
            assert!(seen.insert(addr), "block {addr:#x} handed out twice");
        }
    }
}

#[test]
fn refills_and_page_traffic_interleave_without_deadlock() {
    const ROUNDS: usize = 200;

    let arena = Arena::new(64);
    let pages: &'static _ = Box::leak(Box::new(arena.allocator()));
    let pool = Arc::new(PoolAllocator::new(pages));
    let barrier = Arc::new(Barrier::new(3));

    let small = {
        let pool = Arc::clone(&pool);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            // Every class starts empty, so these keep pulling pages under the pool lock.
            let mut kept = Vec::new();
            for i in 0..ROUNDS {
                let size = [24, 100, 500, 2000][i % 4];
                kept.push(pool.allocate(size).unwrap().as_ptr() as usize);
            }
            kept
        })
    };
    let large = {
        let pool = Arc::clone(&pool);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for _ in 0..ROUNDS {
                let p = pool.allocate(3 * MAX_POOL_SIZE).unwrap();
                unsafe { pool.free(p.as_ptr()) };
            }
        })
    };
    let direct = {
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for _ in 0..ROUNDS {
                let run = pages.allocate(2).unwrap();
                unsafe { pages.free(run, 2) };
            }
        })
    };

    large.join().unwrap();
    direct.join().unwrap();
    let kept = small.join().unwrap();
    assert_eq!(kept.iter().collect::<HashSet<_>>().len(), ROUNDS);

    // Only the pages split for small blocks stay out.
    let pool_pages = 64 - pages.free_page_count();
    assert!(pool_pages > 0 && pool_pages < 64, "{pool_pages} pages held by the pool");
    assert!(pages.allocate(1).is_some());
}
