//! # Pool Allocator
//!
//! Small variable-size allocations backed by pages.
//!
//! Every block starts with an 8-byte [`BlockHeader`] recording the size of
//! the whole block; the caller gets the memory right after it. Requests are
//! served from six power-of-two size classes:
//!
//! | Class | Block size | Largest request |
//! |-------|------------|-----------------|
//! | 0     | 64         | 56              |
//! | 1     | 128        | 120             |
//! | 2     | 256        | 248             |
//! | 3     | 512        | 504             |
//! | 4     | 1024       | 1016            |
//! | 5     | 2048       | 2040            |
//!
//! An empty class borrows a block from the class above and splits it in
//! half; the lower half goes onto the class's free list, the upper half is
//! handed out. Above the top class a fresh page is split. Freed blocks go
//! back onto their class list as they are; buddies are never merged, and
//! pages taken for small blocks are never returned.
//!
//! Requests that do not fit the top class are rounded up to whole pages
//! and taken straight from the [`PageSource`]; the header then records the
//! page-rounded size so [`PoolAllocator::free`] can hand the pages back.

use crate::PageSource;
use core::alloc::{GlobalAlloc, Layout};
use core::ptr::{self, NonNull};
use kernel_memory_addresses::{PageSize, Size4K, bytes_for_pages, pages_for_bytes};
use kernel_sync::SpinMutex;
use log::trace;

/// log2 of the smallest block size.
pub const MIN_POOL_SHIFT: u32 = 6;

/// log2 of the largest block size: half a page.
pub const MAX_POOL_SHIFT: u32 = Size4K::SHIFT - 1;

/// Number of size classes.
pub const POOL_CLASSES: usize = (MAX_POOL_SHIFT - MIN_POOL_SHIFT + 1) as usize;

pub const MIN_POOL_SIZE: usize = 1 << MIN_POOL_SHIFT;
pub const MAX_POOL_SIZE: usize = 1 << MAX_POOL_SHIFT;

/// Bytes in front of every payload.
pub const HEADER_SIZE: usize = size_of::<BlockHeader>();

/// Alignment of every payload.
pub const POOL_ALIGN: usize = align_of::<BlockHeader>();

const _: () = assert!(HEADER_SIZE == 8);
const _: () = assert!(POOL_CLASSES == 6);

#[repr(C)]
struct BlockHeader {
    /// Size of the whole block, header included. A power of two up to
    /// [`MAX_POOL_SIZE`] for pooled blocks, a page multiple above.
    size: usize,
}

/// A block while it sits on a free list.
#[repr(C)]
struct FreeBlock {
    header: BlockHeader,
    next: Option<NonNull<FreeBlock>>,
}

/// Size in bytes of blocks in `class`.
#[must_use]
pub const fn class_size(class: usize) -> usize {
    MIN_POOL_SIZE << class
}

/// The class serving a request of `size` payload bytes, or `None` if the
/// request goes straight to pages.
#[must_use]
pub const fn size_class(size: usize) -> Option<usize> {
    let Some(total) = size.checked_add(HEADER_SIZE) else {
        return None;
    };
    if total > MAX_POOL_SIZE {
        return None;
    }
    let units = total.div_ceil(MIN_POOL_SIZE);
    let round_up = if units.is_power_of_two() { 0 } else { 1 };
    Some(units.ilog2() as usize + round_up)
}

struct ClassLists {
    heads: [Option<NonNull<FreeBlock>>; POOL_CLASSES],
}

// SAFETY: the blocks are owned by the lists and only touched under the pool lock.
unsafe impl Send for ClassLists {}

impl ClassLists {
    const fn new() -> Self {
        Self {
            heads: [None; POOL_CLASSES],
        }
    }

    fn pop(&mut self, class: usize) -> Option<NonNull<FreeBlock>> {
        let block = self.heads[class]?;
        // SAFETY: listed blocks are initialized `FreeBlock`s.
        self.heads[class] = unsafe { block.as_ref().next };
        Some(block)
    }

    /// # Safety
    /// `block` must point to `class_size(class)` writable bytes, aligned for
    /// [`FreeBlock`], that nobody else uses.
    unsafe fn push(&mut self, class: usize, block: NonNull<FreeBlock>) {
        unsafe {
            block.write(FreeBlock {
                header: BlockHeader {
                    size: class_size(class),
                },
                next: self.heads[class],
            });
        }
        self.heads[class] = Some(block);
    }

    fn len(&self, class: usize) -> usize {
        let mut count = 0;
        let mut cursor = self.heads[class];
        while let Some(block) = cursor {
            count += 1;
            // SAFETY: listed blocks are initialized `FreeBlock`s.
            cursor = unsafe { block.as_ref().next };
        }
        count
    }
}

/// Size-class allocator on top of a [`PageSource`].
pub struct PoolAllocator<S: PageSource> {
    pages: S,
    classes: SpinMutex<ClassLists>,
}

impl<S: PageSource> PoolAllocator<S> {
    #[must_use]
    pub const fn new(pages: S) -> Self {
        Self {
            pages,
            classes: SpinMutex::new(ClassLists::new()),
        }
    }

    #[must_use]
    pub const fn page_source(&self) -> &S {
        &self.pages
    }

    /// Allocates at least `size` bytes, aligned to [`POOL_ALIGN`].
    ///
    /// A zero `size` still yields a (smallest-class) block. Returns `None`
    /// when the backing pages are exhausted.
    pub fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        let total = size.checked_add(HEADER_SIZE)?;
        let header = match size_class(size) {
            Some(class) => self
                .classes
                .with_lock(|lists| unsafe { self.allocate_class(lists, class) })?,
            None => self.allocate_large(total)?,
        };
        // SAFETY: every block is larger than its header.
        Some(unsafe { header.add(1).cast() })
    }

    /// Allocates `count * size` bytes and zeroes them.
    ///
    /// Returns `None` if the product overflows.
    pub fn allocate_zeroed(&self, count: usize, size: usize) -> Option<NonNull<u8>> {
        let bytes = count.checked_mul(size)?;
        let ptr = self.allocate(bytes)?;
        unsafe { ptr.write_bytes(0, bytes) };
        Some(ptr)
    }

    fn allocate_large(&self, total: usize) -> Option<NonNull<BlockHeader>> {
        let pages = pages_for_bytes::<Size4K>(total as u64);
        let block = self.pages.allocate_pages(pages)?.cast::<BlockHeader>();
        let size = usize::try_from(bytes_for_pages::<Size4K>(pages)).ok()?;
        // SAFETY: the page source handed us `pages` fresh pages.
        unsafe { block.write(BlockHeader { size }) };
        trace!("pool: {total} bytes from {pages} page(s)");
        Some(block)
    }

    /// Takes a block of `class` from its list, splitting a block of the
    /// next larger class (or a fresh page, past the top class) when empty.
    ///
    /// # Safety
    /// `lists` must be this pool's class lists.
    unsafe fn allocate_class(
        &self,
        lists: &mut ClassLists,
        class: usize,
    ) -> Option<NonNull<BlockHeader>> {
        let block = if class == POOL_CLASSES {
            self.pages.allocate_pages(1)?.cast::<BlockHeader>()
        } else if let Some(free) = lists.pop(class) {
            free.cast::<BlockHeader>()
        } else {
            let parent = unsafe { self.allocate_class(lists, class + 1)? };
            // Lower half stays here, upper half goes to the caller.
            unsafe {
                lists.push(class, parent.cast());
                parent.byte_add(class_size(class))
            }
        };
        unsafe {
            block.write(BlockHeader {
                size: class_size(class),
            });
        }
        Some(block)
    }

    /// Returns a block to the pool. Null is ignored.
    ///
    /// # Safety
    /// `ptr` must be null or a live pointer returned by this pool's
    /// [`allocate`](Self::allocate) or [`allocate_zeroed`](Self::allocate_zeroed).
    pub unsafe fn free(&self, ptr: *mut u8) {
        let Some(payload) = NonNull::new(ptr) else {
            return;
        };
        let header = unsafe { payload.cast::<BlockHeader>().sub(1) };
        let size = unsafe { header.read().size };

        if size > MAX_POOL_SIZE {
            unsafe {
                self.pages
                    .free_pages(header.cast(), pages_for_bytes::<Size4K>(size as u64));
            }
            return;
        }

        debug_assert!(
            size.is_power_of_two() && size >= MIN_POOL_SIZE,
            "corrupt pool header at {header:p}: {size}"
        );
        let class = (size.trailing_zeros() - MIN_POOL_SHIFT) as usize;
        self.classes
            .with_lock(|lists| unsafe { lists.push(class, header.cast()) });
    }

    /// Payload bytes available behind `ptr`.
    ///
    /// # Safety
    /// `ptr` must be a live pointer returned by this pool.
    pub unsafe fn usable_size(&self, ptr: NonNull<u8>) -> usize {
        unsafe { ptr.cast::<BlockHeader>().sub(1).read().size - HEADER_SIZE }
    }

    /// Number of blocks on the free list of `class`.
    ///
    /// # Panics
    /// If `class >= POOL_CLASSES`.
    pub fn free_blocks(&self, class: usize) -> usize {
        assert!(class < POOL_CLASSES, "no pool class {class}");
        self.classes.with_lock(|lists| lists.len(class))
    }
}

/// Serves layouts with an alignment up to [`POOL_ALIGN`]; anything stricter
/// gets a null pointer.
unsafe impl<S: PageSource> GlobalAlloc for PoolAllocator<S> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > POOL_ALIGN {
            return ptr::null_mut();
        }
        self.allocate(layout.size()).map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        if layout.align() > POOL_ALIGN {
            return ptr::null_mut();
        }
        self.allocate_zeroed(1, layout.size())
            .map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        unsafe { self.free(ptr) }
    }
}
