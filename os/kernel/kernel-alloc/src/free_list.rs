use crate::phys_mapper::PhysMapper;
use kernel_memory_addresses::{PhysicalAddress, Size4K};

/// Header stored at the beginning of every **free** page run.
///
/// The node *is* the free memory it describes:
///
/// ```text
/// +-------------------------+----------------------------------------+
/// | FreeRegion (prev, next, |   rest of the run (pages * 4096 bytes  |
/// |             pages)      |   in total, header included)           |
/// +-------------------------+----------------------------------------+
/// ^ base (page aligned)                                              ^ base + pages * 4096
/// ```
///
/// Links are physical addresses, resolved through a [`PhysMapper`].
#[repr(C)]
struct FreeRegion {
    prev: Option<PhysicalAddress>,
    next: Option<PhysicalAddress>,
    pages: u64,
}

/// A free run as reported to callers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Region {
    pub base: PhysicalAddress,
    pub pages: u64,
}

impl Region {
    /// One past the last byte of the run.
    #[must_use]
    pub const fn end(&self) -> PhysicalAddress {
        self.base.add_pages::<Size4K>(self.pages)
    }
}

/// Address-ordered, doubly linked list of free page runs.
///
/// # Invariants
/// - Nodes are sorted by strictly increasing base address.
/// - Runs never overlap.
/// - Every linked address holds an initialized [`FreeRegion`] that is
///   reachable through the mapper the list is used with.
///
/// The list itself does not merge neighbors; the page allocator does that
/// on free.
pub(crate) struct FreeRegionList {
    head: Option<PhysicalAddress>,
    tail: Option<PhysicalAddress>,
    len: usize,
}

impl FreeRegionList {
    pub(crate) const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    /// Lowest-addressed run.
    pub(crate) const fn first(&self) -> Option<PhysicalAddress> {
        self.head
    }

    /// Highest-addressed run.
    pub(crate) const fn last(&self) -> Option<PhysicalAddress> {
        self.tail
    }

    /// # Safety
    /// `at` must be a node of this list (or a location about to become one).
    #[allow(clippy::mut_from_ref)]
    unsafe fn node<'a, M: PhysMapper>(m: &M, at: PhysicalAddress) -> &'a mut FreeRegion {
        unsafe { &mut *m.phys_to_virt::<FreeRegion>(at) }
    }

    /// # Safety
    /// `at` must be a node of this list.
    pub(crate) unsafe fn pages<M: PhysMapper>(&self, m: &M, at: PhysicalAddress) -> u64 {
        unsafe { Self::node(m, at).pages }
    }

    /// # Safety
    /// `at` must be a node of this list, and the new size must not make it
    /// overlap its successor.
    pub(crate) unsafe fn set_pages<M: PhysMapper>(
        &mut self,
        m: &M,
        at: PhysicalAddress,
        pages: u64,
    ) {
        unsafe { Self::node(m, at).pages = pages };
    }

    /// # Safety
    /// `at` must be a node of this list.
    pub(crate) unsafe fn next<M: PhysMapper>(
        &self,
        m: &M,
        at: PhysicalAddress,
    ) -> Option<PhysicalAddress> {
        unsafe { Self::node(m, at).next }
    }

    /// # Safety
    /// `at` must be a node of this list.
    pub(crate) unsafe fn prev<M: PhysMapper>(
        &self,
        m: &M,
        at: PhysicalAddress,
    ) -> Option<PhysicalAddress> {
        unsafe { Self::node(m, at).prev }
    }

    /// Writes a node for `pages` pages at `at` and links it in front of
    /// `before`, or at the tail if `before` is `None`.
    ///
    /// # Safety
    /// - `[at, at + pages)` must be free, mapped, writable and not already listed.
    /// - `before` must be a node of this list, and the result must keep the
    ///   address order.
    pub(crate) unsafe fn insert_before<M: PhysMapper>(
        &mut self,
        m: &M,
        before: Option<PhysicalAddress>,
        at: PhysicalAddress,
        pages: u64,
    ) {
        let prev = match before {
            Some(b) => unsafe { self.prev(m, b) },
            None => self.tail,
        };
        unsafe { self.link(m, prev, before, at, pages) };
    }

    /// Writes a node for `pages` pages at `at` and links it right after `after`.
    ///
    /// # Safety
    /// Same as [`insert_before`](Self::insert_before).
    pub(crate) unsafe fn insert_after<M: PhysMapper>(
        &mut self,
        m: &M,
        after: PhysicalAddress,
        at: PhysicalAddress,
        pages: u64,
    ) {
        let next = unsafe { self.next(m, after) };
        unsafe { self.link(m, Some(after), next, at, pages) };
    }

    unsafe fn link<M: PhysMapper>(
        &mut self,
        m: &M,
        prev: Option<PhysicalAddress>,
        next: Option<PhysicalAddress>,
        at: PhysicalAddress,
        pages: u64,
    ) {
        unsafe {
            m.phys_to_virt::<FreeRegion>(at)
                .write(FreeRegion { prev, next, pages });
        }
        match prev {
            Some(p) => unsafe { Self::node(m, p).next = Some(at) },
            None => self.head = Some(at),
        }
        match next {
            Some(n) => unsafe { Self::node(m, n).prev = Some(at) },
            None => self.tail = Some(at),
        }
        self.len += 1;
    }

    /// Unlinks the node at `at`. Its memory is left as is.
    ///
    /// # Safety
    /// `at` must be a node of this list.
    pub(crate) unsafe fn remove<M: PhysMapper>(&mut self, m: &M, at: PhysicalAddress) {
        let (prev, next) = unsafe {
            let node = Self::node(m, at);
            (node.prev, node.next)
        };
        match prev {
            Some(p) => unsafe { Self::node(m, p).next = next },
            None => self.head = next,
        }
        match next {
            Some(n) => unsafe { Self::node(m, n).prev = prev },
            None => self.tail = prev,
        }
        self.len -= 1;
    }

    /// Walks the runs from lowest to highest address.
    pub(crate) fn iter<'a, M: PhysMapper>(&'a self, m: &'a M) -> Iter<'a, M> {
        Iter {
            mapper: m,
            cursor: self.head,
            _list: self,
        }
    }
}

pub(crate) struct Iter<'a, M> {
    mapper: &'a M,
    cursor: Option<PhysicalAddress>,
    _list: &'a FreeRegionList,
}

impl<M: PhysMapper> Iterator for Iter<'_, M> {
    type Item = Region;

    fn next(&mut self) -> Option<Region> {
        let base = self.cursor?;
        // SAFETY: the cursor only ever holds linked nodes, and the borrow on
        // the list keeps them linked.
        let node = unsafe { FreeRegionList::node(self.mapper, base) };
        self.cursor = node.next;
        Some(Region {
            base,
            pages: node.pages,
        })
    }
}
