use core::fmt;
use core::ptr;
use kernel_sync::{Event, Spinlock, TimedMutex};

/// An opaque reference to a synchronization object living in the kernel pool.
///
/// Handles are what the firmware interpreter stores and passes back. They
/// are plain copies of a pointer: destroying the object while another copy
/// is still in use is the caller's responsibility to avoid, which is why
/// the `destroy_*` operations are `unsafe`.
pub struct Handle<'k, T> {
    object: &'k T,
}

pub type MutexHandle<'k> = Handle<'k, TimedMutex>;
pub type SpinlockHandle<'k> = Handle<'k, Spinlock>;
pub type EventHandle<'k> = Handle<'k, Event>;

impl<'k, T> Handle<'k, T> {
    pub(crate) const fn new(object: &'k T) -> Self {
        Self { object }
    }

    /// The object behind the handle.
    #[must_use]
    pub const fn get(&self) -> &'k T {
        self.object
    }

    #[must_use]
    pub fn as_ptr(&self) -> *const T {
        ptr::from_ref(self.object)
    }
}

#[allow(clippy::expl_impl_clone_on_copy)]
impl<T> Clone for Handle<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<'_, T> {}

impl<T> PartialEq for Handle<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.object, other.object)
    }
}

impl<T> Eq for Handle<'_, T> {}

impl<T> fmt::Debug for Handle<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handle").field(&self.as_ptr()).finish()
    }
}
