use crate::clock::{Clock, Deadline};
use crate::{RawLock, RawUnlock};
use core::hint::spin_loop;
use core::sync::atomic::{AtomicBool, Ordering};

/// A test-and-set flag: the state shared by every lock in this crate.
///
/// No owner is recorded, so nothing stops the holder from locking again and
/// spinning on itself forever. There is no fairness either; whichever CPU's
/// swap lands first wins.
pub struct RawSpin {
    held: AtomicBool,
}

impl Default for RawSpin {
    fn default() -> Self {
        Self::new()
    }
}

impl RawSpin {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn lock(&self) {
        // Fast path: try once, then spin on a plain load until it looks free.
        while self.held.swap(true, Ordering::Acquire) {
            while self.held.load(Ordering::Relaxed) {
                spin_loop();
            }
        }
    }

    #[inline]
    pub fn try_lock(&self) -> bool {
        !self.held.swap(true, Ordering::Acquire)
    }

    /// Spins until the flag is taken or `deadline` passes on `clock`.
    ///
    /// Returns `false` without touching the flag on timeout. At least one
    /// attempt is made even if the deadline has already passed.
    pub fn lock_until<C: Clock>(&self, clock: &C, deadline: Deadline) -> bool {
        loop {
            if self.try_lock() {
                return true;
            }
            clock.relax();
            if deadline.expired(clock) {
                return false;
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.held.load(Ordering::Relaxed)
    }

    /// Clears the flag.
    ///
    /// # Safety
    /// The caller must be the current holder.
    #[inline]
    pub unsafe fn unlock(&self) {
        self.held.store(false, Ordering::Release);
    }
}

impl RawLock for RawSpin {
    fn raw_lock(&self) {
        self.lock();
    }

    fn raw_try_lock(&self) -> bool {
        self.try_lock()
    }
}

impl RawUnlock for RawSpin {
    unsafe fn raw_unlock(&self) {
        unsafe { self.unlock() }
    }
}
