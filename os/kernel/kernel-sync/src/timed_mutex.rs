use crate::clock::{Clock, Timeout};
use crate::raw_spin::RawSpin;

/// A spin lock with a bounded wait.
///
/// Unlike [`Spinlock`](crate::Spinlock) it leaves interrupts alone, so the
/// critical section may be preempted; it suits longer sections that never
/// run in interrupt context.
pub struct TimedMutex {
    raw: RawSpin,
}

impl Default for TimedMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl TimedMutex {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            raw: RawSpin::new(),
        }
    }

    /// Spins until the mutex is acquired or `timeout` elapses on `clock`.
    ///
    /// Returns `false` on timeout, in which case nothing was acquired.
    #[must_use = "a `false` result means the mutex is not held"]
    pub fn acquire<C: Clock>(&self, clock: &C, timeout: Timeout) -> bool {
        if self.raw.try_lock() {
            return true;
        }
        self.raw.lock_until(clock, timeout.deadline(clock))
    }

    /// Acquires without a deadline.
    #[inline]
    pub fn acquire_forever(&self) {
        self.raw.lock();
    }

    /// # Safety
    /// The caller must hold the mutex.
    #[inline]
    pub unsafe fn release(&self) {
        unsafe { self.raw.unlock() }
    }

    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }
}
