use crate::clock::{Clock, Timeout};
use core::sync::atomic::{AtomicU64, Ordering};

/// A counting signal.
///
/// Every [`signal`](Self::signal) banks one wakeup; every successful
/// [`wait`](Self::wait) consumes exactly one. Waiters poll the counter; there
/// is no queue, so which of several waiters wins a signal is arbitrary.
pub struct Event {
    count: AtomicU64,
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

impl Event {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
        }
    }

    /// Banks one wakeup.
    #[inline]
    pub fn signal(&self) {
        self.count.fetch_add(1, Ordering::Release);
    }

    /// Waits for a banked wakeup and consumes it.
    ///
    /// Returns `false` if `timeout` elapses first; the counter is then left
    /// untouched. A `true` result always means this call decremented the
    /// counter.
    #[must_use = "a `false` result means no signal was consumed"]
    pub fn wait<C: Clock>(&self, clock: &C, timeout: Timeout) -> bool {
        let deadline = timeout.deadline(clock);
        loop {
            let mut count = self.count.load(Ordering::Relaxed);
            while count == 0 {
                clock.relax();
                if deadline.expired(clock) {
                    return false;
                }
                count = self.count.load(Ordering::Relaxed);
            }

            // Another waiter may drain the counter under us; go back to
            // polling once it reads zero.
            while count != 0 {
                match self.count.compare_exchange_weak(
                    count,
                    count - 1,
                    Ordering::Acquire,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => return true,
                    Err(actual) => count = actual,
                }
            }
        }
    }

    /// Drops all banked wakeups.
    #[inline]
    pub fn reset(&self) {
        self.count.store(0, Ordering::Release);
    }

    /// Number of banked wakeups right now.
    #[inline]
    #[must_use]
    pub fn pending(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}
