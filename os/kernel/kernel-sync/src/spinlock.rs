use crate::irq::{InterruptControl, InterruptState};
use crate::raw_spin::RawSpin;

/// Interrupt-masking spinlock for very short critical sections.
///
/// [`lock`](Self::lock) masks interrupts on the calling CPU **before**
/// spinning and hands back the previous [`InterruptState`];
/// [`unlock`](Self::unlock) clears the flag and then restores that state.
///
/// There is no timeout and no owner tracking: locking twice from the same
/// context without unlocking in between spins forever, with interrupts off.
pub struct Spinlock {
    raw: RawSpin,
}

impl Default for Spinlock {
    fn default() -> Self {
        Self::new()
    }
}

impl Spinlock {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            raw: RawSpin::new(),
        }
    }

    /// Masks interrupts, then spins until the lock is taken.
    #[inline]
    #[must_use = "the saved state must be passed back to `unlock`"]
    pub fn lock<I: InterruptControl>(&self, irq: &I) -> InterruptState {
        let saved = irq.save_and_disable();
        self.raw.lock();
        saved
    }

    /// Releases the lock, then restores the interrupt state saved by [`lock`](Self::lock).
    ///
    /// # Safety
    /// The caller must hold the lock, and `saved` must be the value its
    /// matching `lock` call returned on this CPU.
    #[inline]
    pub unsafe fn unlock<I: InterruptControl>(&self, irq: &I, saved: InterruptState) {
        unsafe { self.raw.unlock() };
        irq.restore(saved);
    }

    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }
}
