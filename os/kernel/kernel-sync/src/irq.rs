use crate::{Mutex, MutexGuard, RawLock, RawUnlock};
use bitfield_struct::bitfield;

/// Saved processor flags, as returned by [`InterruptControl::save_and_disable`].
///
/// This is the `RFLAGS` image at the time interrupts were masked; only the
/// interrupt enable flag (bit 9, `IF`) is interpreted. Its raw `u64` form is
/// what the firmware interface passes around as "CPU flags".
#[bitfield(u64, order = Lsb)]
#[derive(PartialEq, Eq)]
pub struct InterruptState {
    #[bits(9)]
    _low: u16, // 0–8

    /// Interrupt Enable Flag
    pub interrupts_enabled: bool, // 9

    #[bits(54)]
    _high: u64, // 10–63
}

impl InterruptState {
    /// The state of a processor with interrupt delivery enabled.
    pub const ENABLED: Self = Self::new().with_interrupts_enabled(true);

    /// The state of a processor with interrupt delivery masked.
    pub const DISABLED: Self = Self::new();
}

/// Local interrupt delivery control for the calling processor.
///
/// Implementations act on the **current** CPU only; masking interrupts
/// does not stop other processors.
pub trait InterruptControl {
    /// Snapshots the interrupt state, then masks interrupt delivery.
    fn save_and_disable(&self) -> InterruptState;

    /// Re-enables interrupt delivery if `state` had it enabled.
    fn restore(&self, state: InterruptState);

    /// Stops the processor for good.
    fn halt(&self) -> !;
}

impl<I: InterruptControl + ?Sized> InterruptControl for &I {
    fn save_and_disable(&self) -> InterruptState {
        (**self).save_and_disable()
    }

    fn restore(&self, state: InterruptState) {
        (**self).restore(state);
    }

    fn halt(&self) -> ! {
        (**self).halt()
    }
}

/// [`InterruptControl`] for the executing x86-64 processor (`cli/sti`,
/// `pushfq/pop`, `hlt`).
///
/// # Safety & Privilege
///
/// Only usable at CPL0 (or wherever `cli`/`sti` are legal). Calling from
/// user space faults.
#[cfg(target_arch = "x86_64")]
#[derive(Copy, Clone, Debug, Default)]
pub struct CpuInterrupts;

#[cfg(target_arch = "x86_64")]
impl CpuInterrupts {
    /// Returns the current `RFLAGS` value (via `pushfq/pop`).
    #[inline]
    #[must_use]
    pub fn rflags() -> u64 {
        let r: u64;
        unsafe { core::arch::asm!("pushfq; pop {}", out(reg) r, options(preserves_flags)) }
        r
    }
}

#[cfg(target_arch = "x86_64")]
impl InterruptControl for CpuInterrupts {
    #[inline]
    fn save_and_disable(&self) -> InterruptState {
        let state = InterruptState::from_bits(Self::rflags());
        if state.interrupts_enabled() {
            unsafe { core::arch::asm!("cli", options(nomem, nostack, preserves_flags)) }
        }
        state
    }

    #[inline]
    fn restore(&self, state: InterruptState) {
        if state.interrupts_enabled() {
            unsafe { core::arch::asm!("sti", options(nomem, nostack, preserves_flags)) }
        }
    }

    fn halt(&self) -> ! {
        loop {
            unsafe { core::arch::asm!("cli; hlt", options(nomem, nostack)) }
        }
    }
}

/// RAII guard that masks interrupts on creation and restores them on drop.
///
/// Interrupts are re-enabled on drop **only** if they were enabled when the
/// guard was created, so guards nest.
pub struct IrqGuard<'a, I: InterruptControl> {
    irq: &'a I,
    saved: InterruptState,
}

impl<'a, I: InterruptControl> IrqGuard<'a, I> {
    #[inline]
    #[must_use]
    pub fn new(irq: &'a I) -> Self {
        let saved = irq.save_and_disable();
        Self { irq, saved }
    }

    /// The state that will be restored on drop.
    #[must_use]
    pub const fn saved(&self) -> InterruptState {
        self.saved
    }
}

impl<I: InterruptControl> Drop for IrqGuard<'_, I> {
    fn drop(&mut self) {
        self.irq.restore(self.saved);
    }
}

/// A mutex guard that also keeps interrupts masked while held.
///
/// Created by [`Mutex::lock_irq`]. Interrupts are masked *before* the lock is
/// taken and restored *after* it is released, so an interrupt handler on the
/// same CPU can never spin on a lock its own CPU holds.
pub struct IrqMutex<'a, T, R: RawLock + RawUnlock, I: InterruptControl> {
    // Field order is drop order: release the lock, then restore interrupts.
    guard: MutexGuard<'a, T, R>,
    _irq: IrqGuard<'a, I>,
}

impl<T, R: RawLock + RawUnlock, I: InterruptControl> core::ops::Deref for IrqMutex<'_, T, R, I> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T, R: RawLock + RawUnlock, I: InterruptControl> core::ops::DerefMut
    for IrqMutex<'_, T, R, I>
{
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T, R: RawLock + RawUnlock> Mutex<T, R> {
    /// Acquires the mutex with interrupts masked for the guard's lifetime.
    #[inline]
    pub fn lock_irq<'a, I: InterruptControl>(&'a self, irq: &'a I) -> IrqMutex<'a, T, R, I> {
        let ig = IrqGuard::new(irq);
        let g = self.lock();
        IrqMutex { guard: g, _irq: ig }
    }
}
