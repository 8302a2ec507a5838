//! # Kernel synchronization primitives
//!
//! Everything here spins; there is no scheduler underneath to park a waiter.
//!
//! | Primitive | Waits | Interrupts | Used for |
//! |-----------|-------|------------|----------|
//! | [`Spinlock`] | forever | masked while held | very short sections, interrupt-safe |
//! | [`TimedMutex`] | bounded by a [`Timeout`] | untouched | longer, preemptible sections |
//! | [`Event`] | bounded by a [`Timeout`] | untouched | counting signals |
//! | [`SpinMutex<T>`] | forever | optionally masked ([`Mutex::lock_irq`]) | guarding data, e.g. allocator free lists |
//!
//! Bounded waits read time from a [`Clock`]; see [`clock`] for the tick unit.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod clock;
mod event;
pub mod irq;
mod mutex;
mod raw_spin;
mod spinlock;
mod sync_once_cell;
mod timed_mutex;

pub use clock::{Clock, Deadline, Timeout};
pub use event::Event;
pub use irq::{InterruptControl, InterruptState, IrqGuard, IrqMutex};
pub use mutex::{Mutex, MutexGuard};
pub use raw_spin::RawSpin;
pub use spinlock::Spinlock;
pub use sync_once_cell::SyncOnceCell;
pub use timed_mutex::TimedMutex;

#[cfg(target_arch = "x86_64")]
pub use clock::TscClock;
#[cfg(target_arch = "x86_64")]
pub use irq::CpuInterrupts;

pub type SpinMutex<T> = Mutex<T, RawSpin>;

impl<T> SpinMutex<T> {
    pub const fn new(value: T) -> Self {
        Self::from_raw(RawSpin::new(), value)
    }
}

pub trait RawLock {
    fn raw_lock(&self);
    fn raw_try_lock(&self) -> bool;
}

pub trait RawUnlock {
    /// # Safety
    /// The caller must currently hold the lock.
    unsafe fn raw_unlock(&self);
}
