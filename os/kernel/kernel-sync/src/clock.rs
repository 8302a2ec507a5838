//! # Tick Clock and Timeouts
//!
//! Every bounded wait in this crate is expressed in **ticks**, an abstract
//! monotonic unit supplied by a [`Clock`]. The firmware interface counts in
//! 100 ns ticks, so [`TICKS_PER_MILLISECOND`] and [`TICKS_PER_MICROSECOND`]
//! follow that convention.
//!
//! A clock also decides how a waiter passes time between polls
//! ([`Clock::relax`]): on bare metal this is a `pause` hint; a hosted port
//! with a scheduler can yield the thread instead.

use core::hint::spin_loop;
use core::num::NonZeroU64;

/// Ticks in one millisecond (100 ns tick).
pub const TICKS_PER_MILLISECOND: u64 = 10_000;

/// Ticks in one microsecond (100 ns tick).
pub const TICKS_PER_MICROSECOND: u64 = 10;

/// Ticks in one second (100 ns tick).
pub const TICKS_PER_SECOND: u64 = 10_000_000;

/// Converts a count of `hz` cycles to 100 ns ticks, rounding down and
/// saturating at `u64::MAX`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_lossless)]
pub const fn cycles_to_ticks(cycles: u64, hz: NonZeroU64) -> u64 {
    let ticks = cycles as u128 * TICKS_PER_SECOND as u128 / hz.get() as u128;
    if ticks > u64::MAX as u128 {
        u64::MAX
    } else {
        ticks as u64
    }
}

/// A monotonic tick source.
pub trait Clock {
    /// Current tick count. Must never go backwards.
    fn ticks(&self) -> u64;

    /// Called once per iteration of a wait loop.
    #[inline]
    fn relax(&self) {
        spin_loop();
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    #[inline]
    fn ticks(&self) -> u64 {
        (**self).ticks()
    }

    #[inline]
    fn relax(&self) {
        (**self).relax();
    }
}

/// How long a wait may take.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Timeout {
    /// Give up after this many ticks.
    Ticks(u64),
    /// Wait indefinitely.
    Forever,
}

impl Timeout {
    /// Do not wait at all beyond the first attempt.
    pub const IMMEDIATE: Self = Self::Ticks(0);

    /// Interprets a raw tick budget; `u64::MAX` means [`Forever`](Self::Forever).
    #[must_use]
    pub const fn from_ticks(ticks: u64) -> Self {
        if ticks == u64::MAX {
            Self::Forever
        } else {
            Self::Ticks(ticks)
        }
    }

    /// Interprets a firmware millisecond budget; `u16::MAX` means
    /// [`Forever`](Self::Forever).
    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn from_millis(millis: u16) -> Self {
        if millis == u16::MAX {
            Self::Forever
        } else {
            Self::Ticks(millis as u64 * TICKS_PER_MILLISECOND)
        }
    }

    /// Anchors the timeout at the current tick count of `clock`.
    #[must_use]
    pub fn deadline<C: Clock>(self, clock: &C) -> Deadline {
        match self {
            Self::Forever => Deadline(None),
            Self::Ticks(t) => Deadline(Some(clock.ticks().saturating_add(t))),
        }
    }
}

impl From<u64> for Timeout {
    fn from(ticks: u64) -> Self {
        Self::from_ticks(ticks)
    }
}

/// An absolute point on a clock's tick axis, or none.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Deadline(Option<u64>);

impl Deadline {
    /// A deadline that never expires.
    pub const NEVER: Self = Self(None);

    #[must_use]
    pub const fn at(tick: u64) -> Self {
        Self(Some(tick))
    }

    /// Whether `clock` has reached the deadline.
    #[inline]
    #[must_use]
    pub fn expired<C: Clock>(&self, clock: &C) -> bool {
        self.0.is_some_and(|at| clock.ticks() >= at)
    }
}

/// Busy-waits for `micros` microseconds.
pub fn stall<C: Clock>(clock: &C, micros: u64) {
    let deadline = Timeout::Ticks(micros.saturating_mul(TICKS_PER_MICROSECOND)).deadline(clock);
    while !deadline.expired(clock) {
        spin_loop();
    }
}

/// Waits for `millis` milliseconds, relaxing between polls.
pub fn sleep<C: Clock>(clock: &C, millis: u64) {
    let deadline = Timeout::Ticks(millis.saturating_mul(TICKS_PER_MILLISECOND)).deadline(clock);
    while !deadline.expired(clock) {
        clock.relax();
    }
}

/// Reads the time stamp counter.
#[cfg(target_arch = "x86_64")]
#[inline]
#[must_use]
pub fn rdtsc() -> u64 {
    let lo: u32;
    let hi: u32;
    unsafe {
        core::arch::asm!("lfence; rdtsc", out("eax") lo, out("edx") hi, options(nomem, nostack, preserves_flags));
    }
    (u64::from(hi) << 32) | u64::from(lo)
}

/// A [`Clock`] backed by the time stamp counter.
///
/// The TSC frequency must be measured by the caller (CPUID leaf 15h/16h or a
/// PIT window) before constructing the clock; there is no default.
#[cfg(target_arch = "x86_64")]
#[derive(Copy, Clone, Debug)]
pub struct TscClock {
    tsc_hz: NonZeroU64,
}

#[cfg(target_arch = "x86_64")]
impl TscClock {
    /// Returns `None` for a zero frequency.
    #[must_use]
    pub const fn new(tsc_hz: u64) -> Option<Self> {
        match NonZeroU64::new(tsc_hz) {
            Some(tsc_hz) => Some(Self { tsc_hz }),
            None => None,
        }
    }

    #[must_use]
    pub const fn frequency(&self) -> u64 {
        self.tsc_hz.get()
    }
}

#[cfg(target_arch = "x86_64")]
impl Clock for TscClock {
    fn ticks(&self) -> u64 {
        cycles_to_ticks(rdtsc(), self.tsc_hz)
    }
}
