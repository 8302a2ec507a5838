//! # ACPI Host Services
//!
//! The kernel side of the contract with an embedded ACPI interpreter. The
//! interpreter is a black box that needs memory, locks, events and a clock
//! from its host; [`HostServices`] provides all of them on top of the kernel
//! allocators and `kernel-sync`.
//!
//! ## Services
//!
//! | Service | Operations | Backed by |
//! |---------|------------|-----------|
//! | Memory | `alloc`, `calloc`, `free` | [`PoolAllocator`](kernel_alloc::PoolAllocator) |
//! | Pages | `alloc_pages`, `alloc_pages_below`, `free_pages` | [`PageAllocator`](kernel_alloc::PageAllocator) |
//! | Mutex | `create`, `destroy`, `acquire` (timed), `release` | [`TimedMutex`](kernel_sync::TimedMutex) |
//! | Spinlock | `create`, `destroy`, `lock`, `unlock` | [`Spinlock`](kernel_sync::Spinlock) |
//! | Event | `create`, `destroy`, `wait` (timed), `signal`, `reset` | [`Event`](kernel_sync::Event) |
//! | Time | `ticks`, `stall`, `sleep` | a [`Clock`](kernel_sync::Clock) |
//! | Raw memory | `raw_memory_read`, `raw_memory_write` | the direct map |
//! | Firmware | `handle_firmware_request`, [`forward_log`] | `log`, [`InterruptControl`](kernel_sync::InterruptControl) |
//!
//! Synchronization objects live in pool memory and are referred to by
//! copyable [`Handle`]s. Timeouts arrive from the interpreter as
//! milliseconds; convert them with [`Timeout::from_millis`](kernel_sync::Timeout::from_millis),
//! which maps `0xFFFF` to "wait forever".
//!
//! ## Fatal errors
//! A `Fatal` request logs and halts the processor. Nothing tries to carry
//! on after the firmware has declared the platform broken.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod firmware;
mod handles;
mod host;
mod raw_memory;

pub use firmware::{FirmwareLogLevel, FirmwareRequest, LOG_TARGET, forward_log};
pub use handles::{EventHandle, Handle, MutexHandle, SpinlockHandle};
pub use host::HostServices;
pub use raw_memory::AccessWidth;

/// Failures reported back to the interpreter.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ServiceError {
    /// A malformed argument, such as an access width other than 1, 2, 4 or 8.
    #[error("invalid argument")]
    InvalidArgument,
    /// The pool could not hold a new object.
    #[error("out of memory")]
    OutOfMemory,
}
