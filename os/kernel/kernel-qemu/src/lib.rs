//! # Debug Console Logging
//!
//! A [`log`] backend for kernels running under QEMU (or Bochs), writing to
//! the debug console I/O port `0xE9`.
//!
//! ```text
//! log::info!(..)
//!     ↓
//! DebugconLogger  ── "[LEVEL] target: message\n"
//!     ↓
//! ByteSink        ── IoPort(0xE9) in the kernel, a buffer in tests
//!     ↓
//! -debugcon stdio / file:debug.log
//! ```
//!
//! Capture the output on the host with
//!
//! ```bash
//! qemu-system-x86_64 ... -debugcon stdio
//! ```
//!
//! ## Features
//! - `enabled` (default): port writes are compiled in. Without it
//!   [`IoPort`] swallows every byte, so the logger stays installable but
//!   silent.
//!
//! ## Usage
//! ```rust,no_run
//! use kernel_qemu::{DEBUGCON, DebugconLogger};
//! use log::{LevelFilter, info};
//!
//! static LOGGER: DebugconLogger<kernel_qemu::IoPort> = DebugconLogger::new(DEBUGCON, LevelFilter::Debug);
//!
//! LOGGER.init().expect("logger initialization");
//! info!("memory map imported");
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod logger;
mod port;

pub use logger::DebugconLogger;
pub use port::{DEBUGCON, DEBUGCON_PORT, IoPort};

/// Destination for log bytes.
pub trait ByteSink {
    fn put(&self, byte: u8);

    fn put_all(&self, bytes: &[u8]) {
        for &b in bytes {
            self.put(b);
        }
    }
}

impl<S: ByteSink + ?Sized> ByteSink for &S {
    fn put(&self, byte: u8) {
        (**self).put(byte);
    }
}
