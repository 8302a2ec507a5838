//! # Kernel Boot Interface
//!
//! Data handed from the bootloader to the memory subsystem, and the physical
//! layout constants callers use when they need address-limited memory.
//!
//! ## Modules
//!
//! ### Boot Information ([`boot`])
//! * **Memory map entries**: `{ base, length, kind }` records describing the
//!   physical address space as classified by the bootloader.
//! * **Region classes**: the eight [`MemoryRegionKind`](boot::MemoryRegionKind)
//!   values; only [`Usable`](boot::MemoryRegionKind::Usable) memory is handed
//!   to the page allocator.
//!
//! ### Physical Layout ([`memory`])
//! Ceilings for devices that cannot address all of physical memory, suitable
//! as the `max_address` argument of a bounded page allocation.
//!
//! ## Usage
//!
//! ```rust
//! use kernel_info::boot::{MemoryMapEntry, MemoryRegionKind};
//!
//! let entry = MemoryMapEntry::new(0x10_0000, 0x20_0000, MemoryRegionKind::Usable);
//! assert!(entry.kind.is_usable());
//! assert_eq!(entry.end(), 0x30_0000);
//! assert_eq!(MemoryRegionKind::try_from(7), Ok(MemoryRegionKind::Framebuffer));
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod memory;
