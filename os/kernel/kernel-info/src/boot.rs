//! # Boot Memory Map

use core::fmt;

/// Classification of a physical memory region, as reported by the bootloader.
///
/// The discriminants follow the Limine memory map protocol so raw entry types
/// convert with [`TryFrom<u64>`].
#[repr(u64)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum MemoryRegionKind {
    /// Free RAM, handed to the page allocator.
    Usable = 0,
    Reserved = 1,
    /// ACPI tables; reclaimable once the interpreter is done with them.
    AcpiReclaimable = 2,
    /// ACPI non-volatile storage; must be preserved.
    AcpiNvs = 3,
    BadMemory = 4,
    /// Bootloader structures (page tables, this very map).
    BootloaderReclaimable = 5,
    KernelAndModules = 6,
    Framebuffer = 7,
}

/// A raw memory map type outside the known classes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("unknown memory region type {0}")]
pub struct UnknownRegionKind(pub u64);

impl MemoryRegionKind {
    /// The upper-case name used in boot logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Usable => "USABLE",
            Self::Reserved => "RESERVED",
            Self::AcpiReclaimable => "ACPI_RECLAIMABLE",
            Self::AcpiNvs => "ACPI_NVS",
            Self::BadMemory => "BAD_MEMORY",
            Self::BootloaderReclaimable => "BOOTLOADER_RECLAIMABLE",
            Self::KernelAndModules => "KERNEL_AND_MODULES",
            Self::Framebuffer => "FRAMEBUFFER",
        }
    }

    #[must_use]
    pub const fn is_usable(self) -> bool {
        matches!(self, Self::Usable)
    }
}

impl fmt::Display for MemoryRegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u64> for MemoryRegionKind {
    type Error = UnknownRegionKind;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Usable,
            1 => Self::Reserved,
            2 => Self::AcpiReclaimable,
            3 => Self::AcpiNvs,
            4 => Self::BadMemory,
            5 => Self::BootloaderReclaimable,
            6 => Self::KernelAndModules,
            7 => Self::Framebuffer,
            other => return Err(UnknownRegionKind(other)),
        })
    }
}

/// One entry of the bootloader's physical memory map.
///
/// Addresses are **physical**; `length` is in bytes and need not be page aligned.
#[repr(C)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MemoryMapEntry {
    /// First byte of the region.
    pub base: u64,
    /// Length of the region in bytes.
    pub length: u64,
    /// What the region may be used for.
    pub kind: MemoryRegionKind,
}

impl MemoryMapEntry {
    #[must_use]
    pub const fn new(base: u64, length: u64, kind: MemoryRegionKind) -> Self {
        Self { base, length, kind }
    }

    /// One past the last byte of the region (saturating).
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.base.saturating_add(self.length)
    }
}

impl fmt::Display for MemoryMapEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}-{:x}: {}", self.base, self.end(), self.kind)
    }
}
