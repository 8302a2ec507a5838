use crate::ServiceError;

/// Width of a raw physical memory access.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AccessWidth {
    Byte = 1,
    Word = 2,
    Dword = 4,
    Qword = 8,
}

impl AccessWidth {
    #[must_use]
    pub const fn bytes(self) -> usize {
        self as usize
    }
}

impl TryFrom<u8> for AccessWidth {
    type Error = ServiceError;

    fn try_from(width: u8) -> Result<Self, ServiceError> {
        match width {
            1 => Ok(Self::Byte),
            2 => Ok(Self::Word),
            4 => Ok(Self::Dword),
            8 => Ok(Self::Qword),
            _ => Err(ServiceError::InvalidArgument),
        }
    }
}

/// Volatile read of `width` bytes at `ptr`, zero-extended.
///
/// # Safety
/// `ptr` must be valid and aligned for a read of `width` bytes.
pub(crate) unsafe fn read(ptr: *const u8, width: AccessWidth) -> u64 {
    unsafe {
        match width {
            AccessWidth::Byte => u64::from(ptr.read_volatile()),
            AccessWidth::Word => u64::from(ptr.cast::<u16>().read_volatile()),
            AccessWidth::Dword => u64::from(ptr.cast::<u32>().read_volatile()),
            AccessWidth::Qword => ptr.cast::<u64>().read_volatile(),
        }
    }
}

/// Volatile write of the low `width` bytes of `value` to `ptr`.
///
/// # Safety
/// `ptr` must be valid and aligned for a write of `width` bytes.
#[allow(clippy::cast_possible_truncation)]
pub(crate) unsafe fn write(ptr: *mut u8, width: AccessWidth, value: u64) {
    unsafe {
        match width {
            AccessWidth::Byte => ptr.write_volatile(value as u8),
            AccessWidth::Word => ptr.cast::<u16>().write_volatile(value as u16),
            AccessWidth::Dword => ptr.cast::<u32>().write_volatile(value as u32),
            AccessWidth::Qword => ptr.cast::<u64>().write_volatile(value),
        }
    }
}
