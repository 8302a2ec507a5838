//! # Physical Layout

/// Page frame size managed by the page allocator.
pub const PAGE_SIZE: u64 = 4096;

/// Last byte reachable by legacy ISA DMA (24-bit addressing).
pub const ISA_DMA_LIMIT: u64 = 0x00FF_FFFF;

/// Last byte reachable by devices limited to 32-bit physical addresses.
pub const DMA32_LIMIT: u64 = 0xFFFF_FFFF;

/// No ceiling: any physical address is acceptable.
pub const NO_LIMIT: u64 = u64::MAX;

const _: () = {
    assert!(PAGE_SIZE.is_power_of_two());
    assert!((ISA_DMA_LIMIT + 1).is_multiple_of(PAGE_SIZE));
    assert!((DMA32_LIMIT + 1).is_multiple_of(PAGE_SIZE));
};
