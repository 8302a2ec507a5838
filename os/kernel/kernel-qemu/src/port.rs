use crate::ByteSink;

/// The debug console port of QEMU and Bochs (`-debugcon`).
pub const DEBUGCON_PORT: u16 = 0xE9;

/// The debug console as a [`ByteSink`].
pub const DEBUGCON: IoPort = IoPort::new(DEBUGCON_PORT);

/// An x86 I/O port written with `out`.
///
/// Requires CPL0 (or a permissive I/O bitmap). Off x86 or with the
/// `enabled` feature disabled, writes are dropped.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct IoPort(u16);

impl IoPort {
    #[must_use]
    pub const fn new(port: u16) -> Self {
        Self(port)
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.0
    }
}

impl ByteSink for IoPort {
    #[allow(clippy::inline_always)]
    #[inline(always)]
    fn put(&self, byte: u8) {
        #[cfg(all(feature = "enabled", any(target_arch = "x86", target_arch = "x86_64")))]
        unsafe {
            core::arch::asm!(
                "out dx, al",
                in("dx") self.0,
                in("al") byte,
                options(nomem, nostack, preserves_flags)
            );
        }
        #[cfg(not(all(feature = "enabled", any(target_arch = "x86", target_arch = "x86_64"))))]
        let _ = byte;
    }
}
