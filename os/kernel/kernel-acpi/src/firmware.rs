use log::Level;

/// A request the interpreter raises on behalf of AML code (`Fatal`, `BreakPoint`).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FirmwareRequest {
    /// AML `Fatal(type, code, arg)`: the platform cannot continue.
    Fatal { kind: u8, code: u32, arg: u64 },
    /// AML `BreakPoint`.
    Breakpoint { context: usize },
}

/// Log levels of the firmware interpreter.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FirmwareLogLevel {
    Error,
    Warn,
    Info,
    Trace,
    Debug,
}

impl From<FirmwareLogLevel> for Level {
    fn from(level: FirmwareLogLevel) -> Self {
        match level {
            FirmwareLogLevel::Error => Self::Error,
            FirmwareLogLevel::Warn => Self::Warn,
            FirmwareLogLevel::Info => Self::Info,
            FirmwareLogLevel::Trace => Self::Trace,
            FirmwareLogLevel::Debug => Self::Debug,
        }
    }
}

/// Log target for everything the interpreter says.
pub const LOG_TARGET: &str = "acpi";

/// Forwards an interpreter log line to the kernel logger.
///
/// The interpreter terminates its messages with a newline; the logger adds
/// its own, so trailing line breaks are dropped.
pub fn forward_log(level: FirmwareLogLevel, message: &str) {
    log::log!(target: LOG_TARGET, Level::from(level), "{}", message.trim_end_matches(['\r', '\n']));
}
