use crate::ByteSink;
use core::fmt::{self, Write};
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Writes each record as `"[LEVEL] target: message\n"` to a [`ByteSink`].
pub struct DebugconLogger<S> {
    sink: S,
    max_level: LevelFilter,
}

impl<S: ByteSink> DebugconLogger<S> {
    #[must_use]
    pub const fn new(sink: S, max_level: LevelFilter) -> Self {
        Self { sink, max_level }
    }

    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// Installs the logger. Call once during early init.
    ///
    /// # Errors
    /// Fails if a logger is already installed.
    pub fn init(&'static self) -> Result<(), SetLoggerError>
    where
        S: Sync + Send,
    {
        log::set_logger(self)?;
        log::set_max_level(self.max_level);
        Ok(())
    }
}

struct SinkWriter<'a, S>(&'a S);

impl<S: ByteSink> Write for SinkWriter<'_, S> {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.put_all(s.as_bytes());
        Ok(())
    }
}

impl<S: ByteSink + Sync + Send> Log for DebugconLogger<S> {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // Best effort: the sink itself cannot fail.
        let _ = writeln!(
            SinkWriter(&self.sink),
            "[{}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}
