//! Console sink

use super::formatter::{Formatter, JsonLinesFormatter, TextFormatter};
use crate::core::{LogLevel, LogRecord, Result, Sink};
use parking_lot::Mutex;
use std::io::Write;

/// Writes one line per record: error and fatal records to stderr,
/// everything else to stdout.
pub struct ConsoleSink {
    formatter: Box<dyn Formatter>,
    // Serializes writers so lines from concurrent emitters never interleave.
    write_lock: Mutex<()>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::with_formatter(TextFormatter::new().with_colors(true))
    }

    pub fn with_formatter(formatter: impl Formatter + 'static) -> Self {
        Self {
            formatter: Box::new(formatter),
            write_lock: Mutex::new(()),
        }
    }

    /// Plain text without ANSI colours.
    pub fn plain() -> Self {
        Self::with_formatter(TextFormatter::new())
    }

    pub fn json() -> Self {
        Self::with_formatter(JsonLinesFormatter::new())
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for ConsoleSink {
    fn emit(&self, record: &LogRecord) -> Result<()> {
        let line = self.formatter.format(record);
        let _guard = self.write_lock.lock();
        match record.level {
            LogLevel::Error | LogLevel::Fatal => writeln!(std::io::stderr().lock(), "{}", line)?,
            _ => writeln!(std::io::stdout().lock(), "{}", line)?,
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}
