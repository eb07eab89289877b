//! Log level definitions

use super::error::{LoggerError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Severity of a record, totally ordered from `Trace` to `Fatal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    #[serde(alias = "warn")]
    Warning = 3,
    Error = 4,
    Fatal = 5,
}

impl LogLevel {
    /// All levels in ascending severity.
    pub const ALL: [LogLevel; 6] = [
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Fatal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Fatal => "fatal",
        }
    }

    #[cfg(feature = "console")]
    pub fn color_code(&self) -> colored::Color {
        use colored::Color::*;
        match self {
            LogLevel::Trace => BrightBlack,
            LogLevel::Debug => Blue,
            LogLevel::Info => Green,
            LogLevel::Warning => Yellow,
            LogLevel::Error => Red,
            LogLevel::Fatal => BrightRed,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = LoggerError;

    /// Level tokens are the lowercase names; `warn` is accepted as an alias.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "fatal" => Ok(LogLevel::Fatal),
            _ => Err(LoggerError::invalid_level(s)),
        }
    }
}

/// Parse a level token, failing on anything outside the six known names.
pub fn parse_log_level(token: &str) -> Result<LogLevel> {
    token.parse()
}

/// Compare two levels by position in the severity sequence.
pub fn compare_log_level(a: LogLevel, b: LogLevel) -> Ordering {
    a.cmp(&b)
}

/// Compare two level tokens; either side being unrecognized is an error.
pub fn compare_level_tokens(a: &str, b: &str) -> Result<Ordering> {
    Ok(compare_log_level(parse_log_level(a)?, parse_log_level(b)?))
}
