//! Line formatters for log records
//!
//! - `TextFormatter`: `2025-01-08T10:30:45.123Z [INF] app·db: Connected`
//! - `JsonLinesFormatter`: one JSON object per record

use crate::core::{LogLevel, LogRecord};
use chrono::{DateTime, TimeZone, Utc};

/// Renders a record as a single line (without the trailing newline).
pub trait Formatter: Send + Sync {
    fn format(&self, record: &LogRecord) -> String;
}

impl<F> Formatter for F
where
    F: Fn(&LogRecord) -> String + Send + Sync,
{
    fn format(&self, record: &LogRecord) -> String {
        self(record)
    }
}

/// Timestamp rendering
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TimestampFormat {
    /// `2025-01-08T10:30:45.123Z`
    #[default]
    Iso8601,
    /// `2025-01-08T10:30:45.123+00:00`
    Rfc3339,
    /// Milliseconds since the epoch
    UnixMillis,
    /// strftime-compatible pattern
    Custom(String),
    /// Leave the timestamp out
    None,
}

impl TimestampFormat {
    /// Render `timestamp` (milliseconds since the epoch); `None` for formats
    /// without output or timestamps outside chrono's range.
    pub fn format(&self, timestamp: f64) -> Option<String> {
        if let TimestampFormat::UnixMillis = self {
            return Some(format!("{}", timestamp));
        }
        let datetime = to_datetime(timestamp)?;
        match self {
            TimestampFormat::Iso8601 => {
                Some(datetime.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
            }
            TimestampFormat::Rfc3339 => Some(datetime.to_rfc3339()),
            TimestampFormat::Custom(pattern) => Some(datetime.format(pattern).to_string()),
            TimestampFormat::UnixMillis | TimestampFormat::None => None,
        }
    }
}

fn to_datetime(timestamp: f64) -> Option<DateTime<Utc>> {
    if !timestamp.is_finite() {
        return None;
    }
    Utc.timestamp_millis_opt(timestamp as i64).single()
}

fn level_abbreviation(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "TRC",
        LogLevel::Debug => "DBG",
        LogLevel::Info => "INF",
        LogLevel::Warning => "WRN",
        LogLevel::Error => "ERR",
        LogLevel::Fatal => "FTL",
    }
}

/// Human-readable single-line format
#[derive(Debug, Clone)]
pub struct TextFormatter {
    timestamp_format: TimestampFormat,
    category_separator: String,
    #[cfg_attr(not(feature = "console"), allow(dead_code))]
    use_colors: bool,
    include_properties: bool,
}

impl TextFormatter {
    pub fn new() -> Self {
        Self {
            timestamp_format: TimestampFormat::default(),
            category_separator: "·".to_string(),
            use_colors: false,
            include_properties: false,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_category_separator(mut self, separator: impl Into<String>) -> Self {
        self.category_separator = separator.into();
        self
    }

    /// ANSI colours for the level tag; ignored without the `console` feature.
    #[must_use = "builder methods return a new value"]
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    /// Append the record's properties as `key=value` pairs.
    #[must_use = "builder methods return a new value"]
    pub fn with_properties(mut self, include: bool) -> Self {
        self.include_properties = include;
        self
    }

    fn level_tag(&self, level: LogLevel) -> String {
        let tag = level_abbreviation(level);
        #[cfg(feature = "console")]
        if self.use_colors {
            use colored::Colorize;
            return tag.color(level.color_code()).to_string();
        }
        tag.to_string()
    }
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter for TextFormatter {
    fn format(&self, record: &LogRecord) -> String {
        let mut line = String::new();
        if let Some(timestamp) = self.timestamp_format.format(record.timestamp) {
            line.push_str(&timestamp);
            line.push(' ');
        }
        line.push_str(&format!(
            "[{}] {}: {}",
            self.level_tag(record.level),
            record.category.segments().join(&self.category_separator),
            record.message()
        ));
        if self.include_properties && !record.properties().is_empty() {
            line.push(' ');
            line.push_str(&record.properties().format_fields());
        }
        line
    }
}

/// JSON Lines output: `@timestamp`, `level`, `message`, `logger`, `properties`
#[derive(Debug, Clone, Default)]
pub struct JsonLinesFormatter {
    timestamp_format: TimestampFormat,
}

impl JsonLinesFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    fn timestamp_json(&self, timestamp: f64) -> serde_json::Value {
        match &self.timestamp_format {
            TimestampFormat::UnixMillis => serde_json::Number::from_f64(timestamp)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            format => format
                .format(timestamp)
                .map(serde_json::Value::String)
                .unwrap_or(serde_json::Value::Null),
        }
    }
}

impl Formatter for JsonLinesFormatter {
    fn format(&self, record: &LogRecord) -> String {
        let mut object = serde_json::Map::new();
        object.insert("@timestamp".to_string(), self.timestamp_json(record.timestamp));
        object.insert(
            "level".to_string(),
            serde_json::Value::String(record.level.as_str().to_uppercase()),
        );
        object.insert(
            "message".to_string(),
            serde_json::Value::String(record.message().to_string()),
        );
        object.insert(
            "logger".to_string(),
            serde_json::Value::String(record.category.to_string()),
        );
        object.insert(
            "properties".to_string(),
            record.properties().to_json_value(),
        );
        serde_json::Value::Object(object).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Message, Properties, RawMessage, Value};

    fn record() -> LogRecord {
        let mut message = Message::literal("Hello, ");
        message.push_value(Some(Value::from("world")));
        LogRecord::new(
            ["app", "db"],
            LogLevel::Info,
            message,
            RawMessage::Template("Hello, {name}".into()),
            Properties::new().with_field("name", "world"),
        )
        .with_timestamp(1_736_332_245_123.0)
    }

    #[test]
    fn test_text_format() {
        let line = TextFormatter::new().format(&record());
        assert_eq!(line, "2025-01-08T10:30:45.123Z [INF] app·db: Hello, \"world\"");

        let line = TextFormatter::new()
            .with_timestamp_format(TimestampFormat::None)
            .with_category_separator(".")
            .with_properties(true)
            .format(&record());
        assert_eq!(line, "[INF] app.db: Hello, \"world\" name=world");
    }

    #[test]
    fn test_json_lines_format() {
        let line = JsonLinesFormatter::new().format(&record());
        let json: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(json["@timestamp"], "2025-01-08T10:30:45.123Z");
        assert_eq!(json["level"], "INFO");
        assert_eq!(json["logger"], "app.db");
        assert_eq!(json["properties"]["name"], "world");
    }

    #[test]
    fn test_non_finite_timestamp() {
        assert_eq!(TimestampFormat::Iso8601.format(f64::NAN), None);
        let line = TextFormatter::new().format(&record().with_timestamp(f64::INFINITY));
        assert!(line.starts_with("[INF]"));
    }
}
