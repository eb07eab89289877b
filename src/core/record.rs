//! Log record structure
//!
//! A [`LogRecord`] is immutable once created. Its message, raw message and
//! properties may be computed on first access through [`Deferred`]; the
//! computed value is cached and shared by every clone of the record.

use super::log_level::LogLevel;
use super::value::{Properties, Value};
use chrono::{DateTime, TimeZone, Utc};
use serde::de::{Deserialize, Deserializer};
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, LazyLock};

/// Hierarchical logger identity, e.g. `["app", "db"]`. The empty path is the root.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Category(Arc<[String]>);

impl Category {
    pub fn root() -> Self {
        Category(Arc::from(Vec::<String>::new()))
    }

    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Category(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Category extended by `other`'s segments.
    pub fn join(&self, other: &Category) -> Category {
        Category(self.0.iter().chain(other.0.iter()).cloned().collect())
    }

    /// True when `self` is a (non-strict) prefix of `other`.
    ///
    /// The root category is never considered related to anything but itself,
    /// so this returns false whenever either side is empty.
    pub fn is_prefix_of(&self, other: &Category) -> bool {
        if self.is_root() || other.is_root() || self.len() > other.len() {
            return false;
        }
        self.0.iter().zip(other.0.iter()).all(|(a, b)| a == b)
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::root()
    }
}

impl fmt::Debug for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl From<&str> for Category {
    /// A single segment; the empty string names the root.
    fn from(segment: &str) -> Self {
        if segment.is_empty() {
            Category::root()
        } else {
            Category::new([segment])
        }
    }
}

impl From<String> for Category {
    fn from(segment: String) -> Self {
        Category::from(segment.as_str())
    }
}

impl From<&[&str]> for Category {
    fn from(segments: &[&str]) -> Self {
        Category::new(segments.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for Category {
    fn from(segments: [&str; N]) -> Self {
        Category::new(segments)
    }
}

impl From<Vec<String>> for Category {
    fn from(segments: Vec<String>) -> Self {
        Category(Arc::from(segments))
    }
}

impl From<Vec<&str>> for Category {
    fn from(segments: Vec<&str>) -> Self {
        Category::new(segments)
    }
}

impl From<&Category> for Category {
    fn from(category: &Category) -> Self {
        category.clone()
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum Repr {
            One(String),
            Many(Vec<String>),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::One(segment) => Category::from(segment),
            Repr::Many(segments) => Category::from(segments),
        })
    }
}

/// A piece of a rendered message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MessagePart<'a> {
    Literal(&'a str),
    /// Substituted value; `None` when the placeholder resolved to nothing.
    Value(Option<&'a Value>),
}

/// Rendered message: literals interleaved with substituted values.
///
/// There is always exactly one more literal than values, so the part
/// sequence starts and ends with a (possibly empty) literal and its length
/// is odd.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    literals: Vec<String>,
    values: Vec<Option<Value>>,
}

impl Message {
    pub fn new() -> Self {
        Self::literal("")
    }

    pub fn literal(text: impl Into<String>) -> Self {
        Self {
            literals: vec![text.into()],
            values: Vec::new(),
        }
    }

    /// Append text to the trailing literal.
    pub fn push_str(&mut self, text: &str) {
        if let Some(last) = self.literals.last_mut() {
            last.push_str(text);
        }
    }

    /// Append a substituted value followed by a fresh empty literal.
    pub fn push_value(&mut self, value: Option<Value>) {
        self.values.push(value);
        self.literals.push(String::new());
    }

    /// Number of parts (always odd).
    pub fn len(&self) -> usize {
        self.literals.len() + self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.literals.iter().all(String::is_empty)
    }

    pub fn literals(&self) -> &[String] {
        &self.literals
    }

    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }

    pub fn part(&self, index: usize) -> Option<MessagePart<'_>> {
        if index % 2 == 0 {
            self.literals
                .get(index / 2)
                .map(|s| MessagePart::Literal(s.as_str()))
        } else {
            self.values
                .get(index / 2)
                .map(|v| MessagePart::Value(v.as_ref()))
        }
    }

    pub fn parts(&self) -> impl Iterator<Item = MessagePart<'_>> {
        (0..self.len()).filter_map(move |i| self.part(i))
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in self.parts() {
            match part {
                MessagePart::Literal(text) => f.write_str(text)?,
                MessagePart::Value(Some(Value::String(s))) => write!(f, "{:?}", s)?,
                MessagePart::Value(Some(value)) => write!(f, "{}", value)?,
                MessagePart::Value(None) => f.write_str("undefined")?,
            }
        }
        Ok(())
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.parts().map(|part| match part {
            MessagePart::Literal(text) => Value::String(text.to_string()),
            MessagePart::Value(value) => value.cloned().unwrap_or(Value::Null),
        }))
    }
}

/// The template a message was rendered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawMessage {
    /// A `{placeholder}` template.
    Template(String),
    /// Literal fragments of a template call; values sit between them.
    Fragments(Vec<String>),
}

impl Serialize for RawMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RawMessage::Template(template) => serializer.serialize_str(template),
            RawMessage::Fragments(fragments) => serializer.collect_seq(fragments.iter()),
        }
    }
}

type Thunk<T> = Box<dyn FnOnce() -> T + Send>;

/// Evaluate-once cell shared by clones.
///
/// The producer runs on first access; every later access (from any clone,
/// on any thread) observes the same cached value.
pub struct Deferred<T>(Arc<LazyLock<T, Thunk<T>>>);

impl<T: Send + 'static> Deferred<T> {
    pub fn new<F>(producer: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Deferred(Arc::new(LazyLock::new(Box::new(producer))))
    }

    pub fn ready(value: T) -> Self {
        Self::new(move || value)
    }

    pub fn get(&self) -> &T {
        LazyLock::force(&self.0)
    }
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Deferred(Arc::clone(&self.0))
    }
}

/// A single log event.
#[derive(Clone)]
pub struct LogRecord {
    pub category: Category,
    pub level: LogLevel,
    /// Milliseconds since the Unix epoch.
    pub timestamp: f64,
    message: Deferred<Message>,
    raw_message: Deferred<RawMessage>,
    properties: Deferred<Properties>,
}

impl LogRecord {
    pub fn new(
        category: impl Into<Category>,
        level: LogLevel,
        message: Message,
        raw_message: RawMessage,
        properties: Properties,
    ) -> Self {
        Self {
            category: category.into(),
            level,
            timestamp: now_millis(),
            message: Deferred::ready(message),
            raw_message: Deferred::ready(raw_message),
            properties: Deferred::ready(properties),
        }
    }

    /// Build a record whose parts are computed on first access.
    pub fn deferred(
        category: Category,
        level: LogLevel,
        timestamp: f64,
        message: Deferred<Message>,
        raw_message: Deferred<RawMessage>,
        properties: Deferred<Properties>,
    ) -> Self {
        Self {
            category,
            level,
            timestamp,
            message,
            raw_message,
            properties,
        }
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<Category>) -> Self {
        self.category = category.into();
        self
    }

    /// Same record with `bound` merged underneath its own properties.
    #[must_use]
    pub fn with_bound_properties(mut self, bound: Properties) -> Self {
        if bound.is_empty() {
            return self;
        }
        let own = self.properties.clone();
        self.properties =
            Deferred::new(move || bound.resolve_lazy().overlay(own.get().clone()));
        self
    }

    pub fn message(&self) -> &Message {
        self.message.get()
    }

    pub fn raw_message(&self) -> &RawMessage {
        self.raw_message.get()
    }

    pub fn properties(&self) -> &Properties {
        self.properties.get()
    }

    /// Timestamp as a `DateTime`, when it is finite and in range.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        if !self.timestamp.is_finite() {
            return None;
        }
        Utc.timestamp_millis_opt(self.timestamp as i64).single()
    }

    /// Snapshot of the record as a property value.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.header_fields()
                .with_field("message", self.message().to_string())
                .with_field("properties", self.properties().clone()),
        )
    }

    /// Snapshot limited to the eagerly known fields; never forces the
    /// deferred message or properties.
    pub fn to_header_value(&self) -> Value {
        Value::Object(self.header_fields())
    }

    fn header_fields(&self) -> Properties {
        Properties::new()
            .with_field(
                "category",
                self.category
                    .segments()
                    .iter()
                    .map(|s| Value::from(s.as_str()))
                    .collect::<Vec<_>>(),
            )
            .with_field("level", self.level.as_str())
            .with_field("timestamp", self.timestamp)
    }
}

impl fmt::Debug for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogRecord")
            .field("category", &self.category)
            .field("level", &self.level)
            .field("timestamp", &self.timestamp)
            .field("message", self.message())
            .field("raw_message", self.raw_message())
            .field("properties", self.properties())
            .finish()
    }
}

impl Serialize for LogRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("LogRecord", 6)?;
        state.serialize_field("category", &self.category)?;
        state.serialize_field("level", &self.level)?;
        state.serialize_field("timestamp", &self.timestamp)?;
        state.serialize_field("message", self.message())?;
        state.serialize_field("rawMessage", self.raw_message())?;
        state.serialize_field("properties", self.properties())?;
        state.end()
    }
}

/// A record that has not been assigned a category yet.
#[derive(Debug, Clone)]
pub struct RecordDraft {
    pub level: LogLevel,
    pub timestamp: f64,
    pub message: Message,
    pub raw_message: RawMessage,
    pub properties: Properties,
}

impl RecordDraft {
    pub fn new(level: LogLevel, message: Message, raw_message: RawMessage) -> Self {
        Self {
            level,
            timestamp: now_millis(),
            message,
            raw_message,
            properties: Properties::new(),
        }
    }

    #[must_use]
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    pub fn into_record(self, category: Category) -> LogRecord {
        LogRecord::new(
            category,
            self.level,
            self.message,
            self.raw_message,
            self.properties,
        )
        .with_timestamp(self.timestamp)
    }
}

pub(crate) fn now_millis() -> f64 {
    Utc::now().timestamp_millis() as f64
}
