//! Property values carried by log records
//!
//! This module provides:
//! - `Value`: a closed set of property value shapes, including captured errors
//!   and lazily evaluated entries
//! - `Properties`: a string-keyed bag of values
//! - `ErrorValue`: an error flattened into inspectable fields
//! - `Lazy`: a getter evaluated when a record's properties are materialized

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Value type for structured properties
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    BigInt(i128),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(Properties),
    Error(ErrorValue),
    Lazy(Lazy),
}

impl Value {
    /// Own-property lookup used by template path resolution.
    ///
    /// Only objects and captured errors have named properties.
    pub fn get_property(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(props) => props.get(key),
            Value::Error(err) => err.fields.get(key),
            _ => None,
        }
    }

    /// Element lookup used by template path resolution.
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        match self {
            Value::Array(items) => items.get(index),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Evaluate a lazy entry; every other value is returned unchanged.
    pub fn resolve(self) -> Value {
        match self {
            Value::Lazy(lazy) => lazy.evaluate(),
            other => other,
        }
    }

    /// Convert to serde_json::Value for JSON serialization
    #[must_use]
    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::Number((*i).into()),
            Value::BigInt(i) => {
                if let Ok(small) = i64::try_from(*i) {
                    serde_json::Value::Number(small.into())
                } else if let Ok(unsigned) = u64::try_from(*i) {
                    serde_json::Value::Number(unsigned.into())
                } else {
                    serde_json::Value::String(i.to_string())
                }
            }
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json_value).collect())
            }
            Value::Object(props) => props.to_json_value(),
            Value::Error(err) => err.fields.to_json_value(),
            Value::Lazy(lazy) => lazy.evaluate().to_json_value(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::BigInt(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::String(s) => write!(f, "{}", s),
            Value::Error(err) => write!(f, "{}", err),
            Value::Lazy(lazy) => write!(f, "{}", lazy.evaluate()),
            Value::Array(_) | Value::Object(_) => write!(f, "{}", self.to_json_value()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::BigInt(i) => serializer.serialize_i128(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(props) => props.serialize(serializer),
            Value::Error(err) => err.fields.serialize(serializer),
            Value::Lazy(lazy) => lazy.evaluate().serialize(serializer),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::String(s.clone())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        match i64::try_from(i) {
            Ok(small) => Value::Int(small),
            Err(_) => Value::BigInt(i as i128),
        }
    }
}

impl From<u64> for Value {
    fn from(i: u64) -> Self {
        match i64::try_from(i) {
            Ok(small) => Value::Int(small),
            Err(_) => Value::BigInt(i as i128),
        }
    }
}

impl From<i128> for Value {
    fn from(i: i128) -> Self {
        Value::BigInt(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Properties> for Value {
    fn from(props: Properties) -> Self {
        Value::Object(props)
    }
}

impl From<ErrorValue> for Value {
    fn from(err: ErrorValue) -> Self {
        Value::Error(err)
    }
}

impl From<Lazy> for Value {
    fn from(lazy: Lazy) -> Self {
        Value::Lazy(lazy)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::BigInt(u as i128)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// String-keyed property bag
///
/// Keys are kept sorted, so two bags holding the same entries compare and
/// serialize identically regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    fields: BTreeMap<String, Value>,
}

impl Properties {
    pub fn new() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }

    /// Add a field (builder style)
    pub fn with_field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Add a field (mutable version); returns the previous value for the key
    pub fn insert<K, V>(&mut self, key: K, value: V) -> Option<Value>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.fields.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields of `self` win over `other` on key collision.
    pub fn merge_over(mut self, other: &Properties) -> Properties {
        for (key, value) in other.fields.iter() {
            if !self.fields.contains_key(key) {
                self.fields.insert(key.clone(), value.clone());
            }
        }
        self
    }

    /// Fields of `other` win over `self` on key collision.
    pub fn overlay(mut self, other: Properties) -> Properties {
        self.fields.extend(other.fields);
        self
    }

    /// Evaluate every top-level lazy entry.
    pub fn resolve_lazy(self) -> Properties {
        if !self.fields.values().any(|v| matches!(v, Value::Lazy(_))) {
            return self;
        }
        Properties {
            fields: self
                .fields
                .into_iter()
                .map(|(k, v)| (k, v.resolve()))
                .collect(),
        }
    }

    /// Format fields as key=value pairs
    pub fn format_fields(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[must_use]
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json_value()))
                .collect(),
        )
    }
}

impl fmt::Display for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_fields())
    }
}

impl Serialize for Properties {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in self.fields.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Properties {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for Properties {
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl<'a> IntoIterator for &'a Properties {
    type Item = (&'a String, &'a Value);
    type IntoIter = std::collections::btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// An error captured as a value
///
/// The error is flattened into `name`, `message` and (when the error has a
/// source) `cause` fields so templates such as `{error.message}` can reach
/// into it.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorValue {
    fields: Properties,
}

impl ErrorValue {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            fields: Properties::new()
                .with_field("name", name.into())
                .with_field("message", message.into()),
        }
    }

    /// Capture an error and its source chain.
    pub fn from_error<E: std::error::Error + ?Sized>(error: &E) -> Self {
        let mut value = Self::new(short_type_name::<E>(), error.to_string());
        if let Some(source) = error.source() {
            value
                .fields
                .insert("cause", Value::Error(ErrorValue::from_dyn(source)));
        }
        value
    }

    fn from_dyn(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut value = Self::new("Error", error.to_string());
        if let Some(source) = error.source() {
            value
                .fields
                .insert("cause", Value::Error(ErrorValue::from_dyn(source)));
        }
        value
    }

    /// Attach an extra field, e.g. an error code.
    pub fn with_field<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.fields.insert(key, value);
        self
    }

    pub fn name(&self) -> &str {
        self.fields.get("name").and_then(Value::as_str).unwrap_or("Error")
    }

    pub fn message(&self) -> &str {
        self.fields.get("message").and_then(Value::as_str).unwrap_or("")
    }

    pub fn cause(&self) -> Option<&ErrorValue> {
        match self.fields.get("cause") {
            Some(Value::Error(cause)) => Some(cause),
            _ => None,
        }
    }

    pub fn fields(&self) -> &Properties {
        &self.fields
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name(), self.message())
    }
}

fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// A property whose value is computed when the record is materialized,
/// not when it is bound with [`Logger::with`](crate::Logger::with).
#[derive(Clone)]
pub struct Lazy {
    getter: Arc<dyn Fn() -> Value + Send + Sync>,
}

impl Lazy {
    pub fn new<F, V>(getter: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        Self {
            getter: Arc::new(move || getter().into()),
        }
    }

    pub fn evaluate(&self) -> Value {
        (self.getter)()
    }
}

/// Shorthand for [`Lazy::new`] wrapped into a [`Value`].
pub fn lazy<F, V>(getter: F) -> Value
where
    F: Fn() -> V + Send + Sync + 'static,
    V: Into<Value>,
{
    Value::Lazy(Lazy::new(getter))
}

impl fmt::Debug for Lazy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Lazy(..)")
    }
}

impl PartialEq for Lazy {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.getter, &other.getter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_properties_with_fields() {
        let props = Properties::new()
            .with_field("user_id", 123)
            .with_field("username", "john_doe")
            .with_field("active", true);

        assert_eq!(props.len(), 3);
        assert_eq!(props.get("user_id"), Some(&Value::Int(123)));
        assert_eq!(props.format_fields(), "active=true user_id=123 username=john_doe");
    }

    #[test]
    fn test_merge_priority() {
        let bound = Properties::from([("key", "bound"), ("other", "kept")]);
        let explicit = Properties::from([("key", "explicit")]);

        let merged = bound.clone().overlay(explicit.clone());
        assert_eq!(merged.get("key"), Some(&Value::from("explicit")));
        assert_eq!(merged.get("other"), Some(&Value::from("kept")));

        let merged = explicit.merge_over(&bound);
        assert_eq!(merged.get("key"), Some(&Value::from("explicit")));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_lazy_resolution_is_deferred() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let props = Properties::new().with_field(
            "request",
            lazy(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                "req-1"
            }),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let resolved = props.resolve_lazy();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolved.get("request"), Some(&Value::from("req-1")));
    }

    #[test]
    fn test_error_value_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing file");
        let err = crate::core::LoggerError::from(io);
        let value = ErrorValue::from_error(&err);

        assert_eq!(value.name(), "LoggerError");
        assert_eq!(value.message(), "IO error: missing file");
        assert_eq!(value.cause().map(ErrorValue::message), Some("missing file"));
        assert_eq!(
            Value::Error(value).get_property("message"),
            Some(&Value::from("IO error: missing file"))
        );
    }

    #[test]
    fn test_json_conversion() {
        let value = Value::from(Properties::new().with_field("n", 1).with_field("list", vec![1, 2]));
        assert_eq!(value.to_json_value(), serde_json::json!({"n": 1, "list": [1, 2]}));
        assert_eq!(serde_json::to_string(&value).unwrap(), r#"{"list":[1,2],"n":1}"#);

        let back = Value::from(serde_json::json!({"a": [true, null]}));
        assert_eq!(
            back.get_property("a").and_then(|a| a.get_index(1)),
            Some(&Value::Null)
        );
    }
}
