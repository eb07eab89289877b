//! Record filters

use super::error::Result;
use super::log_level::LogLevel;
use super::record::LogRecord;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// How a sink or filter must be torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposal {
    /// Nothing to release
    None,
    /// Releasable with [`Filter::dispose`] / [`Sink::dispose`](super::sink::Sink::dispose)
    Sync,
    /// Only releasable with the async variants
    AsyncOnly,
}

/// A predicate deciding whether a record continues down the pipeline.
///
/// Any `Fn(&LogRecord) -> bool` is a filter.
#[async_trait]
pub trait Filter: Send + Sync {
    fn accepts(&self, record: &LogRecord) -> bool;

    fn disposal(&self) -> Disposal {
        Disposal::None
    }

    fn dispose(&self) -> Result<()> {
        Ok(())
    }

    async fn dispose_async(&self) -> Result<()> {
        self.dispose()
    }
}

impl<F> Filter for F
where
    F: Fn(&LogRecord) -> bool + Send + Sync,
{
    fn accepts(&self, record: &LogRecord) -> bool {
        self(record)
    }
}

pub type FilterRef = Arc<dyn Filter>;

/// Accepts records at or above a minimum level; `None` rejects everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelFilter {
    minimum: Option<LogLevel>,
}

impl LevelFilter {
    pub fn new(minimum: Option<LogLevel>) -> Self {
        Self { minimum }
    }

    pub fn minimum(&self) -> Option<LogLevel> {
        self.minimum
    }
}

#[async_trait]
impl Filter for LevelFilter {
    fn accepts(&self, record: &LogRecord) -> bool {
        self.minimum.is_some_and(|minimum| record.level >= minimum)
    }
}

/// Build the filter matching `minimum` and every more severe level.
pub fn get_level_filter(minimum: Option<LogLevel>) -> FilterRef {
    Arc::new(LevelFilter::new(minimum))
}

/// Something usable as a filter: a predicate or a bare level.
#[derive(Clone)]
pub enum FilterLike {
    Filter(FilterRef),
    Level(Option<LogLevel>),
}

impl FilterLike {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&LogRecord) -> bool + Send + Sync + 'static,
    {
        FilterLike::Filter(Arc::new(f))
    }
}

impl fmt::Debug for FilterLike {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterLike::Filter(_) => f.write_str("Filter(..)"),
            FilterLike::Level(level) => f.debug_tuple("Level").field(level).finish(),
        }
    }
}

impl From<FilterRef> for FilterLike {
    fn from(filter: FilterRef) -> Self {
        FilterLike::Filter(filter)
    }
}

impl From<LogLevel> for FilterLike {
    fn from(level: LogLevel) -> Self {
        FilterLike::Level(Some(level))
    }
}

impl From<Option<LogLevel>> for FilterLike {
    fn from(level: Option<LogLevel>) -> Self {
        FilterLike::Level(level)
    }
}

impl From<LevelFilter> for FilterLike {
    fn from(filter: LevelFilter) -> Self {
        FilterLike::Filter(Arc::new(filter))
    }
}

/// Normalize a filter-like value into a filter.
pub fn to_filter(filter: impl Into<FilterLike>) -> FilterRef {
    match filter.into() {
        FilterLike::Filter(filter) => filter,
        FilterLike::Level(level) => get_level_filter(level),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::{Message, RawMessage};
    use crate::core::value::Properties;

    fn record(level: LogLevel) -> LogRecord {
        LogRecord::new(
            "test",
            level,
            Message::literal("m"),
            RawMessage::Template("m".into()),
            Properties::new(),
        )
    }

    #[test]
    fn test_level_filter_threshold() {
        let filter = get_level_filter(Some(LogLevel::Warning));
        assert!(!filter.accepts(&record(LogLevel::Info)));
        assert!(filter.accepts(&record(LogLevel::Warning)));
        assert!(filter.accepts(&record(LogLevel::Fatal)));
    }

    #[test]
    fn test_level_filter_none_rejects_all() {
        let filter = get_level_filter(None);
        for level in LogLevel::ALL {
            assert!(!filter.accepts(&record(level)));
        }
    }

    #[test]
    fn test_to_filter_normalizes() {
        let closure = to_filter(FilterLike::predicate(|r: &LogRecord| r.level == LogLevel::Debug));
        assert!(closure.accepts(&record(LogLevel::Debug)));
        assert!(!closure.accepts(&record(LogLevel::Info)));

        let by_level = to_filter(LogLevel::Error);
        assert!(by_level.accepts(&record(LogLevel::Error)));
        assert_eq!(by_level.disposal(), Disposal::None);
    }
}
