//! Sink trait for record destinations

use super::error::Result;
use super::filter::{to_filter, Disposal, FilterLike, FilterRef};
use super::record::LogRecord;
use async_trait::async_trait;
use std::sync::Arc;

/// A destination for log records.
///
/// Sinks are shared between loggers and threads, so `emit` takes `&self`;
/// implementations that keep mutable state guard it themselves.
///
/// # Example
///
/// ```no_run
/// use logtape::{LogRecord, Result, Sink};
///
/// struct StdoutSink;
///
/// impl Sink for StdoutSink {
///     fn emit(&self, record: &LogRecord) -> Result<()> {
///         println!("{} {}", record.level, record.message());
///         Ok(())
///     }
///
///     fn name(&self) -> &str {
///         "stdout"
///     }
/// }
/// ```
#[async_trait]
pub trait Sink: Send + Sync {
    fn emit(&self, record: &LogRecord) -> Result<()>;

    fn name(&self) -> &str;

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

pub type SinkRef = Arc<dyn Sink>;

/// Identity of a shared sink, stable for as long as it is alive.
pub(crate) fn sink_id(sink: &SinkRef) -> usize {
    Arc::as_ptr(sink) as *const () as usize
}

/// Sink backed by a closure.
pub struct FnSink<F> {
    name: String,
    f: F,
}

impl<F> Sink for FnSink<F>
where
    F: Fn(&LogRecord) -> Result<()> + Send + Sync,
{
    fn emit(&self, record: &LogRecord) -> Result<()> {
        (self.f)(record)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

pub fn sink_fn<F>(name: impl Into<String>, f: F) -> SinkRef
where
    F: Fn(&LogRecord) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(FnSink {
        name: name.into(),
        f,
    })
}

/// Sink that only forwards records accepted by a filter.
pub struct FilteredSink {
    inner: SinkRef,
    filter: FilterRef,
}

#[async_trait]
impl Sink for FilteredSink {
    fn emit(&self, record: &LogRecord) -> Result<()> {
        if self.filter.accepts(record) {
            self.inner.emit(record)
        } else {
            Ok(())
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn disposal(&self) -> Disposal {
        self.inner.disposal()
    }

    fn dispose(&self) -> Result<()> {
        self.inner.dispose()
    }

    async fn dispose_async(&self) -> Result<()> {
        self.inner.dispose_async().await
    }
}

/// Wrap `sink` so it only sees records passing `filter`.
pub fn with_filter(sink: SinkRef, filter: impl Into<FilterLike>) -> SinkRef {
    Arc::new(FilteredSink {
        inner: sink,
        filter: to_filter(filter),
    })
}
