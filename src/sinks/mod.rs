//! Sinks and sink adapters shipped with the crate

pub mod async_sink;
pub mod console;
pub mod fingers_crossed;
pub mod formatter;

pub use async_sink::{from_async_sink, AsyncSink, AsyncSinkAdapter};
pub use console::ConsoleSink;
pub use fingers_crossed::{
    fingers_crossed, CategoryIsolation, CategoryMatcher, ContextIsolation, FingersCrossedOptions,
    FingersCrossedSink,
};
pub use formatter::{Formatter, JsonLinesFormatter, TextFormatter, TimestampFormat};
