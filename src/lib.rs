//! # logtape
//!
//! Structured logging facade built around a hierarchy of categories.
//!
//! ## Features
//!
//! - **Category tree**: loggers named by category paths inherit sinks and
//!   filters from their ancestors
//! - **Message templates**: `{placeholder}` templates resolved against
//!   structured properties, including nested property paths
//! - **Implicit context**: properties attached to a scope or a future flow into
//!   every record emitted inside it
//! - **Fingers-crossed buffering**: keep low-level records in memory and only
//!   release them once something goes wrong
//! - **Failure isolation**: a failing sink never affects other sinks; the
//!   failure is reported through the `logtape.meta` category
//!
//! ## Example
//!
//! ```
//! use logtape::prelude::*;
//! use std::sync::Arc;
//!
//! let logger = Logger::isolated_root().get_child(["my-app", "db"]);
//! logger.add_sink(Arc::new(ConsoleSink::plain()));
//!
//! logger.info(("Connected to {host}", props! { "host" => "localhost" }));
//! ```

pub mod config;
pub mod core;
pub mod macros;
pub mod sinks;

pub mod prelude {
    pub use crate::config::{configure, configure_async, reset, reset_async, Config, LoggerConfig};
    pub use crate::core::{
        get_logger, in_context, with_context, Category, LogArgs, LogLevel, LogRecord, Logger,
        LoggerError, ParentSinks, Properties, Result, Sink, SinkRef, Value,
    };
    pub use crate::props;
    pub use crate::sinks::{fingers_crossed, ConsoleSink, FingersCrossedOptions};
}

pub use crate::core::{
    compare_level_tokens, compare_log_level, current_context, get_level_filter, get_logger,
    in_context, lazy, parse_log_level, parse_message_template, push_context, render_message,
    resolve_property_path, sink_fn, to_filter, with_context, with_filter, Category, ContextFuture,
    ContextGuard, Deferred, Disposal, ErrorValue, Filter, FilterLike, FilterRef, FilteredSink,
    FnSink, Lazy, LazyTemplate, LevelFilter, LogArgs, LogLevel, LogRecord, Logger, LoggerError,
    Message, MessagePart, ParentSinks, PipelineMetrics, Properties, RawMessage, RecordDraft,
    Rendered, Result, Sink, SinkRef, Value, META_CATEGORY,
};
