//! Core pipeline types and traits

pub mod context;
pub mod error;
pub mod filter;
pub mod log_level;
pub mod logger;
pub mod metrics;
pub mod record;
pub mod sink;
pub mod template;
pub mod value;

pub use context::{current_context, in_context, push_context, with_context, ContextFuture, ContextGuard};
pub use error::{LoggerError, Result};
pub use filter::{get_level_filter, to_filter, Disposal, Filter, FilterLike, FilterRef, LevelFilter};
pub use log_level::{compare_level_tokens, compare_log_level, parse_log_level, LogLevel};
pub use logger::{get_logger, LazyTemplate, LogArgs, Logger, ParentSinks, Rendered, META_CATEGORY};
pub use metrics::PipelineMetrics;
pub use record::{Category, Deferred, LogRecord, Message, MessagePart, RawMessage, RecordDraft};
pub use sink::{sink_fn, with_filter, FilteredSink, FnSink, Sink, SinkRef};
pub use template::{parse_message_template, render_message, resolve_property_path};
pub use value::{lazy, ErrorValue, Lazy, Properties, Value};
