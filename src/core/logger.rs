//! Logger hierarchy and emission pipeline
//!
//! Loggers form a tree keyed by [`Category`]. Each node owns its sinks,
//! filters and lowest level; a record emitted at a node is gated by the
//! node's level and filters and then fanned out to the node's sinks,
//! preceded by its ancestors' sinks unless the node overrides them.
//!
//! Nodes hold their parent strongly and their children weakly, so a subtree
//! nobody references any more is dropped along with its configuration.

use super::context;
use super::error::LoggerError;
use super::filter::{to_filter, FilterLike, FilterRef};
use super::log_level::LogLevel;
use super::metrics::PipelineMetrics;
use super::record::{now_millis, Category, Deferred, LogRecord, Message, RawMessage, RecordDraft};
use super::sink::{sink_id, SinkRef};
use super::template::{parse_message_template, render_message};
use super::value::{ErrorValue, Properties, Value};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock, Weak};

/// Category reserved for the pipeline's own diagnostics.
pub const META_CATEGORY: [&str; 2] = ["logtape", "meta"];

const SINK_FAILURE_TEMPLATE: &str = "Failed to emit a log record to sink {sink}: {error}";

/// Whether a node's sinks add to or replace its ancestors' sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParentSinks {
    #[default]
    Inherit,
    Override,
}

struct NodeConfig {
    sinks: Vec<SinkRef>,
    filters: Vec<FilterRef>,
    parent_sinks: ParentSinks,
    /// `None` disables the node entirely.
    lowest_level: Option<LogLevel>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            sinks: Vec::new(),
            filters: Vec::new(),
            parent_sinks: ParentSinks::Inherit,
            lowest_level: Some(LogLevel::Trace),
        }
    }
}

pub(crate) type BypassSet = HashSet<usize>;

pub(crate) struct LoggerImpl {
    category: Category,
    parent: Option<Arc<LoggerImpl>>,
    children: Mutex<HashMap<String, Weak<LoggerImpl>>>,
    config: RwLock<NodeConfig>,
    metrics: Arc<PipelineMetrics>,
}

static GLOBAL_ROOT: OnceLock<Arc<LoggerImpl>> = OnceLock::new();

impl LoggerImpl {
    fn new_root() -> Arc<Self> {
        Arc::new(Self {
            category: Category::root(),
            parent: None,
            children: Mutex::new(HashMap::new()),
            config: RwLock::new(NodeConfig::default()),
            metrics: Arc::new(PipelineMetrics::new()),
        })
    }

    fn global_root() -> Arc<Self> {
        Arc::clone(GLOBAL_ROOT.get_or_init(Self::new_root))
    }

    /// Child for one segment, created on first lookup.
    fn child(self: &Arc<Self>, segment: &str) -> Arc<Self> {
        let mut children = self.children.lock();
        if let Some(existing) = children.get(segment).and_then(Weak::upgrade) {
            return existing;
        }
        let child = Arc::new(Self {
            category: self.category.join(&Category::from(segment)),
            parent: Some(Arc::clone(self)),
            children: Mutex::new(HashMap::new()),
            config: RwLock::new(NodeConfig::default()),
            metrics: Arc::clone(&self.metrics),
        });
        children.retain(|_, weak| weak.strong_count() > 0);
        children.insert(segment.to_string(), Arc::downgrade(&child));
        child
    }

    fn descend(self: &Arc<Self>, category: &Category) -> Arc<Self> {
        category
            .segments()
            .iter()
            .fold(Arc::clone(self), |node, segment| node.child(segment))
    }

    fn tree_root(self: &Arc<Self>) -> Arc<Self> {
        let mut node = Arc::clone(self);
        while let Some(parent) = node.parent.clone() {
            node = parent;
        }
        node
    }

    fn live_children(&self) -> Vec<Arc<Self>> {
        self.children
            .lock()
            .values()
            .filter_map(Weak::upgrade)
            .collect()
    }

    fn reset(&self) {
        *self.config.write() = NodeConfig::default();
    }

    fn reset_descendants(&self) {
        self.reset();
        for child in self.live_children() {
            child.reset_descendants();
        }
    }

    /// Every filter on this node must accept; a node without filters defers
    /// to its parent, and the root without filters accepts everything.
    fn filter(&self, record: &LogRecord) -> bool {
        let filters = self.config.read().filters.clone();
        if filters.is_empty() {
            return match &self.parent {
                Some(parent) => parent.filter(record),
                None => true,
            };
        }
        filters.iter().all(|filter| filter.accepts(record))
    }

    fn get_sinks(&self, level: LogLevel) -> Vec<SinkRef> {
        let (own, parent_sinks) = {
            let config = self.config.read();
            match config.lowest_level {
                Some(lowest) if level >= lowest => {}
                _ => return Vec::new(),
            }
            (config.sinks.clone(), config.parent_sinks)
        };
        let mut sinks = match (&self.parent, parent_sinks) {
            (Some(parent), ParentSinks::Inherit) => parent.get_sinks(level),
            _ => Vec::new(),
        };
        sinks.extend(own);
        sinks
    }

    fn emit(self: &Arc<Self>, record: LogRecord, bypass: &BypassSet) {
        let admitted = matches!(
            self.config.read().lowest_level,
            Some(lowest) if record.level >= lowest
        );
        if !admitted || !self.filter(&record) {
            self.metrics.record_rejected();
            return;
        }
        self.metrics.record_dispatched();

        for sink in self.get_sinks(record.level) {
            if bypass.contains(&sink_id(&sink)) {
                continue;
            }
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| sink.emit(&record)));
            let error = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => ErrorValue::from_error(&e),
                Err(payload) => ErrorValue::new("Panic", panic_message(payload.as_ref())),
            };
            self.metrics.record_sink_failure();
            self.report_sink_failure(&sink, error, &record, bypass);
        }
    }

    fn report_sink_failure(
        self: &Arc<Self>,
        sink: &SinkRef,
        error: ErrorValue,
        record: &LogRecord,
        bypass: &BypassSet,
    ) {
        let meta = self.tree_root().descend(&Category::from(META_CATEGORY));
        let mut bypass = bypass.clone();
        bypass.insert(sink_id(sink));

        let routable = meta
            .get_sinks(LogLevel::Fatal)
            .iter()
            .any(|candidate| !bypass.contains(&sink_id(candidate)));
        if !routable {
            eprintln!(
                "[LOGGER ERROR] Sink '{}' failed on a {} record: {}",
                sink.name(),
                record.level,
                error
            );
            return;
        }

        // A panicking lazy producer poisons the record; report what is known.
        let snapshot = panic::catch_unwind(AssertUnwindSafe(|| record.to_value()))
            .unwrap_or_else(|_| record.to_header_value());
        let properties = Properties::new()
            .with_field("sink", sink.name())
            .with_field("error", error)
            .with_field("record", snapshot);
        let message = parse_message_template(SINK_FAILURE_TEMPLATE, &properties);
        let diagnostic = LogRecord::new(
            meta.category.clone(),
            LogLevel::Fatal,
            message,
            RawMessage::Template(SINK_FAILURE_TEMPLATE.to_string()),
            properties,
        );
        self.metrics.record_meta();
        meta.emit(diagnostic, &bypass);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Explicit properties of a call, either ready or produced on first access.
enum PropertySource {
    Ready(Properties),
    Thunk(Box<dyn FnOnce() -> Properties + Send>),
}

impl PropertySource {
    fn produce(self) -> Properties {
        match self {
            PropertySource::Ready(properties) => properties,
            PropertySource::Thunk(thunk) => thunk(),
        }
    }
}

/// Capability handed to a [`LogArgs::Lazy`] callback.
///
/// The only way to obtain a [`Rendered`] is to consume this token, so a
/// callback always produces a message.
pub struct LazyTemplate {
    _private: (),
}

impl LazyTemplate {
    /// Interleave literal `fragments` with `values`.
    pub fn render<S: Into<String>>(
        self,
        fragments: impl IntoIterator<Item = S>,
        values: Vec<Value>,
    ) -> Rendered {
        let fragments: Vec<String> = fragments.into_iter().map(Into::into).collect();
        Rendered {
            message: render_message(&fragments, &values),
            raw_message: RawMessage::Fragments(fragments),
        }
    }
}

/// A message produced through [`LazyTemplate::render`].
#[derive(Debug, Clone)]
pub struct Rendered {
    message: Message,
    raw_message: RawMessage,
}

impl Rendered {
    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn raw_message(&self) -> &RawMessage {
        &self.raw_message
    }
}

type LazyCallback = Box<dyn FnOnce(LazyTemplate) -> Rendered + Send>;

/// The shapes a level method accepts.
pub enum LogArgs {
    /// Literal fragments with values between them; no placeholder parsing.
    Template {
        fragments: Vec<String>,
        values: Vec<Value>,
    },
    /// A `{placeholder}` template and its properties.
    Message {
        template: String,
        properties: Properties,
    },
    /// A template whose properties are computed on first access.
    LazyMessage {
        template: String,
        thunk: Box<dyn FnOnce() -> Properties + Send>,
    },
    /// Properties alone, rendered through the `{*}` template.
    Properties(Properties),
    /// A callback rendering the message on first access.
    Lazy(LazyCallback),
    /// An error, stored under the `error` property.
    Error {
        error: ErrorValue,
        message: Option<String>,
        properties: Properties,
    },
}

impl LogArgs {
    pub fn template<S: Into<String>>(
        fragments: impl IntoIterator<Item = S>,
        values: Vec<Value>,
    ) -> Self {
        LogArgs::Template {
            fragments: fragments.into_iter().map(Into::into).collect(),
            values,
        }
    }

    pub fn lazy_message<F>(template: impl Into<String>, thunk: F) -> Self
    where
        F: FnOnce() -> Properties + Send + 'static,
    {
        LogArgs::LazyMessage {
            template: template.into(),
            thunk: Box::new(thunk),
        }
    }

    pub fn lazy<F>(callback: F) -> Self
    where
        F: FnOnce(LazyTemplate) -> Rendered + Send + 'static,
    {
        LogArgs::Lazy(Box::new(callback))
    }

    pub fn error<E: std::error::Error + ?Sized>(error: &E) -> Self {
        LogArgs::from(ErrorValue::from_error(error))
    }

    /// Error logged under a fixed message instead of its own text.
    pub fn error_with_message<E: std::error::Error + ?Sized>(
        message: impl Into<String>,
        error: &E,
    ) -> Self {
        LogArgs::Error {
            error: ErrorValue::from_error(error),
            message: Some(message.into()),
            properties: Properties::new(),
        }
    }
}

impl fmt::Debug for LogArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogArgs::Template { fragments, values } => f
                .debug_struct("Template")
                .field("fragments", fragments)
                .field("values", values)
                .finish(),
            LogArgs::Message {
                template,
                properties,
            } => f
                .debug_struct("Message")
                .field("template", template)
                .field("properties", properties)
                .finish(),
            LogArgs::LazyMessage { template, .. } => f
                .debug_struct("LazyMessage")
                .field("template", template)
                .finish_non_exhaustive(),
            LogArgs::Properties(properties) => {
                f.debug_tuple("Properties").field(properties).finish()
            }
            LogArgs::Lazy(_) => f.write_str("Lazy(..)"),
            LogArgs::Error { error, message, .. } => f
                .debug_struct("Error")
                .field("error", error)
                .field("message", message)
                .finish_non_exhaustive(),
        }
    }
}

impl From<&str> for LogArgs {
    fn from(template: &str) -> Self {
        LogArgs::from(template.to_string())
    }
}

impl From<String> for LogArgs {
    fn from(template: String) -> Self {
        LogArgs::Message {
            template,
            properties: Properties::new(),
        }
    }
}

impl From<(&str, Properties)> for LogArgs {
    fn from((template, properties): (&str, Properties)) -> Self {
        LogArgs::Message {
            template: template.to_string(),
            properties,
        }
    }
}

impl From<(String, Properties)> for LogArgs {
    fn from((template, properties): (String, Properties)) -> Self {
        LogArgs::Message {
            template,
            properties,
        }
    }
}

impl From<Properties> for LogArgs {
    fn from(properties: Properties) -> Self {
        LogArgs::Properties(properties)
    }
}

impl From<ErrorValue> for LogArgs {
    fn from(error: ErrorValue) -> Self {
        LogArgs::Error {
            error,
            message: None,
            properties: Properties::new(),
        }
    }
}

impl From<&LoggerError> for LogArgs {
    fn from(error: &LoggerError) -> Self {
        LogArgs::error(error)
    }
}

/// A handle to a node of the logger tree, optionally carrying properties
/// bound with [`Logger::with`].
///
/// Handles are cheap to clone. Two handles for the same category share the
/// same node, and therefore the same configuration.
#[derive(Clone)]
pub struct Logger {
    node: Arc<LoggerImpl>,
    bound: Properties,
}

/// Logger for `category` in the process-wide tree.
///
/// # Example
///
/// ```
/// use logtape::{get_logger, Properties};
///
/// let logger = get_logger(["my-app", "db"]);
/// logger.info(("Connected to {host}", Properties::new().with_field("host", "localhost")));
/// ```
pub fn get_logger(category: impl Into<Category>) -> Logger {
    Logger::root().get_child(category)
}

impl Logger {
    fn from_node(node: Arc<LoggerImpl>) -> Self {
        Self {
            node,
            bound: Properties::new(),
        }
    }

    /// Root of the process-wide tree.
    pub fn root() -> Self {
        Self::from_node(LoggerImpl::global_root())
    }

    /// Root of a fresh tree sharing no state with the process-wide one.
    pub fn isolated_root() -> Self {
        Self::from_node(LoggerImpl::new_root())
    }

    pub fn category(&self) -> &Category {
        &self.node.category
    }

    /// Parent node; bound properties are not carried over.
    pub fn parent(&self) -> Option<Logger> {
        self.node.parent.clone().map(Self::from_node)
    }

    /// Descendant at `subcategory`, keeping this handle's bound properties.
    pub fn get_child(&self, subcategory: impl Into<Category>) -> Logger {
        Self {
            node: self.node.descend(&subcategory.into()),
            bound: self.bound.clone(),
        }
    }

    /// Handle binding `properties` to every record it logs; later bindings
    /// win over earlier ones.
    #[must_use]
    pub fn with(&self, properties: Properties) -> Logger {
        Self {
            node: Arc::clone(&self.node),
            bound: self.bound.clone().overlay(properties),
        }
    }

    pub fn bound_properties(&self) -> &Properties {
        &self.bound
    }

    /// The meta logger of this handle's tree.
    pub fn meta(&self) -> Logger {
        Self::from_node(
            self.node
                .tree_root()
                .descend(&Category::from(META_CATEGORY)),
        )
    }

    /// True when both handles point at the same node.
    pub fn ptr_eq(&self, other: &Logger) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.node.metrics
    }

    // Configuration

    pub fn add_sink(&self, sink: SinkRef) {
        self.node.config.write().sinks.push(sink);
    }

    pub fn set_sinks(&self, sinks: Vec<SinkRef>) {
        self.node.config.write().sinks = sinks;
    }

    /// This node's own sinks, without inherited ones.
    pub fn sinks(&self) -> Vec<SinkRef> {
        self.node.config.read().sinks.clone()
    }

    pub fn add_filter(&self, filter: impl Into<FilterLike>) {
        self.node.config.write().filters.push(to_filter(filter));
    }

    pub fn set_filters(&self, filters: Vec<FilterRef>) {
        self.node.config.write().filters = filters;
    }

    /// `None` disables the node.
    pub fn set_lowest_level(&self, level: Option<LogLevel>) {
        self.node.config.write().lowest_level = level;
    }

    pub fn lowest_level(&self) -> Option<LogLevel> {
        self.node.config.read().lowest_level
    }

    pub fn set_parent_sinks(&self, parent_sinks: ParentSinks) {
        self.node.config.write().parent_sinks = parent_sinks;
    }

    pub fn parent_sinks(&self) -> ParentSinks {
        self.node.config.read().parent_sinks
    }

    /// Clear sinks and filters and restore the `trace` threshold.
    pub fn reset(&self) {
        self.node.reset();
    }

    /// [`reset`](Self::reset) this node and every live descendant.
    pub fn reset_descendants(&self) {
        self.node.reset_descendants();
    }

    // Pipeline

    pub fn filter(&self, record: &LogRecord) -> bool {
        self.node.filter(record)
    }

    /// Sinks a record at `level` reaches, ancestors' first.
    pub fn get_sinks(&self, level: LogLevel) -> Vec<SinkRef> {
        self.node.get_sinks(level)
    }

    /// True when a record at `level` would reach at least one sink.
    pub fn is_enabled_for(&self, level: LogLevel) -> bool {
        !self.get_sinks(level).is_empty()
    }

    /// Dispatch a complete record, adding this handle's bound properties
    /// underneath its own.
    pub fn emit(&self, record: LogRecord) {
        self.emit_with_bypass(record, &BypassSet::new());
    }

    /// Dispatch a record that has no category yet under this node's.
    pub fn emit_draft(&self, draft: RecordDraft) {
        self.emit(draft.into_record(self.category().clone()));
    }

    pub(crate) fn emit_with_bypass(&self, record: LogRecord, bypass: &BypassSet) {
        let record = record.with_bound_properties(self.bound.clone());
        self.node.emit(record, bypass);
    }

    /// Merge implicit context and bound properties under the explicit ones.
    fn materialize(&self, explicit: PropertySource) -> Deferred<Properties> {
        let implicit = if context::has_context() {
            context::current_context()
        } else {
            Properties::new()
        };
        let bound = self.bound.clone();
        Deferred::new(move || {
            implicit
                .overlay(bound)
                .overlay(explicit.produce())
                .resolve_lazy()
        })
    }

    fn dispatch_template(&self, level: LogLevel, template: String, explicit: PropertySource) {
        let properties = self.materialize(explicit);
        let source = properties.clone();
        let raw = template.clone();
        let message = Deferred::new(move || parse_message_template(&raw, source.get()));
        self.dispatch(
            level,
            message,
            Deferred::ready(RawMessage::Template(template)),
            properties,
        );
    }

    fn dispatch(
        &self,
        level: LogLevel,
        message: Deferred<Message>,
        raw_message: Deferred<RawMessage>,
        properties: Deferred<Properties>,
    ) {
        let record = LogRecord::deferred(
            self.category().clone(),
            level,
            now_millis(),
            message,
            raw_message,
            properties,
        );
        self.node.emit(record, &BypassSet::new());
    }

    /// Log a `{placeholder}` template rendered against `properties`.
    pub fn log(&self, level: LogLevel, template: impl Into<String>, properties: Properties) {
        self.dispatch_template(level, template.into(), PropertySource::Ready(properties));
    }

    /// Like [`log`](Self::log), with properties produced on first access.
    ///
    /// `thunk` runs at most once, and not at all when no sink looks at the
    /// record.
    pub fn log_lazy<F>(&self, level: LogLevel, template: impl Into<String>, thunk: F)
    where
        F: FnOnce() -> Properties + Send + 'static,
    {
        self.dispatch_template(
            level,
            template.into(),
            PropertySource::Thunk(Box::new(thunk)),
        );
    }

    /// Log a message rendered by `callback` on first access.
    pub fn log_lazily<F>(&self, level: LogLevel, callback: F)
    where
        F: FnOnce(LazyTemplate) -> Rendered + Send + 'static,
    {
        let rendered = Deferred::new(move || callback(LazyTemplate { _private: () }));
        let for_message = rendered.clone();
        self.dispatch(
            level,
            Deferred::new(move || for_message.get().message.clone()),
            Deferred::new(move || rendered.get().raw_message.clone()),
            self.materialize(PropertySource::Ready(Properties::new())),
        );
    }

    /// Log literal `fragments` interleaved with `values`.
    pub fn log_template(&self, level: LogLevel, fragments: Vec<String>, values: Vec<Value>) {
        let message = render_message(&fragments, &values);
        self.dispatch(
            level,
            Deferred::ready(message),
            Deferred::ready(RawMessage::Fragments(fragments)),
            self.materialize(PropertySource::Ready(Properties::new())),
        );
    }

    /// Await `producer` for the properties, then log.
    ///
    /// When no sink is enabled for `level` the producer is never called.
    pub async fn log_async<F, Fut>(&self, level: LogLevel, template: impl Into<String>, producer: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Properties>,
    {
        if !self.is_enabled_for(level) {
            return;
        }
        let properties = producer().await;
        self.log(level, template, properties);
    }

    fn log_error(
        &self,
        level: LogLevel,
        error: ErrorValue,
        message: Option<String>,
        properties: Properties,
    ) {
        let explicit = PropertySource::Ready(properties.with_field("error", error));
        match message {
            None => self.dispatch_template(level, "{error.message}".to_string(), explicit),
            Some(text) => self.dispatch(
                level,
                Deferred::ready(Message::literal(text.clone())),
                Deferred::ready(RawMessage::Template(text)),
                self.materialize(explicit),
            ),
        }
    }

    /// Single entry point behind every level method.
    pub fn log_args(&self, level: LogLevel, args: impl Into<LogArgs>) {
        match args.into() {
            LogArgs::Template { fragments, values } => self.log_template(level, fragments, values),
            LogArgs::Message {
                template,
                properties,
            } => self.log(level, template, properties),
            LogArgs::LazyMessage { template, thunk } => {
                self.dispatch_template(level, template, PropertySource::Thunk(thunk))
            }
            LogArgs::Properties(properties) => self.log(level, "{*}", properties),
            LogArgs::Lazy(callback) => self.log_lazily(level, callback),
            LogArgs::Error {
                error,
                message,
                properties,
            } => self.log_error(level, error, message, properties),
        }
    }

    pub fn trace(&self, args: impl Into<LogArgs>) {
        self.log_args(LogLevel::Trace, args);
    }

    pub fn debug(&self, args: impl Into<LogArgs>) {
        self.log_args(LogLevel::Debug, args);
    }

    pub fn info(&self, args: impl Into<LogArgs>) {
        self.log_args(LogLevel::Info, args);
    }

    /// Alias of [`warning`](Self::warning).
    pub fn warn(&self, args: impl Into<LogArgs>) {
        self.log_args(LogLevel::Warning, args);
    }

    pub fn warning(&self, args: impl Into<LogArgs>) {
        self.log_args(LogLevel::Warning, args);
    }

    pub fn error(&self, args: impl Into<LogArgs>) {
        self.log_args(LogLevel::Error, args);
    }

    pub fn fatal(&self, args: impl Into<LogArgs>) {
        self.log_args(LogLevel::Fatal, args);
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("category", self.category())
            .field("bound", &self.bound)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sink::sink_fn;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn collector() -> (SinkRef, Arc<Mutex<Vec<LogRecord>>>) {
        let records = Arc::new(Mutex::new(Vec::new()));
        let target = Arc::clone(&records);
        let sink = sink_fn("collector", move |record: &LogRecord| {
            target.lock().push(record.clone());
            Ok(())
        });
        (sink, records)
    }

    #[test]
    fn test_get_child_is_idempotent() {
        let root = Logger::isolated_root();
        let a = root.get_child(["app", "db"]);
        let b = root.get_child("app").get_child("db");
        assert!(a.ptr_eq(&b));
        assert_eq!(a.category(), &Category::from(["app", "db"]));
        assert!(a.parent().is_some_and(|p| p.category() == &Category::from("app")));
        assert!(root.get_child("").ptr_eq(&root));
    }

    #[test]
    fn test_dropped_subtree_loses_config() {
        let root = Logger::isolated_root();
        let (sink, _) = collector();
        {
            let child = root.get_child("temp");
            child.add_sink(sink);
        }
        assert!(root.get_child("temp").sinks().is_empty());
    }

    #[test]
    fn test_disabled_node_yields_no_sinks() {
        let root = Logger::isolated_root();
        let (sink, records) = collector();
        root.add_sink(sink);
        root.set_lowest_level(None);

        root.fatal("nothing");
        assert!(records.lock().is_empty());
        assert!(!root.is_enabled_for(LogLevel::Fatal));
        assert_eq!(root.metrics().records_rejected(), 1);
    }

    #[test]
    fn test_error_overload() {
        let root = Logger::isolated_root();
        let (sink, records) = collector();
        root.add_sink(sink);

        let error = LoggerError::other("disk full");
        root.error(&error);
        root.error(LogArgs::error_with_message("Upload {failed}", &error));

        let records = records.lock();
        assert_eq!(records[0].message().values(), &[Some(Value::from("disk full"))]);
        assert_eq!(
            records[0].raw_message(),
            &RawMessage::Template("{error.message}".into())
        );
        assert_eq!(records[1].message().literals(), ["Upload {failed}"]);
        assert!(matches!(
            records[1].properties().get("error"),
            Some(Value::Error(_))
        ));
    }

    #[test]
    fn test_lazy_thunk_runs_once_on_access() {
        let root = Logger::isolated_root();
        let (sink, records) = collector();
        root.add_sink(sink);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        root.info(LogArgs::lazy_message("value={v}", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Properties::new().with_field("v", 1)
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let record = records.lock()[0].clone();
        assert_eq!(record.message().values(), &[Some(Value::Int(1))]);
        assert_eq!(record.properties().get("v"), Some(&Value::Int(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lazy_callback_renders_template() {
        let root = Logger::isolated_root();
        let (sink, records) = collector();
        root.add_sink(sink);

        root.debug(LogArgs::lazy(|t| {
            t.render(["took ", "ms"], vec![Value::Int(12)])
        }));

        let record = records.lock()[0].clone();
        assert_eq!(record.message().literals(), ["took ", "ms"]);
        assert_eq!(
            record.raw_message(),
            &RawMessage::Fragments(vec!["took ".into(), "ms".into()])
        );
    }

    #[test]
    fn test_emit_draft_takes_node_category() {
        let root = Logger::isolated_root();
        let (sink, records) = collector();
        root.add_sink(sink);
        let jobs = root.get_child(["app", "jobs"]).with(Properties::new().with_field("worker", 3));

        let draft = RecordDraft::new(
            LogLevel::Info,
            Message::literal("started"),
            RawMessage::Template("started".into()),
        );
        jobs.emit_draft(draft.with_properties(Properties::new().with_field("attempt", 1)));

        let records = records.lock();
        assert_eq!(records[0].category, Category::from(["app", "jobs"]));
        assert_eq!(records[0].properties().get("worker"), Some(&Value::Int(3)));
        assert_eq!(records[0].properties().get("attempt"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_log_async_awaits_producer() {
        let root = Logger::isolated_root();
        let (sink, records) = collector();
        root.add_sink(sink);

        tokio_test::block_on(root.log_async(LogLevel::Info, "rows={rows}", || async {
            Properties::new().with_field("rows", 3)
        }));

        assert_eq!(records.lock()[0].message().values(), &[Some(Value::Int(3))]);
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "Unknown panic");
    }
}
