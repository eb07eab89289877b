//! Process-wide configuration
//!
//! A [`Config`] names sinks and filters once and routes them to categories
//! through [`LoggerConfig`] entries. Installing a configuration replaces the
//! routing of the whole process-wide logger tree; resetting it disposes
//! every configured sink and filter exactly once.
//!
//! # Example
//!
//! ```no_run
//! use logtape::config::{configure, Config, LoggerConfig};
//! use logtape::sinks::ConsoleSink;
//! use logtape::{get_logger, LogLevel};
//! use std::sync::Arc;
//!
//! configure(
//!     Config::new()
//!         .sink("console", Arc::new(ConsoleSink::new()))
//!         .logger(
//!             LoggerConfig::new(["my-app"])
//!                 .with_sinks(["console"])
//!                 .with_lowest_level(Some(LogLevel::Info)),
//!         ),
//! )
//! .unwrap();
//!
//! get_logger(["my-app"]).info("ready");
//! ```

use crate::core::sink::sink_id;
use crate::core::{
    to_filter, Category, Disposal, FilterLike, FilterRef, LogLevel, Logger, LoggerError,
    ParentSinks, Result, SinkRef, META_CATEGORY,
};
use crate::sinks::ConsoleSink;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn default_lowest_level() -> Option<LogLevel> {
    Some(LogLevel::Trace)
}

/// Routing entry for one category.
///
/// Deserializes from JSON such as
/// `{"category": ["app", "db"], "sinks": ["console"], "lowestLevel": "info"}`;
/// `"lowestLevel": null` disables the category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggerConfig {
    pub category: Category,
    #[serde(default)]
    pub sinks: Vec<String>,
    #[serde(default)]
    pub filters: Vec<String>,
    #[serde(default)]
    pub parent_sinks: ParentSinks,
    #[serde(default = "default_lowest_level")]
    pub lowest_level: Option<LogLevel>,
}

impl LoggerConfig {
    pub fn new(category: impl Into<Category>) -> Self {
        Self {
            category: category.into(),
            sinks: Vec::new(),
            filters: Vec::new(),
            parent_sinks: ParentSinks::Inherit,
            lowest_level: default_lowest_level(),
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_sinks<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sinks = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_filters<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_parent_sinks(mut self, parent_sinks: ParentSinks) -> Self {
        self.parent_sinks = parent_sinks;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_lowest_level(mut self, level: Option<LogLevel>) -> Self {
        self.lowest_level = level;
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a JSON array of entries.
    pub fn list_from_json(json: &str) -> Result<Vec<Self>> {
        Ok(serde_json::from_str(json)?)
    }
}

/// A complete configuration, built fluently.
#[derive(Clone, Default)]
pub struct Config {
    sinks: HashMap<String, SinkRef>,
    filters: HashMap<String, FilterRef>,
    loggers: Vec<LoggerConfig>,
    reset: bool,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value"]
    pub fn sink(mut self, name: impl Into<String>, sink: SinkRef) -> Self {
        self.sinks.insert(name.into(), sink);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn filter(mut self, name: impl Into<String>, filter: impl Into<FilterLike>) -> Self {
        self.filters.insert(name.into(), to_filter(filter));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn logger(mut self, logger: LoggerConfig) -> Self {
        self.loggers.push(logger);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn loggers(mut self, loggers: impl IntoIterator<Item = LoggerConfig>) -> Self {
        self.loggers.extend(loggers);
        self
    }

    /// Replace an installed configuration instead of failing.
    #[must_use = "builder methods return a new value"]
    pub fn reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }

    /// Check names and categories; `sync` additionally rejects anything
    /// that can only be disposed asynchronously.
    fn validate(&self, sync: bool) -> Result<()> {
        let mut seen = HashSet::new();
        for logger in &self.loggers {
            if !seen.insert(&logger.category) {
                return Err(LoggerError::config(
                    "config",
                    format!("Duplicate logger configuration for category: {:?}", logger.category),
                ));
            }
            if let Some(name) = logger.sinks.iter().find(|n| !self.sinks.contains_key(*n)) {
                return Err(LoggerError::config(
                    "config",
                    format!("Undefined sink: '{}'", name),
                ));
            }
            if let Some(name) = logger.filters.iter().find(|n| !self.filters.contains_key(*n)) {
                return Err(LoggerError::config(
                    "config",
                    format!("Undefined filter: '{}'", name),
                ));
            }
        }
        if sync {
            if let Some(disposable) = self
                .disposables()
                .into_iter()
                .find(|d| d.disposal() == Disposal::AsyncOnly)
            {
                return Err(LoggerError::AsyncDisposalRequired {
                    name: disposable.name().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Sinks and filters needing disposal, each shared instance once.
    fn disposables(&self) -> Vec<Disposable> {
        let mut seen = HashSet::new();
        let mut disposables = Vec::new();
        for (name, sink) in &self.sinks {
            if sink.disposal() != Disposal::None && seen.insert(sink_id(sink)) {
                disposables.push(Disposable::Sink {
                    name: name.clone(),
                    sink: Arc::clone(sink),
                });
            }
        }
        for (name, filter) in &self.filters {
            let id = Arc::as_ptr(filter) as *const () as usize;
            if filter.disposal() != Disposal::None && seen.insert(id) {
                disposables.push(Disposable::Filter {
                    name: name.clone(),
                    filter: Arc::clone(filter),
                });
            }
        }
        disposables
    }
}

enum Disposable {
    Sink { name: String, sink: SinkRef },
    Filter { name: String, filter: FilterRef },
}

impl Disposable {
    fn name(&self) -> &str {
        match self {
            Disposable::Sink { name, .. } | Disposable::Filter { name, .. } => name,
        }
    }

    fn disposal(&self) -> Disposal {
        match self {
            Disposable::Sink { sink, .. } => sink.disposal(),
            Disposable::Filter { filter, .. } => filter.disposal(),
        }
    }

    fn dispose(&self) -> Result<()> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match self {
            Disposable::Sink { sink, .. } => sink.dispose(),
            Disposable::Filter { filter, .. } => filter.dispose(),
        }));
        outcome.unwrap_or_else(|_| Err(LoggerError::disposal(self.name(), "disposer panicked")))
    }

    async fn dispose_async(&self) -> Result<()> {
        match self {
            Disposable::Sink { sink, .. } => sink.dispose_async().await,
            Disposable::Filter { filter, .. } => filter.dispose_async().await,
        }
    }
}

struct ConfigState {
    /// Configured nodes, held so the tree keeps their routing alive.
    loggers: Vec<Logger>,
    disposables: Vec<Disposable>,
}

static STATE: Mutex<Option<ConfigState>> = parking_lot::const_mutex(None);
/// Configuration changes and disposals in flight.
static PENDING: AtomicUsize = AtomicUsize::new(0);

/// Marks a change in flight until dropped. Only begun under the `STATE` lock.
struct PendingChange;

impl PendingChange {
    fn begin() -> Self {
        PENDING.fetch_add(1, Ordering::SeqCst);
        PendingChange
    }
}

impl Drop for PendingChange {
    fn drop(&mut self) {
        PENDING.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Keep the first error, report the rest.
fn record_failure(first: &mut Option<LoggerError>, error: LoggerError) {
    eprintln!("[LOGGER ERROR] {}", error);
    if first.is_none() {
        *first = Some(error);
    }
}

fn dispose_all(disposables: &[Disposable]) -> Result<()> {
    let mut first = None;
    for disposable in disposables {
        if let Err(e) = disposable.dispose() {
            record_failure(&mut first, e);
        }
    }
    first.map_or(Ok(()), Err)
}

async fn dispose_all_async(disposables: &[Disposable]) -> Result<()> {
    let mut first = None;
    for disposable in disposables {
        if let Err(e) = disposable.dispose_async().await {
            record_failure(&mut first, e);
        }
    }
    first.map_or(Ok(()), Err)
}

fn ensure_sync_disposable(state: &ConfigState) -> Result<()> {
    match state
        .disposables
        .iter()
        .find(|d| d.disposal() == Disposal::AsyncOnly)
    {
        Some(disposable) => Err(LoggerError::AsyncDisposalRequired {
            name: disposable.name().to_string(),
        }),
        None => Ok(()),
    }
}

/// Take the installed state out for replacement, or refuse.
///
/// The returned marker makes concurrent changes fail with
/// [`LoggerError::DisposalPending`] until it is dropped after installing.
fn take_for_replacement(
    reset: bool,
    sync: bool,
) -> Result<(PendingChange, Option<ConfigState>)> {
    let mut state = STATE.lock();
    if PENDING.load(Ordering::SeqCst) > 0 {
        return Err(LoggerError::DisposalPending);
    }
    if let Some(current) = state.as_ref() {
        if !reset {
            return Err(LoggerError::AlreadyConfigured);
        }
        if sync {
            ensure_sync_disposable(current)?;
        }
    }
    Ok((PendingChange::begin(), state.take()))
}

fn apply(config: Config) -> ConfigState {
    let root = Logger::root();
    root.reset_descendants();

    let meta_category = Category::from(META_CATEGORY);
    let mut meta_configured = false;
    let mut loggers = Vec::with_capacity(config.loggers.len() + 1);

    for entry in &config.loggers {
        meta_configured |= entry.category == meta_category;
        let logger = root.get_child(entry.category.clone());
        logger.set_parent_sinks(entry.parent_sinks);
        logger.set_lowest_level(entry.lowest_level);
        for name in &entry.sinks {
            if let Some(sink) = config.sinks.get(name) {
                logger.add_sink(Arc::clone(sink));
            }
        }
        for name in &entry.filters {
            if let Some(filter) = config.filters.get(name) {
                logger.add_filter(FilterLike::Filter(Arc::clone(filter)));
            }
        }
        loggers.push(logger);
    }

    if !meta_configured {
        let meta = root.meta();
        meta.set_lowest_level(Some(LogLevel::Warning));
        meta.add_sink(Arc::new(ConsoleSink::plain()));
        loggers.push(meta);
    }

    ConfigState {
        loggers,
        disposables: config.disposables(),
    }
}

fn install(state: ConfigState) {
    *STATE.lock() = Some(state);
}

/// Install `config` into the process-wide logger tree.
///
/// Fails when a configuration is already installed unless
/// [`Config::reset`] was set, and rejects sinks or filters that can only be
/// disposed asynchronously; use [`configure_async`] for those.
pub fn configure(config: Config) -> Result<()> {
    config.validate(true)?;
    let (_pending, previous) = take_for_replacement(config.reset, true)?;
    let disposed = match previous {
        Some(previous) => dispose_all(&previous.disposables),
        None => Ok(()),
    };
    install(apply(config));
    disposed
}

/// Asynchronous variant of [`configure`], accepting async-only disposables.
pub async fn configure_async(config: Config) -> Result<()> {
    config.validate(false)?;
    let (_pending, previous) = take_for_replacement(config.reset, false)?;
    let disposed = match previous {
        Some(previous) => dispose_all_async(&previous.disposables).await,
        None => Ok(()),
    };
    install(apply(config));
    disposed
}

/// Dispose the installed configuration and clear the logger tree.
pub fn reset() -> Result<()> {
    let (_pending, previous) = take_for_replacement(true, true)?;
    let result = match previous {
        Some(previous) => dispose_all(&previous.disposables),
        None => Ok(()),
    };
    Logger::root().reset_descendants();
    result
}

pub async fn reset_async() -> Result<()> {
    let (_pending, previous) = take_for_replacement(true, false)?;
    let result = match previous {
        Some(previous) => dispose_all_async(&previous.disposables).await,
        None => Ok(()),
    };
    Logger::root().reset_descendants();
    result
}

/// Dispose every configured sink and filter, leaving the routing installed.
pub fn dispose() -> Result<()> {
    let disposables = {
        let mut state = STATE.lock();
        match state.as_mut() {
            Some(current) => {
                ensure_sync_disposable(current)?;
                std::mem::take(&mut current.disposables)
            }
            None => return Ok(()),
        }
    };
    dispose_all(&disposables)
}

pub async fn dispose_async() -> Result<()> {
    let (_pending, disposables) = match STATE.lock().as_mut() {
        Some(current) => (
            PendingChange::begin(),
            std::mem::take(&mut current.disposables),
        ),
        None => return Ok(()),
    };
    dispose_all_async(&disposables).await
}

pub fn is_configured() -> bool {
    STATE.lock().is_some()
}

/// Categories routed by the installed configuration.
pub fn configured_categories() -> Vec<Category> {
    STATE
        .lock()
        .as_ref()
        .map(|state| {
            state
                .loggers
                .iter()
                .map(|logger| logger.category().clone())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_config_from_json() {
        let config = LoggerConfig::from_json(
            r#"{"category": ["app", "db"], "sinks": ["console"], "parentSinks": "override"}"#,
        )
        .unwrap();
        assert_eq!(config.category, Category::from(["app", "db"]));
        assert_eq!(config.sinks, vec!["console".to_string()]);
        assert_eq!(config.parent_sinks, ParentSinks::Override);
        assert_eq!(config.lowest_level, Some(LogLevel::Trace));

        let disabled = LoggerConfig::from_json(r#"{"category": "app", "lowestLevel": null}"#).unwrap();
        assert_eq!(disabled.lowest_level, None);

        let list = LoggerConfig::list_from_json(
            r#"[{"category": "a", "lowestLevel": "warn"}, {"category": []}]"#,
        )
        .unwrap();
        assert_eq!(list[0].lowest_level, Some(LogLevel::Warning));
        assert!(list[1].category.is_root());
    }

    #[test]
    fn test_invalid_level_in_json() {
        let result = LoggerConfig::from_json(r#"{"category": "a", "lowestLevel": "loud"}"#);
        assert!(matches!(result, Err(LoggerError::JsonError(_))));
    }

    #[test]
    fn test_validation_errors() {
        let undefined = Config::new().logger(LoggerConfig::new("a").with_sinks(["missing"]));
        assert!(matches!(
            undefined.validate(true),
            Err(LoggerError::InvalidConfiguration { .. })
        ));

        let undefined_filter = Config::new().logger(LoggerConfig::new("a").with_filters(["f"]));
        assert!(undefined_filter.validate(true).is_err());

        let duplicate = Config::new()
            .logger(LoggerConfig::new("a"))
            .logger(LoggerConfig::new(["a"]));
        let err = duplicate.validate(true).unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }
}
