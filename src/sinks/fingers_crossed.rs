//! Fingers-crossed buffering sink
//!
//! Keeps low-severity records in memory and forwards them only once a
//! record at or above the trigger level shows up, so the detailed history
//! leading to a failure is written while quiet periods cost nothing.
//!
//! Buffers can be isolated per category and/or per context property so a
//! failure in one request flushes only that request's history. Memory is
//! bounded per bucket ([`FingersCrossedOptions::max_buffer_size`]), by age
//! ([`ContextIsolation::buffer_ttl`]) and by bucket count
//! ([`ContextIsolation::max_contexts`]). Expired and evicted buckets are
//! discarded without being flushed. The same limits apply to triggered
//! keys; a context that ages out or is evicted after triggering starts
//! buffering again.

use crate::core::{Category, Disposal, LogLevel, LogRecord, LoggerError, Result, Sink, SinkRef};
use crossbeam_channel::{select, tick, Receiver, Sender};
use parking_lot::{Mutex, ReentrantMutex};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub const DEFAULT_MAX_BUFFER_SIZE: usize = 1000;
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(30);
const MIN_CLEANUP_INTERVAL: Duration = Duration::from_millis(1);

pub type CategoryMatcher = Arc<dyn Fn(&Category, &Category) -> bool + Send + Sync>;

/// Which buffered categories a trigger flushes besides its own.
#[derive(Clone)]
pub enum CategoryIsolation {
    /// The trigger's category and everything below it
    Descendant,
    /// The trigger's category and everything above it
    Ancestor,
    Both,
    /// `matcher(trigger_category, buffered_category)`
    Custom(CategoryMatcher),
}

impl CategoryIsolation {
    pub fn custom<F>(matcher: F) -> Self
    where
        F: Fn(&Category, &Category) -> bool + Send + Sync + 'static,
    {
        CategoryIsolation::Custom(Arc::new(matcher))
    }

    fn matches(&self, trigger: &Category, buffered: &Category) -> bool {
        match self {
            CategoryIsolation::Descendant => trigger.is_prefix_of(buffered),
            CategoryIsolation::Ancestor => buffered.is_prefix_of(trigger),
            CategoryIsolation::Both => {
                trigger.is_prefix_of(buffered) || buffered.is_prefix_of(trigger)
            }
            // A failing matcher only costs its own candidate bucket.
            CategoryIsolation::Custom(matcher) => {
                panic::catch_unwind(AssertUnwindSafe(|| matcher(trigger, buffered)))
                    .unwrap_or(false)
            }
        }
    }
}

impl fmt::Debug for CategoryIsolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryIsolation::Descendant => f.write_str("Descendant"),
            CategoryIsolation::Ancestor => f.write_str("Ancestor"),
            CategoryIsolation::Both => f.write_str("Both"),
            CategoryIsolation::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Bucket records by the values of some of their properties.
#[derive(Debug, Clone)]
pub struct ContextIsolation {
    pub keys: Vec<String>,
    /// Discard buckets untouched for longer than this.
    pub buffer_ttl: Option<Duration>,
    /// How often expired buckets are looked for.
    pub cleanup_interval: Duration,
    /// Evict the least recently touched bucket beyond this many; 0 means no limit.
    pub max_contexts: usize,
}

impl ContextIsolation {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            buffer_ttl: None,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            max_contexts: 0,
        }
    }

    /// A zero duration disables expiry.
    #[must_use = "builder methods return a new value"]
    pub fn with_buffer_ttl(mut self, ttl: Duration) -> Self {
        self.buffer_ttl = (!ttl.is_zero()).then_some(ttl);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval.max(MIN_CLEANUP_INTERVAL);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_max_contexts(mut self, max_contexts: usize) -> Self {
        self.max_contexts = max_contexts;
        self
    }
}

#[derive(Debug, Clone)]
pub struct FingersCrossedOptions {
    pub trigger_level: LogLevel,
    /// Lowest buffered level; `None` buffers everything below the trigger.
    pub buffer_level: Option<LogLevel>,
    pub max_buffer_size: usize,
    pub isolate_by_category: Option<CategoryIsolation>,
    pub isolate_by_context: Option<ContextIsolation>,
}

impl Default for FingersCrossedOptions {
    fn default() -> Self {
        Self {
            trigger_level: LogLevel::Error,
            buffer_level: None,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            isolate_by_category: None,
            isolate_by_context: None,
        }
    }
}

impl FingersCrossedOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_trigger_level(mut self, level: LogLevel) -> Self {
        self.trigger_level = level;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_buffer_level(mut self, level: LogLevel) -> Self {
        self.buffer_level = Some(level);
        self
    }

    /// Negative sizes are treated as 0.
    #[must_use = "builder methods return a new value"]
    pub fn with_max_buffer_size(mut self, size: i64) -> Self {
        self.max_buffer_size = usize::try_from(size.max(0)).unwrap_or(usize::MAX);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn isolate_by_category(mut self, isolation: CategoryIsolation) -> Self {
        self.isolate_by_category = Some(isolation);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn isolate_by_context(mut self, isolation: ContextIsolation) -> Self {
        self.isolate_by_context = Some(isolation);
        self
    }

    fn validate(&self) -> Result<()> {
        match self.buffer_level {
            Some(buffer) if buffer >= self.trigger_level => Err(LoggerError::config(
                "fingers_crossed",
                format!(
                    "buffer level ({}) must be lower than trigger level ({})",
                    buffer, self.trigger_level
                ),
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BucketKey {
    category: Option<Category>,
    context: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct Touch {
    last_access: Instant,
    tick: u64,
}

struct Bucket {
    records: VecDeque<LogRecord>,
    touch: Touch,
}

#[derive(Default)]
struct BufferState {
    buckets: HashMap<BucketKey, Bucket>,
    /// Keys whose records pass straight through, with their last use.
    triggered: HashMap<BucketKey, Touch>,
    clock: u64,
}

impl BufferState {
    fn next_touch(&mut self) -> Touch {
        self.clock += 1;
        Touch {
            last_access: Instant::now(),
            tick: self.clock,
        }
    }

    /// Drops buffered and triggered keys idle for longer than `ttl`.
    fn purge_expired(&mut self, ttl: Duration, now: Instant) {
        let live = |touch: &Touch| now.saturating_duration_since(touch.last_access) <= ttl;
        self.buckets.retain(|_, bucket| live(&bucket.touch));
        self.triggered.retain(|_, touch| live(touch));
    }

    fn evict_least_recent(&mut self) {
        if let Some(key) = least_recent(&self.buckets, |bucket| bucket.touch.tick) {
            self.buckets.remove(&key);
        }
    }

    fn mark_triggered(&mut self, key: BucketKey, max_contexts: usize) {
        if max_contexts > 0 && !self.triggered.contains_key(&key) {
            while self.triggered.len() >= max_contexts {
                match least_recent(&self.triggered, |touch| touch.tick) {
                    Some(oldest) => {
                        self.triggered.remove(&oldest);
                    }
                    None => break,
                }
            }
        }
        let touch = self.next_touch();
        self.triggered.insert(key, touch);
    }
}

fn least_recent<V>(map: &HashMap<BucketKey, V>, tick: impl Fn(&V) -> u64) -> Option<BucketKey> {
    map.iter()
        .min_by_key(|(_, value)| tick(value))
        .map(|(key, _)| key.clone())
}

struct Reaper {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

/// Buffering sink wrapping another sink.
///
/// # Example
///
/// ```
/// use logtape::sinks::{FingersCrossedOptions, FingersCrossedSink};
/// use logtape::{sink_fn, LogRecord};
///
/// let inner = sink_fn("stdout", |record: &LogRecord| {
///     println!("{}", record.message());
///     Ok(())
/// });
/// let sink = FingersCrossedSink::new(inner, FingersCrossedOptions::new()).unwrap();
/// ```
pub struct FingersCrossedSink {
    inner: SinkRef,
    options: FingersCrossedOptions,
    state: Arc<Mutex<BufferState>>,
    // Held from classification through delivery so forwarded records keep
    // the order in which they were classified.
    delivery: ReentrantMutex<()>,
    reaper: Mutex<Option<Reaper>>,
}

/// Shorthand for [`FingersCrossedSink::new`] returning a shared sink.
pub fn fingers_crossed(sink: SinkRef, options: FingersCrossedOptions) -> Result<SinkRef> {
    Ok(Arc::new(FingersCrossedSink::new(sink, options)?))
}

impl FingersCrossedSink {
    pub fn new(inner: SinkRef, options: FingersCrossedOptions) -> Result<Self> {
        options.validate()?;
        let state = Arc::new(Mutex::new(BufferState::default()));

        let reaper = match &options.isolate_by_context {
            Some(ContextIsolation {
                buffer_ttl: Some(ttl),
                cleanup_interval,
                ..
            }) => Some(spawn_reaper(
                Arc::downgrade(&state),
                *ttl,
                (*cleanup_interval).max(MIN_CLEANUP_INTERVAL),
            )?),
            _ => None,
        };

        Ok(Self {
            inner,
            options,
            state,
            delivery: ReentrantMutex::new(()),
            reaper: Mutex::new(reaper),
        })
    }

    /// Number of buckets currently holding records.
    pub fn bucket_count(&self) -> usize {
        self.state.lock().buckets.len()
    }

    /// Number of keys currently passing records straight through.
    pub fn triggered_count(&self) -> usize {
        self.state.lock().triggered.len()
    }

    /// Number of records currently held across all buckets.
    pub fn buffered_len(&self) -> usize {
        self.state
            .lock()
            .buckets
            .values()
            .map(|bucket| bucket.records.len())
            .sum()
    }

    fn max_contexts(&self) -> usize {
        self.options
            .isolate_by_context
            .as_ref()
            .map_or(0, |context| context.max_contexts)
    }

    fn bucket_key(&self, record: &LogRecord) -> BucketKey {
        let category = self
            .options
            .isolate_by_category
            .as_ref()
            .map(|_| record.category.clone());
        let context = self.options.isolate_by_context.as_ref().map(|isolation| {
            let properties = record.properties();
            let components: Vec<serde_json::Value> = isolation
                .keys
                .iter()
                .map(|key| match properties.get(key) {
                    // An absent key is a component of its own, distinct from null.
                    None => serde_json::Value::Array(Vec::new()),
                    Some(value) => serde_json::Value::Array(vec![value.to_json_value()]),
                })
                .collect();
            serde_json::Value::Array(components).to_string()
        });
        BucketKey { category, context }
    }

    fn flushes(&self, trigger: &BucketKey, candidate: &BucketKey) -> bool {
        if trigger == candidate {
            return true;
        }
        if trigger.context != candidate.context {
            return false;
        }
        match (
            &self.options.isolate_by_category,
            &trigger.category,
            &candidate.category,
        ) {
            (Some(isolation), Some(trigger_category), Some(buffered_category)) => {
                isolation.matches(trigger_category, buffered_category)
            }
            _ => false,
        }
    }

    /// Decide what happens to `record`; returns the records to forward now.
    fn classify(&self, record: &LogRecord) -> Vec<LogRecord> {
        let key = self.bucket_key(record);
        let mut state = self.state.lock();

        let max_contexts = self.max_contexts();
        if state.triggered.contains_key(&key) {
            let touch = state.next_touch();
            state.triggered.insert(key, touch);
            return vec![record.clone()];
        }

        if record.level >= self.options.trigger_level {
            let matched: Vec<BucketKey> = state
                .buckets
                .keys()
                .filter(|candidate| self.flushes(&key, candidate))
                .cloned()
                .collect();
            let mut flushed = Vec::new();
            for bucket_key in matched {
                if let Some(bucket) = state.buckets.remove(&bucket_key) {
                    flushed.extend(bucket.records);
                }
                state.mark_triggered(bucket_key, max_contexts);
            }
            state.mark_triggered(key, max_contexts);
            flushed.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
            flushed.push(record.clone());
            return flushed;
        }

        if let Some(floor) = self.options.buffer_level {
            if record.level < floor {
                return Vec::new();
            }
            if record.level > floor {
                return vec![record.clone()];
            }
        }

        if max_contexts > 0 && !state.buckets.contains_key(&key) {
            while state.buckets.len() >= max_contexts {
                state.evict_least_recent();
            }
        }

        let touch = state.next_touch();
        let max_buffer_size = self.options.max_buffer_size;
        let bucket = state.buckets.entry(key).or_insert_with(|| Bucket {
            records: VecDeque::new(),
            touch,
        });
        bucket.records.push_back(record.clone());
        bucket.touch = touch;
        while bucket.records.len() > max_buffer_size {
            bucket.records.pop_front();
        }
        Vec::new()
    }

    fn stop_reaper(&self) -> Result<()> {
        let reaper = self.reaper.lock().take();
        if let Some(Reaper { stop, handle }) = reaper {
            drop(stop);
            handle
                .join()
                .map_err(|_| LoggerError::disposal(self.name(), "cleanup thread panicked"))?;
        }
        Ok(())
    }
}

fn spawn_reaper(
    state: Weak<Mutex<BufferState>>,
    ttl: Duration,
    interval: Duration,
) -> Result<Reaper> {
    let (stop, stopped): (Sender<()>, Receiver<()>) = crossbeam_channel::bounded(0);
    let ticker = tick(interval);
    let handle = thread::Builder::new()
        .name("logtape-fingers-crossed".to_string())
        .spawn(move || loop {
            select! {
                recv(ticker) -> _ => match state.upgrade() {
                    Some(state) => state.lock().purge_expired(ttl, Instant::now()),
                    None => break,
                },
                recv(stopped) -> _ => break,
            }
        })?;
    Ok(Reaper { stop, handle })
}

impl Sink for FingersCrossedSink {
    fn emit(&self, record: &LogRecord) -> Result<()> {
        let _delivery = self.delivery.lock();
        let mut first_error = None;
        for forwarded in self.classify(record) {
            if let Err(e) = self.inner.emit(&forwarded) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn name(&self) -> &str {
        "fingers_crossed"
    }

    fn disposal(&self) -> Disposal {
        let bounded = self.reaper.lock().is_some() || self.max_contexts() > 0;
        if bounded {
            Disposal::Sync
        } else {
            Disposal::None
        }
    }

    /// Stop the cleanup thread and abandon whatever is still buffered.
    fn dispose(&self) -> Result<()> {
        let stopped = self.stop_reaper();
        let mut state = self.state.lock();
        state.buckets.clear();
        state.triggered.clear();
        stopped
    }
}

impl Drop for FingersCrossedSink {
    fn drop(&mut self) {
        if let Err(e) = self.stop_reaper() {
            eprintln!("[LOGGER ERROR] {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{sink_fn, Message, Properties, RawMessage, Value};

    fn collector() -> (SinkRef, Arc<Mutex<Vec<LogRecord>>>) {
        let records = Arc::new(Mutex::new(Vec::new()));
        let target = Arc::clone(&records);
        let sink = sink_fn("collector", move |record: &LogRecord| {
            target.lock().push(record.clone());
            Ok(())
        });
        (sink, records)
    }

    fn record(level: LogLevel, text: &str) -> LogRecord {
        record_with(level, text, Properties::new())
    }

    fn record_with(level: LogLevel, text: &str, properties: Properties) -> LogRecord {
        LogRecord::new(
            "app",
            level,
            Message::literal(text),
            RawMessage::Template(text.into()),
            properties,
        )
    }

    fn texts(records: &Mutex<Vec<LogRecord>>) -> Vec<String> {
        records
            .lock()
            .iter()
            .map(|r| r.message().to_string())
            .collect()
    }

    #[test]
    fn test_buffers_until_trigger() {
        let (inner, seen) = collector();
        let sink = FingersCrossedSink::new(inner, FingersCrossedOptions::new()).unwrap();

        sink.emit(&record(LogLevel::Debug, "d")).unwrap();
        sink.emit(&record(LogLevel::Info, "i")).unwrap();
        assert!(seen.lock().is_empty());

        sink.emit(&record(LogLevel::Error, "e")).unwrap();
        assert_eq!(texts(&seen), ["d", "i", "e"]);

        // Triggered: everything now passes through.
        sink.emit(&record(LogLevel::Trace, "t")).unwrap();
        assert_eq!(texts(&seen), ["d", "i", "e", "t"]);
    }

    #[test]
    fn test_max_buffer_size_drops_oldest() {
        let (inner, seen) = collector();
        let options = FingersCrossedOptions::new().with_max_buffer_size(3);
        let sink = FingersCrossedSink::new(inner, options).unwrap();

        for text in ["1", "2", "3", "4"] {
            sink.emit(&record(LogLevel::Debug, text)).unwrap();
        }
        sink.emit(&record(LogLevel::Fatal, "trigger")).unwrap();
        assert_eq!(texts(&seen), ["2", "3", "4", "trigger"]);
    }

    #[test]
    fn test_negative_buffer_size_clamps() {
        let (inner, seen) = collector();
        let options = FingersCrossedOptions::new().with_max_buffer_size(-5);
        let sink = FingersCrossedSink::new(inner, options).unwrap();

        sink.emit(&record(LogLevel::Debug, "lost")).unwrap();
        assert_eq!(sink.buffered_len(), 0);
        sink.emit(&record(LogLevel::Error, "e")).unwrap();
        assert_eq!(texts(&seen), ["e"]);
    }

    #[test]
    fn test_buffer_level_must_be_below_trigger() {
        let (inner, _) = collector();
        let options = FingersCrossedOptions::new()
            .with_trigger_level(LogLevel::Warning)
            .with_buffer_level(LogLevel::Warning);
        assert!(matches!(
            FingersCrossedSink::new(inner, options),
            Err(LoggerError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_buffer_level_floor_and_pass_through() {
        let (inner, seen) = collector();
        let options = FingersCrossedOptions::new().with_buffer_level(LogLevel::Debug);
        let sink = FingersCrossedSink::new(inner, options).unwrap();

        sink.emit(&record(LogLevel::Trace, "dropped")).unwrap();
        sink.emit(&record(LogLevel::Debug, "buffered")).unwrap();
        sink.emit(&record(LogLevel::Warning, "live")).unwrap();
        assert_eq!(texts(&seen), ["live"]);

        sink.emit(&record(LogLevel::Error, "e")).unwrap();
        assert_eq!(texts(&seen), ["live", "buffered", "e"]);
    }

    #[test]
    fn test_flush_sorted_by_timestamp() {
        let (inner, seen) = collector();
        let sink = FingersCrossedSink::new(inner, FingersCrossedOptions::new()).unwrap();

        sink.emit(&record(LogLevel::Debug, "third").with_timestamp(30.0)).unwrap();
        sink.emit(&record(LogLevel::Debug, "first").with_timestamp(10.0)).unwrap();
        sink.emit(&record(LogLevel::Debug, "odd").with_timestamp(f64::NAN)).unwrap();
        sink.emit(&record(LogLevel::Debug, "second").with_timestamp(20.0)).unwrap();
        sink.emit(&record(LogLevel::Error, "e").with_timestamp(5.0)).unwrap();

        let delivered = texts(&seen);
        let ordered: Vec<_> = delivered.iter().filter(|t| *t != "odd").collect();
        assert_eq!(ordered, ["first", "second", "third", "e"]);
        assert_eq!(delivered.len(), 5);
    }

    #[test]
    fn test_context_isolation_with_absent_key() {
        let (inner, seen) = collector();
        let options = FingersCrossedOptions::new()
            .isolate_by_context(ContextIsolation::new(["requestId"]));
        let sink = FingersCrossedSink::new(inner, options).unwrap();

        let req = |id: Option<i64>| match id {
            Some(id) => Properties::new().with_field("requestId", id),
            None => Properties::new(),
        };
        sink.emit(&record_with(LogLevel::Debug, "r1", req(Some(1)))).unwrap();
        sink.emit(&record_with(LogLevel::Debug, "r2", req(Some(2)))).unwrap();
        sink.emit(&record_with(LogLevel::Debug, "none", req(None))).unwrap();
        sink.emit(&record_with(LogLevel::Debug, "null", Properties::new().with_field("requestId", Value::Null)))
            .unwrap();
        assert_eq!(sink.bucket_count(), 4);

        sink.emit(&record_with(LogLevel::Error, "fail1", req(Some(1)))).unwrap();
        assert_eq!(texts(&seen), ["r1", "fail1"]);

        sink.emit(&record_with(LogLevel::Error, "fail-none", req(None))).unwrap();
        assert_eq!(texts(&seen), ["r1", "fail1", "none", "fail-none"]);
    }

    #[test]
    fn test_lru_eviction() {
        let (inner, seen) = collector();
        let options = FingersCrossedOptions::new()
            .isolate_by_context(ContextIsolation::new(["id"]).with_max_contexts(2));
        let sink = FingersCrossedSink::new(inner, options).unwrap();
        assert_eq!(sink.disposal(), Disposal::Sync);

        let id = |n: i64| Properties::new().with_field("id", n);
        sink.emit(&record_with(LogLevel::Debug, "a", id(1))).unwrap();
        sink.emit(&record_with(LogLevel::Debug, "b", id(2))).unwrap();
        sink.emit(&record_with(LogLevel::Debug, "a2", id(1))).unwrap();
        sink.emit(&record_with(LogLevel::Debug, "c", id(3))).unwrap();
        assert_eq!(sink.bucket_count(), 2);

        sink.emit(&record_with(LogLevel::Error, "e2", id(2))).unwrap();
        assert_eq!(texts(&seen), ["e2"]);
        sink.emit(&record_with(LogLevel::Error, "e1", id(1))).unwrap();
        assert_eq!(texts(&seen), ["e2", "a", "a2", "e1"]);
    }

    #[test]
    fn test_ttl_expiry_and_idempotent_dispose() {
        let (inner, seen) = collector();
        let options = FingersCrossedOptions::new().isolate_by_context(
            ContextIsolation::new(["id"])
                .with_buffer_ttl(Duration::from_millis(20))
                .with_cleanup_interval(Duration::from_millis(5)),
        );
        let sink = FingersCrossedSink::new(inner, options).unwrap();

        sink.emit(&record_with(LogLevel::Debug, "stale", Properties::new().with_field("id", 1)))
            .unwrap();
        thread::sleep(Duration::from_millis(200));
        assert_eq!(sink.bucket_count(), 0);

        sink.emit(&record_with(LogLevel::Error, "e", Properties::new().with_field("id", 1)))
            .unwrap();
        assert_eq!(texts(&seen), ["e"]);

        sink.dispose().unwrap();
        sink.dispose().unwrap();
        assert_eq!(sink.bucket_count(), 0);
    }

    #[test]
    fn test_triggered_keys_bounded_by_max_contexts() {
        let (inner, seen) = collector();
        let options = FingersCrossedOptions::new()
            .isolate_by_context(ContextIsolation::new(["id"]).with_max_contexts(3));
        let sink = FingersCrossedSink::new(inner, options).unwrap();
        let id = |n: i64| Properties::new().with_field("id", n);

        for n in 0..50 {
            sink.emit(&record_with(LogLevel::Error, "e", id(n))).unwrap();
        }
        assert_eq!(sink.triggered_count(), 3);

        sink.emit(&record_with(LogLevel::Debug, "recent", id(49))).unwrap();
        assert_eq!(seen.lock().last().map(|r| r.message().to_string()), Some("recent".into()));

        sink.emit(&record_with(LogLevel::Debug, "evicted", id(0))).unwrap();
        assert_eq!(sink.bucket_count(), 1);
        assert_eq!(seen.lock().len(), 51);
        assert!(sink.triggered_count() <= 3);
    }

    #[test]
    fn test_triggered_keys_expire_after_ttl() {
        let (inner, seen) = collector();
        let options = FingersCrossedOptions::new().isolate_by_context(
            ContextIsolation::new(["id"])
                .with_buffer_ttl(Duration::from_millis(20))
                .with_cleanup_interval(Duration::from_millis(5)),
        );
        let sink = FingersCrossedSink::new(inner, options).unwrap();
        let id = |n: i64| Properties::new().with_field("id", n);

        for n in 0..100 {
            sink.emit(&record_with(LogLevel::Error, "e", id(n))).unwrap();
        }
        assert!(sink.triggered_count() > 0);
        thread::sleep(Duration::from_millis(200));
        assert_eq!(sink.triggered_count(), 0);

        sink.emit(&record_with(LogLevel::Debug, "quiet", id(1))).unwrap();
        assert_eq!(seen.lock().len(), 100);
        assert_eq!(sink.bucket_count(), 1);
        sink.dispose().unwrap();
    }

    #[test]
    fn test_plain_sink_has_no_disposer() {
        let (inner, _) = collector();
        let sink = FingersCrossedSink::new(inner, FingersCrossedOptions::new()).unwrap();
        assert_eq!(sink.disposal(), Disposal::None);
    }

    #[test]
    fn test_inner_error_is_returned_after_delivery() {
        let delivered = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&delivered);
        let inner = sink_fn("flaky", move |r: &LogRecord| {
            *counter.lock() += 1;
            if r.message().to_string() == "bad" {
                Err(LoggerError::sink("flaky", "bad record"))
            } else {
                Ok(())
            }
        });
        let sink = FingersCrossedSink::new(inner, FingersCrossedOptions::new()).unwrap();

        sink.emit(&record(LogLevel::Debug, "bad")).unwrap();
        sink.emit(&record(LogLevel::Debug, "good")).unwrap();
        assert!(sink.emit(&record(LogLevel::Error, "e")).is_err());
        assert_eq!(*delivered.lock(), 3);
    }
}
