//! Pipeline metrics
//!
//! Counters describing what a logger tree did with the records it was
//! handed: how many reached sinks, how many were turned away by levels or
//! filters, and how many sink invocations failed.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by every node of one logger tree.
///
/// # Example
///
/// ```
/// use logtape::PipelineMetrics;
///
/// let metrics = PipelineMetrics::new();
/// metrics.record_dispatched();
/// metrics.record_sink_failure();
///
/// assert_eq!(metrics.records_dispatched(), 1);
/// assert_eq!(metrics.sink_failures(), 1);
/// ```
#[derive(Debug)]
pub struct PipelineMetrics {
    /// Records that passed the level gate and the filters
    records_dispatched: AtomicU64,

    /// Records rejected by the level gate or a filter
    records_rejected: AtomicU64,

    /// Sink invocations that returned an error or panicked
    sink_failures: AtomicU64,

    /// Diagnostics emitted on the meta category
    meta_records: AtomicU64,
}

impl PipelineMetrics {
    pub const fn new() -> Self {
        Self {
            records_dispatched: AtomicU64::new(0),
            records_rejected: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
            meta_records: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn records_dispatched(&self) -> u64 {
        self.records_dispatched.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn records_rejected(&self) -> u64 {
        self.records_rejected.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sink_failures(&self) -> u64 {
        self.sink_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn meta_records(&self) -> u64 {
        self.meta_records.load(Ordering::Relaxed)
    }

    /// Returns the previous count
    #[inline]
    pub fn record_dispatched(&self) -> u64 {
        self.records_dispatched.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_rejected(&self) -> u64 {
        self.records_rejected.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_sink_failure(&self) -> u64 {
        self.sink_failures.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_meta(&self) -> u64 {
        self.meta_records.fetch_add(1, Ordering::Relaxed)
    }

    /// Share of sink invocations that failed, as a percentage.
    ///
    /// Returns 0.0 before anything was dispatched.
    pub fn failure_rate(&self) -> f64 {
        let dispatched = self.records_dispatched() as f64;
        if dispatched == 0.0 {
            0.0
        } else {
            (self.sink_failures() as f64 / dispatched) * 100.0
        }
    }

    pub fn reset(&self) {
        self.records_dispatched.store(0, Ordering::Relaxed);
        self.records_rejected.store(0, Ordering::Relaxed);
        self.sink_failures.store(0, Ordering::Relaxed);
        self.meta_records.store(0, Ordering::Relaxed);
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for PipelineMetrics {
    /// Snapshot of the current values
    fn clone(&self) -> Self {
        Self {
            records_dispatched: AtomicU64::new(self.records_dispatched()),
            records_rejected: AtomicU64::new(self.records_rejected()),
            sink_failures: AtomicU64::new(self.sink_failures()),
            meta_records: AtomicU64::new(self.meta_records()),
        }
    }
}
