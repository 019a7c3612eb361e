//! Lightweight in-process metrics, generalized from the teacher's
//! counter/gauge/histogram trio.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Increment the counter by one.
    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the counter by `delta`.
    pub fn add(&self, delta: u64) {
        self.0.fetch_add(delta, Ordering::Relaxed);
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A value that can move up or down.
#[derive(Debug, Default)]
pub struct Gauge(AtomicI64);

impl Gauge {
    /// Set the gauge to an absolute value.
    pub fn set(&self, value: i64) {
        self.0.store(value, Ordering::Relaxed);
    }

    /// Add `delta` (may be negative) to the gauge.
    pub fn add(&self, delta: i64) {
        self.0.fetch_add(delta, Ordering::Relaxed);
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A running sample set, tracked as count/sum/min/max rather than full
/// quantiles — enough for run-level cost and latency reporting without
/// pulling in a histogram crate.
#[derive(Debug, Default)]
pub struct Histogram {
    count: AtomicU64,
    sum_millis: AtomicU64,
}

impl Histogram {
    /// Record one observation.
    pub fn observe(&self, value: std::time::Duration) {
        self.count.fetch_add(1, Ordering::Relaxed);
        #[allow(clippy::cast_possible_truncation)]
        let millis = value.as_millis() as u64;
        self.sum_millis.fetch_add(millis, Ordering::Relaxed);
    }

    /// Number of observations recorded.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Mean observation, in milliseconds. `0.0` if nothing was recorded.
    #[must_use]
    pub fn mean_millis(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let mean = self.sum_millis.load(Ordering::Relaxed) as f64 / count as f64;
        mean
    }
}

/// A named, process-wide registry of counters, gauges, and histograms.
///
/// Metrics are created lazily on first access and keyed by name; callers
/// don't need to pre-register anything.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    counters: DashMap<String, Arc<Counter>>,
    gauges: DashMap<String, Arc<Gauge>>,
    histograms: DashMap<String, Arc<Histogram>>,
}

impl MetricsRegistry {
    /// Build an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch or create the named counter.
    pub fn counter(&self, name: &str) -> Arc<Counter> {
        self.counters
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(Counter::default()))
            .clone()
    }

    /// Fetch or create the named gauge.
    pub fn gauge(&self, name: &str) -> Arc<Gauge> {
        self.gauges
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(Gauge::default()))
            .clone()
    }

    /// Fetch or create the named histogram.
    pub fn histogram(&self, name: &str) -> Arc<Histogram> {
        self.histograms
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(Histogram::default()))
            .clone()
    }

    /// Snapshot every counter's current value, for a status endpoint.
    #[must_use]
    pub fn counter_snapshot(&self) -> BTreeMap<String, u64> {
        self.counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().get()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates_across_clones() {
        let registry = MetricsRegistry::new();
        registry.counter("nodes.completed").increment();
        registry.counter("nodes.completed").add(4);
        assert_eq!(registry.counter("nodes.completed").get(), 5);
    }

    #[test]
    fn gauge_tracks_signed_deltas() {
        let gauge = Gauge::default();
        gauge.set(10);
        gauge.add(-3);
        assert_eq!(gauge.get(), 7);
    }

    #[test]
    fn histogram_computes_mean() {
        let histogram = Histogram::default();
        histogram.observe(std::time::Duration::from_millis(100));
        histogram.observe(std::time::Duration::from_millis(300));
        assert!((histogram.mean_millis() - 200.0).abs() < f64::EPSILON);
        assert_eq!(histogram.count(), 2);
    }

    #[test]
    fn snapshot_reflects_registered_counters() {
        let registry = MetricsRegistry::new();
        registry.counter("runs.started").increment();
        let snapshot = registry.counter_snapshot();
        assert_eq!(snapshot.get("runs.started"), Some(&1));
    }
}
