//! Atomic metrics for local tracking.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::Serialize;

/// Thread-safe atomic counter.
#[derive(Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Thread-safe atomic gauge.
#[derive(Default)]
pub struct Gauge {
    value: AtomicI64,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Simple histogram using fixed buckets.
pub struct Histogram {
    buckets: Vec<AtomicU64>,
    bucket_bounds: Vec<f64>,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new(bucket_bounds: Vec<f64>) -> Self {
        let buckets = (0..=bucket_bounds.len())
            .map(|_| AtomicU64::new(0))
            .collect();
        Self {
            buckets,
            bucket_bounds,
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn default_latency() -> Self {
        Self::new(vec![1.0, 2.5, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0])
    }

    pub fn observe(&self, value: f64) {
        let bucket_idx = self
            .bucket_bounds
            .iter()
            .position(|&bound| value <= bound)
            .unwrap_or(self.bucket_bounds.len());

        self.buckets[bucket_idx].fetch_add(1, Ordering::Relaxed);
        self.sum
            .fetch_add((value * 1000.0) as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Sum in the observed unit (ms). Stored internally scaled by 1000.
    pub fn sum_ms(&self) -> f64 {
        self.sum.load(Ordering::Relaxed) as f64 / 1000.0
    }

    pub fn bucket_counts(&self) -> Vec<u64> {
        self.buckets
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .collect()
    }
}

/// Metering-engine metrics registry.
pub struct MeterMetrics {
    pub sessions_started: Counter,
    pub sessions_stopped: Counter,
    pub open_sessions: Gauge,
    pub ticks_total: Counter,
    pub seconds_accrued: Counter,
    pub not_entitled: Counter,
    pub session_not_found: Counter,
    pub session_cap_reached: Counter,
    pub balance_exhausted: Counter,
    pub grants_issued: Counter,
    pub seconds_granted: Counter,
    pub unknown_sku: Counter,
    pub operation_latency_ms: Histogram,
}

impl MeterMetrics {
    pub fn new() -> Self {
        Self {
            sessions_started: Counter::new(),
            sessions_stopped: Counter::new(),
            open_sessions: Gauge::new(),
            ticks_total: Counter::new(),
            seconds_accrued: Counter::new(),
            not_entitled: Counter::new(),
            session_not_found: Counter::new(),
            session_cap_reached: Counter::new(),
            balance_exhausted: Counter::new(),
            grants_issued: Counter::new(),
            seconds_granted: Counter::new(),
            unknown_sku: Counter::new(),
            operation_latency_ms: Histogram::default_latency(),
        }
    }

    pub fn denials(&self) -> u64 {
        self.not_entitled.get() + self.session_cap_reached.get() + self.balance_exhausted.get()
    }

    pub fn snapshot(&self) -> MetricsSummary {
        let operations = self.operation_latency_ms.count();
        MetricsSummary {
            sessions_started: self.sessions_started.get(),
            sessions_stopped: self.sessions_stopped.get(),
            open_sessions: self.open_sessions.get(),
            ticks_total: self.ticks_total.get(),
            seconds_accrued: self.seconds_accrued.get(),
            denials: self.denials(),
            session_cap_reached: self.session_cap_reached.get(),
            balance_exhausted: self.balance_exhausted.get(),
            grants_issued: self.grants_issued.get(),
            seconds_granted: self.seconds_granted.get(),
            avg_latency_ms: if operations > 0 {
                self.operation_latency_ms.sum_ms() / operations as f64
            } else {
                0.0
            },
        }
    }
}

impl Default for MeterMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub sessions_started: u64,
    pub sessions_stopped: u64,
    pub open_sessions: i64,
    pub ticks_total: u64,
    pub seconds_accrued: u64,
    pub denials: u64,
    pub session_cap_reached: u64,
    pub balance_exhausted: u64,
    pub grants_issued: u64,
    pub seconds_granted: u64,
    pub avg_latency_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let counter = Counter::new();
        counter.inc();
        counter.add(5);
        assert_eq!(counter.get(), 6);
    }

    #[test]
    fn test_gauge() {
        let gauge = Gauge::new();
        gauge.set(10);
        gauge.inc();
        gauge.dec();
        gauge.dec();
        assert_eq!(gauge.get(), 9);
    }

    #[test]
    fn test_histogram_buckets() {
        let hist = Histogram::new(vec![10.0, 100.0]);
        hist.observe(5.0);
        hist.observe(50.0);
        hist.observe(500.0);
        assert_eq!(hist.count(), 3);
        assert_eq!(hist.bucket_counts(), vec![1, 1, 1]);
        assert!((hist.sum_ms() - 555.0).abs() < 0.01);
    }

    #[test]
    fn test_snapshot_aggregates_denials() {
        let metrics = MeterMetrics::new();
        metrics.not_entitled.inc();
        metrics.session_cap_reached.add(2);
        metrics.balance_exhausted.inc();
        metrics.operation_latency_ms.observe(4.0);
        metrics.operation_latency_ms.observe(6.0);

        let summary = metrics.snapshot();
        assert_eq!(summary.denials, 4);
        assert!((summary.avg_latency_ms - 5.0).abs() < 0.01);
    }
}
