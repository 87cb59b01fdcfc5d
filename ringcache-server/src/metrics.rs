//! # Server Metrics
//!
//! Lightweight counters and a latency histogram for QPS, error rate, and
//! tail latency of the peer RPC listener and the HTTP front-end. Ambient
//! observability a network listener always carries alongside its
//! connection-handling loop.
//!
//! ## Design Principles
//! 1. **Accumulator Pattern**: atomic counters aggregate events cheaply.
//! 2. **Fixed Buckets**: histogram buckets sit in a contiguous array for
//!    cache locality.
//! 3. **Zero-Cost Access**: snapshots are plain structs, no heap work on
//!    the hot path.
//! 4. Metrics are decoupled from the request path; wiring is the caller's
//!    job.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Default latency bucket boundaries in microseconds, coarse on purpose to
/// keep the bucket scan short.
pub const DEFAULT_LATENCY_BUCKETS_US: [u64; 12] =
    [1, 2, 5, 10, 20, 50, 100, 200, 500, 1_000, 2_000, 5_000];

/// Snapshot of all server metrics at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub errors_total: u64,
    pub inflight: u64,
    pub latency: LatencySnapshot,
}

/// Snapshot of the latency histogram.
#[derive(Debug, Clone)]
pub struct LatencySnapshot {
    pub bounds_us: Vec<u64>,
    /// Bucket counts, including the overflow bucket at the end.
    pub buckets: Vec<u64>,
    pub samples: u64,
    pub sum_us: u64,
}

/// Thread-safe metrics aggregator. Record calls are zero-allocation;
/// `Ordering::Relaxed` is enough since we need no cross-field ordering,
/// only eventual consistency.
pub struct Metrics {
    requests_total: AtomicU64,
    errors_total: AtomicU64,
    inflight: AtomicU64,
    latency: LatencyHistogram,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics::with_latency_buckets(DEFAULT_LATENCY_BUCKETS_US.to_vec())
    }

    pub fn with_latency_buckets(bounds_us: Vec<u64>) -> Self {
        Metrics {
            requests_total: AtomicU64::new(0),
            errors_total: AtomicU64::new(0),
            inflight: AtomicU64::new(0),
            latency: LatencyHistogram::new(bounds_us),
        }
    }

    pub fn record_request_start(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.inflight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_request_end(&self, latency: Duration) {
        self.inflight.fetch_sub(1, Ordering::Relaxed);
        self.latency.record(latency);
    }

    pub fn record_error(&self) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            errors_total: self.errors_total.load(Ordering::Relaxed),
            inflight: self.inflight.load(Ordering::Relaxed),
            latency: self.latency.snapshot(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-bucket latency histogram. Bucket selection is a linear scan; the
/// bucket list is small (a dozen entries) and stays hot in cache, so this
/// beats a binary search in practice.
pub struct LatencyHistogram {
    bounds_us: Vec<u64>,
    buckets: Vec<AtomicU64>,
    sum_us: AtomicU64,
    samples: AtomicU64,
}

impl LatencyHistogram {
    pub fn new(bounds_us: Vec<u64>) -> Self {
        let buckets = (0..=bounds_us.len()).map(|_| AtomicU64::new(0)).collect();
        LatencyHistogram {
            bounds_us,
            buckets,
            sum_us: AtomicU64::new(0),
            samples: AtomicU64::new(0),
        }
    }

    pub fn record(&self, latency: Duration) {
        let micros = latency.as_micros().min(u64::MAX as u128) as u64;
        self.samples.fetch_add(1, Ordering::Relaxed);
        self.sum_us.fetch_add(micros, Ordering::Relaxed);

        let bucket = self
            .bounds_us
            .iter()
            .position(|&bound| micros <= bound)
            .unwrap_or(self.bounds_us.len());
        self.buckets[bucket].fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LatencySnapshot {
        LatencySnapshot {
            bounds_us: self.bounds_us.clone(),
            buckets: self.buckets.iter().map(|b| b.load(Ordering::Relaxed)).collect(),
            samples: self.samples.load(Ordering::Relaxed),
            sum_us: self.sum_us.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_land_in_the_right_bucket() {
        let metrics = Metrics::with_latency_buckets(vec![10, 100]);
        metrics.record_request_start();
        metrics.record_request_end(Duration::from_micros(5));
        metrics.record_request_start();
        metrics.record_request_end(Duration::from_micros(50));
        metrics.record_request_start();
        metrics.record_request_end(Duration::from_micros(500));

        let snap = metrics.snapshot();
        assert_eq!(snap.requests_total, 3);
        assert_eq!(snap.inflight, 0);
        assert_eq!(snap.latency.buckets, vec![1, 1, 1]);
        assert_eq!(snap.latency.samples, 3);
    }

    #[test]
    fn errors_are_counted_independently_of_requests() {
        let metrics = Metrics::new();
        metrics.record_request_start();
        metrics.record_error();
        metrics.record_request_end(Duration::from_micros(1));
        assert_eq!(metrics.snapshot().errors_total, 1);
    }
}
