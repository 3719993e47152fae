//! Shared metrics collection
//!
//! The collector is the only mutable state shared between virtual users. It
//! is injected as an `Arc` into every driver rather than living in a global,
//! so tests can run isolated instances side by side. Rate counters are plain
//! atomics; the latency log takes a short mutex per sample.

use crate::domain::ErrorRate;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Metric name for the shared check error rate
pub const ERRORS_METRIC: &str = "errors";

/// Metric name for request latency samples
pub const REQUEST_DURATION_METRIC: &str = "http_req_duration";

#[derive(Debug, Default)]
struct RateCounter {
    successes: AtomicU64,
    failures: AtomicU64,
}

/// Accumulates named error rates and request latencies across all users
#[derive(Debug, Default)]
pub struct MetricsCollector {
    rates: RwLock<HashMap<String, Arc<RateCounter>>>,
    latencies: Mutex<Vec<Duration>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&self, metric: &str) -> Arc<RateCounter> {
        if let Some(counter) = self.rates.read().get(metric) {
            return Arc::clone(counter);
        }
        let mut rates = self.rates.write();
        Arc::clone(rates.entry(metric.to_string()).or_default())
    }

    /// Record one passed check under `metric`
    pub fn record_success(&self, metric: &str) {
        self.counter(metric).successes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one failed check under `metric`
    pub fn record_failure(&self, metric: &str) {
        self.counter(metric).failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the wall-clock duration of one request attempt
    ///
    /// Failed attempts are recorded too; a timeout is a latency sample.
    pub fn record_latency(&self, elapsed: Duration) {
        self.latencies.lock().push(elapsed);
    }

    /// failures / total for `metric`, in [0, 1]; zero when nothing recorded
    pub fn current_rate(&self, metric: &str) -> ErrorRate {
        let Some(counter) = self.rates.read().get(metric).map(Arc::clone) else {
            return ErrorRate::zero();
        };
        let failures = counter.failures.load(Ordering::Relaxed);
        let total = failures + counter.successes.load(Ordering::Relaxed);
        ErrorRate::from_counts(failures, total)
    }

    /// Immutable end-of-run view for threshold evaluation and reporting
    pub fn snapshot(&self) -> MetricsSnapshot {
        let rates = self
            .rates
            .read()
            .iter()
            .map(|(name, counter)| {
                (
                    name.clone(),
                    RateSnapshot {
                        successes: counter.successes.load(Ordering::Relaxed),
                        failures: counter.failures.load(Ordering::Relaxed),
                    },
                )
            })
            .collect();
        let mut latencies = self.latencies.lock().clone();
        latencies.sort_unstable();
        MetricsSnapshot { rates, latencies }
    }
}

/// Frozen success/failure counts for one named metric
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateSnapshot {
    pub successes: u64,
    pub failures: u64,
}

impl RateSnapshot {
    pub fn total(&self) -> u64 {
        self.successes + self.failures
    }

    pub fn rate(&self) -> ErrorRate {
        ErrorRate::from_counts(self.failures, self.total())
    }
}

/// Point-in-time view of all metrics, latencies pre-sorted
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    rates: HashMap<String, RateSnapshot>,
    latencies: Vec<Duration>,
}

impl MetricsSnapshot {
    pub fn rate(&self, metric: &str) -> Option<RateSnapshot> {
        self.rates.get(metric).copied()
    }

    pub fn sample_count(&self) -> usize {
        self.latencies.len()
    }

    /// Nearest-rank percentile over the sorted latency samples
    ///
    /// `p` is in [0, 100]. Returns None when no samples were recorded.
    pub fn latency_percentile(&self, p: f64) -> Option<Duration> {
        if self.latencies.is_empty() {
            return None;
        }
        let clamped = p.clamp(0.0, 100.0);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let rank = ((clamped / 100.0 * self.latencies.len() as f64).ceil() as usize).max(1);
        Some(self.latencies[rank - 1])
    }

    pub fn latency_min(&self) -> Option<Duration> {
        self.latencies.first().copied()
    }

    pub fn latency_max(&self) -> Option<Duration> {
        self.latencies.last().copied()
    }

    pub fn latency_median(&self) -> Option<Duration> {
        self.latency_percentile(50.0)
    }
}
