//! Admission counters.
//!
//! Every counter is kept twice: as an in-process atomic (readable through
//! [`AdmissionMetrics::snapshot`]) and as an OpenTelemetry counter on the
//! global meter, which is a no-op until an exporter is installed.

use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
struct Counters {
    proceeded: AtomicU64,
    queued: AtomicU64,
    promoted: AtomicU64,
    rejected: AtomicU64,
    rate_limited: AtomicU64,
    cancelled: AtomicU64,
    config_unavailable: AtomicU64,
    queue_wait_ms: AtomicU64,
}

/// Admission outcome counters shared by the controller, rate limiter and gate.
///
/// Cloning yields another handle to the same counters.
#[derive(Clone)]
pub struct AdmissionMetrics {
    counters: Arc<Counters>,
    decisions: Counter<u64>,
    queue_wait: Histogram<f64>,
}

impl AdmissionMetrics {
    /// Create new admission metrics.
    pub fn new() -> Self {
        let meter = global::meter("clause_admission");

        Self {
            counters: Arc::new(Counters::default()),
            decisions: meter
                .u64_counter("admission.decisions")
                .with_description("Admission decisions by outcome")
                .build(),
            queue_wait: meter
                .f64_histogram("admission.queue_wait")
                .with_unit("seconds")
                .with_description("Time queued callers waited for a slot")
                .build(),
        }
    }

    fn record(&self, counter: &AtomicU64, outcome: &'static str) {
        counter.fetch_add(1, Ordering::Relaxed);
        self.decisions.add(1, &[KeyValue::new("outcome", outcome)]);
    }

    /// A caller got a slot straight away.
    pub fn record_proceed(&self) {
        self.record(&self.counters.proceeded, "proceed");
    }

    /// A caller joined the queue.
    pub fn record_queued(&self) {
        self.record(&self.counters.queued, "queued");
    }

    /// A queued caller got its slot after waiting `waited`.
    pub fn record_promoted(&self, waited: Duration) {
        self.record(&self.counters.promoted, "promoted");
        self.counters
            .queue_wait_ms
            .fetch_add(waited.as_millis() as u64, Ordering::Relaxed);
        self.queue_wait.record(waited.as_secs_f64(), &[]);
    }

    /// A caller was turned away because slots and queue were full.
    pub fn record_rejected(&self) {
        self.record(&self.counters.rejected, "rejected");
    }

    /// A caller was turned away by its per-client rate limit.
    pub fn record_rate_limited(&self) {
        self.record(&self.counters.rate_limited, "rate_limited");
    }

    /// A queued caller gave up before getting a slot.
    pub fn record_cancelled(&self) {
        self.record(&self.counters.cancelled, "cancelled");
    }

    /// A decision failed because the limits could not be read.
    pub fn record_config_unavailable(&self) {
        self.record(&self.counters.config_unavailable, "config_unavailable");
    }

    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let c = &self.counters;
        MetricsSnapshot {
            proceeded: c.proceeded.load(Ordering::Relaxed),
            queued: c.queued.load(Ordering::Relaxed),
            promoted: c.promoted.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
            rate_limited: c.rate_limited.load(Ordering::Relaxed),
            cancelled: c.cancelled.load(Ordering::Relaxed),
            config_unavailable: c.config_unavailable.load(Ordering::Relaxed),
            queue_wait_ms: c.queue_wait_ms.load(Ordering::Relaxed),
        }
    }
}

impl Default for AdmissionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AdmissionMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AdmissionMetrics")
            .field(&self.snapshot())
            .finish()
    }
}

/// Counter values at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Callers admitted without waiting
    pub proceeded: u64,
    /// Callers that joined the queue
    pub queued: u64,
    /// Queued callers that later got a slot
    pub promoted: u64,
    /// Callers rejected because the system was full
    pub rejected: u64,
    /// Callers rejected by their rate limit
    pub rate_limited: u64,
    /// Queued callers that gave up
    pub cancelled: u64,
    /// Decisions that failed for lack of limits
    pub config_unavailable: u64,
    /// Total time promoted callers spent queued, in milliseconds
    pub queue_wait_ms: u64,
}

impl MetricsSnapshot {
    /// Callers that were given a slot, directly or after queueing.
    pub fn admitted(&self) -> u64 {
        self.proceeded + self.promoted
    }

    /// Mean queue wait of promoted callers.
    pub fn mean_queue_wait(&self) -> Duration {
        if self.promoted == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(self.queue_wait_ms / self.promoted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_counters() {
        let metrics = AdmissionMetrics::new();
        let other = metrics.clone();

        metrics.record_proceed();
        other.record_queued();
        other.record_promoted(Duration::from_millis(300));
        metrics.record_promoted(Duration::from_millis(100));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.proceeded, 1);
        assert_eq!(snapshot.queued, 1);
        assert_eq!(snapshot.admitted(), 3);
        assert_eq!(snapshot.mean_queue_wait(), Duration::from_millis(200));
    }

    #[test]
    fn test_mean_wait_without_promotions() {
        assert_eq!(MetricsSnapshot::default().mean_queue_wait(), Duration::ZERO);
    }
}
