//! Consecutive-failure breaker for the ML service.
//!
//! # States
//! - Closed: `failure_count < threshold`, requests go upstream
//! - Tripped: `failure_count >= threshold`, requests get a degraded answer
//!
//! # State Transitions
//! ```text
//! Closed → Tripped: failure_count reaches threshold
//! any    → Closed:  successful upstream call, passing health check, manual reset
//! ```
//!
//! There is no time-based decay and no half-open trial call. The tally lives in
//! application state, one per process; replicas do not share it.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::observability::metrics;

/// Shared consecutive-failure counter.
#[derive(Debug)]
pub struct FailureTally {
    failure_count: AtomicU32,
    threshold: AtomicU32,
    /// Unix millis of the last failure, 0 when none has been seen.
    last_failure_ms: AtomicU64,
}

/// Point-in-time view of the tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TallySnapshot {
    pub failure_count: u32,
    pub threshold: u32,
    pub tripped: bool,
    pub last_failure_at: Option<u64>,
}

impl FailureTally {
    /// Create a tally. A threshold of 0 is raised to 1.
    pub fn new(threshold: u32) -> Self {
        Self {
            failure_count: AtomicU32::new(0),
            threshold: AtomicU32::new(threshold.max(1)),
            last_failure_ms: AtomicU64::new(0),
        }
    }

    /// True once consecutive failures have reached the threshold.
    pub fn is_tripped(&self) -> bool {
        self.failure_count.load(Ordering::Acquire) >= self.threshold.load(Ordering::Acquire)
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::Acquire)
    }

    pub fn threshold(&self) -> u32 {
        self.threshold.load(Ordering::Acquire)
    }

    /// Report a successful upstream call.
    pub fn record_success(&self) {
        let previous = self.failure_count.swap(0, Ordering::AcqRel);
        if previous >= self.threshold() {
            tracing::info!(previous_failures = previous, "ML service recovered, leaving degraded mode");
        }
        metrics::record_breaker_failures(0);
    }

    /// Report a failed upstream call. Returns true if this failure tripped the tally.
    pub fn record_failure(&self) -> bool {
        self.last_failure_ms.store(now_millis(), Ordering::Release);

        let mut current = self.failure_count.load(Ordering::Acquire);
        let (previous, failures) = loop {
            let next = current.saturating_add(1);
            match self.failure_count.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break (current, next),
                Err(actual) => current = actual,
            }
        };

        metrics::record_breaker_failures(failures);

        let threshold = self.threshold();
        let tripped_now = previous < threshold && failures >= threshold;
        if tripped_now {
            tracing::warn!(failures, threshold, "ML service failure threshold reached, entering degraded mode");
            metrics::record_breaker_trip();
        }
        tripped_now
    }

    /// Clear the tally regardless of state.
    pub fn reset(&self) {
        let previous = self.failure_count.swap(0, Ordering::AcqRel);
        tracing::info!(previous_failures = previous, "Failure tally reset");
        metrics::record_breaker_failures(0);
    }

    /// Update the threshold after a config reload. The count is kept.
    ///
    /// Returns true if lowering the threshold tripped the tally.
    pub fn set_threshold(&self, threshold: u32) -> bool {
        let threshold = threshold.max(1);
        let previous = self.threshold.swap(threshold, Ordering::AcqRel);
        if previous == threshold {
            return false;
        }
        tracing::info!(previous, threshold, "Failure threshold updated");

        let failures = self.failure_count();
        let tripped_now = failures < previous && failures >= threshold;
        if tripped_now {
            tracing::warn!(failures, threshold, "Lowered threshold already reached, entering degraded mode");
            metrics::record_breaker_trip();
        }
        tripped_now
    }

    pub fn snapshot(&self) -> TallySnapshot {
        let failure_count = self.failure_count();
        let threshold = self.threshold();
        let last = self.last_failure_ms.load(Ordering::Acquire);
        TallySnapshot {
            failure_count,
            threshold,
            tripped: failure_count >= threshold,
            last_failure_at: (last > 0).then_some(last),
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_trips_at_threshold() {
        let tally = FailureTally::new(3);
        assert!(!tally.record_failure());
        assert!(!tally.record_failure());
        assert!(!tally.is_tripped());
        assert!(tally.record_failure());
        assert!(tally.is_tripped());

        // further failures keep it tripped but don't report a new trip
        assert!(!tally.record_failure());
        assert_eq!(tally.failure_count(), 4);
    }

    #[test]
    fn test_success_resets() {
        let tally = FailureTally::new(3);
        tally.record_failure();
        tally.record_failure();
        tally.record_success();
        assert_eq!(tally.failure_count(), 0);

        tally.record_failure();
        tally.record_failure();
        assert!(!tally.is_tripped(), "needs three fresh failures after a success");
        tally.record_failure();
        assert!(tally.is_tripped());
    }

    #[test]
    fn test_snapshot_and_reset() {
        let tally = FailureTally::new(2);
        assert_eq!(tally.snapshot().last_failure_at, None);

        tally.record_failure();
        tally.record_failure();
        let snap = tally.snapshot();
        assert!(snap.tripped);
        assert_eq!(snap.failure_count, 2);
        assert!(snap.last_failure_at.is_some());

        tally.reset();
        assert!(!tally.snapshot().tripped);
    }

    #[test]
    fn test_threshold_change_applies_to_existing_count() {
        let tally = FailureTally::new(5);
        tally.record_failure();
        tally.record_failure();
        assert!(!tally.is_tripped());

        assert!(tally.set_threshold(2), "lowering below the count is a trip");
        assert!(tally.is_tripped());

        assert!(!tally.set_threshold(0), "already tripped");
        assert_eq!(tally.threshold(), 1);
    }

    #[test]
    fn test_trip_reported_once_after_threshold_lowered() {
        let tally = FailureTally::new(5);
        for _ in 0..3 {
            assert!(!tally.record_failure());
        }

        // raise then lower past the count: the next failure crosses the line
        assert!(!tally.set_threshold(4));
        assert!(tally.record_failure());
        assert!(!tally.record_failure());
    }

    #[test]
    fn test_trip_reported_again_after_reset() {
        let tally = FailureTally::new(2);
        assert!(!tally.record_failure());
        assert!(tally.record_failure());

        tally.reset();
        assert!(!tally.record_failure());
        assert!(tally.record_failure(), "a fresh crossing is a new trip");
    }

    #[test]
    fn test_concurrent_failures_report_exactly_one_trip() {
        let tally = Arc::new(FailureTally::new(50));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tally = tally.clone();
                std::thread::spawn(move || (0..20).filter(|_| tally.record_failure()).count())
            })
            .collect();
        let trips: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(trips, 1);
        assert_eq!(tally.failure_count(), 160);
    }

    #[test]
    fn test_concurrent_failures_are_all_counted() {
        let tally = Arc::new(FailureTally::new(1000));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tally = tally.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        tally.record_failure();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(tally.failure_count(), 800);
    }
}
