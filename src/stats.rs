//! Delivery counters shared between the handler and its background task

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, updated without locking
#[derive(Debug, Default)]
pub struct ShipperStats {
    submitted: AtomicU64,
    rejected: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    dial_attempts: AtomicU64,
    dial_failures: AtomicU64,
}

/// Point-in-time copy of [`ShipperStats`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Records accepted into the queue
    pub submitted: u64,
    /// Records refused because the queue was full
    pub rejected: u64,
    /// Records written to the transport
    pub delivered: u64,
    /// Records lost to an encode or write failure
    pub dropped: u64,
    /// Dials started
    pub dial_attempts: u64,
    /// Dials that failed or timed out
    pub dial_failures: u64,
}

impl ShipperStats {
    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dial_attempt(&self) {
        self.dial_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dial_failure(&self) {
        self.dial_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            dial_attempts: self.dial_attempts.load(Ordering::Relaxed),
            dial_failures: self.dial_failures.load(Ordering::Relaxed),
        }
    }
}
