//! Poll metrics
//!
//! Lock-free counters updated by the scheduler, snapshotted for the status
//! endpoint.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime};

/// Poll session counters
pub struct PollMetrics {
    /// Ticks that issued a fetch
    ticks_started: AtomicU64,
    /// Ticks that delivered a batch
    ticks_succeeded: AtomicU64,
    /// Ticks reported as failed (fetch, decode, store)
    ticks_failed: AtomicU64,
    /// Ticks refused because the previous one was still in flight
    ticks_skipped: AtomicU64,
    /// Rows discarded for a wrong column count
    rows_discarded: AtomicU64,
    /// Last successful tick (Unix millis)
    last_success_time: AtomicU64,
    start_time: Instant,
}

/// Metrics snapshot for API export
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollMetricsSnapshot {
    pub ticks_started: u64,
    pub ticks_succeeded: u64,
    pub ticks_failed: u64,
    pub ticks_skipped: u64,
    pub rows_discarded: u64,
    pub staleness_ms: u64,
    pub uptime_seconds: u64,
}

impl PollMetrics {
    /// Staleness reported before any success
    pub const MAX_STALENESS_MS: u64 = 3_600_000;

    pub fn new() -> Self {
        Self {
            ticks_started: AtomicU64::new(0),
            ticks_succeeded: AtomicU64::new(0),
            ticks_failed: AtomicU64::new(0),
            ticks_skipped: AtomicU64::new(0),
            rows_discarded: AtomicU64::new(0),
            last_success_time: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    #[inline]
    pub fn record_started(&self) {
        self.ticks_started.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_success(&self, discarded_rows: usize) {
        self.ticks_succeeded.fetch_add(1, Ordering::Relaxed);
        self.rows_discarded
            .fetch_add(discarded_rows as u64, Ordering::Relaxed);
        self.last_success_time.store(unix_millis(), Ordering::Relaxed);
    }

    #[inline]
    pub fn record_failure(&self) {
        self.ticks_failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_skipped(&self) {
        self.ticks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Time since the last successful tick, capped
    pub fn staleness_ms(&self) -> u64 {
        let last = self.last_success_time.load(Ordering::Relaxed);
        if last == 0 {
            return Self::MAX_STALENESS_MS;
        }
        unix_millis().saturating_sub(last).min(Self::MAX_STALENESS_MS)
    }

    pub fn snapshot(&self) -> PollMetricsSnapshot {
        PollMetricsSnapshot {
            ticks_started: self.ticks_started.load(Ordering::Relaxed),
            ticks_succeeded: self.ticks_succeeded.load(Ordering::Relaxed),
            ticks_failed: self.ticks_failed.load(Ordering::Relaxed),
            ticks_skipped: self.ticks_skipped.load(Ordering::Relaxed),
            rows_discarded: self.rows_discarded.load(Ordering::Relaxed),
            staleness_ms: self.staleness_ms(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for PollMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
