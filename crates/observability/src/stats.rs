//! Shared relay counters.
//!
//! One `RelayStats` instance is created at startup and handed to the
//! dispatcher and the resync scheduler behind an `Arc`. Counters are
//! monotonic for the process lifetime; `snapshot` is the only read path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

/// Process-wide relay counters.
#[derive(Debug)]
pub struct RelayStats {
    received: AtomicU64,
    stored: AtomicU64,
    queued: AtomicU64,
    synced: AtomicU64,
    evicted: AtomicU64,
    errors: AtomicU64,
    started_at: Instant,
}

impl RelayStats {
    pub fn new() -> Self {
        Self {
            received: AtomicU64::new(0),
            stored: AtomicU64::new(0),
            queued: AtomicU64::new(0),
            synced: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// Inbound record accepted by the dispatcher
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record delivered directly to its destination
    pub fn record_stored(&self) {
        self.stored.fetch_add(1, Ordering::Relaxed);
    }

    /// Record parked in the offline queue
    pub fn record_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    /// Queued records drained by a resync cycle
    pub fn record_synced(&self, count: u64) {
        self.synced.fetch_add(count, Ordering::Relaxed);
    }

    /// Oldest queued record dropped to make room
    pub fn record_evicted(&self) {
        self.evicted.fetch_add(1, Ordering::Relaxed);
    }

    /// Request rejected with an error
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            stored: self.stored.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            synced: self.synced.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            uptime_s: self.started_at.elapsed().as_secs(),
        }
    }
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of the relay counters.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatsSnapshot {
    pub received: u64,
    pub stored: u64,
    pub queued: u64,
    pub synced: u64,
    pub evicted: u64,
    pub errors: u64,
    pub uptime_s: u64,
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "received={} stored={} queued={} synced={} evicted={} errors={} uptime={}s",
            self.received,
            self.stored,
            self.queued,
            self.synced,
            self.evicted,
            self.errors,
            self.uptime_s
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = RelayStats::new();
        stats.record_received();
        stats.record_received();
        stats.record_stored();
        stats.record_queued();
        stats.record_synced(5);
        stats.record_error();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.received, 2);
        assert_eq!(snapshot.stored, 1);
        assert_eq!(snapshot.queued, 1);
        assert_eq!(snapshot.synced, 5);
        assert_eq!(snapshot.evicted, 0);
        assert_eq!(snapshot.errors, 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let stats = RelayStats::new();
        stats.record_received();

        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["received"], 1);
        assert_eq!(json["errors"], 0);
    }

    #[test]
    fn test_display_format() {
        let snapshot = StatsSnapshot {
            received: 10,
            stored: 7,
            queued: 3,
            ..Default::default()
        };
        let line = snapshot.to_string();
        assert!(line.contains("received=10"));
        assert!(line.contains("queued=3"));
    }
}
