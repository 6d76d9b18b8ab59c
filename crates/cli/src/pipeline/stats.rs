//! Periodic health/statistics report.

use serde::Serialize;

use contracts::DestinationHealth;
use observability::StatsSnapshot;

/// Point-in-time report logged by `run` and printed on shutdown.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Seconds since the service started
    pub uptime_s: u64,

    /// Relay counters since start
    pub stats: StatsSnapshot,

    /// Last probe result per destination
    pub destinations: Vec<DestinationHealth>,

    /// Offline queue occupancy
    pub queue: QueueReport,
}

/// Offline queue occupancy summary.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct QueueReport {
    /// All records on disk, exhausted included
    pub depth: u64,

    /// Records still eligible for redelivery to the datastore
    pub pending_storage: u64,

    /// Records still eligible for redelivery to the remote API
    pub pending_remote_api: u64,

    /// Records that burned their whole attempt budget
    pub exhausted: u64,
}

impl HealthReport {
    /// Print a human-readable summary.
    pub fn print_summary(&self) {
        println!("\n=== Relay Status ===\n");
        println!("Uptime: {}s", self.uptime_s);
        println!(
            "Records: received={} stored={} queued={} synced={} evicted={} errors={}",
            self.stats.received,
            self.stats.stored,
            self.stats.queued,
            self.stats.synced,
            self.stats.evicted,
            self.stats.errors
        );

        println!("\nDestinations:");
        if self.destinations.is_empty() {
            println!("  (not probed yet)");
        }
        for health in &self.destinations {
            let state = if health.available { "up" } else { "DOWN" };
            println!(
                "  - {}: {} (checked {})",
                health.destination,
                state,
                health.checked_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }

        println!("\nOffline queue:");
        println!("  depth: {}", self.queue.depth);
        println!("  pending (storage): {}", self.queue.pending_storage);
        println!("  pending (remote API): {}", self.queue.pending_remote_api);
        println!("  exhausted: {}", self.queue.exhausted);
        println!();
    }
}
