//! Relay metric helpers
//!
//! Thin wrappers over the `metrics` macros so label names stay
//! consistent across crates.

use contracts::{Destination, RecordKind};
use metrics::counter;

/// Record acceptance of an inbound record.
pub fn record_record_received(kind: RecordKind) {
    counter!(
        "relay_records_received_total",
        "kind" => kind.as_str()
    )
    .increment(1);
}

/// Record a delivery attempt outcome against a destination.
pub fn record_delivery(destination: Destination, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "relay_delivery_total",
        "destination" => destination.as_str(),
        "status" => status
    )
    .increment(1);
}

/// Record a completed resync cycle.
pub fn record_resync_cycle() {
    counter!("relay_resync_cycles_total").increment(1);
}

/// Record records drained from the queue during resync.
pub fn record_resync_synced(destination: Destination, count: u64) {
    if count > 0 {
        counter!(
            "relay_resync_synced_total",
            "destination" => destination.as_str()
        )
        .increment(count);
    }
}
