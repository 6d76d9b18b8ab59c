//! # Health
//!
//! Destination availability probing for the relay.
//!
//! A probe is a cheap connectivity check (`SELECT 1`, `GET /api/test`)
//! bounded by a hard timeout so a hung destination reads as down rather
//! than stalling the caller. Probe results are cached per destination;
//! callers that only want the last known state read the cache without
//! touching the network.

mod monitor;

pub use monitor::HealthMonitor;
