//! Relay service orchestration module.

mod orchestrator;
mod stats;

pub use orchestrator::{RelayService, ServiceConfig};
pub use stats::{HealthReport, QueueReport};
