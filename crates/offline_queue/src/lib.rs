//! # Offline Queue
//!
//! Durable, capacity-bounded store of records awaiting delivery.
//!
//! Responsibilities:
//! - Persist write-shaped payloads that could not be delivered
//! - Serve ordered per-destination batches to the resync scheduler
//! - Account delivery attempts and retain exhausted records
//! - Evict the globally oldest record when the capacity bound is exceeded
//!
//! Every operation is one independent transaction; no cross-operation
//! locks are held, so dispatcher appends and resync drains only contend
//! per call.

mod queue;

pub use queue::{AppendReceipt, OfflineQueue, QueueStats};
