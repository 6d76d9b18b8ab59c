//! # Resync
//!
//! Background drain of the offline queue.
//!
//! A scheduler task wakes on a fixed interval, probes each destination,
//! and redelivers queued records to the destinations that answer. Each
//! record gets one delivery attempt per cycle; the queue tracks attempt
//! counts and stops offering records that have exhausted their budget.
//! The task is cooperatively cancellable and a faulted cycle backs off
//! instead of killing the loop.

mod scheduler;

pub use scheduler::{CycleReport, ResyncHandle, ResyncScheduler};
