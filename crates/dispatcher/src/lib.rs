//! # Dispatcher
//!
//! Request-path delivery with bounded in-request retries and offline
//! fallback.
//!
//! A submitted payload is delivered to its destination immediately. A
//! transient failure is retried a bounded number of times inside the
//! request; if every attempt fails, write payloads are parked in the
//! offline queue and the caller gets an acknowledgement that the data
//! is safe, not delivered. Read-only lookups are never queued.
//!
//! ## Latency contract
//!
//! `submit` blocks the caller for at most
//! `max_retries * attempt_timeout + (max_retries - 1) * retry_delay`
//! per destination touched. With defaults (3 retries, 10s timeout, 5s
//! delay) that is 40 seconds worst case. Deployments that cannot
//! tolerate this reduce `retry.max_retries` or `retry.attempt_timeout_s`
//! and lean on the resync scheduler instead.

mod dispatcher;
mod retry;

pub use dispatcher::Dispatcher;
pub use retry::with_retry;
