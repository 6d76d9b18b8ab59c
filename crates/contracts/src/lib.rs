//! # Contracts
//!
//! Frozen interface contracts (ICD), defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Delivery Model
//! - A payload targets exactly one [`Destination`]
//! - Write-shaped payloads that cannot be delivered are buffered as
//!   [`QueuedRecord`]s; read-shaped payloads are never buffered

mod client;
mod config;
mod destination;
mod error;
mod outcome;
mod record;

pub use client::{RemoteApiClient, StorageClient};
pub use config::*;
pub use destination::{Destination, DestinationHealth};
pub use error::*;
pub use outcome::SubmitOutcome;
pub use record::*;
