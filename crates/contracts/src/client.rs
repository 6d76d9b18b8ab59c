//! Upstream client traits - the dispatcher's delivery interfaces
//!
//! Connection pooling and transport details live behind these traits;
//! the relay core only sees typed operations.

use serde_json::Value;

use crate::{AssignmentInfo, RelayError, Registration, SensorReading};

/// Transactional datastore client
///
/// All storage implementations must implement this trait.
#[trait_variant::make(StorageClient: Send)]
pub trait LocalStorageClient {
    /// Insert one sensor reading, resolving the device's farm/zone
    /// assignment first.
    ///
    /// # Errors
    /// [`RelayError::UnassignedDevice`] when the device has no assignment
    /// (permanent); connection/timeout errors are transient.
    async fn insert_reading(&self, reading: &SensorReading) -> Result<u64, RelayError>;

    /// Point lookup of a device's assignment; `None` when unknown
    async fn lookup_assignment(
        &self,
        machine_id: &str,
    ) -> Result<Option<AssignmentInfo>, RelayError>;

    /// Lightweight liveness round trip
    async fn ping(&self) -> bool;
}

/// Remote administrative API client
#[trait_variant::make(RemoteApiClient: Send)]
pub trait LocalRemoteApiClient {
    /// Submit a device registration; returns the API's response body
    async fn register(&self, registration: &Registration) -> Result<Value, RelayError>;

    /// Fetch a device's assignment; `None` when the API does not know it
    async fn fetch_assignment(
        &self,
        machine_id: &str,
    ) -> Result<Option<AssignmentInfo>, RelayError>;

    /// Lightweight liveness request
    async fn ping(&self) -> bool;
}
