//! Mock upstream clients
//!
//! Test doubles with injectable failure scenarios, shared by unit tests
//! across the relay crates and by the integration suite.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{json, Value};

use contracts::{
    AssignmentInfo, Destination, Registration, RelayError, RemoteApiClient, SensorReading,
    StorageClient,
};

/// Mock datastore client
///
/// Starts online with no assignments; configure via [`Self::assign`],
/// [`Self::set_online`] and [`Self::set_fail_inserts`].
pub struct MockStorageClient {
    assignments: Mutex<HashMap<String, AssignmentInfo>>,
    inserted: Mutex<Vec<SensorReading>>,
    next_id: AtomicU64,
    online: AtomicBool,
    fail_inserts: AtomicBool,
    /// Artificial latency applied to every operation
    delay: Mutex<Option<Duration>>,
}

impl MockStorageClient {
    pub fn new() -> Self {
        Self {
            assignments: Mutex::new(HashMap::new()),
            inserted: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1000), // start above real-looking ids
            online: AtomicBool::new(true),
            fail_inserts: AtomicBool::new(false),
            delay: Mutex::new(None),
        }
    }

    /// Register an assignment so inserts for this device succeed
    pub fn assign(&self, machine_id: &str, farm_id: i64, zone_code: &str) {
        self.assignments.lock().unwrap().insert(
            machine_id.to_string(),
            AssignmentInfo {
                machine_id: machine_id.to_string(),
                assigned: true,
                farm_id: Some(farm_id),
                zone_code: Some(zone_code.to_string()),
                farm_name: Some("Test Farm".to_string()),
                client_id: Some(1),
                client_name: Some("Test Client".to_string()),
                installation_date: None,
            },
        );
    }

    /// Register a device known to storage but without a farm assignment
    pub fn register_unassigned(&self, machine_id: &str) {
        self.assignments.lock().unwrap().insert(
            machine_id.to_string(),
            AssignmentInfo {
                machine_id: machine_id.to_string(),
                assigned: false,
                farm_id: None,
                zone_code: None,
                farm_name: None,
                client_id: None,
                client_name: None,
                installation_date: None,
            },
        );
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn insert_count(&self) -> usize {
        self.inserted.lock().unwrap().len()
    }

    pub fn inserted(&self) -> Vec<SensorReading> {
        self.inserted.lock().unwrap().clone()
    }

    async fn simulate_latency(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn ensure_online(&self) -> Result<(), RelayError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RelayError::connection(
                Destination::Storage,
                "connection refused",
            ))
        }
    }
}

impl Default for MockStorageClient {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageClient for MockStorageClient {
    async fn insert_reading(&self, reading: &SensorReading) -> Result<u64, RelayError> {
        self.simulate_latency().await;
        self.ensure_online()?;
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(RelayError::connection(
                Destination::Storage,
                "insert failed",
            ));
        }

        let assigned = self
            .assignments
            .lock()
            .unwrap()
            .get(&reading.machine_id)
            .is_some_and(|info| info.assigned);
        if !assigned {
            return Err(RelayError::UnassignedDevice {
                machine_id: reading.machine_id.clone(),
            });
        }

        self.inserted.lock().unwrap().push(reading.clone());
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn lookup_assignment(
        &self,
        machine_id: &str,
    ) -> Result<Option<AssignmentInfo>, RelayError> {
        self.simulate_latency().await;
        self.ensure_online()?;
        Ok(self.assignments.lock().unwrap().get(machine_id).cloned())
    }

    async fn ping(&self) -> bool {
        self.simulate_latency().await;
        self.online.load(Ordering::SeqCst)
    }
}

/// Mock remote API client
pub struct MockRemoteApiClient {
    assignments: Mutex<HashMap<String, AssignmentInfo>>,
    registered: Mutex<Vec<Registration>>,
    online: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl MockRemoteApiClient {
    pub fn new() -> Self {
        Self {
            assignments: Mutex::new(HashMap::new()),
            registered: Mutex::new(Vec::new()),
            online: AtomicBool::new(true),
            delay: Mutex::new(None),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn assign(&self, machine_id: &str, farm_id: i64, zone_code: &str) {
        self.assignments.lock().unwrap().insert(
            machine_id.to_string(),
            AssignmentInfo {
                machine_id: machine_id.to_string(),
                assigned: true,
                farm_id: Some(farm_id),
                zone_code: Some(zone_code.to_string()),
                farm_name: Some("Test Farm".to_string()),
                client_id: Some(1),
                client_name: Some("Test Client".to_string()),
                installation_date: None,
            },
        );
    }

    pub fn registration_count(&self) -> usize {
        self.registered.lock().unwrap().len()
    }

    async fn simulate_latency(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn ensure_online(&self) -> Result<(), RelayError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RelayError::connection(
                Destination::RemoteApi,
                "connection refused",
            ))
        }
    }
}

impl Default for MockRemoteApiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteApiClient for MockRemoteApiClient {
    async fn register(&self, registration: &Registration) -> Result<Value, RelayError> {
        self.simulate_latency().await;
        self.ensure_online()?;
        self.registered.lock().unwrap().push(registration.clone());
        Ok(json!({
            "status": "registered",
            "machine_id": registration.machine_id,
        }))
    }

    async fn fetch_assignment(
        &self,
        machine_id: &str,
    ) -> Result<Option<AssignmentInfo>, RelayError> {
        self.simulate_latency().await;
        self.ensure_online()?;
        Ok(self.assignments.lock().unwrap().get(machine_id).cloned())
    }

    async fn ping(&self) -> bool {
        self.simulate_latency().await;
        self.online.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(machine_id: &str) -> SensorReading {
        SensorReading {
            machine_id: machine_id.to_string(),
            timestamp: None,
            moisture: 40.0,
            temperature: 19.0,
            conductivity: 1.1,
            ph: 6.8,
            nitrogen: 10.0,
            phosphorus: 4.0,
            potassium: 8.0,
        }
    }

    #[tokio::test]
    async fn test_mock_storage_insert_paths() {
        let storage = MockStorageClient::new();
        storage.assign("m1", 7, "A1");
        storage.register_unassigned("m2");

        let id = storage.insert_reading(&reading("m1")).await.unwrap();
        assert!(id >= 1000);
        assert_eq!(storage.insert_count(), 1);

        let err = storage.insert_reading(&reading("m2")).await.unwrap_err();
        assert!(matches!(err, RelayError::UnassignedDevice { .. }));

        let err = storage.insert_reading(&reading("m3")).await.unwrap_err();
        assert!(matches!(err, RelayError::UnassignedDevice { .. }));

        storage.set_online(false);
        let err = storage.insert_reading(&reading("m1")).await.unwrap_err();
        assert!(err.is_transient());
        assert!(!storage.ping().await);
    }

    #[tokio::test]
    async fn test_mock_api_offline() {
        let api = MockRemoteApiClient::new();
        api.set_online(false);

        let err = api.fetch_assignment("m1").await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(api.registration_count(), 0);
    }
}
