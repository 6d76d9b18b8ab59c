//! Request-path dispatcher.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use contracts::{
    Destination, RecordPayload, RelayError, RemoteApiClient, RetryConfig, StorageClient,
    SubmitOutcome,
};
use observability::{record_delivery, record_record_received, RelayStats};
use offline_queue::OfflineQueue;

use crate::retry::with_retry;

/// Routes payloads to their destination with offline fallback.
///
/// Cheap to share: clients, queue and stats all sit behind `Arc`s owned
/// by the orchestrator.
pub struct Dispatcher<S, A> {
    storage: Arc<S>,
    api: Arc<A>,
    queue: Arc<OfflineQueue>,
    retry: RetryConfig,
    stats: Arc<RelayStats>,
}

impl<S, A> Dispatcher<S, A>
where
    S: StorageClient + Sync,
    A: RemoteApiClient + Sync,
{
    pub fn new(
        storage: Arc<S>,
        api: Arc<A>,
        queue: Arc<OfflineQueue>,
        retry: RetryConfig,
        stats: Arc<RelayStats>,
    ) -> Self {
        Self {
            storage,
            api,
            queue,
            retry,
            stats,
        }
    }

    /// Deliver one payload, parking writes offline when the destination
    /// stays unreachable.
    ///
    /// Returns `Err` only for rejections the caller must see: invalid
    /// or unassigned devices, and lookups with no reachable source.
    /// `QueuedOffline` is a success from the device's point of view.
    #[instrument(name = "dispatch_submit", skip(self, payload), fields(kind = payload.kind().as_str(), machine_id = %payload.machine_id()))]
    pub async fn submit(&self, payload: RecordPayload) -> Result<SubmitOutcome, RelayError> {
        self.stats.record_received();
        record_record_received(payload.kind());

        let result = match payload {
            RecordPayload::SensorReading(_) => self.submit_write(payload).await,
            RecordPayload::Registration(_) => self.submit_write(payload).await,
            RecordPayload::AssignmentQuery(query) => self.submit_query(&query.machine_id).await,
        };

        if result.is_err() {
            self.stats.record_error();
        }
        result
    }

    /// Direct delivery, then offline fallback on transient exhaustion.
    async fn submit_write(&self, payload: RecordPayload) -> Result<SubmitOutcome, RelayError> {
        let destination = payload.destination();
        let attempt = match &payload {
            RecordPayload::SensorReading(reading) => {
                with_retry(destination, &self.retry, || {
                    self.storage.insert_reading(reading)
                })
                .await
                .map(|storage_id| SubmitOutcome::Stored { storage_id })
            }
            RecordPayload::Registration(registration) => {
                with_retry(destination, &self.retry, || self.api.register(registration))
                    .await
                    .map(|response| SubmitOutcome::Accepted { response })
            }
            RecordPayload::AssignmentQuery(_) => unreachable!("queries take the lookup path"),
        };

        match attempt {
            Ok(outcome) => {
                record_delivery(destination, true);
                self.stats.record_stored();
                Ok(outcome)
            }
            Err(e) if e.is_transient() => {
                record_delivery(destination, false);
                let receipt = self.queue.append(destination, &payload)?;
                self.stats.record_queued();
                if receipt.evicted.is_some() {
                    self.stats.record_evicted();
                }
                info!(
                    destination = destination.as_str(),
                    queue_id = receipt.record_id,
                    "destination unreachable, record queued offline"
                );
                Ok(SubmitOutcome::QueuedOffline {
                    queue_id: receipt.record_id,
                })
            }
            Err(e) => {
                record_delivery(destination, false);
                Err(e)
            }
        }
    }

    /// Assignment lookup: remote API first, one direct datastore check
    /// as fallback. Lookups carry no data worth preserving, so a total
    /// failure is an error, never a queue entry.
    async fn submit_query(&self, machine_id: &str) -> Result<SubmitOutcome, RelayError> {
        let api_result = with_retry(Destination::RemoteApi, &self.retry, || {
            self.api.fetch_assignment(machine_id)
        })
        .await;

        match api_result {
            Ok(info) => {
                record_delivery(Destination::RemoteApi, true);
                Ok(SubmitOutcome::Assignment { info })
            }
            Err(api_err) => {
                record_delivery(Destination::RemoteApi, false);
                warn!(
                    machine_id,
                    error = %api_err,
                    "remote API unreachable, falling back to direct lookup"
                );
                match self.storage.lookup_assignment(machine_id).await {
                    Ok(info) => {
                        record_delivery(Destination::Storage, true);
                        Ok(SubmitOutcome::Assignment { info })
                    }
                    Err(storage_err) => {
                        record_delivery(Destination::Storage, false);
                        warn!(machine_id, error = %storage_err, "fallback lookup failed");
                        Err(RelayError::Unavailable {
                            destination: Destination::RemoteApi,
                        })
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{AssignmentQuery, Registration, SensorReading};
    use upstream::{MockRemoteApiClient, MockStorageClient};

    struct Fixture {
        storage: Arc<MockStorageClient>,
        api: Arc<MockRemoteApiClient>,
        queue: Arc<OfflineQueue>,
        dispatcher: Dispatcher<MockStorageClient, MockRemoteApiClient>,
    }

    fn fixture() -> Fixture {
        fixture_with_cap(100)
    }

    fn fixture_with_cap(max_records: usize) -> Fixture {
        let storage = Arc::new(MockStorageClient::new());
        let api = Arc::new(MockRemoteApiClient::new());
        let queue = Arc::new(OfflineQueue::open_in_memory(max_records, 3).unwrap());
        let retry = RetryConfig {
            max_retries: 2,
            retry_delay_s: 0,
            attempt_timeout_s: 1,
        };
        let dispatcher = Dispatcher::new(
            storage.clone(),
            api.clone(),
            queue.clone(),
            retry,
            Arc::new(RelayStats::new()),
        );
        Fixture {
            storage,
            api,
            queue,
            dispatcher,
        }
    }

    fn reading(machine_id: &str) -> RecordPayload {
        RecordPayload::SensorReading(SensorReading {
            machine_id: machine_id.to_string(),
            timestamp: None,
            moisture: 42.0,
            temperature: 18.5,
            conductivity: 1.2,
            ph: 6.5,
            nitrogen: 12.0,
            phosphorus: 5.0,
            potassium: 9.0,
        })
    }

    fn registration(machine_id: &str) -> RecordPayload {
        RecordPayload::Registration(Registration {
            machine_id: machine_id.to_string(),
            sensor_name: "North field probe".to_string(),
            sensor_type: "soil".to_string(),
            client_name: "Acme Agro".to_string(),
            farm_name: "North Farm".to_string(),
            zone_code: "A1".to_string(),
            installation_date: None,
        })
    }

    #[tokio::test]
    async fn test_reading_stored_directly_when_online() {
        let f = fixture();
        f.storage.assign("m1", 7, "A1");

        let outcome = f.dispatcher.submit(reading("m1")).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Stored { .. }));
        assert_eq!(f.storage.insert_count(), 1);
        assert!(f.queue.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_reading_queued_when_storage_down() {
        let f = fixture();
        f.storage.set_online(false);

        let outcome = f.dispatcher.submit(reading("m1")).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::QueuedOffline { .. }));
        assert_eq!(f.queue.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unassigned_device_is_rejected_not_queued() {
        let f = fixture();
        f.storage.register_unassigned("m1");

        let err = f.dispatcher.submit(reading("m1")).await.unwrap_err();
        assert!(matches!(err, RelayError::UnassignedDevice { .. }));
        assert!(f.queue.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_registration_accepted_when_api_online() {
        let f = fixture();

        let outcome = f.dispatcher.submit(registration("m2")).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Accepted { .. }));
        assert_eq!(f.api.registration_count(), 1);
    }

    #[tokio::test]
    async fn test_registration_queued_when_api_down() {
        let f = fixture();
        f.api.set_online(false);

        let outcome = f.dispatcher.submit(registration("m2")).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::QueuedOffline { .. }));
        let pending = f.queue.pending(Destination::RemoteApi, 10).unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_query_uses_api_then_storage_fallback() {
        let f = fixture();
        f.api.set_online(false);
        f.storage.assign("m3", 9, "B2");

        let query = RecordPayload::AssignmentQuery(AssignmentQuery {
            machine_id: "m3".to_string(),
        });
        let outcome = f.dispatcher.submit(query).await.unwrap();
        match outcome {
            SubmitOutcome::Assignment { info } => {
                let info = info.unwrap();
                assert!(info.assigned);
                assert_eq!(info.farm_id, Some(9));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        // lookups never land in the queue
        assert!(f.queue.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_query_fails_when_both_sources_down() {
        let f = fixture();
        f.api.set_online(false);
        f.storage.set_online(false);

        let query = RecordPayload::AssignmentQuery(AssignmentQuery {
            machine_id: "m3".to_string(),
        });
        let err = f.dispatcher.submit(query).await.unwrap_err();
        assert!(matches!(err, RelayError::Unavailable { .. }));
        assert!(f.queue.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_queue_eviction_reported_in_stats() {
        let f = fixture_with_cap(1);
        f.storage.set_online(false);

        f.dispatcher.submit(reading("m1")).await.unwrap();
        f.dispatcher.submit(reading("m2")).await.unwrap();

        assert_eq!(f.queue.len().unwrap(), 1);
        let pending = f.queue.pending(Destination::Storage, 10).unwrap();
        assert_eq!(pending[0].payload.machine_id(), "m2");
    }
}
