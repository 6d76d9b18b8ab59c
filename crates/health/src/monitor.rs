use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use contracts::{Destination, DestinationHealth, HealthConfig, RemoteApiClient, StorageClient};

/// Probes destinations and caches the most recent result.
///
/// Shared behind an `Arc` by the dispatcher, the resync scheduler and
/// the status reporter. Probes never run concurrently against the same
/// cached entry in a harmful way: writes are last-probe-wins.
pub struct HealthMonitor<S, A> {
    storage: Arc<S>,
    api: Arc<A>,
    probe_timeout: Duration,
    cache: RwLock<HashMap<Destination, DestinationHealth>>,
}

impl<S, A> HealthMonitor<S, A>
where
    S: StorageClient + Sync,
    A: RemoteApiClient + Sync,
{
    pub fn new(storage: Arc<S>, api: Arc<A>, config: &HealthConfig) -> Self {
        Self {
            storage,
            api,
            probe_timeout: config.probe_timeout(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Actively probe one destination and refresh its cache entry.
    ///
    /// A probe that exceeds the configured timeout counts as down.
    pub async fn probe(&self, destination: Destination) -> bool {
        let check = async {
            match destination {
                Destination::Storage => self.storage.ping().await,
                Destination::RemoteApi => self.api.ping().await,
            }
        };

        let available = match tokio::time::timeout(self.probe_timeout, check).await {
            Ok(up) => up,
            Err(_) => {
                warn!(
                    destination = destination.as_str(),
                    timeout_ms = self.probe_timeout.as_millis() as u64,
                    "health probe timed out"
                );
                false
            }
        };

        debug!(
            destination = destination.as_str(),
            available, "health probe completed"
        );
        metrics::gauge!(
            "relay_destination_up",
            "destination" => destination.as_str()
        )
        .set(if available { 1.0 } else { 0.0 });

        self.write_cache().insert(
            destination,
            DestinationHealth {
                destination,
                available,
                checked_at: Utc::now(),
            },
        );
        available
    }

    /// Probe every destination, returning the refreshed snapshot.
    pub async fn probe_all(&self) -> Vec<DestinationHealth> {
        for destination in Destination::ALL {
            self.probe(destination).await;
        }
        self.snapshot()
    }

    /// Last cached result for a destination, `None` if never probed.
    pub fn status(&self, destination: Destination) -> Option<DestinationHealth> {
        self.read_cache().get(&destination).copied()
    }

    /// Cached results for all probed destinations, storage first.
    pub fn snapshot(&self) -> Vec<DestinationHealth> {
        let cache = self.read_cache();
        Destination::ALL
            .into_iter()
            .filter_map(|d| cache.get(&d).copied())
            .collect()
    }

    fn read_cache(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<Destination, DestinationHealth>> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_cache(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<Destination, DestinationHealth>> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upstream::{MockRemoteApiClient, MockStorageClient};

    fn monitor(
        storage: Arc<MockStorageClient>,
        api: Arc<MockRemoteApiClient>,
    ) -> HealthMonitor<MockStorageClient, MockRemoteApiClient> {
        HealthMonitor::new(storage, api, &HealthConfig::default())
    }

    #[tokio::test]
    async fn test_probe_reports_current_state() {
        let storage = Arc::new(MockStorageClient::new());
        let api = Arc::new(MockRemoteApiClient::new());
        let monitor = monitor(storage.clone(), api.clone());

        assert!(monitor.probe(Destination::Storage).await);
        assert!(monitor.probe(Destination::RemoteApi).await);

        storage.set_online(false);
        assert!(!monitor.probe(Destination::Storage).await);
        assert!(monitor.probe(Destination::RemoteApi).await);
    }

    #[tokio::test]
    async fn test_cache_reflects_last_probe() {
        let storage = Arc::new(MockStorageClient::new());
        let api = Arc::new(MockRemoteApiClient::new());
        let monitor = monitor(storage.clone(), api);

        assert!(monitor.status(Destination::Storage).is_none());

        monitor.probe(Destination::Storage).await;
        let status = monitor.status(Destination::Storage).unwrap();
        assert!(status.available);

        storage.set_online(false);
        // cache is stale until the next probe
        assert!(monitor.status(Destination::Storage).unwrap().available);

        monitor.probe(Destination::Storage).await;
        assert!(!monitor.status(Destination::Storage).unwrap().available);
    }

    #[tokio::test]
    async fn test_slow_probe_counts_as_down() {
        let storage = Arc::new(MockStorageClient::new());
        let api = Arc::new(MockRemoteApiClient::new());
        let config = HealthConfig { probe_timeout_s: 1 };
        let monitor = HealthMonitor::new(storage.clone(), api, &config);

        storage.set_delay(Some(Duration::from_secs(5)));
        assert!(!monitor.probe(Destination::Storage).await);
        assert!(!monitor.status(Destination::Storage).unwrap().available);
    }

    #[tokio::test]
    async fn test_probe_all_covers_both_destinations() {
        let storage = Arc::new(MockStorageClient::new());
        let api = Arc::new(MockRemoteApiClient::new());
        api.set_online(false);
        let monitor = monitor(storage, api);

        let snapshot = monitor.probe_all().await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].destination, Destination::Storage);
        assert!(snapshot[0].available);
        assert_eq!(snapshot[1].destination, Destination::RemoteApi);
        assert!(!snapshot[1].available);
    }
}
