//! Resync scheduler and its task handle.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use contracts::{
    Destination, QueuedRecord, RecordPayload, RelayError, RemoteApiClient, ResyncConfig,
    StorageClient,
};
use health::HealthMonitor;
use observability::{record_resync_cycle, record_resync_synced, RelayStats};
use offline_queue::OfflineQueue;

/// Outcome of one resync cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Records delivered and removed from the queue
    pub synced: u64,
    /// Records that failed delivery and had their attempt count bumped
    pub failed: u64,
    /// Destinations skipped because the probe said down
    pub skipped: u64,
    /// Queue access failed mid-cycle; the loop backs off before retrying
    pub faulted: bool,
}

/// Drains the offline queue toward healthy destinations.
pub struct ResyncScheduler<S, A> {
    storage: Arc<S>,
    api: Arc<A>,
    queue: Arc<OfflineQueue>,
    health: Arc<HealthMonitor<S, A>>,
    config: ResyncConfig,
    stats: Arc<RelayStats>,
}

impl<S, A> ResyncScheduler<S, A>
where
    S: StorageClient + Sync + Send + 'static,
    A: RemoteApiClient + Sync + Send + 'static,
{
    pub fn new(
        storage: Arc<S>,
        api: Arc<A>,
        queue: Arc<OfflineQueue>,
        health: Arc<HealthMonitor<S, A>>,
        config: ResyncConfig,
        stats: Arc<RelayStats>,
    ) -> Self {
        Self {
            storage,
            api,
            queue,
            health,
            config,
            stats,
        }
    }

    /// Run one cycle over both destinations.
    pub async fn run_cycle(&self) -> CycleReport {
        self.run_cycle_inner(None).await
    }

    #[instrument(name = "resync_cycle", skip_all)]
    async fn run_cycle_inner(&self, cancel: Option<&watch::Receiver<bool>>) -> CycleReport {
        let mut report = CycleReport::default();

        for destination in Destination::ALL {
            if cancelled(cancel) {
                break;
            }

            // probe every cycle so the health cache stays fresh even
            // when a destination has nothing queued
            if !self.health.probe(destination).await {
                debug!(
                    destination = destination.as_str(),
                    "destination down, keeping records queued"
                );
                report.skipped += 1;
                continue;
            }

            let pending = match self.queue.pending_count(destination) {
                Ok(n) => n,
                Err(e) => {
                    error!(error = %e, "queue inspection failed");
                    report.faulted = true;
                    break;
                }
            };
            if pending == 0 {
                continue;
            }

            self.drain_destination(destination, cancel, &mut report)
                .await;
        }

        record_resync_cycle();
        if report.synced > 0 || report.failed > 0 {
            info!(
                synced = report.synced,
                failed = report.failed,
                skipped = report.skipped,
                "resync cycle finished"
            );
        }
        report
    }

    /// Redeliver up to one batch for a destination, oldest first.
    ///
    /// Every record in the batch gets one delivery attempt; a failed
    /// record has its attempt count bumped and the drain moves on to
    /// the next record.
    async fn drain_destination(
        &self,
        destination: Destination,
        cancel: Option<&watch::Receiver<bool>>,
        report: &mut CycleReport,
    ) {
        let batch = match self.queue.pending(destination, self.config.batch_size) {
            Ok(batch) => batch,
            Err(e) => {
                error!(destination = destination.as_str(), error = %e, "queue read failed");
                report.faulted = true;
                return;
            }
        };

        let mut synced = 0u64;
        for record in &batch {
            if cancelled(cancel) {
                break;
            }

            // lookups are never queued by the dispatcher; drop a stray
            // entry without counting it as synced
            if matches!(record.payload, RecordPayload::AssignmentQuery(_)) {
                warn!(record_id = record.id, "query payload found in queue, dropping");
                if let Err(e) = self.queue.complete(record.id) {
                    error!(record_id = record.id, error = %e, "queue completion failed");
                    report.faulted = true;
                    break;
                }
                continue;
            }

            match self.deliver(record).await {
                Ok(()) => match self.queue.complete(record.id) {
                    Ok(()) => synced += 1,
                    Err(e) => {
                        error!(record_id = record.id, error = %e, "queue completion failed");
                        report.faulted = true;
                        break;
                    }
                },
                Err(e) => {
                    warn!(
                        record_id = record.id,
                        destination = destination.as_str(),
                        error = %e,
                        "redelivery failed"
                    );
                    if let Err(qe) = self.queue.fail(record.id) {
                        error!(record_id = record.id, error = %qe, "queue update failed");
                        report.faulted = true;
                        break;
                    }
                    report.failed += 1;
                }
            }
        }

        record_resync_synced(destination, synced);
        self.stats.record_synced(synced);
        report.synced += synced;
    }

    async fn deliver(&self, record: &QueuedRecord) -> Result<(), RelayError> {
        match &record.payload {
            RecordPayload::SensorReading(reading) => {
                self.storage.insert_reading(reading).await?;
                Ok(())
            }
            RecordPayload::Registration(registration) => {
                self.api.register(registration).await?;
                Ok(())
            }
            RecordPayload::AssignmentQuery(_) => {
                unreachable!("query records are dropped before delivery")
            }
        }
    }

    /// Move the scheduler onto a background task.
    pub fn spawn(self) -> ResyncHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = tokio::spawn(async move {
            self.run_loop(shutdown_rx).await;
        });

        ResyncHandle {
            shutdown_tx,
            worker,
        }
    }

    #[instrument(name = "resync_loop", skip_all)]
    async fn run_loop(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            interval_s = self.config.interval_s,
            batch_size = self.config.batch_size,
            "resync scheduler started"
        );

        let mut delay = self.config.interval();
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            let report = self.run_cycle_inner(Some(&shutdown_rx)).await;
            delay = if report.faulted {
                self.config.recovery_backoff()
            } else {
                self.config.interval()
            };
        }

        info!("resync scheduler stopped");
    }
}

fn cancelled(cancel: Option<&watch::Receiver<bool>>) -> bool {
    cancel.is_some_and(|rx| *rx.borrow())
}

/// Handle to the running scheduler task.
pub struct ResyncHandle {
    shutdown_tx: watch::Sender<bool>,
    worker: JoinHandle<()>,
}

impl ResyncHandle {
    /// Signal the scheduler to stop and wait for the task to exit.
    ///
    /// Returns promptly even mid-cycle; at most one in-flight delivery
    /// finishes before the task observes the signal.
    #[instrument(name = "resync_shutdown", skip(self))]
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.worker.await {
            error!(error = ?e, "resync task panicked");
        }
        debug!("resync handle shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{AssignmentQuery, HealthConfig, Registration, SensorReading};
    use upstream::{MockRemoteApiClient, MockStorageClient};

    struct Fixture {
        storage: Arc<MockStorageClient>,
        api: Arc<MockRemoteApiClient>,
        queue: Arc<OfflineQueue>,
        health: Arc<HealthMonitor<MockStorageClient, MockRemoteApiClient>>,
        scheduler: ResyncScheduler<MockStorageClient, MockRemoteApiClient>,
    }

    fn fixture(config: ResyncConfig) -> Fixture {
        let storage = Arc::new(MockStorageClient::new());
        let api = Arc::new(MockRemoteApiClient::new());
        let queue = Arc::new(OfflineQueue::open_in_memory(100, 3).unwrap());
        let health = Arc::new(HealthMonitor::new(
            storage.clone(),
            api.clone(),
            &HealthConfig::default(),
        ));
        let scheduler = ResyncScheduler::new(
            storage.clone(),
            api.clone(),
            queue.clone(),
            health.clone(),
            config,
            Arc::new(RelayStats::new()),
        );
        Fixture {
            storage,
            api,
            queue,
            health,
            scheduler,
        }
    }

    fn fast_config(batch_size: usize) -> ResyncConfig {
        ResyncConfig {
            interval_s: 1,
            batch_size,
            recovery_backoff_s: 1,
        }
    }

    fn reading(machine_id: &str) -> RecordPayload {
        RecordPayload::SensorReading(SensorReading {
            machine_id: machine_id.to_string(),
            timestamp: None,
            moisture: 35.0,
            temperature: 21.0,
            conductivity: 0.9,
            ph: 7.0,
            nitrogen: 11.0,
            phosphorus: 6.0,
            potassium: 10.0,
        })
    }

    fn registration(machine_id: &str) -> RecordPayload {
        RecordPayload::Registration(Registration {
            machine_id: machine_id.to_string(),
            sensor_name: "probe".to_string(),
            sensor_type: "soil".to_string(),
            client_name: "Acme Agro".to_string(),
            farm_name: "North Farm".to_string(),
            zone_code: "A1".to_string(),
            installation_date: None,
        })
    }

    #[tokio::test]
    async fn test_cycle_drains_queue_after_recovery() {
        let f = fixture(fast_config(50));
        f.api.set_online(false);
        for i in 0..3 {
            f.queue
                .append(Destination::RemoteApi, &registration(&format!("m{i}")))
                .unwrap();
        }

        // destination still down: nothing drained, no attempts burned
        let report = f.scheduler.run_cycle().await;
        assert_eq!(report.synced, 0);
        assert_eq!(report.skipped, 1);
        assert_eq!(f.queue.len().unwrap(), 3);

        f.api.set_online(true);
        let report = f.scheduler.run_cycle().await;
        assert_eq!(report.synced, 3);
        assert!(f.queue.is_empty().unwrap());
        assert_eq!(f.api.registration_count(), 3);
    }

    #[tokio::test]
    async fn test_batch_size_limits_one_cycle() {
        let f = fixture(fast_config(2));
        f.storage.assign("m1", 1, "A1");
        for _ in 0..5 {
            f.queue.append(Destination::Storage, &reading("m1")).unwrap();
        }

        let report = f.scheduler.run_cycle().await;
        assert_eq!(report.synced, 2);
        assert_eq!(f.queue.len().unwrap(), 3);

        let report = f.scheduler.run_cycle().await;
        assert_eq!(report.synced, 2);

        let report = f.scheduler.run_cycle().await;
        assert_eq!(report.synced, 1);
        assert!(f.queue.is_empty().unwrap());
        assert_eq!(f.storage.insert_count(), 5);
    }

    #[tokio::test]
    async fn test_oldest_records_sync_first() {
        let f = fixture(fast_config(1));
        f.storage.assign("first", 1, "A1");
        f.storage.assign("second", 1, "A1");
        f.queue
            .append(Destination::Storage, &reading("first"))
            .unwrap();
        f.queue
            .append(Destination::Storage, &reading("second"))
            .unwrap();

        f.scheduler.run_cycle().await;
        let inserted = f.storage.inserted();
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].machine_id, "first");
    }

    #[tokio::test]
    async fn test_permanent_failures_exhaust_attempt_budget() {
        let f = fixture(fast_config(50));
        // device never assigned: every redelivery is a permanent failure
        f.queue
            .append(Destination::Storage, &reading("ghost"))
            .unwrap();

        for _ in 0..3 {
            let report = f.scheduler.run_cycle().await;
            assert_eq!(report.failed, 1);
        }

        // attempts exhausted: retained but no longer offered
        let report = f.scheduler.run_cycle().await;
        assert_eq!(report.failed, 0);
        assert_eq!(report.synced, 0);
        assert_eq!(f.queue.len().unwrap(), 1);
        assert_eq!(f.queue.pending_count(Destination::Storage).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_transient_failure_fails_whole_batch() {
        let f = fixture(fast_config(50));
        f.storage.assign("m1", 1, "A1");
        for _ in 0..4 {
            f.queue.append(Destination::Storage, &reading("m1")).unwrap();
        }

        // probe passes, every insert fails: each record in the batch is
        // still attempted, so every attempt count advances
        f.storage.set_fail_inserts(true);
        let report = f.scheduler.run_cycle().await;
        assert_eq!(report.synced, 0);
        assert_eq!(report.failed, 4);
        assert_eq!(f.queue.len().unwrap(), 4);
        let pending = f.queue.pending(Destination::Storage, 10).unwrap();
        assert!(pending.iter().all(|r| r.attempts == 1));
    }

    #[tokio::test]
    async fn test_idle_destination_is_probed_every_cycle() {
        let f = fixture(fast_config(50));
        f.storage.set_online(false);

        // nothing queued, yet the cycle refreshes the health cache
        let report = f.scheduler.run_cycle().await;
        assert_eq!(report.skipped, 1);
        assert!(!f.health.status(Destination::Storage).unwrap().available);
        assert!(f.health.status(Destination::RemoteApi).unwrap().available);

        f.storage.set_online(true);
        f.scheduler.run_cycle().await;
        assert!(f.health.status(Destination::Storage).unwrap().available);
    }

    #[tokio::test]
    async fn test_stray_query_record_dropped_without_sync_count() {
        let f = fixture(fast_config(50));
        f.queue
            .append(
                Destination::RemoteApi,
                &RecordPayload::AssignmentQuery(AssignmentQuery {
                    machine_id: "m9".to_string(),
                }),
            )
            .unwrap();

        let report = f.scheduler.run_cycle().await;
        assert_eq!(report.synced, 0);
        assert_eq!(report.failed, 0);
        assert!(f.queue.is_empty().unwrap());
        assert_eq!(f.api.registration_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_is_prompt() {
        let config = ResyncConfig {
            interval_s: 3600,
            batch_size: 50,
            recovery_backoff_s: 3600,
        };
        let f = fixture(config);
        let handle = f.scheduler.spawn();

        // must not wait out the hour-long interval
        tokio::time::timeout(std::time::Duration::from_secs(5), handle.shutdown())
            .await
            .expect("shutdown did not complete in time");
    }

    #[tokio::test]
    async fn test_spawned_loop_drains_queue() {
        let config = ResyncConfig {
            interval_s: 1,
            batch_size: 50,
            recovery_backoff_s: 1,
        };
        let f = fixture(config);
        f.storage.assign("m1", 1, "A1");
        f.queue.append(Destination::Storage, &reading("m1")).unwrap();

        let handle = f.scheduler.spawn();
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
        while !f.queue.is_empty().unwrap() && std::time::Instant::now() < deadline {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        handle.shutdown().await;

        assert!(f.queue.is_empty().unwrap());
        assert_eq!(f.storage.insert_count(), 1);
    }
}
