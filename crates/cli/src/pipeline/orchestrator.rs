//! Relay service orchestrator - wires queue, clients, health and resync.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;

use contracts::RelayConfig;
use health::HealthMonitor;
use observability::RelayStats;
use offline_queue::OfflineQueue;
use resync::{ResyncHandle, ResyncScheduler};
use upstream::{HttpApiClient, MySqlStorageClient};

use super::{HealthReport, QueueReport};

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// The resolved relay configuration
    pub relay: RelayConfig,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Running relay service.
///
/// Owns the offline queue, the upstream clients, the health monitor and
/// the background resync task. Direct delivery for inbound records goes
/// through `dispatcher::Dispatcher` built on the same shared pieces; the
/// service itself only keeps the buffer draining and the status surface
/// fresh.
pub struct RelayService {
    queue: Arc<OfflineQueue>,
    health: Arc<HealthMonitor<MySqlStorageClient, HttpApiClient>>,
    stats: Arc<RelayStats>,
    resync: ResyncHandle,
    started: Instant,
}

impl RelayService {
    /// Build every component and spawn the resync scheduler.
    ///
    /// Upstream connections are lazy; a down destination delays nothing
    /// here and shows up in the first probe instead.
    pub fn start(config: ServiceConfig) -> Result<Self> {
        if let Some(port) = config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let relay = &config.relay;

        let queue = Arc::new(
            OfflineQueue::open(
                &relay.queue.path,
                relay.queue.max_records,
                relay.retry.max_retries,
            )
            .with_context(|| {
                format!("Failed to open offline queue at {}", relay.queue.path.display())
            })?,
        );
        info!(
            path = %relay.queue.path.display(),
            max_records = relay.queue.max_records,
            "Offline queue opened"
        );

        let storage = Arc::new(
            MySqlStorageClient::connect(&relay.storage)
                .context("Failed to configure datastore client")?,
        );
        let api = Arc::new(
            HttpApiClient::new(&relay.api).context("Failed to configure remote API client")?,
        );
        let health = Arc::new(HealthMonitor::new(
            storage.clone(),
            api.clone(),
            &relay.health,
        ));
        let stats = Arc::new(RelayStats::new());

        let scheduler = ResyncScheduler::new(
            storage,
            api,
            queue.clone(),
            health.clone(),
            relay.resync.clone(),
            stats.clone(),
        );
        let resync = scheduler.spawn();
        info!(
            interval_s = relay.resync.interval_s,
            batch_size = relay.resync.batch_size,
            "Relay service started"
        );

        Ok(Self {
            queue,
            health,
            stats,
            resync,
            started: Instant::now(),
        })
    }

    /// Probe both destinations and refresh the cached health state.
    pub async fn probe(&self) {
        self.health.probe_all().await;
    }

    /// Assemble the current health/stats report.
    pub fn health_report(&self) -> Result<HealthReport> {
        let queue_stats = self.queue.stats().context("Failed to read queue stats")?;
        let queue = QueueReport {
            depth: queue_stats.total,
            pending_storage: self
                .queue
                .pending_count(contracts::Destination::Storage)
                .context("Failed to count pending storage records")?,
            pending_remote_api: self
                .queue
                .pending_count(contracts::Destination::RemoteApi)
                .context("Failed to count pending remote API records")?,
            exhausted: queue_stats.exhausted,
        };

        Ok(HealthReport {
            uptime_s: self.started.elapsed().as_secs(),
            stats: self.stats.snapshot(),
            destinations: self.health.snapshot(),
            queue,
        })
    }

    /// Stop the resync task and release the queue.
    pub async fn shutdown(self) {
        info!("Shutting down relay service");
        self.resync.shutdown().await;
        info!("Relay service stopped");
    }
}
