//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{RelayService, ServiceConfig};

/// Execute the `run` command
pub async fn run_relay(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    // Load and parse configuration
    let mut relay = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(ref url) = args.storage_url {
        info!("Overriding datastore DSN from CLI");
        relay.storage.url = url.clone();
    }
    if let Some(ref url) = args.api_url {
        info!(url = %url, "Overriding remote API base URL from CLI");
        relay.api.base_url = url.clone();
    }
    if let Some(ref path) = args.queue_path {
        info!(path = %path.display(), "Overriding queue path from CLI");
        relay.queue.path = path.clone();
    }

    info!(
        api = %relay.api.base_url,
        queue = %relay.queue.path.display(),
        max_records = relay.queue.max_records,
        resync_interval_s = relay.resync.interval_s,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        return Ok(());
    }

    let service_config = ServiceConfig {
        relay,
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    };

    let service = RelayService::start(service_config).context("Failed to start relay service")?;

    // First probe up front so the status surface is populated
    service.probe().await;
    match service.health_report() {
        Ok(report) => info!(report = %serde_json::to_string(&report)?, "Relay status"),
        Err(e) => warn!(error = %e, "Failed to build status report"),
    }

    let shutdown_signal = setup_shutdown_signal();
    tokio::pin!(shutdown_signal);

    if args.stats_interval > 0 {
        let mut ticker = tokio::time::interval(Duration::from_secs(args.stats_interval));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await; // first tick fires immediately

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    service.probe().await;
                    match service.health_report() {
                        Ok(report) => {
                            info!(report = %serde_json::to_string(&report)?, "Relay status");
                        }
                        Err(e) => warn!(error = %e, "Failed to build status report"),
                    }
                }
                _ = &mut shutdown_signal => {
                    warn!("Received shutdown signal, stopping relay...");
                    break;
                }
            }
        }
    } else {
        (&mut shutdown_signal).await;
        warn!("Received shutdown signal, stopping relay...");
    }

    let final_report = service.health_report().ok();
    service.shutdown().await;

    if let Some(report) = final_report {
        report.print_summary();
    }

    info!("Soil Relay finished");
    Ok(())
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
