//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Soil Relay - edge relay between field sensors and upstream systems
#[derive(Parser, Debug)]
#[command(
    name = "soil-relay",
    author,
    version,
    about = "Edge relay with durable offline queue for soil sensor data",
    long_about = "An edge relay that accepts soil sensor writes and queries, delivers \n\
                  them to the transactional datastore and the remote administrative \n\
                  API, and durably buffers records locally whenever an upstream is \n\
                  unreachable. A background scheduler resynchronizes the buffer once \n\
                  the destination recovers."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "SOIL_RELAY_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "SOIL_RELAY_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the relay service
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "relay.toml", env = "SOIL_RELAY_CONFIG")]
    pub config: PathBuf,

    /// Override datastore DSN from configuration
    #[arg(long, env = "SOIL_RELAY_STORAGE_URL")]
    pub storage_url: Option<String>,

    /// Override remote API base URL from configuration
    #[arg(long, env = "SOIL_RELAY_API_URL")]
    pub api_url: Option<String>,

    /// Override offline queue path from configuration
    #[arg(long, env = "SOIL_RELAY_QUEUE_PATH")]
    pub queue_path: Option<PathBuf>,

    /// Validate configuration and exit without running the service
    #[arg(long)]
    pub dry_run: bool,

    /// Interval between health/stats reports in seconds (0 = disabled)
    #[arg(long, default_value = "60", env = "SOIL_RELAY_STATS_INTERVAL")]
    pub stats_interval: u64,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "SOIL_RELAY_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "relay.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "relay.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Include offline queue statistics (opens the queue file read-only)
    #[arg(long)]
    pub queue: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
