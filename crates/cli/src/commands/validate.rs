//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    api_base_url: String,
    queue_path: String,
    max_records: usize,
    max_retries: u32,
    resync_interval_s: u64,
    resync_batch_size: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    api_base_url: config.api.base_url.clone(),
                    queue_path: config.queue.path.display().to_string(),
                    max_records: config.queue.max_records,
                    max_retries: config.retry.max_retries,
                    resync_interval_s: config.resync.interval_s,
                    resync_batch_size: config.resync.batch_size,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &contracts::RelayConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    // Worst-case blocking time on the request path
    let retry = &config.retry;
    let worst_case_s = u64::from(retry.max_retries) * retry.attempt_timeout_s
        + u64::from(retry.max_retries.saturating_sub(1)) * retry.retry_delay_s;
    if worst_case_s > 60 {
        warnings.push(format!(
            "retry settings allow up to {worst_case_s}s of blocking per request"
        ));
    }

    if config.queue.max_records < config.resync.batch_size {
        warnings.push(format!(
            "queue.max_records ({}) is smaller than resync.batch_size ({})",
            config.queue.max_records, config.resync.batch_size
        ));
    }

    if config.api.base_url.starts_with("http://") {
        warnings.push("api.base_url uses plain http".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Remote API: {}", summary.api_base_url);
            println!("  Queue: {}", summary.queue_path);
            println!("  Max records: {}", summary.max_records);
            println!("  Max retries: {}", summary.max_retries);
            println!("  Resync interval: {}s", summary.resync_interval_s);
            println!("  Resync batch size: {}", summary.resync_batch_size);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
