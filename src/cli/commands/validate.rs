//! Validate config command implementation
//!
//! This module implements the `validate-config` command for checking a
//! Strata configuration file without running a batch.

use crate::config::{load_config, StrataConfig};
use crate::domain::stage::Stage;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config validates as part of loading
        match load_config(config_path) {
            Ok(config) => {
                println!("✅ Configuration is valid");
                println!();
                print_config_summary(&config);
                Ok(0)
            }
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                println!();
                Ok(2) // Configuration error exit code
            }
        }
    }
}

fn print_config_summary(config: &StrataConfig) {
    println!("Configuration Summary:");
    println!("  Log Level: {}", config.application.log_level);
    println!(
        "  Seed: {}",
        config
            .simulation
            .seed
            .map(|s| s.to_string())
            .unwrap_or_else(|| "entropy".to_string())
    );
    println!(
        "  Systems: {} -> {} ({})",
        config.simulation.source_system,
        config.simulation.target_system,
        config.simulation.strategy
    );
    for stage in Stage::ALL {
        let rates: Vec<String> = stage
            .substages()
            .iter()
            .map(|s| {
                format!(
                    "{}={:.3}",
                    s.name,
                    config.stages.substage_success_rate(stage, s.name)
                )
            })
            .collect();
        println!("  {:<10} {}", stage.as_str(), rates.join(" "));
    }
    println!(
        "  Failure Modes: network {} / overload {} / corruption {} / security {}",
        config.failure_modes.network_failure_rate,
        config.failure_modes.system_overload_rate,
        config.failure_modes.data_corruption_rate,
        config.failure_modes.security_violation_rate
    );
    println!(
        "  Workers: {}",
        config.concurrency.max_concurrent_records
    );
    println!(
        "  Retries: {} (delay {} ms, x{}, max {} ms)",
        config.retry.retry_attempts,
        config.retry.retry_delay_ms,
        config.retry.backoff_multiplier,
        config.retry.max_delay_ms
    );
    println!(
        "  Alert Thresholds: critical {} / high {} / medium {}",
        config.alerts.critical_threshold,
        config.alerts.high_threshold,
        config.alerts.medium_threshold
    );
    println!(
        "  Permitted Roles: {}",
        config.compliance.permitted_roles.join(", ")
    );
    println!();
}
