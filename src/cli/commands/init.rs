//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "strata.toml")]
    pub output: String,

    /// Include every setting with explanatory comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing Strata configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2); // Configuration error exit code
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your settings", self.output);
                println!("  2. Validate configuration: strata validate-config");
                println!("  3. Run a batch: strata run --records records.json --output outcome.json");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {}", e);
                Ok(5) // Fatal error exit code
            }
        }
    }

    /// Generate minimal configuration
    fn generate_minimal_config() -> String {
        r#"# Strata Configuration File
# Staged clinical record migration simulator

[application]
log_level = "info"

[simulation]
seed = 42
source_system = "legacy_emr"
target_system = "modern_ehr"
strategy = "phased"

[stages.stage_success_rates]
extract = 0.98
transform = 0.97
validate = 0.96
load = 0.98

[failure_modes]
network_failure_rate = 0.01
system_overload_rate = 0.005
data_corruption_rate = 0.005
security_violation_rate = 0.001

[concurrency]
max_concurrent_records = 16

[retry]
retry_attempts = 3
retry_delay_ms = 250
backoff_multiplier = 2.0

[logging]
local_enabled = false
"#
        .to_string()
    }

    /// Generate configuration with every setting documented
    fn generate_config_with_examples() -> String {
        r#"# Strata Configuration File
# Staged clinical record migration simulator
#
# Every setting below shows its default. Values may reference environment
# variables with ${VAR_NAME}, and STRATA_<SECTION>_<KEY> variables override
# individual settings (e.g. STRATA_SIMULATION_SEED=7).

[application]
# Log level: trace, debug, info, warn, error
log_level = "info"

[simulation]
# Fixed seed for reproducible runs; remove to draw one from entropy
seed = 42
# Start of the simulated clock
epoch = "2024-01-01T00:00:00Z"
source_system = "legacy_emr"
target_system = "modern_ehr"
# Label only: big_bang, phased, parallel_run
strategy = "phased"
# Sleep for real during retry backoff instead of only advancing simulated time
pace_realtime = false

[stages]
# Fraction (+/-) by which each attempt's latency varies around its base
duration_variance = 0.2
# Per-record simulated time limit within one substage
substage_timeout_ms = 30000

# Success probability of substages without their own rate
[stages.stage_success_rates]
extract = 0.98
transform = 0.97
validate = 0.96
load = 0.98

# Per-substage overrides
[stages.substage_success_rates.extract]
# connect = 0.99
# query = 0.98
# export = 0.98

[stages.substage_success_rates.transform]
# map_codes = 0.95

[stages.substage_success_rates.validate]
# clinical_rules = 0.97

[stages.substage_success_rates.load]
# verify = 0.99

# Base simulated duration of each stage, split evenly across its substages
[stages.stage_base_duration_ms]
extract = 1500
transform = 3000
validate = 1200
load = 2000

# Ambient failure modes, checked before each substage's own success check
[failure_modes]
network_failure_rate = 0.01
system_overload_rate = 0.005
data_corruption_rate = 0.005
# Only drawn at substages that touch protected fields
security_violation_rate = 0.001

[quality]
# Score lost per failed attempt, scaled by failure severity and criticality
degradation_per_failure = 0.1
# Score lost per successful attempt; negative values recover quality
degradation_per_success = 0.0

[quality.criticality_impact]
critical = 1.5
high = 1.25
medium = 1.0
low = 0.75

[concurrency]
# Records processed in parallel within a substage (1..=1024)
max_concurrent_records = 16

[retry]
# Retries per record per substage; transient failures only
retry_attempts = 3
retry_delay_ms = 250
# 1.0 keeps the delay fixed
backoff_multiplier = 2.0
max_delay_ms = 5000

[alerts]
# Must satisfy critical < high < medium (< low when set)
critical_threshold = 0.70
high_threshold = 0.80
medium_threshold = 0.85
# low_threshold = 0.90
# Score above a threshold needed to resolve its alert
resolution_margin = 0.05

[compliance]
permitted_roles = ["extract_service", "transform_service", "validation_service", "load_service"]
require_justification = true
# Probability that an access is logged without a justification
missing_justification_rate = 0.0

[logging]
local_enabled = false
local_path = "./logs"
# daily, hourly or never
local_rotation = "daily"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_str;
    use tempfile::TempDir;

    #[test]
    fn test_init_args_defaults() {
        let args = InitArgs {
            output: "strata.toml".to_string(),
            with_examples: false,
            force: false,
        };

        assert_eq!(args.output, "strata.toml");
        assert!(!args.with_examples);
        assert!(!args.force);
    }

    #[test]
    fn test_generated_configs_load() {
        let minimal = load_config_str(&InitArgs::generate_minimal_config()).unwrap();
        assert_eq!(minimal.simulation.seed, Some(42));

        let full = load_config_str(&InitArgs::generate_config_with_examples()).unwrap();
        assert_eq!(full.concurrency.max_concurrent_records, 16);
        assert_eq!(full.alerts.low_threshold, None);
        assert_eq!(full.compliance.permitted_roles.len(), 4);
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("strata.toml");
        fs::write(&path, "# existing").unwrap();

        let args = InitArgs {
            output: path.to_string_lossy().to_string(),
            with_examples: false,
            force: false,
        };
        assert_eq!(args.execute().await.unwrap(), 2);

        let args = InitArgs { force: true, ..args };
        assert_eq!(args.execute().await.unwrap(), 0);
        assert!(fs::read_to_string(&path).unwrap().contains("[simulation]"));
    }
}
