//! Configuration management for Strata.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! Strata uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `STRATA_*` environment overrides
//! - Default values for every setting
//! - Range validation before any batch is built
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use strata::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("strata.toml")?;
//!
//! println!("Seed: {:?}", config.simulation.seed);
//! println!("Workers: {}", config.concurrency.max_concurrent_records);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level
//! - [`SimulationConfig`] - Seed, simulated clock epoch, system labels
//! - [`StagesConfig`] - Stage/substage success probabilities and durations
//! - [`FailureModesConfig`] - Ambient network, overload, corruption and security rates
//! - [`QualityConfig`] - Degradation per outcome and criticality impact
//! - [`ConcurrencyConfig`] - Worker pool size
//! - [`RetryConfig`] - Retry budget and backoff
//! - [`AlertConfig`] - Quality alert thresholds
//! - [`ComplianceConfig`] - Permitted roles and justification policy
//! - [`LoggingConfig`] - Logging configuration
//!
//! # Example Configuration
//!
//! ```toml
//! [simulation]
//! seed = 42
//! source_system = "legacy_emr"
//! target_system = "${TARGET_EHR}"
//!
//! [stages.stage_success_rates]
//! extract = 0.98
//! transform = 0.97
//! validate = 0.96
//! load = 0.98
//!
//! [stages.substage_success_rates.transform]
//! map_codes = 0.92
//!
//! [concurrency]
//! max_concurrent_records = 32
//!
//! [retry]
//! retry_attempts = 3
//! retry_delay_ms = 250
//! backoff_multiplier = 2.0
//! ```

pub mod loader;
pub mod schema;

// Re-export commonly used types
pub use loader::{load_config, load_config_str};
pub use schema::{
    AlertConfig, ApplicationConfig, ComplianceConfig, ConcurrencyConfig, FailureModesConfig,
    LoggingConfig, PerClass, PerStage, QualityConfig, RetryConfig, SimulationConfig, StagesConfig,
    StrataConfig, MAX_WORKER_POOL,
};
