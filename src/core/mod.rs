//! Core business logic for Strata.
//!
//! # Modules
//!
//! - [`migration`] - Batch orchestration, attempts, retries and the simulated clock
//! - [`quality`] - Degradation, scoring and threshold alerting
//! - [`compliance`] - Protected-element inventory and access log
//! - [`analytics`] - Batch aggregation and recommendations
//!
//! # Migration Workflow
//!
//! 1. **Register**: every record gets a migration status and its protected
//!    fields enter the compliance inventory
//! 2. **Run substages**: extract, transform, validate and load, each a fixed
//!    sequence of substages; non-terminal records run concurrently on a
//!    bounded pool with retries for transient failures
//! 3. **Publish**: per-record results are applied in input order to the
//!    batch status, the compliance tracker and the quality monitor
//! 4. **Report**: analytics are recomputed from the finished history
//!
//! # Example
//!
//! ```rust,no_run
//! use strata::config::load_config;
//! use strata::core::migration::MigrationExecutor;
//!
//! # async fn example(records: Vec<strata::domain::Record>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("strata.toml")?;
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//! let outcome = MigrationExecutor::new(config)?
//!     .with_cancellation(shutdown_rx)
//!     .run_batch(records)
//!     .await?;
//!
//! println!("Migrated: {}", outcome.analytics.migrated_records);
//! println!("Failed: {}", outcome.analytics.failed_records);
//! println!("Alerts: {}", outcome.alerts.len());
//! # Ok(())
//! # }
//! ```

pub mod analytics;
pub mod compliance;
pub mod migration;
pub mod quality;
