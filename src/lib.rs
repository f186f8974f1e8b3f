// Strata - Staged Clinical Record Migration Simulator
// Copyright (c) 2025 Strata Contributors
// Licensed under the MIT License

//! # Strata - Staged Clinical Record Migration Simulator
//!
//! Strata runs batches of clinical records through a staged migration
//! pipeline (extract → transform → validate → load) and reports what a real
//! migration would risk: which records fail and why, how much data quality
//! erodes along the way, and whether protected health information stayed
//! protected.
//!
//! ## Overview
//!
//! - **Executes** each stage as a fixed sequence of substages over a bounded
//!   worker pool, retrying transient failures with exponential backoff
//! - **Degrades** record quality on failures and applies corruption actions to
//!   a migration-scoped copy of each record
//! - **Scores** records across seven quality dimensions weighted by clinical
//!   criticality and raises threshold alerts
//! - **Tracks** every protected-field access and scores compliance
//! - **Aggregates** batch analytics and recommendations
//!
//! Seeded runs are reproducible: every random draw is keyed by the batch seed
//! and the draw's coordinates, and all timestamps come from a simulated clock.
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Migration, quality, compliance and analytics
//! - [`adapters`] - Record input and outcome delivery
//! - [`domain`] - Core domain types and models
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use strata::config::StrataConfig;
//! use strata::core::migration::MigrationExecutor;
//! use strata::domain::RecordBuilder;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = StrataConfig::default();
//!     config.simulation.seed = Some(42);
//!
//!     let records = vec![RecordBuilder::new()
//!         .id("patient-0001")?
//!         .field("medications", json!([{"code": "RX-1", "dose": "5 mg", "status": "active"}]))
//!         .field("mrn", json!("MRN-0001"))
//!         .build()?];
//!
//!     let outcome = MigrationExecutor::new(config)?.run_batch(records).await?;
//!
//!     println!("Success rate: {:.2}", outcome.analytics.overall_success_rate);
//!     println!("Mean quality: {:.3}", outcome.analytics.quality.mean);
//!     println!("Compliance: {:.3}", outcome.compliance.score);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Batch-level problems use [`domain::StrataError`]. Record-level failures are
//! not errors: they are tagged [`domain::FailureKind`] values recorded on the
//! record, and never abort the batch.
//!
//! ```rust,no_run
//! use strata::domain::StrataError;
//!
//! fn example() -> Result<(), StrataError> {
//!     let config = strata::config::load_config("strata.toml")?;
//!     strata::core::migration::MigrationExecutor::new(config)?;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
