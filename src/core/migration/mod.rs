//! Batch migration pipeline
//!
//! - [`executor`]: stage/substage orchestration over a bounded worker pool
//! - [`attempt`]: per-record attempt simulation with coordinate-seeded RNG
//! - [`retry`]: retry controller with backoff and per-record deadline
//! - [`clock`]: simulated clock
//! - [`outcome`]: what a finished batch returns
//!
//! # Example
//!
//! ```no_run
//! use strata::config::StrataConfig;
//! use strata::core::migration::MigrationExecutor;
//! use strata::domain::RecordBuilder;
//! use serde_json::json;
//!
//! # async fn example() -> strata::domain::Result<()> {
//! let record = RecordBuilder::new()
//!     .id("patient-0001")
//!     .map_err(strata::domain::StrataError::Validation)?
//!     .field("allergies", json!(["penicillin"]))
//!     .build()
//!     .map_err(strata::domain::StrataError::Validation)?;
//!
//! let outcome = MigrationExecutor::new(StrataConfig::default())?
//!     .run_batch(vec![record])
//!     .await?;
//! println!("success rate: {:.2}", outcome.analytics.overall_success_rate);
//! # Ok(())
//! # }
//! ```

pub mod attempt;
pub mod clock;
pub mod executor;
pub mod outcome;
pub mod retry;

pub use attempt::{attempt_rng, AttemptOutcome, FailureModel, SimulationModel};
pub use clock::SimClock;
pub use executor::{makespan, run_batch, MigrationExecutor};
pub use outcome::MigrationOutcome;
pub use retry::{RetryController, RetryPolicy, RetryReport};
