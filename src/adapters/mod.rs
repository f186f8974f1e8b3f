//! External system integrations for Strata.
//!
//! - [`source`] - Reading input records (JSON array or JSON Lines)
//! - [`sink`] - Handing finished outcomes to the reporting side
//!
//! # Design Pattern
//!
//! Adapters isolate I/O from the core. Outcome delivery goes through the
//! [`OutcomeSink`] trait so reporting backends can be swapped or mocked.
//!
//! ```rust,no_run
//! use strata::adapters::{read_records, JsonFileSink, OutcomeSink};
//! use strata::config::StrataConfig;
//! use strata::core::migration::run_batch;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let records = read_records("records.json").await?;
//! let outcome = run_batch(records, StrataConfig::default()).await?;
//! JsonFileSink::new("outcome.json").deliver(&outcome).await?;
//! # Ok(())
//! # }
//! ```

pub mod sink;
pub mod source;

pub use sink::{JsonFileSink, MemorySink, OutcomeSink};
pub use source::{parse_records, read_records};
