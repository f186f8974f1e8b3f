//! Record quality: degradation, scoring and alerting
//!
//! - [`degradation`] - Turns attempt outcomes into ledger entries and shadow-field corruption
//! - [`scorer`] - Weighted seven-dimension score, a pure function of record state
//! - [`monitor`] - Edge-triggered threshold alerts and compliance escalation

pub mod degradation;
pub mod monitor;
pub mod scorer;

pub use degradation::{DegradationSimulator, OutcomeSite};
pub use monitor::{Observation, QualityMonitor, Threshold};
pub use scorer::{score_record, weights};
