//! Domain models and types for Strata.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`RecordId`], [`BatchId`], [`ElementId`])
//! - **Records** ([`Record`]) and their copy-on-write migration view ([`ShadowRecord`])
//! - **Pipeline catalogue** ([`Stage`], [`SubstageSpec`], [`FailureKind`])
//! - **Status model** ([`StageResult`], [`RecordMigrationStatus`], [`BatchMigrationStatus`])
//! - **Quality and compliance vocabulary** ([`QualityDimension`], [`QualityAlert`], [`ViolationKind`])
//! - **Error types** ([`StrataError`]) and the [`Result`] alias
//!
//! # Example
//!
//! ```rust
//! use strata::domain::{Criticality, RecordBuilder, Stage};
//! use serde_json::json;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let record = RecordBuilder::new()
//!     .id("patient-0001")?
//!     .field("conditions", json!([{"code": "I10", "system": "icd10"}]))
//!     .build()?;
//!
//! assert_eq!(record.criticality(), Criticality::High);
//! assert_eq!(Stage::Extract.substages()[0].name, "connect");
//! # Ok(())
//! # }
//! ```

pub mod compliance;
pub mod context;
pub mod errors;
pub mod ids;
pub mod quality;
pub mod record;
pub mod result;
pub mod stage;
pub mod status;

// Re-export commonly used types for convenience
pub use compliance::{AccessRequest, ComplianceFinding, ProtectionStatus, ViolationKind};
pub use errors::{FailureAttribution, StrataError};
pub use ids::{BatchId, ElementId, RecordId};
pub use quality::{
    AlertTrigger, AppliedCorruption, CorruptionAction, DegradationEntry, DimensionImpact,
    DimensionScores, QualityAlert, QualityDimension, QualityScore, Severity,
};
pub use record::{Criticality, PhiCategory, Record, RecordBuilder, ShadowRecord};
pub use result::Result;
pub use stage::{FailureCategory, FailureKind, Stage, SubstageSpec};
pub use status::{
    BatchMigrationStatus, BatchOutcome, RecordEvent, RecordEventKind, RecordMigrationStatus,
    RecordState, StageResult, StageStatus,
};
