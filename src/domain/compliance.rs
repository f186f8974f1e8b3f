//! Compliance domain types
//!
//! Record tasks never touch the shared compliance log. They emit
//! [`AccessRequest`] values that the executor publishes to the tracker after the
//! substage drains; the tracker answers with [`ComplianceFinding`]s that are
//! annotated back onto the record.

use super::ids::{ElementId, RecordId};
use super::quality::Severity;
use super::stage::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Protection status of an inventory element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionStatus {
    /// Encrypted/masked in transit and at rest
    Protected,
    /// Written to the target without protection
    Exposed,
}

/// Kind of compliance violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Access recorded without a justification
    MissingJustification,
    /// Accessor role outside the permitted set
    UnauthorizedAccess,
    /// Protected element written without protection
    UnprotectedExposure,
}

impl ViolationKind {
    /// Severity of this violation kind
    pub fn severity(&self) -> Severity {
        match self {
            Self::MissingJustification => Severity::Medium,
            Self::UnauthorizedAccess => Severity::High,
            Self::UnprotectedExposure => Severity::Critical,
        }
    }

    /// Whether the violation ends the record's processing and raises a
    /// critical alert whatever the record's score
    pub fn ends_processing(&self) -> bool {
        matches!(self, Self::UnauthorizedAccess | Self::UnprotectedExposure)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingJustification => "missing_justification",
            Self::UnauthorizedAccess => "unauthorized_access",
            Self::UnprotectedExposure => "unprotected_exposure",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access to a protected field emitted by a record task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub record_id: RecordId,
    pub field: String,
    pub accessor: String,
    pub justification: Option<String>,
    pub stage: Stage,
    pub substage: String,

    /// Status the access leaves the element in
    pub resulting_status: ProtectionStatus,

    /// SHA-256 of the accessed value; plaintext is never kept
    pub value_hash: String,
}

impl AccessRequest {
    /// Element id this access refers to
    pub fn element_id(&self) -> ElementId {
        ElementId::for_field(&self.record_id, &self.field)
    }
}

/// A violation attributed to a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceFinding {
    pub kind: ViolationKind,
    pub severity: Severity,
    pub element_id: ElementId,
    pub stage: Stage,
    pub substage: String,
    pub at: DateTime<Utc>,
}
