//! Pipeline stages, substages and the failure-kind taxonomy
//!
//! The pipeline is fixed: four ordered stages, each with an ordered list of
//! substages. Every substage declares which failure kind its own success check
//! produces and which role accesses protected fields while it runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Migration stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Pull records out of the legacy system
    Extract,
    /// Map codes and normalize structure for the target system
    Transform,
    /// Check schema, clinical rules and access policy
    Validate,
    /// Write into the target system
    Load,
}

impl Stage {
    /// All stages in execution order
    pub const ALL: [Stage; 4] = [Stage::Extract, Stage::Transform, Stage::Validate, Stage::Load];

    /// Stage name as used in configuration and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extract => "extract",
            Self::Transform => "transform",
            Self::Validate => "validate",
            Self::Load => "load",
        }
    }

    /// Ordered substages of this stage
    pub fn substages(&self) -> &'static [SubstageSpec] {
        match self {
            Self::Extract => &EXTRACT_SUBSTAGES,
            Self::Transform => &TRANSFORM_SUBSTAGES,
            Self::Validate => &VALIDATE_SUBSTAGES,
            Self::Load => &LOAD_SUBSTAGES,
        }
    }

    /// Looks up a substage of this stage by name
    pub fn substage(&self, name: &str) -> Option<&'static SubstageSpec> {
        self.substages().iter().find(|s| s.name == name)
    }

    /// Role that accesses protected fields during this stage
    pub fn accessor_role(&self) -> &'static str {
        match self {
            Self::Extract => "extract_service",
            Self::Transform => "transform_service",
            Self::Validate => "validation_service",
            Self::Load => "load_service",
        }
    }

    /// Total number of substages across the pipeline
    pub fn total_substages() -> usize {
        Self::ALL.iter().map(|s| s.substages().len()).sum()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "extract" => Ok(Self::Extract),
            "transform" => Ok(Self::Transform),
            "validate" => Ok(Self::Validate),
            "load" => Ok(Self::Load),
            _ => Err(format!(
                "Invalid stage '{s}'. Must be one of: extract, transform, validate, load"
            )),
        }
    }
}

/// Static description of a substage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubstageSpec {
    /// Substage name, unique within its stage
    pub name: &'static str,

    /// Failure kind produced when this substage's own success check fails
    pub failure_kind: FailureKind,

    /// Whether this substage reads protected fields
    pub touches_protected: bool,

    /// Justification recorded for protected-field access
    pub justification: &'static str,
}

const EXTRACT_SUBSTAGES: [SubstageSpec; 3] = [
    SubstageSpec {
        name: "connect",
        failure_kind: FailureKind::NetworkTimeout,
        touches_protected: false,
        justification: "",
    },
    SubstageSpec {
        name: "query",
        failure_kind: FailureKind::SystemOverload,
        touches_protected: true,
        justification: "legacy extraction query for migration",
    },
    SubstageSpec {
        name: "export",
        failure_kind: FailureKind::DataCorruption,
        touches_protected: true,
        justification: "serialize record for transfer",
    },
];

const TRANSFORM_SUBSTAGES: [SubstageSpec; 3] = [
    SubstageSpec {
        name: "map_codes",
        failure_kind: FailureKind::MappingError,
        touches_protected: false,
        justification: "",
    },
    SubstageSpec {
        name: "normalize",
        failure_kind: FailureKind::DataCorruption,
        touches_protected: true,
        justification: "normalize demographics to target schema",
    },
    SubstageSpec {
        name: "enrich",
        failure_kind: FailureKind::ResourceExhaustion,
        touches_protected: false,
        justification: "",
    },
];

const VALIDATE_SUBSTAGES: [SubstageSpec; 3] = [
    SubstageSpec {
        name: "schema_check",
        failure_kind: FailureKind::ValidationFailure,
        touches_protected: false,
        justification: "",
    },
    SubstageSpec {
        name: "clinical_rules",
        failure_kind: FailureKind::ValidationFailure,
        touches_protected: false,
        justification: "",
    },
    SubstageSpec {
        name: "compliance_check",
        failure_kind: FailureKind::SecurityViolation,
        touches_protected: true,
        justification: "verify protection status before load",
    },
];

const LOAD_SUBSTAGES: [SubstageSpec; 2] = [
    SubstageSpec {
        name: "write",
        failure_kind: FailureKind::SystemOverload,
        touches_protected: true,
        justification: "persist record in target system",
    },
    SubstageSpec {
        name: "verify",
        failure_kind: FailureKind::ValidationFailure,
        touches_protected: false,
        justification: "",
    },
];

/// Broad failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// Retryable infrastructure failure
    TransientInfrastructure,
    /// Terminal for the record, never retried
    DataIntegrity,
    /// Terminal for the record and escalated as a critical alert
    ComplianceViolation,
}

/// Record-level failure kind
///
/// Produced by the probability check that fired, never chosen after the fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NetworkTimeout,
    SystemOverload,
    ResourceExhaustion,
    DataCorruption,
    MappingError,
    ValidationFailure,
    SecurityViolation,
}

impl FailureKind {
    /// Every failure kind, in histogram order
    pub const ALL: [FailureKind; 7] = [
        FailureKind::NetworkTimeout,
        FailureKind::SystemOverload,
        FailureKind::ResourceExhaustion,
        FailureKind::DataCorruption,
        FailureKind::MappingError,
        FailureKind::ValidationFailure,
        FailureKind::SecurityViolation,
    ];

    /// Category of this failure kind
    pub fn category(&self) -> FailureCategory {
        match self {
            Self::NetworkTimeout | Self::SystemOverload | Self::ResourceExhaustion => {
                FailureCategory::TransientInfrastructure
            }
            Self::DataCorruption | Self::MappingError | Self::ValidationFailure => {
                FailureCategory::DataIntegrity
            }
            Self::SecurityViolation => FailureCategory::ComplianceViolation,
        }
    }

    /// Whether the retry controller may retry this failure
    pub fn is_transient(&self) -> bool {
        self.category() == FailureCategory::TransientInfrastructure
    }

    /// Severity multiplier applied to the per-failure quality degradation
    pub fn severity(&self) -> f64 {
        match self {
            Self::NetworkTimeout => 0.3,
            Self::SystemOverload => 0.3,
            Self::ResourceExhaustion => 0.4,
            Self::ValidationFailure => 0.6,
            Self::MappingError => 0.8,
            Self::DataCorruption => 1.0,
            Self::SecurityViolation => 1.0,
        }
    }

    /// Name as used in logs and histograms
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "network_timeout",
            Self::SystemOverload => "system_overload",
            Self::ResourceExhaustion => "resource_exhaustion",
            Self::DataCorruption => "data_corruption",
            Self::MappingError => "mapping_error",
            Self::ValidationFailure => "validation_failure",
            Self::SecurityViolation => "security_violation",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
