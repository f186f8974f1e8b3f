//! Quality and alert domain types
//!
//! Shared vocabulary for the degradation simulator, the scorer and the quality
//! monitor: dimensions, the corruption catalogue, the degradation ledger kept on
//! each record, severities and alerts.

use super::ids::RecordId;
use super::record::{
    is_date_field, protected_fields, FIELD_ALLERGIES, FIELD_CONDITIONS, FIELD_MEDICATIONS,
    FIELD_OBSERVATIONS, FIELD_VITALS,
};
use super::stage::{FailureKind, Stage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Quality dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityDimension {
    Completeness,
    Accuracy,
    Consistency,
    Timeliness,
    Validity,
    ClinicalRelevance,
    PrivacyCompliance,
}

impl QualityDimension {
    /// All seven dimensions
    pub const ALL: [QualityDimension; 7] = [
        QualityDimension::Completeness,
        QualityDimension::Accuracy,
        QualityDimension::Consistency,
        QualityDimension::Timeliness,
        QualityDimension::Validity,
        QualityDimension::ClinicalRelevance,
        QualityDimension::PrivacyCompliance,
    ];

    fn index(&self) -> usize {
        match self {
            Self::Completeness => 0,
            Self::Accuracy => 1,
            Self::Consistency => 2,
            Self::Timeliness => 3,
            Self::Validity => 4,
            Self::ClinicalRelevance => 5,
            Self::PrivacyCompliance => 6,
        }
    }
}

/// One value per quality dimension
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionScores([f64; 7]);

impl DimensionScores {
    /// Every dimension set to the same value
    pub fn uniform(value: f64) -> Self {
        Self([value; 7])
    }

    /// Builds scores from a per-dimension function
    pub fn from_fn(f: impl Fn(QualityDimension) -> f64) -> Self {
        let mut values = [0.0; 7];
        for dim in QualityDimension::ALL {
            values[dim.index()] = f(dim);
        }
        Self(values)
    }

    /// Value for a dimension
    pub fn get(&self, dim: QualityDimension) -> f64 {
        self.0[dim.index()]
    }

    /// Sets the value for a dimension
    pub fn set(&mut self, dim: QualityDimension, value: f64) {
        self.0[dim.index()] = value;
    }

    /// Sum of all values
    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }

    /// Iterates `(dimension, value)` pairs in dimension order
    pub fn iter(&self) -> impl Iterator<Item = (QualityDimension, f64)> + '_ {
        QualityDimension::ALL.iter().map(|d| (*d, self.get(*d)))
    }
}

/// Composite quality score of a record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    /// Weighted composite in [0, 1]
    pub overall: f64,

    /// Per-dimension scores in [0, 1]
    pub dimensions: DimensionScores,
}

impl QualityScore {
    /// A perfect score
    pub fn perfect() -> Self {
        Self {
            overall: 1.0,
            dimensions: DimensionScores::uniform(1.0),
        }
    }
}

/// Structural corruption actions the degradation simulator can apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorruptionAction {
    /// Dosage value or unit garbled on a medication entry
    DosageUnitCorruption,
    /// Allergy list dropped
    AllergyFieldLoss,
    /// Demographic string truncated
    DemographicTruncation,
    /// Date rewritten in a non-ISO format
    DateFormatDrift,
    /// Condition code replaced with an unmapped placeholder
    CodeMappingError,
    /// Protected field written without its protection
    ProtectedFieldExposure,
    /// Vital-sign values rounded to integers
    VitalsPrecisionLoss,
}

impl CorruptionAction {
    /// Full catalogue
    pub const ALL: [CorruptionAction; 7] = [
        CorruptionAction::DosageUnitCorruption,
        CorruptionAction::AllergyFieldLoss,
        CorruptionAction::DemographicTruncation,
        CorruptionAction::DateFormatDrift,
        CorruptionAction::CodeMappingError,
        CorruptionAction::ProtectedFieldExposure,
        CorruptionAction::VitalsPrecisionLoss,
    ];

    /// Dimension hurt most by this action
    pub fn primary_dimension(&self) -> QualityDimension {
        match self {
            Self::DosageUnitCorruption => QualityDimension::Accuracy,
            Self::AllergyFieldLoss => QualityDimension::Completeness,
            Self::DemographicTruncation => QualityDimension::Consistency,
            Self::DateFormatDrift => QualityDimension::Validity,
            Self::CodeMappingError => QualityDimension::ClinicalRelevance,
            Self::ProtectedFieldExposure => QualityDimension::PrivacyCompliance,
            Self::VitalsPrecisionLoss => QualityDimension::Accuracy,
        }
    }

    /// Field this action would target in the given field map, if applicable
    pub fn target_field(&self, fields: &Map<String, Value>) -> Option<String> {
        let has_array = |name: &str| {
            fields
                .get(name)
                .and_then(Value::as_array)
                .map(|a| !a.is_empty())
                .unwrap_or(false)
        };
        match self {
            Self::DosageUnitCorruption => {
                has_array(FIELD_MEDICATIONS).then(|| FIELD_MEDICATIONS.to_string())
            }
            Self::AllergyFieldLoss => fields
                .contains_key(FIELD_ALLERGIES)
                .then(|| FIELD_ALLERGIES.to_string()),
            Self::DemographicTruncation => ["name", "address", "last_name", "first_name"]
                .iter()
                .find(|f| fields.get(**f).and_then(Value::as_str).is_some())
                .map(|f| f.to_string()),
            Self::DateFormatDrift => fields
                .iter()
                .find(|(k, v)| is_date_field(k) && v.is_string())
                .map(|(k, _)| k.clone()),
            Self::CodeMappingError => {
                has_array(FIELD_CONDITIONS).then(|| FIELD_CONDITIONS.to_string())
            }
            Self::ProtectedFieldExposure => {
                protected_fields(fields).into_iter().next().map(|(f, _)| f)
            }
            Self::VitalsPrecisionLoss => [FIELD_VITALS, FIELD_OBSERVATIONS]
                .iter()
                .find(|f| has_array(**f))
                .map(|f| f.to_string()),
        }
    }

    /// Name as used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DosageUnitCorruption => "dosage_unit_corruption",
            Self::AllergyFieldLoss => "allergy_field_loss",
            Self::DemographicTruncation => "demographic_truncation",
            Self::DateFormatDrift => "date_format_drift",
            Self::CodeMappingError => "code_mapping_error",
            Self::ProtectedFieldExposure => "protected_field_exposure",
            Self::VitalsPrecisionLoss => "vitals_precision_loss",
        }
    }
}

impl fmt::Display for CorruptionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A corruption applied to a specific field of the shadow record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedCorruption {
    pub action: CorruptionAction,
    pub field: String,
}

/// Quality penalty on one dimension (negative values improve quality)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionImpact {
    pub dimension: QualityDimension,
    pub amount: f64,
}

/// One entry of a record's degradation ledger
///
/// The scorer folds the ledger in order; together with the shadow fields it
/// is the whole input to a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradationEntry {
    pub stage: Stage,
    pub substage: String,
    pub attempt: u32,

    /// `None` for a successful attempt
    pub failure: Option<FailureKind>,

    /// Scalar delta before it was split across dimensions
    pub delta: f64,

    pub impacts: Vec<DimensionImpact>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub corruption: Option<AppliedCorruption>,
}

/// Severity shared by alerts and compliance violations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Weight of a violation of this severity in the compliance score
    pub fn violation_weight(&self) -> f64 {
        match self {
            Self::Critical => 1.0,
            Self::High => 0.6,
            Self::Medium => 0.3,
            Self::Low => 0.1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What raised an alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertTrigger {
    /// Record score crossed below a severity threshold
    ScoreThreshold { threshold: f64, score: f64 },
    /// Critical compliance violation
    ComplianceViolation { violation: String },
}

/// Alert raised by the quality monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAlert {
    /// Sequential id within the batch (`alert-000001`, ...)
    pub id: String,
    pub severity: Severity,
    pub trigger: AlertTrigger,
    pub record_id: RecordId,
    pub stage: Stage,
    pub substage: String,
    pub raised_at: DateTime<Utc>,
    pub resolved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl QualityAlert {
    /// Marks the alert resolved
    pub fn resolve(&mut self, at: DateTime<Utc>) {
        if !self.resolved {
            self.resolved = true;
            self.resolved_at = Some(at);
        }
    }
}
