//! Patient record model
//!
//! A [`Record`] is owned by the caller and never mutated by the migration core.
//! Simulated corruption is applied to a [`ShadowRecord`], a copy-on-write view
//! that clones the clinical fields only on the first write.

use super::ids::RecordId;
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Field holding medication entries
pub const FIELD_MEDICATIONS: &str = "medications";
/// Field holding allergy entries
pub const FIELD_ALLERGIES: &str = "allergies";
/// Field holding condition entries
pub const FIELD_CONDITIONS: &str = "conditions";
/// Field holding vital-sign observations
pub const FIELD_VITALS: &str = "vitals";
/// Field holding lab/observation entries
pub const FIELD_OBSERVATIONS: &str = "observations";

/// One patient's migration-relevant clinical data
///
/// # Examples
///
/// ```
/// use strata::domain::record::{Criticality, RecordBuilder};
/// use serde_json::json;
///
/// let record = RecordBuilder::new()
///     .id("patient-1")
///     .unwrap()
///     .field("name", json!("Ada Example"))
///     .field("medications", json!([{"name": "warfarin", "dose": 5.0, "unit": "mg", "status": "active"}]))
///     .build()
///     .unwrap();
///
/// assert_eq!(record.criticality(), Criticality::Critical);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Opaque record identifier
    pub id: RecordId,

    /// Clinical fields (conditions, medications, identifiers, timestamps)
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Creates a new builder for constructing a Record
    pub fn builder() -> RecordBuilder {
        RecordBuilder::default()
    }

    /// Worst-case field criticality of this record
    pub fn criticality(&self) -> Criticality {
        Criticality::of_fields(&self.fields)
    }
}

/// Builder for constructing Record instances
#[derive(Debug, Default)]
pub struct RecordBuilder {
    id: Option<RecordId>,
    fields: Map<String, Value>,
}

impl RecordBuilder {
    /// Creates a new RecordBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the record id
    pub fn id(mut self, id: impl Into<String>) -> Result<Self, String> {
        self.id = Some(RecordId::new(id)?);
        Ok(self)
    }

    /// Adds a clinical field
    pub fn field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Builds the Record
    pub fn build(self) -> Result<Record, String> {
        Ok(Record {
            id: self.id.ok_or("id is required")?,
            fields: self.fields,
        })
    }
}

/// Clinical criticality class of a record
///
/// Determined by the most critical field present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criticality {
    /// Administrative data only
    Low,
    /// Observations, vitals or labs
    Medium,
    /// Diagnosed conditions
    High,
    /// Active medications or allergies
    Critical,
}

impl Criticality {
    /// All classes, least critical first
    pub const ALL: [Criticality; 4] = [
        Criticality::Low,
        Criticality::Medium,
        Criticality::High,
        Criticality::Critical,
    ];

    /// Classifies a field map
    pub fn of_fields(fields: &Map<String, Value>) -> Self {
        if has_active_medication(fields) || non_empty(fields.get(FIELD_ALLERGIES)) {
            Self::Critical
        } else if non_empty(fields.get(FIELD_CONDITIONS)) {
            Self::High
        } else if non_empty(fields.get(FIELD_VITALS)) || non_empty(fields.get(FIELD_OBSERVATIONS))
        {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Name as used in configuration and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Criticality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn non_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

fn has_active_medication(fields: &Map<String, Value>) -> bool {
    match fields.get(FIELD_MEDICATIONS) {
        Some(Value::Array(items)) => items.iter().any(|item| {
            item.get("status")
                .and_then(Value::as_str)
                .map(|status| status.eq_ignore_ascii_case("active"))
                .unwrap_or(true)
        }),
        _ => false,
    }
}

/// Protected health information category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhiCategory {
    Name,
    BirthDate,
    Address,
    Phone,
    Email,
    Ssn,
    MedicalRecordNumber,
    InsuranceId,
}

impl PhiCategory {
    /// Category of a field name, if the field is protected
    pub fn for_field(field: &str) -> Option<Self> {
        match field {
            "name" | "first_name" | "last_name" | "patient_name" => Some(Self::Name),
            "birth_date" | "date_of_birth" | "dob" => Some(Self::BirthDate),
            "address" | "street" | "postal_code" | "zip" => Some(Self::Address),
            "phone" | "mobile" => Some(Self::Phone),
            "email" => Some(Self::Email),
            "ssn" | "national_id" => Some(Self::Ssn),
            "mrn" | "medical_record_number" => Some(Self::MedicalRecordNumber),
            "insurance_id" | "health_plan_id" => Some(Self::InsuranceId),
            _ => None,
        }
    }

    /// Violation weight multiplier for an exposure of this category
    pub fn sensitivity(&self) -> f64 {
        match self {
            Self::Ssn | Self::MedicalRecordNumber => 1.0,
            Self::Name | Self::BirthDate | Self::InsuranceId => 0.8,
            Self::Address | Self::Phone | Self::Email => 0.6,
        }
    }
}

/// Protected fields of a field map, in key order
pub fn protected_fields(fields: &Map<String, Value>) -> Vec<(String, PhiCategory)> {
    fields
        .keys()
        .filter_map(|k| PhiCategory::for_field(k).map(|c| (k.clone(), c)))
        .collect()
}

/// Whether a field name holds a date or timestamp
pub fn is_date_field(field: &str) -> bool {
    field == "dob" || field.ends_with("_date") || field.ends_with("_at")
}

/// Whether a value is a well-formed ISO date or RFC 3339 timestamp
pub fn is_valid_date(value: &Value) -> bool {
    match value {
        Value::String(s) => {
            NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
                || DateTime::parse_from_rfc3339(s).is_ok()
        }
        _ => false,
    }
}

/// Copy-on-write view of a record's clinical fields
///
/// Reads go to the caller-owned source until the first write, which clones the
/// fields into a migration-scoped shadow.
#[derive(Debug, Clone, Serialize)]
pub struct ShadowRecord {
    #[serde(skip)]
    source: Arc<Record>,
    shadow: Option<Map<String, Value>>,
}

impl ShadowRecord {
    /// Wraps a source record
    pub fn new(source: Arc<Record>) -> Self {
        Self {
            source,
            shadow: None,
        }
    }

    /// The unmodified caller-owned record
    pub fn source(&self) -> &Record {
        &self.source
    }

    /// Current fields (shadow if written, source otherwise)
    pub fn fields(&self) -> &Map<String, Value> {
        self.shadow.as_ref().unwrap_or(&self.source.fields)
    }

    /// Mutable fields, cloning the source on first write
    pub fn fields_mut(&mut self) -> &mut Map<String, Value> {
        let source = &self.source;
        self.shadow.get_or_insert_with(|| source.fields.clone())
    }

    /// Reads a single field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields().get(field)
    }

    /// Whether any write has happened
    pub fn is_modified(&self) -> bool {
        self.shadow.is_some()
    }
}
