//! Domain identifier types with validation
//!
//! Newtype wrappers for the identifiers that flow through a migration batch.
//! Each type keeps record, batch and protected-element ids from being mixed up.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Patient record identifier
///
/// Opaque to the migration core; produced by the external record generator.
///
/// # Examples
///
/// ```
/// use strata::domain::ids::RecordId;
/// use std::str::FromStr;
///
/// let id = RecordId::from_str("patient-0001").unwrap();
/// assert_eq!(id.as_str(), "patient-0001");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(String);

impl RecordId {
    /// Creates a new RecordId from a string
    ///
    /// # Returns
    ///
    /// Returns `Ok(RecordId)` if the ID is non-empty, `Err` otherwise
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Record ID cannot be empty".to_string());
        }
        Ok(Self(id))
    }

    /// Returns the record ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Batch identifier
///
/// A UUID, either supplied by the caller or generated at batch start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(Uuid);

impl BatchId {
    /// Generates a fresh random batch id
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Builds a batch id from two 64-bit halves (used for seeded runs)
    pub fn from_u64_pair(high: u64, low: u64) -> Self {
        Self(Uuid::from_u64_pair(high, low))
    }

    /// Returns the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BatchId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| format!("Invalid batch ID '{s}': {e}"))
    }
}

/// Protected element identifier
///
/// Format: `{record_id}/{field}`. Keys the compliance inventory.
///
/// # Examples
///
/// ```
/// use strata::domain::ids::{ElementId, RecordId};
///
/// let record = RecordId::new("patient-7").unwrap();
/// let element = ElementId::for_field(&record, "ssn");
/// assert_eq!(element.as_str(), "patient-7/ssn");
/// assert_eq!(element.field(), Some("ssn"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementId(String);

impl ElementId {
    /// Builds the element id for a field of a record
    pub fn for_field(record_id: &RecordId, field: &str) -> Self {
        Self(format!("{}/{}", record_id.as_str(), field))
    }

    /// Returns the element ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Field name part (after the last `/`)
    pub fn field(&self) -> Option<&str> {
        self.0.rsplit_once('/').map(|(_, field)| field)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
