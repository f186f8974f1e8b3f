//! Protected-data inventory, access log and violation detection
//!
//! The tracker has exactly one mutation path: [`ComplianceTracker::record_access`],
//! called by the executor after a substage drains. Inventory status changes only
//! through an access.

use crate::config::ComplianceConfig;
use crate::domain::compliance::{
    AccessRequest, ComplianceFinding, ProtectionStatus, ViolationKind,
};
use crate::domain::ids::{ElementId, RecordId};
use crate::domain::quality::Severity;
use crate::domain::record::{protected_fields, PhiCategory, Record};
use crate::domain::stage::Stage;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

/// SHA-256 of a field value (never log plaintext PHI)
pub fn hash_value(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.to_string().as_bytes());
    let result = hasher.finalize();
    format!("{result:x}")
}

/// Protected element in the inventory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryEntry {
    pub element_id: ElementId,
    pub record_id: RecordId,
    pub field: String,
    pub category: Option<PhiCategory>,
    pub status: ProtectionStatus,
    pub access_count: usize,
    pub last_accessor: Option<String>,
    pub last_access_at: Option<DateTime<Utc>>,
}

/// Append-only access log entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessLogEntry {
    pub sequence: u64,
    pub element_id: ElementId,
    pub accessor: String,
    pub justification: Option<String>,
    pub stage: Stage,
    pub substage: String,
    pub resulting_status: ProtectionStatus,
    pub value_hash: String,
    pub at: DateTime<Utc>,
}

/// Violation event in the compliance log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceEvent {
    /// Log sequence number of the access that raised it
    pub access_sequence: u64,
    pub kind: ViolationKind,
    pub severity: Severity,
    pub element_id: ElementId,
    pub record_id: RecordId,
    pub accessor: String,
    pub at: DateTime<Utc>,
}

/// Compliance summary handed to reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceReport {
    pub score: f64,
    pub protected_elements: usize,
    pub exposed_elements: usize,
    pub total_accesses: usize,
    pub violations_by_kind: BTreeMap<ViolationKind, usize>,
    pub violations: Vec<ComplianceEvent>,
    pub access_log: Vec<AccessLogEntry>,
}

/// Compliance tracker
#[derive(Debug)]
pub struct ComplianceTracker {
    permitted_roles: BTreeSet<String>,
    require_justification: bool,
    inventory: BTreeMap<ElementId, InventoryEntry>,
    log: Vec<AccessLogEntry>,
    violations: Vec<ComplianceEvent>,
}

impl ComplianceTracker {
    /// Creates an empty tracker with the given access policy
    pub fn new(config: &ComplianceConfig) -> Self {
        Self {
            permitted_roles: config.permitted_roles.iter().cloned().collect(),
            require_justification: config.require_justification,
            inventory: BTreeMap::new(),
            log: Vec::new(),
            violations: Vec::new(),
        }
    }

    /// Adds a record's protected fields to the inventory, all protected
    ///
    /// Returns the number of elements added.
    pub fn register_record(&mut self, record: &Record) -> usize {
        let mut added = 0;
        for (field, category) in protected_fields(&record.fields) {
            let element_id = ElementId::for_field(&record.id, &field);
            if self.inventory.contains_key(&element_id) {
                continue;
            }
            self.inventory.insert(
                element_id.clone(),
                InventoryEntry {
                    element_id,
                    record_id: record.id.clone(),
                    field,
                    category: Some(category),
                    status: ProtectionStatus::Protected,
                    access_count: 0,
                    last_accessor: None,
                    last_access_at: None,
                },
            );
            added += 1;
        }
        added
    }

    /// Records an access and returns the violations it raised
    ///
    /// An element not yet in the inventory is added as protected before the
    /// access is applied.
    pub fn record_access(
        &mut self,
        request: AccessRequest,
        at: DateTime<Utc>,
    ) -> Vec<ComplianceFinding> {
        let element_id = request.element_id();
        let sequence = self.log.len() as u64 + 1;

        let entry = self
            .inventory
            .entry(element_id.clone())
            .or_insert_with(|| InventoryEntry {
                element_id: element_id.clone(),
                record_id: request.record_id.clone(),
                field: request.field.clone(),
                category: PhiCategory::for_field(&request.field),
                status: ProtectionStatus::Protected,
                access_count: 0,
                last_accessor: None,
                last_access_at: None,
            });

        let mut kinds = Vec::new();
        let justified = request
            .justification
            .as_deref()
            .map(|j| !j.trim().is_empty())
            .unwrap_or(false);
        if self.require_justification && !justified {
            kinds.push(ViolationKind::MissingJustification);
        }
        if !self.permitted_roles.contains(&request.accessor) {
            kinds.push(ViolationKind::UnauthorizedAccess);
        }
        if entry.status == ProtectionStatus::Protected
            && request.resulting_status == ProtectionStatus::Exposed
        {
            kinds.push(ViolationKind::UnprotectedExposure);
        }

        entry.status = request.resulting_status;
        entry.access_count += 1;
        entry.last_accessor = Some(request.accessor.clone());
        entry.last_access_at = Some(at);

        let findings: Vec<ComplianceFinding> = kinds
            .into_iter()
            .map(|kind| ComplianceFinding {
                kind,
                severity: kind.severity(),
                element_id: element_id.clone(),
                stage: request.stage,
                substage: request.substage.clone(),
                at,
            })
            .collect();

        for finding in &findings {
            tracing::warn!(
                element_id = %finding.element_id,
                accessor = %request.accessor,
                violation = %finding.kind,
                severity = %finding.severity,
                stage = %request.stage,
                substage = %request.substage,
                "Compliance violation"
            );
            self.violations.push(ComplianceEvent {
                access_sequence: sequence,
                kind: finding.kind,
                severity: finding.severity,
                element_id: element_id.clone(),
                record_id: request.record_id.clone(),
                accessor: request.accessor.clone(),
                at,
            });
        }

        self.log.push(AccessLogEntry {
            sequence,
            element_id,
            accessor: request.accessor,
            justification: request.justification,
            stage: request.stage,
            substage: request.substage,
            resulting_status: request.resulting_status,
            value_hash: request.value_hash,
            at,
        });

        findings
    }

    /// Running compliance score: 1 − weighted violations / protected elements
    pub fn compliance_score(&self) -> f64 {
        let weighted: f64 = self
            .violations
            .iter()
            .map(|v| v.severity.violation_weight())
            .sum();
        if self.inventory.is_empty() {
            return if weighted > 0.0 { 0.0 } else { 1.0 };
        }
        (1.0 - weighted / self.inventory.len() as f64).clamp(0.0, 1.0)
    }

    /// Number of protected elements in the inventory
    pub fn protected_element_count(&self) -> usize {
        self.inventory.len()
    }

    pub fn inventory_entry(&self, element_id: &ElementId) -> Option<&InventoryEntry> {
        self.inventory.get(element_id)
    }

    pub fn access_log(&self) -> &[AccessLogEntry] {
        &self.log
    }

    pub fn violations(&self) -> &[ComplianceEvent] {
        &self.violations
    }

    /// Builds the compliance report
    pub fn report(&self) -> ComplianceReport {
        let mut violations_by_kind = BTreeMap::new();
        for v in &self.violations {
            *violations_by_kind.entry(v.kind).or_insert(0) += 1;
        }
        ComplianceReport {
            score: self.compliance_score(),
            protected_elements: self.inventory.len(),
            exposed_elements: self
                .inventory
                .values()
                .filter(|e| e.status == ProtectionStatus::Exposed)
                .count(),
            total_accesses: self.log.len(),
            violations_by_kind,
            violations: self.violations.clone(),
            access_log: self.log.clone(),
        }
    }
}
