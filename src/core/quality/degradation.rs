//! Quality degradation simulator
//!
//! Turns an attempt outcome into a ledger entry: a scalar delta split across
//! quality dimensions, plus an optional structural corruption drawn from the
//! catalogue in [`CorruptionAction`]. Corruptions are applied to the record's
//! [`ShadowRecord`]; the caller-owned source record is never written.

use crate::config::{PerClass, QualityConfig};
use crate::domain::quality::{
    AppliedCorruption, CorruptionAction, DegradationEntry, DimensionImpact, QualityDimension,
};
use crate::domain::record::{Criticality, ShadowRecord, FIELD_MEDICATIONS};
use crate::domain::stage::{FailureKind, Stage};
use crate::domain::status::RecordMigrationStatus;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{Map, Value};

/// Code written in place of a condition code by a mapping error
pub const UNMAPPED_CODE: &str = "UNMAPPED";

/// Extra penalty on a corruption's primary dimension, as a fraction of the delta
const CORRUPTION_PENALTY: f64 = 0.5;

/// How a failure kind's delta is spread across dimensions
fn failure_distribution(kind: FailureKind) -> &'static [(QualityDimension, f64)] {
    use QualityDimension::*;
    match kind {
        FailureKind::NetworkTimeout => &[(Timeliness, 0.6), (Completeness, 0.4)],
        FailureKind::SystemOverload => &[(Timeliness, 0.7), (Completeness, 0.3)],
        FailureKind::ResourceExhaustion => &[(Timeliness, 0.5), (Completeness, 0.5)],
        FailureKind::DataCorruption => &[
            (Accuracy, 0.4),
            (Validity, 0.3),
            (Consistency, 0.2),
            (ClinicalRelevance, 0.1),
        ],
        FailureKind::MappingError => &[(ClinicalRelevance, 0.4), (Consistency, 0.3), (Accuracy, 0.3)],
        FailureKind::ValidationFailure => &[(Validity, 0.5), (Consistency, 0.3), (Completeness, 0.2)],
        FailureKind::SecurityViolation => &[(PrivacyCompliance, 0.8), (Consistency, 0.2)],
    }
}

/// Corruption actions a failure kind may cause
fn candidate_actions(kind: FailureKind) -> &'static [CorruptionAction] {
    use CorruptionAction::*;
    match kind {
        FailureKind::DataCorruption => &[
            DosageUnitCorruption,
            AllergyFieldLoss,
            DemographicTruncation,
            DateFormatDrift,
            VitalsPrecisionLoss,
        ],
        FailureKind::MappingError => &[CodeMappingError, DateFormatDrift],
        FailureKind::SecurityViolation => &[ProtectedFieldExposure],
        FailureKind::NetworkTimeout
        | FailureKind::SystemOverload
        | FailureKind::ResourceExhaustion
        | FailureKind::ValidationFailure => &[],
    }
}

/// Where in the pipeline an outcome happened
#[derive(Debug, Clone, Copy)]
pub struct OutcomeSite<'a> {
    pub stage: Stage,
    pub substage: &'a str,
    pub attempt: u32,
}

/// Quality degradation simulator
#[derive(Debug, Clone)]
pub struct DegradationSimulator {
    per_failure: f64,
    per_success: f64,
    criticality_impact: PerClass<f64>,
}

impl DegradationSimulator {
    /// Creates a simulator from the quality configuration
    pub fn new(config: &QualityConfig) -> Self {
        Self {
            per_failure: config.degradation_per_failure,
            per_success: config.degradation_per_success,
            criticality_impact: config.criticality_impact.clone(),
        }
    }

    /// Plans the ledger entry for an outcome
    ///
    /// `failure` is `None` for a successful attempt. Returns `None` when the
    /// outcome has no quality effect (a success with zero per-success delta).
    pub fn simulate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        shadow: &ShadowRecord,
        criticality: Criticality,
        site: OutcomeSite<'_>,
        failure: Option<FailureKind>,
    ) -> Option<DegradationEntry> {
        let impact = *self.criticality_impact.get(criticality);

        let (delta, mut impacts, corruption) = match failure {
            None => {
                if self.per_success == 0.0 {
                    return None;
                }
                let delta = self.per_success;
                let impacts = QualityDimension::ALL
                    .iter()
                    .map(|d| DimensionImpact {
                        dimension: *d,
                        amount: delta,
                    })
                    .collect::<Vec<_>>();
                (delta, impacts, None)
            }
            Some(kind) => {
                let delta = self.per_failure * kind.severity() * impact;
                let impacts = failure_distribution(kind)
                    .iter()
                    .map(|(dimension, share)| DimensionImpact {
                        dimension: *dimension,
                        amount: delta * share,
                    })
                    .collect::<Vec<_>>();
                (delta, impacts, choose_corruption(rng, kind, shadow.fields()))
            }
        };

        if let Some(applied) = &corruption {
            impacts.push(DimensionImpact {
                dimension: applied.action.primary_dimension(),
                amount: delta * CORRUPTION_PENALTY,
            });
        }

        Some(DegradationEntry {
            stage: site.stage,
            substage: site.substage.to_string(),
            attempt: site.attempt,
            failure,
            delta,
            impacts,
            corruption,
        })
    }

    /// Applies a planned entry to a record: corrupts the shadow fields and
    /// appends the entry to the ledger
    pub fn apply(&self, record: &mut RecordMigrationStatus, entry: DegradationEntry) {
        if let Some(applied) = &entry.corruption {
            if applied.action == CorruptionAction::ProtectedFieldExposure {
                record.exposed_fields.insert(applied.field.clone());
            } else {
                corrupt_field(&mut record.shadow, applied);
            }
        }
        record.degradations.push(entry);
    }
}

fn choose_corruption<R: Rng + ?Sized>(
    rng: &mut R,
    kind: FailureKind,
    fields: &Map<String, Value>,
) -> Option<AppliedCorruption> {
    let applicable: Vec<AppliedCorruption> = candidate_actions(kind)
        .iter()
        .filter_map(|action| {
            action.target_field(fields).map(|field| AppliedCorruption {
                action: *action,
                field,
            })
        })
        .collect();
    applicable.choose(rng).cloned()
}

/// Mutates one field of the shadow record according to the action
fn corrupt_field(shadow: &mut ShadowRecord, applied: &AppliedCorruption) {
    let fields = shadow.fields_mut();
    match applied.action {
        CorruptionAction::DosageUnitCorruption => {
            if let Some(Value::Array(items)) = fields.get_mut(FIELD_MEDICATIONS) {
                if let Some(first) = items.first_mut() {
                    corrupt_dosage(first);
                }
            }
        }
        CorruptionAction::AllergyFieldLoss => {
            fields.remove(&applied.field);
        }
        CorruptionAction::DemographicTruncation => {
            if let Some(Value::String(s)) = fields.get_mut(&applied.field) {
                let keep = (s.chars().count() / 2).max(1);
                *s = s.chars().take(keep).collect();
            }
        }
        CorruptionAction::DateFormatDrift => {
            if let Some(value) = fields.get_mut(&applied.field) {
                *value = Value::String(drift_date(value.as_str().unwrap_or_default()));
            }
        }
        CorruptionAction::CodeMappingError => {
            if let Some(Value::Array(items)) = fields.get_mut(&applied.field) {
                if let Some(Value::Object(first)) = items.first_mut() {
                    first.insert("code".to_string(), Value::String(UNMAPPED_CODE.to_string()));
                } else if let Some(first) = items.first_mut() {
                    *first = serde_json::json!({ "code": UNMAPPED_CODE });
                }
            }
        }
        CorruptionAction::VitalsPrecisionLoss => {
            if let Some(Value::Array(items)) = fields.get_mut(&applied.field) {
                for item in items.iter_mut() {
                    if let Some(v) = item.get("value").and_then(Value::as_f64) {
                        if let Some(obj) = item.as_object_mut() {
                            obj.insert("value".to_string(), serde_json::json!(v.round()));
                        }
                    }
                }
            }
        }
        CorruptionAction::ProtectedFieldExposure => {}
    }
}

/// Swaps the dosage unit and keeps the amount, so the prescribed quantity
/// changes by a factor of 1000
fn corrupt_dosage(entry: &mut Value) {
    match entry.as_object_mut() {
        Some(med) => {
            if let Some(unit) = med.get("unit").and_then(Value::as_str) {
                let swapped = swap_unit(unit);
                med.insert("unit".to_string(), Value::String(swapped.to_string()));
            } else if let Some(Value::String(dose)) = med.get_mut("dose") {
                *dose = match dose.rsplit_once(' ') {
                    Some((amount, unit)) => format!("{amount} {}", swap_unit(unit)),
                    None => format!("{dose} mcg"),
                };
            } else {
                med.insert("unit".to_string(), Value::String("mcg".to_string()));
            }
        }
        None => *entry = Value::String("<corrupted dosage>".to_string()),
    }
}

fn swap_unit(unit: &str) -> &'static str {
    if unit == "mcg" {
        "mg"
    } else {
        "mcg"
    }
}

/// Rewrites `YYYY-MM-DD...` as `MM/DD/YYYY`
fn drift_date(value: &str) -> String {
    let date = value.get(..10).unwrap_or(value);
    let parts: Vec<&str> = date.split('-').collect();
    match parts.as_slice() {
        [y, m, d] => format!("{m}/{d}/{y}"),
        _ => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::{is_valid_date, Record, RecordBuilder};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;
    use std::sync::Arc;

    fn config(per_failure: f64, per_success: f64) -> QualityConfig {
        QualityConfig {
            degradation_per_failure: per_failure,
            degradation_per_success: per_success,
            ..QualityConfig::default()
        }
    }

    fn record(fields: Value) -> Arc<Record> {
        let mut builder = RecordBuilder::new().id("r-1").unwrap();
        for (k, v) in fields.as_object().unwrap() {
            builder = builder.field(k.clone(), v.clone());
        }
        Arc::new(builder.build().unwrap())
    }

    fn site() -> OutcomeSite<'static> {
        OutcomeSite {
            stage: Stage::Transform,
            substage: "normalize",
            attempt: 1,
        }
    }

    #[test]
    fn test_success_without_delta_has_no_entry() {
        let sim = DegradationSimulator::new(&config(0.1, 0.0));
        let shadow = ShadowRecord::new(record(json!({"name": "A"})));
        let mut rng = StdRng::seed_from_u64(1);
        assert!(sim
            .simulate(&mut rng, &shadow, Criticality::Low, site(), None)
            .is_none());
    }

    #[test]
    fn test_negative_success_delta_improves_every_dimension() {
        let sim = DegradationSimulator::new(&config(0.1, -0.02));
        let shadow = ShadowRecord::new(record(json!({"name": "A"})));
        let mut rng = StdRng::seed_from_u64(1);
        let entry = sim
            .simulate(&mut rng, &shadow, Criticality::Low, site(), None)
            .unwrap();
        assert_eq!(entry.delta, -0.02);
        assert_eq!(entry.impacts.len(), 7);
        assert!(entry.impacts.iter().all(|i| i.amount == -0.02));
        assert!(entry.corruption.is_none());
    }

    #[test]
    fn test_failure_delta_scaled_by_severity_and_criticality() {
        let sim = DegradationSimulator::new(&config(0.2, 0.0));
        let shadow = ShadowRecord::new(record(json!({"name": "A"})));
        let mut rng = StdRng::seed_from_u64(3);

        let critical = sim
            .simulate(
                &mut rng,
                &shadow,
                Criticality::Critical,
                site(),
                Some(FailureKind::NetworkTimeout),
            )
            .unwrap();
        let low = sim
            .simulate(
                &mut rng,
                &shadow,
                Criticality::Low,
                site(),
                Some(FailureKind::NetworkTimeout),
            )
            .unwrap();

        assert!((critical.delta - 0.2 * 0.3 * 1.5).abs() < 1e-12);
        assert!((low.delta - 0.2 * 0.3 * 0.75).abs() < 1e-12);
        assert!(critical.corruption.is_none());
    }

    #[test]
    fn test_transient_failures_never_corrupt() {
        let sim = DegradationSimulator::new(&config(0.2, 0.0));
        let shadow = ShadowRecord::new(record(json!({
            "name": "Alexandra", "allergies": ["latex"], "birth_date": "1970-01-01"
        })));
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            for kind in [
                FailureKind::NetworkTimeout,
                FailureKind::SystemOverload,
                FailureKind::ResourceExhaustion,
            ] {
                let entry = sim
                    .simulate(&mut rng, &shadow, Criticality::Critical, site(), Some(kind))
                    .unwrap();
                assert!(entry.corruption.is_none());
            }
        }
    }

    #[test]
    fn test_corruption_goes_to_shadow_only() {
        let source = record(json!({
            "allergies": ["penicillin"],
            "medications": [{"name": "warfarin", "dose": 5.0, "unit": "mg"}],
            "name": "Alexandra",
            "birth_date": "1970-03-04",
            "vitals": [{"code": "8867-4", "value": 72.4}]
        }));
        let sim = DegradationSimulator::new(&config(0.2, 0.0));

        for seed in 0..30 {
            let mut status = RecordMigrationStatus::new(source.clone());
            let mut rng = StdRng::seed_from_u64(seed);
            let entry = sim
                .simulate(
                    &mut rng,
                    &status.shadow,
                    status.criticality,
                    site(),
                    Some(FailureKind::DataCorruption),
                )
                .unwrap();
            let applied = entry.corruption.clone().expect("applicable corruption");
            sim.apply(&mut status, entry);

            assert!(status.shadow.is_modified());
            assert_ne!(status.shadow.fields(), &source.fields, "{}", applied.action);
            assert_eq!(status.degradations.len(), 1);
        }
        assert!(source.fields.contains_key("allergies"));
        assert_eq!(source.fields["medications"][0]["unit"], "mg");
    }

    #[test]
    fn test_corruption_penalty_on_primary_dimension() {
        let sim = DegradationSimulator::new(&config(0.2, 0.0));
        let shadow = ShadowRecord::new(record(json!({"conditions": [{"code": "E11.9"}]})));
        let mut rng = StdRng::seed_from_u64(9);
        let entry = sim
            .simulate(
                &mut rng,
                &shadow,
                Criticality::High,
                site(),
                Some(FailureKind::MappingError),
            )
            .unwrap();
        let applied = entry.corruption.as_ref().unwrap();
        assert_eq!(applied.action, CorruptionAction::CodeMappingError);
        let last = entry.impacts.last().unwrap();
        assert_eq!(last.dimension, QualityDimension::ClinicalRelevance);
        assert!((last.amount - entry.delta * CORRUPTION_PENALTY).abs() < 1e-12);
    }

    #[test]
    fn test_security_violation_exposes_protected_field() {
        let source = record(json!({"ssn": "123-45-6789", "conditions": []}));
        let sim = DegradationSimulator::new(&config(0.2, 0.0));
        let mut status = RecordMigrationStatus::new(source);
        let mut rng = StdRng::seed_from_u64(5);
        let entry = sim
            .simulate(
                &mut rng,
                &status.shadow,
                status.criticality,
                site(),
                Some(FailureKind::SecurityViolation),
            )
            .unwrap();
        sim.apply(&mut status, entry);
        assert!(status.exposed_fields.contains("ssn"));
        assert!(!status.shadow.is_modified());
    }

    #[test]
    fn test_field_corruptions() {
        let mut shadow = ShadowRecord::new(record(json!({
            "admitted_at": "2024-02-01T10:00:00Z",
            "last_name": "Montgomery",
            "medications": [{"dose": 2.5, "unit": "mg"}],
            "observations": [{"value": 7.25}]
        })));

        for (action, field) in [
            (CorruptionAction::DateFormatDrift, "admitted_at"),
            (CorruptionAction::DemographicTruncation, "last_name"),
            (CorruptionAction::DosageUnitCorruption, "medications"),
            (CorruptionAction::VitalsPrecisionLoss, "observations"),
        ] {
            corrupt_field(
                &mut shadow,
                &AppliedCorruption {
                    action,
                    field: field.to_string(),
                },
            );
        }

        assert_eq!(shadow.get("admitted_at").unwrap(), "02/01/2024");
        assert!(!is_valid_date(shadow.get("admitted_at").unwrap()));
        assert_eq!(shadow.get("last_name").unwrap(), "Montg");
        assert_eq!(shadow.get("medications").unwrap()[0]["unit"], "mcg");
        assert_eq!(shadow.get("medications").unwrap()[0]["dose"], 2.5);
        assert_eq!(shadow.get("observations").unwrap()[0]["value"], 7.0);
    }

    #[test]
    fn test_dosage_corruption_keeps_amount_and_swaps_unit() {
        let mut structured = json!({"dose": 5.0, "unit": "mg"});
        corrupt_dosage(&mut structured);
        assert_eq!(structured, json!({"dose": 5.0, "unit": "mcg"}));
        corrupt_dosage(&mut structured);
        assert_eq!(structured, json!({"dose": 5.0, "unit": "mg"}));

        let mut inline = json!({"code": "RX-88", "dose": "500 mg"});
        corrupt_dosage(&mut inline);
        assert_eq!(inline["dose"], "500 mcg");

        let mut unitless = json!({"dose": 12.5});
        corrupt_dosage(&mut unitless);
        assert_eq!(unitless, json!({"dose": 12.5, "unit": "mcg"}));
    }

    #[test]
    fn test_drift_date_handles_garbage() {
        assert_eq!(drift_date("1999-12-31"), "12/31/1999");
        assert_eq!(drift_date("yesterday"), "unknown");
    }
}
