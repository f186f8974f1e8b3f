//! Multi-dimensional quality scorer
//!
//! A record's score is a pure function of its annotated state: the shadow
//! fields give each dimension a base value, the degradation ledger is folded
//! over those bases in order, and compliance annotations set the privacy
//! base. Nothing else is consulted, so scores replay exactly.

use super::degradation::UNMAPPED_CODE;
use crate::domain::compliance::ViolationKind;
use crate::domain::quality::{DimensionScores, QualityDimension, QualityScore};
use crate::domain::record::{
    is_date_field, is_valid_date, protected_fields, Criticality, PhiCategory, FIELD_CONDITIONS,
};
use crate::domain::status::RecordMigrationStatus;
use serde_json::Value;

/// Share of a finding's severity weight charged against privacy compliance
const FINDING_PRIVACY_FACTOR: f64 = 0.5;

/// Dimension weights for a criticality class; always sum to 1
///
/// Active medications and allergies push weight onto completeness and
/// privacy compliance.
pub fn weights(criticality: Criticality) -> DimensionScores {
    use QualityDimension::*;
    DimensionScores::from_fn(|dim| match (criticality, dim) {
        (Criticality::Critical, Completeness) => 0.20,
        (Criticality::Critical, Accuracy) => 0.20,
        (Criticality::Critical, Consistency) => 0.10,
        (Criticality::Critical, Timeliness) => 0.05,
        (Criticality::Critical, Validity) => 0.10,
        (Criticality::Critical, ClinicalRelevance) => 0.15,
        (Criticality::Critical, PrivacyCompliance) => 0.20,

        (Criticality::High, Completeness) => 0.18,
        (Criticality::High, Accuracy) => 0.20,
        (Criticality::High, Consistency) => 0.12,
        (Criticality::High, Timeliness) => 0.08,
        (Criticality::High, Validity) => 0.12,
        (Criticality::High, ClinicalRelevance) => 0.15,
        (Criticality::High, PrivacyCompliance) => 0.15,

        (Criticality::Medium, Completeness) => 0.16,
        (Criticality::Medium, Accuracy) => 0.18,
        (Criticality::Medium, Consistency) => 0.14,
        (Criticality::Medium, Timeliness) => 0.12,
        (Criticality::Medium, Validity) => 0.14,
        (Criticality::Medium, ClinicalRelevance) => 0.12,
        (Criticality::Medium, PrivacyCompliance) => 0.14,

        (Criticality::Low, ClinicalRelevance) => 0.10,
        (Criticality::Low, _) => 0.15,
    })
}

/// Scores a record from its current annotated state
pub fn score_record(record: &RecordMigrationStatus) -> QualityScore {
    let mut dimensions = base_dimensions(record);

    for entry in &record.degradations {
        for impact in &entry.impacts {
            let value = dimensions.get(impact.dimension) - impact.amount;
            dimensions.set(impact.dimension, value.clamp(0.0, 1.0));
        }
    }

    let weights = weights(record.criticality);
    let overall = QualityDimension::ALL
        .iter()
        .map(|d| weights.get(*d) * dimensions.get(*d))
        .sum::<f64>()
        .clamp(0.0, 1.0);

    QualityScore {
        overall,
        dimensions,
    }
}

/// Field-derived base value of every dimension
fn base_dimensions(record: &RecordMigrationStatus) -> DimensionScores {
    let source = &record.shadow.source().fields;
    let current = record.shadow.fields();

    let completeness = if source.is_empty() {
        1.0
    } else {
        let present = source
            .keys()
            .filter(|k| !matches!(current.get(*k), None | Some(Value::Null)))
            .count();
        present as f64 / source.len() as f64
    };

    let dates: Vec<&Value> = current
        .iter()
        .filter(|(k, _)| is_date_field(k))
        .map(|(_, v)| v)
        .collect();
    let validity = if dates.is_empty() {
        1.0
    } else {
        dates.iter().filter(|v| is_valid_date(v)).count() as f64 / dates.len() as f64
    };

    let clinical_relevance = match current.get(FIELD_CONDITIONS).and_then(Value::as_array) {
        Some(conditions) if !conditions.is_empty() => {
            let mapped = conditions
                .iter()
                .filter(|c| c.get("code").and_then(Value::as_str) != Some(UNMAPPED_CODE))
                .count();
            mapped as f64 / conditions.len() as f64
        }
        _ => 1.0,
    };

    DimensionScores::from_fn(|dim| match dim {
        QualityDimension::Completeness => completeness,
        QualityDimension::Validity => validity,
        QualityDimension::ClinicalRelevance => clinical_relevance,
        QualityDimension::PrivacyCompliance => privacy_base(record),
        QualityDimension::Accuracy | QualityDimension::Consistency | QualityDimension::Timeliness => {
            1.0
        }
    })
}

/// Privacy base from exposed fields and non-exposure findings
fn privacy_base(record: &RecordMigrationStatus) -> f64 {
    let protected = protected_fields(&record.shadow.source().fields).len().max(1) as f64;

    let exposure: f64 = record
        .exposed_fields
        .iter()
        .map(|f| PhiCategory::for_field(f).map(|c| c.sensitivity()).unwrap_or(1.0))
        .sum();

    let findings: f64 = record
        .compliance_findings
        .iter()
        .filter(|f| f.kind != ViolationKind::UnprotectedExposure)
        .map(|f| f.severity.violation_weight() * FINDING_PRIVACY_FACTOR)
        .sum();

    (1.0 - (exposure + findings) / protected).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::compliance::ComplianceFinding;
    use crate::domain::ids::ElementId;
    use crate::domain::quality::{DegradationEntry, DimensionImpact};
    use crate::domain::record::RecordBuilder;
    use crate::domain::stage::{FailureKind, Stage};
    use chrono::Utc;
    use serde_json::json;
    use std::sync::Arc;
    use test_case::test_case;

    fn status(fields: Value) -> RecordMigrationStatus {
        let mut builder = RecordBuilder::new().id("r-1").unwrap();
        for (k, v) in fields.as_object().unwrap() {
            builder = builder.field(k.clone(), v.clone());
        }
        RecordMigrationStatus::new(Arc::new(builder.build().unwrap()))
    }

    fn entry(dimension: QualityDimension, amount: f64) -> DegradationEntry {
        DegradationEntry {
            stage: Stage::Load,
            substage: "write".to_string(),
            attempt: 1,
            failure: Some(FailureKind::SystemOverload),
            delta: amount,
            impacts: vec![DimensionImpact { dimension, amount }],
            corruption: None,
        }
    }

    #[test_case(Criticality::Critical)]
    #[test_case(Criticality::High)]
    #[test_case(Criticality::Medium)]
    #[test_case(Criticality::Low)]
    fn test_weights_sum_to_one(class: Criticality) {
        assert!((weights(class).sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_critical_weights_favor_completeness_and_privacy() {
        let critical = weights(Criticality::Critical);
        let low = weights(Criticality::Low);
        assert!(critical.get(QualityDimension::Completeness) > low.get(QualityDimension::Completeness));
        assert!(
            critical.get(QualityDimension::PrivacyCompliance)
                > low.get(QualityDimension::PrivacyCompliance)
        );
    }

    #[test]
    fn test_fresh_record_scores_perfect() {
        let record = status(json!({"name": "A", "birth_date": "1980-01-01"}));
        let score = score_record(&record);
        assert!((score.overall - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ledger_folds_and_clamps() {
        let mut record = status(json!({"name": "A"}));
        record
            .degradations
            .push(entry(QualityDimension::Timeliness, 0.7));
        record
            .degradations
            .push(entry(QualityDimension::Timeliness, 0.7));
        record
            .degradations
            .push(entry(QualityDimension::Timeliness, -0.2));

        let score = score_record(&record);
        assert!((score.dimensions.get(QualityDimension::Timeliness) - 0.2).abs() < 1e-12);
        assert!(score.overall < 1.0);
    }

    #[test]
    fn test_score_is_pure() {
        let mut record = status(json!({"name": "A", "conditions": [{"code": "I10"}]}));
        record.degradations.push(entry(QualityDimension::Accuracy, 0.3));
        assert_eq!(score_record(&record), score_record(&record));
    }

    #[test]
    fn test_removed_field_lowers_completeness() {
        let mut record = status(json!({"allergies": ["latex"], "name": "A"}));
        record.shadow.fields_mut().remove("allergies");
        let score = score_record(&record);
        assert_eq!(score.dimensions.get(QualityDimension::Completeness), 0.5);
    }

    #[test]
    fn test_invalid_date_lowers_validity() {
        let mut record = status(json!({"birth_date": "1980-01-01", "admitted_at": "2024-01-01"}));
        record
            .shadow
            .fields_mut()
            .insert("birth_date".to_string(), json!("01/01/1980"));
        let score = score_record(&record);
        assert_eq!(score.dimensions.get(QualityDimension::Validity), 0.5);
    }

    #[test]
    fn test_unmapped_condition_lowers_clinical_relevance() {
        let mut record = status(json!({"conditions": [{"code": "I10"}, {"code": "E11.9"}]}));
        record.shadow.fields_mut()["conditions"][0]["code"] = json!(UNMAPPED_CODE);
        let score = score_record(&record);
        assert_eq!(score.dimensions.get(QualityDimension::ClinicalRelevance), 0.5);
    }

    #[test]
    fn test_exposure_and_findings_lower_privacy() {
        let mut record = status(json!({"ssn": "123-45-6789", "email": "a@example.org"}));
        record.exposed_fields.insert("ssn".to_string());
        let score = score_record(&record);
        assert_eq!(score.dimensions.get(QualityDimension::PrivacyCompliance), 0.5);

        record.compliance_findings.push(ComplianceFinding {
            kind: ViolationKind::MissingJustification,
            severity: ViolationKind::MissingJustification.severity(),
            element_id: ElementId::for_field(&record.record_id, "email"),
            stage: Stage::Extract,
            substage: "query".to_string(),
            at: Utc::now(),
        });
        let score = score_record(&record);
        let expected = 1.0 - (1.0 + 0.3 * FINDING_PRIVACY_FACTOR) / 2.0;
        assert!((score.dimensions.get(QualityDimension::PrivacyCompliance) - expected).abs() < 1e-12);
    }
}
