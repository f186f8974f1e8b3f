//! Batch aggregator
//!
//! Folds the stage-result sequence and per-record statuses into batch
//! analytics. [`analyze`] reads only its arguments and walks them in a fixed
//! order, so recomputing from the same history always yields the same value.

use crate::core::compliance::ComplianceReport;
use crate::domain::quality::{AlertTrigger, QualityAlert, Severity};
use crate::domain::record::Criticality;
use crate::domain::stage::{FailureKind, Stage};
use crate::domain::status::{
    BatchMigrationStatus, RecordEventKind, RecordState, StageResult, StageStatus,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-substage success-rate variance above which smaller batches are advised
const HIGH_SUBSTAGE_VARIANCE: f64 = 0.01;
/// Share of records lost to transient failures that warrants more retries
const TRANSIENT_LOSS_SHARE: f64 = 0.05;
/// Share of records lost to mapping errors that warrants a mapping review
const MAPPING_LOSS_SHARE: f64 = 0.02;
/// Mean quality below which decay is investigated
const QUALITY_DECAY_MEAN: f64 = 0.85;

/// Success figures of one stage, taken from its last substage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageAnalytics {
    pub success_rate: f64,
    pub records_processed: usize,
    pub records_successful: usize,
    pub records_failed: usize,
    pub duration_ms: u64,
    pub retries: u32,
}

/// Figures of one substage execution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubstageAnalytics {
    pub stage: Stage,
    pub substage: String,
    pub status: StageStatus,
    /// Successful over dispatched records
    pub success_rate: f64,
    pub records_dispatched: usize,
    pub records_failed_here: usize,
    pub duration_ms: u64,
    pub retries: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,
}

/// Distribution of quality scores
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityStats {
    pub count: usize,
    pub mean: f64,
    pub variance: f64,
    pub min: f64,
    pub max: f64,
}

impl QualityStats {
    /// Population statistics of a sequence of scores
    pub fn from_scores(scores: impl IntoIterator<Item = f64>) -> Self {
        let scores: Vec<f64> = scores.into_iter().collect();
        if scores.is_empty() {
            return Self {
                count: 0,
                mean: 0.0,
                variance: 0.0,
                min: 0.0,
                max: 0.0,
            };
        }
        let n = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        Self {
            count: scores.len(),
            mean,
            variance,
            min: scores.iter().copied().fold(f64::INFINITY, f64::min),
            max: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Heuristic recommendation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recommendation {
    ReduceBatchSize { substage_variance: f64 },
    RaiseRetryBudget { transient_failures: usize },
    ReviewMappingTables { mapping_errors: usize },
    TightenAccessControl { violations: usize, compliance_score: f64 },
    InvestigateQualityDecay { mean_quality: f64, critical_alerts: usize },
}

impl Recommendation {
    /// Human-readable advice
    pub fn message(&self) -> String {
        match self {
            Self::ReduceBatchSize { substage_variance } => format!(
                "Substage success rates vary widely (variance {substage_variance:.3}); reduce batch size"
            ),
            Self::RaiseRetryBudget { transient_failures } => format!(
                "{transient_failures} records were lost to transient failures; raise the retry budget"
            ),
            Self::ReviewMappingTables { mapping_errors } => format!(
                "{mapping_errors} records failed code mapping; review terminology mapping tables"
            ),
            Self::TightenAccessControl {
                violations,
                compliance_score,
            } => format!(
                "{violations} compliance violations (score {compliance_score:.3}); tighten access control"
            ),
            Self::InvestigateQualityDecay {
                mean_quality,
                critical_alerts,
            } => format!(
                "Mean quality {mean_quality:.3} with {critical_alerts} critical score alerts; investigate quality decay"
            ),
        }
    }
}

/// Batch-level analytics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchAnalytics {
    pub total_records: usize,
    pub migrated_records: usize,
    pub failed_records: usize,

    /// Migrated records over total records
    pub overall_success_rate: f64,
    pub stage_success: BTreeMap<Stage, StageAnalytics>,
    pub substages: Vec<SubstageAnalytics>,
    pub substage_success_variance: f64,

    pub quality: QualityStats,
    pub quality_by_criticality: BTreeMap<Criticality, QualityStats>,

    /// Terminal failure kind of each failed record
    pub failure_kinds: BTreeMap<FailureKind, usize>,
    /// Every failed attempt, retried ones included
    pub attempt_failure_kinds: BTreeMap<FailureKind, usize>,
    pub failures_by_stage: BTreeMap<Stage, usize>,

    pub total_retries: u32,
    pub total_errors: usize,

    pub alerts_raised: usize,
    pub alerts_open: usize,
    pub alerts_by_severity: BTreeMap<Severity, usize>,

    pub compliance_score: f64,
    pub recommendations: Vec<Recommendation>,
}

impl BatchAnalytics {
    /// Recommendation messages in order
    pub fn recommendation_messages(&self) -> Vec<String> {
        self.recommendations.iter().map(Recommendation::message).collect()
    }
}

/// Recomputes batch analytics from the full history
pub fn analyze(
    batch: &BatchMigrationStatus,
    alerts: &[QualityAlert],
    compliance: &ComplianceReport,
) -> BatchAnalytics {
    let total_records = batch.size;
    let migrated_records = batch
        .records_in_order()
        .filter(|r| r.state == RecordState::Migrated)
        .count();
    let failed_records = batch.records_in_order().filter(|r| r.is_terminal()).count();

    let stage_success = stage_analytics(&batch.stage_results);
    let substages: Vec<SubstageAnalytics> =
        batch.stage_results.iter().map(substage_analytics).collect();
    let substage_success_variance =
        QualityStats::from_scores(substages.iter().map(|s| s.success_rate)).variance;

    let quality = QualityStats::from_scores(batch.records_in_order().map(|r| r.quality_score));
    let mut quality_by_criticality = BTreeMap::new();
    for class in Criticality::ALL {
        let scores: Vec<f64> = batch
            .records_in_order()
            .filter(|r| r.criticality == class)
            .map(|r| r.quality_score)
            .collect();
        if !scores.is_empty() {
            quality_by_criticality.insert(class, QualityStats::from_scores(scores));
        }
    }

    let mut failure_kinds = BTreeMap::new();
    let mut failures_by_stage = BTreeMap::new();
    let mut attempt_failure_kinds = BTreeMap::new();
    let mut total_retries = 0;
    for record in batch.records_in_order() {
        total_retries += record.retries;
        if let Some(failure) = &record.failure {
            *failure_kinds.entry(failure.kind).or_insert(0) += 1;
            *failures_by_stage.entry(failure.stage).or_insert(0) += 1;
        }
        for event in &record.events {
            if let RecordEventKind::AttemptFailed { kind, .. } = event.kind {
                *attempt_failure_kinds.entry(kind).or_insert(0) += 1;
            }
        }
    }
    let total_errors = attempt_failure_kinds.values().sum();

    let mut alerts_by_severity = BTreeMap::new();
    for alert in alerts {
        *alerts_by_severity.entry(alert.severity).or_insert(0) += 1;
    }
    let critical_score_alerts = alerts
        .iter()
        .filter(|a| {
            a.severity == Severity::Critical
                && matches!(a.trigger, AlertTrigger::ScoreThreshold { .. })
        })
        .count();

    let recommendations = recommend(&Signals {
        total_records,
        substage_success_variance,
        failure_kinds: &failure_kinds,
        violations: compliance.violations.len(),
        compliance_score: compliance.score,
        mean_quality: quality.mean,
        critical_score_alerts,
    });

    BatchAnalytics {
        total_records,
        migrated_records,
        failed_records,
        overall_success_rate: if total_records == 0 {
            0.0
        } else {
            migrated_records as f64 / total_records as f64
        },
        stage_success,
        substages,
        substage_success_variance,
        quality,
        quality_by_criticality,
        failure_kinds,
        attempt_failure_kinds,
        failures_by_stage,
        total_retries,
        total_errors,
        alerts_raised: alerts.len(),
        alerts_open: alerts.iter().filter(|a| !a.resolved).count(),
        alerts_by_severity,
        compliance_score: compliance.score,
        recommendations,
    }
}

fn stage_analytics(results: &[StageResult]) -> BTreeMap<Stage, StageAnalytics> {
    let mut out = BTreeMap::new();
    for stage in Stage::ALL {
        let rows: Vec<&StageResult> = results.iter().filter(|r| r.stage == stage).collect();
        let Some(last) = rows.last() else {
            continue;
        };
        out.insert(
            stage,
            StageAnalytics {
                success_rate: last.success_rate(),
                records_processed: last.records_processed,
                records_successful: last.records_successful,
                records_failed: last.records_failed,
                duration_ms: rows.iter().map(|r| r.duration_ms).sum(),
                retries: rows.iter().map(|r| r.retries).sum(),
            },
        );
    }
    out
}

fn substage_analytics(result: &StageResult) -> SubstageAnalytics {
    let success_rate = if result.records_dispatched == 0 {
        0.0
    } else {
        result.records_successful as f64 / result.records_dispatched as f64
    };
    SubstageAnalytics {
        stage: result.stage,
        substage: result.substage.clone().unwrap_or_default(),
        status: result.status,
        success_rate,
        records_dispatched: result.records_dispatched,
        records_failed_here: result.records_failed_here(),
        duration_ms: result.duration_ms,
        retries: result.retries,
        error_kind: result.error_kind,
    }
}

struct Signals<'a> {
    total_records: usize,
    substage_success_variance: f64,
    failure_kinds: &'a BTreeMap<FailureKind, usize>,
    violations: usize,
    compliance_score: f64,
    mean_quality: f64,
    critical_score_alerts: usize,
}

fn recommend(signals: &Signals<'_>) -> Vec<Recommendation> {
    let mut out = Vec::new();
    let total = signals.total_records.max(1) as f64;

    if signals.substage_success_variance > HIGH_SUBSTAGE_VARIANCE {
        out.push(Recommendation::ReduceBatchSize {
            substage_variance: signals.substage_success_variance,
        });
    }

    let transient_failures: usize = signals
        .failure_kinds
        .iter()
        .filter(|(kind, _)| kind.is_transient())
        .map(|(_, count)| count)
        .sum();
    if transient_failures > 0 && transient_failures as f64 / total >= TRANSIENT_LOSS_SHARE {
        out.push(Recommendation::RaiseRetryBudget { transient_failures });
    }

    let mapping_errors = signals
        .failure_kinds
        .get(&FailureKind::MappingError)
        .copied()
        .unwrap_or(0);
    if mapping_errors > 0 && mapping_errors as f64 / total >= MAPPING_LOSS_SHARE {
        out.push(Recommendation::ReviewMappingTables { mapping_errors });
    }

    if signals.violations > 0 {
        out.push(Recommendation::TightenAccessControl {
            violations: signals.violations,
            compliance_score: signals.compliance_score,
        });
    }

    if signals.mean_quality < QUALITY_DECAY_MEAN || signals.critical_score_alerts > 0 {
        out.push(Recommendation::InvestigateQualityDecay {
            mean_quality: signals.mean_quality,
            critical_alerts: signals.critical_score_alerts,
        });
    }

    out
}
