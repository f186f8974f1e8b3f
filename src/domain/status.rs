//! Migration status model
//!
//! [`StageResult`] is created once per substage execution and appended to the
//! batch in execution order. [`RecordMigrationStatus`] holds per-record state
//! and is only ever marked terminal, never removed. [`BatchMigrationStatus`]
//! stores history only; its metrics are computed on demand.

use super::compliance::{ComplianceFinding, ViolationKind};
use super::errors::FailureAttribution;
use super::ids::{BatchId, RecordId};
use super::quality::{CorruptionAction, DegradationEntry, DimensionScores, QualityScore, Severity};
use super::record::{Criticality, Record, ShadowRecord};
use super::stage::{FailureKind, Stage};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Status of a substage execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Completed,
    Failed,
    PartialFailure,
}

impl StageStatus {
    /// Status policy over the dispatched records of a substage
    ///
    /// Completed if every dispatched record succeeded, partial failure if some
    /// succeeded and some failed, failed if none succeeded.
    pub fn from_counts(succeeded: usize, failed: usize) -> Self {
        match (succeeded, failed) {
            (s, 0) if s > 0 => Self::Completed,
            (0, _) => Self::Failed,
            _ => Self::PartialFailure,
        }
    }
}

/// Result of one substage execution
#[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
pub struct StageResult {
    pub stage: Stage,
    pub substage: Option<String>,
    pub status: StageStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,

    /// Most frequent failure kind among records that failed here
    pub error_kind: Option<FailureKind>,
    pub error_detail: Option<String>,

    /// Dispatched plus carried-forward terminal records
    pub records_processed: usize,
    pub records_successful: usize,
    /// Failed here plus carried-forward terminal records
    pub records_failed: usize,

    /// Non-terminal records scheduled onto the worker pool
    pub records_dispatched: usize,
    /// Records already terminal on entry, counted as failed
    pub records_carried_failed: usize,

    /// Retries performed across all dispatched records
    pub retries: u32,
}

impl StageResult {
    /// Records that failed in this substage itself
    pub fn records_failed_here(&self) -> usize {
        self.records_failed - self.records_carried_failed
    }

    /// Success rate over processed records
    pub fn success_rate(&self) -> f64 {
        if self.records_processed == 0 {
            return 0.0;
        }
        self.records_successful as f64 / self.records_processed as f64
    }
}

/// Event kinds in a record's log
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RecordEventKind {
    StageEntered,
    StageExited {
        succeeded: bool,
    },
    AttemptSucceeded {
        attempt: u32,
    },
    /// Attempt N of M failed; `will_retry` separates retries from the final outcome
    AttemptFailed {
        attempt: u32,
        max_attempts: u32,
        kind: FailureKind,
        will_retry: bool,
    },
    TimedOut {
        elapsed_ms: u64,
        limit_ms: u64,
    },
    Degraded {
        delta: f64,
        failure: Option<FailureKind>,
        corruption: Option<CorruptionAction>,
        score_after: f64,
    },
    ValidationError {
        detail: String,
    },
    ComplianceViolation {
        kind: ViolationKind,
        severity: Severity,
    },
    Terminal {
        kind: FailureKind,
    },
    Migrated,
}

/// One entry in a record's ordered event log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordEvent {
    pub at: DateTime<Utc>,
    pub stage: Stage,
    pub substage: Option<String>,
    #[serde(flatten)]
    pub kind: RecordEventKind,
}

/// Lifecycle state of a record within a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    Pending,
    InProgress,
    Migrated,
    Failed,
}

/// Per-record migration state
#[derive(Debug, Clone, Serialize)]
pub struct RecordMigrationStatus {
    pub record_id: RecordId,
    pub criticality: Criticality,
    pub state: RecordState,
    pub current_stage: Option<Stage>,
    pub current_substage: Option<String>,
    pub events: Vec<RecordEvent>,

    /// Last computed composite score (recomputable from the fields below)
    pub quality_score: f64,
    pub dimensions: DimensionScores,

    /// Permanently excluded from further processing in this batch
    pub terminal: bool,
    pub failure: Option<FailureAttribution>,

    /// Retries across all substages
    pub retries: u32,
    pub substages_completed: u32,

    /// Migration-scoped copy of the clinical fields
    pub shadow: ShadowRecord,
    pub degradations: Vec<DegradationEntry>,
    pub compliance_findings: Vec<ComplianceFinding>,
    pub exposed_fields: BTreeSet<String>,
}

impl RecordMigrationStatus {
    /// Fresh status for a record at batch start
    pub fn new(source: Arc<Record>) -> Self {
        let score = QualityScore::perfect();
        Self {
            record_id: source.id.clone(),
            criticality: source.criticality(),
            state: RecordState::Pending,
            current_stage: None,
            current_substage: None,
            events: Vec::new(),
            quality_score: score.overall,
            dimensions: score.dimensions,
            terminal: false,
            failure: None,
            retries: 0,
            substages_completed: 0,
            shadow: ShadowRecord::new(source),
            degradations: Vec::new(),
            compliance_findings: Vec::new(),
            exposed_fields: BTreeSet::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Appends an event to the log
    pub fn push_event(
        &mut self,
        at: DateTime<Utc>,
        stage: Stage,
        substage: Option<&str>,
        kind: RecordEventKind,
    ) {
        self.events.push(RecordEvent {
            at,
            stage,
            substage: substage.map(str::to_string),
            kind,
        });
    }

    /// Stores a freshly computed score
    pub fn apply_score(&mut self, score: QualityScore) {
        self.quality_score = score.overall;
        self.dimensions = score.dimensions;
    }

    /// Marks the record terminal with its final failure
    pub fn mark_terminal(&mut self, attribution: FailureAttribution) {
        let at = attribution.at;
        let stage = attribution.stage;
        let substage = attribution.substage.clone();
        let kind = attribution.kind;
        self.terminal = true;
        self.state = RecordState::Failed;
        self.failure = Some(attribution);
        self.push_event(at, stage, Some(&substage), RecordEventKind::Terminal { kind });
    }

    /// Marks the record as having completed every stage
    pub fn mark_migrated(&mut self, at: DateTime<Utc>) {
        if self.terminal {
            return;
        }
        self.state = RecordState::Migrated;
        let stage = self.current_stage.unwrap_or(Stage::Load);
        self.push_event(at, stage, None, RecordEventKind::Migrated);
    }

    /// Number of failed attempts in the event log
    pub fn failed_attempts(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, RecordEventKind::AttemptFailed { .. }))
            .count()
    }
}

/// How a batch ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BatchOutcome {
    InProgress,
    Completed,
    /// Abort requested; honored at a substage boundary
    Cancelled { after_stage: Option<Stage> },
    /// Fatal batch-level error; partial progress is kept
    Aborted {
        reason: String,
        last_completed_stage: Option<Stage>,
    },
}

/// Batch-level migration status
#[derive(Debug, Clone, Serialize)]
pub struct BatchMigrationStatus {
    pub batch_id: BatchId,
    pub size: usize,
    pub source_system: String,
    pub target_system: String,
    pub strategy: String,

    /// Effective seed (drawn from entropy when not configured)
    pub seed: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub current_stage: Option<Stage>,
    pub last_completed_stage: Option<Stage>,
    pub outcome: BatchOutcome,

    /// Insertion order is execution order
    pub stage_results: Vec<StageResult>,
    pub records: BTreeMap<RecordId, RecordMigrationStatus>,

    /// Input order of the records
    pub record_order: Vec<RecordId>,
}

impl BatchMigrationStatus {
    /// Records in input order
    pub fn records_in_order(&self) -> impl Iterator<Item = &RecordMigrationStatus> + '_ {
        self.record_order.iter().filter_map(|id| self.records.get(id))
    }

    /// Successful records over total records
    pub fn success_rate(&self) -> f64 {
        if self.size == 0 {
            return 0.0;
        }
        let migrated = self
            .records
            .values()
            .filter(|r| r.state == RecordState::Migrated)
            .count();
        migrated as f64 / self.size as f64
    }

    /// Mean of current record quality scores
    pub fn average_quality(&self) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        self.records.values().map(|r| r.quality_score).sum::<f64>() / self.records.len() as f64
    }

    /// Failed attempts across all records, retried ones included
    pub fn total_errors(&self) -> usize {
        self.records.values().map(|r| r.failed_attempts()).sum()
    }

    /// Whether the batch ran every stage
    pub fn is_complete(&self) -> bool {
        self.outcome == BatchOutcome::Completed
    }
}
