//! Migration executor - main orchestrator for a batch
//!
//! Runs a batch through the four stages and their substages in order. Within
//! a substage every non-terminal record becomes one task on a bounded worker
//! pool; tasks own their record's working state and hand it back when done.
//! The executor then publishes the results one record at a time, in input
//! order, to the batch status, the compliance tracker and the quality monitor.
//! That single-writer publication step together with per-attempt RNG streams
//! and the simulated clock makes a seeded batch reproducible at any pool size.

use super::attempt::{RecordTask, RecordTaskOutput, SimulationModel};
use super::clock::SimClock;
use super::outcome::MigrationOutcome;
use super::retry::{RetryController, RetryPolicy};
use crate::config::StrataConfig;
use crate::core::compliance::ComplianceTracker;
use crate::core::quality::{score_record, Observation, QualityMonitor};
use crate::domain::errors::{FailureAttribution, StrataError};
use crate::domain::ids::{BatchId, RecordId};
use crate::domain::quality::Severity;
use crate::domain::record::Record;
use crate::domain::stage::{FailureKind, Stage, SubstageSpec};
use crate::domain::status::{
    BatchMigrationStatus, BatchOutcome, RecordEventKind, RecordMigrationStatus, StageResult,
    StageStatus,
};
use crate::domain::Result;
use crate::{log_batch_complete, log_batch_start, log_substage_complete, log_substage_start};
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use sha2::{Digest, Sha256};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Semaphore};
use tracing::Instrument;

/// Migration executor
pub struct MigrationExecutor {
    config: StrataConfig,
    shutdown_signal: Option<watch::Receiver<bool>>,
}

impl MigrationExecutor {
    /// Creates an executor after validating the configuration
    pub fn new(config: StrataConfig) -> Result<Self> {
        config.validate().map_err(StrataError::Configuration)?;
        Ok(Self {
            config,
            shutdown_signal: None,
        })
    }

    /// Checks `shutdown_signal` at every substage boundary and stops the
    /// batch once it reads `true`
    pub fn with_cancellation(mut self, shutdown_signal: watch::Receiver<bool>) -> Self {
        self.shutdown_signal = Some(shutdown_signal);
        self
    }

    pub fn config(&self) -> &StrataConfig {
        &self.config
    }

    fn is_cancelled(&self) -> bool {
        self.shutdown_signal
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(false)
    }

    /// Runs one batch to completion, cancellation or abort
    ///
    /// Record-level failures never surface here: they are recorded on the
    /// records. An `Err` means the batch could not start (empty batch,
    /// duplicate record ids). A fatal error during the run ends the batch as
    /// [`BatchOutcome::Aborted`] with partial progress kept.
    pub async fn run_batch(&self, records: Vec<Record>) -> Result<MigrationOutcome> {
        validate_records(&records)?;

        let seed = self.config.simulation.seed.unwrap_or_else(rand::random);
        let batch_id = derive_batch_id(seed, &records);
        let mut run = BatchRun::new(&self.config, batch_id, seed, records);

        let span = tracing::info_span!("batch", batch_id = %batch_id);
        async {
            log_batch_start!(&batch_id, run.batch.size, seed);
            let started = Instant::now();
            let outcome = self.run_stages(&mut run).await;
            run.finish(outcome);
            log_batch_complete!(
                &batch_id,
                run.batch.outcome,
                run.batch.success_rate(),
                started.elapsed()
            );
        }
        .instrument(span)
        .await;

        Ok(run.into_outcome())
    }

    async fn run_stages(&self, run: &mut BatchRun) -> BatchOutcome {
        for stage in Stage::ALL {
            run.batch.current_stage = Some(stage);
            let entered = run.enter_stage(stage);

            for spec in stage.substages() {
                if self.is_cancelled() {
                    tracing::warn!(
                        stage = %stage,
                        substage = spec.name,
                        "Cancellation requested, stopping batch"
                    );
                    return BatchOutcome::Cancelled {
                        after_stage: run.batch.last_completed_stage,
                    };
                }
                if let Err(e) = run.run_substage(stage, spec).await {
                    crate::log_error_with_context!(&e, "Substage failed, aborting batch");
                    return BatchOutcome::Aborted {
                        reason: e.to_string(),
                        last_completed_stage: run.batch.last_completed_stage,
                    };
                }
            }

            run.exit_stage(stage, &entered);
            run.batch.last_completed_stage = Some(stage);
        }

        let at = run.clock.now();
        for record in run.batch.records.values_mut() {
            record.mark_migrated(at);
        }
        BatchOutcome::Completed
    }
}

/// Runs one batch with the given configuration
pub async fn run_batch(records: Vec<Record>, config: StrataConfig) -> Result<MigrationOutcome> {
    MigrationExecutor::new(config)?.run_batch(records).await
}

fn validate_records(records: &[Record]) -> Result<()> {
    if records.is_empty() {
        return Err(StrataError::Validation(
            "batch must contain at least one record".to_string(),
        ));
    }
    let mut seen = BTreeSet::new();
    for record in records {
        if !seen.insert(&record.id) {
            return Err(StrataError::Validation(format!(
                "duplicate record id '{}' in batch",
                record.id
            )));
        }
    }
    Ok(())
}

/// Batch id derived from the seed and the record ids
fn derive_batch_id(seed: u64, records: &[Record]) -> BatchId {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_le_bytes());
    for record in records {
        hasher.update(record.id.as_str().as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    let mut high = [0u8; 8];
    let mut low = [0u8; 8];
    high.copy_from_slice(&digest[..8]);
    low.copy_from_slice(&digest[8..16]);
    BatchId::from_u64_pair(u64::from_be_bytes(high), u64::from_be_bytes(low))
}

/// Wall time of running `durations` in order on `slots` parallel workers,
/// each task going to the worker that frees up first
pub fn makespan(durations: impl IntoIterator<Item = u64>, slots: usize) -> u64 {
    let mut workers: BinaryHeap<Reverse<u64>> = BinaryHeap::new();
    let mut longest = 0;
    for duration in durations {
        let start = if workers.len() < slots.max(1) {
            0
        } else {
            workers.pop().map(|Reverse(t)| t).unwrap_or(0)
        };
        let end = start.saturating_add(duration);
        longest = longest.max(end);
        workers.push(Reverse(end));
    }
    longest
}

/// Mutable state of one running batch
struct BatchRun {
    batch: BatchMigrationStatus,
    tracker: ComplianceTracker,
    monitor: QualityMonitor,
    clock: SimClock,
    model: Arc<SimulationModel>,
    controller: Arc<RetryController>,
    semaphore: Arc<Semaphore>,
    pool_size: usize,
}

impl BatchRun {
    fn new(config: &StrataConfig, batch_id: BatchId, seed: u64, records: Vec<Record>) -> Self {
        let clock = SimClock::new(config.simulation.epoch);
        let mut tracker = ComplianceTracker::new(&config.compliance);

        let mut statuses = BTreeMap::new();
        let mut order = Vec::with_capacity(records.len());
        for record in records {
            tracker.register_record(&record);
            let status = RecordMigrationStatus::new(Arc::new(record));
            order.push(status.record_id.clone());
            statuses.insert(status.record_id.clone(), status);
        }

        let timeout_ms =
            u64::try_from(config.stages.substage_timeout().as_millis()).unwrap_or(u64::MAX);
        let controller = RetryController::new(RetryPolicy::from_config(&config.retry), timeout_ms)
            .with_realtime_pacing(config.simulation.pace_realtime);
        let pool_size = config.concurrency.max_concurrent_records;

        Self {
            batch: BatchMigrationStatus {
                batch_id,
                size: order.len(),
                source_system: config.simulation.source_system.clone(),
                target_system: config.simulation.target_system.clone(),
                strategy: config.simulation.strategy.clone(),
                seed,
                started_at: clock.now(),
                ended_at: None,
                current_stage: None,
                last_completed_stage: None,
                outcome: BatchOutcome::InProgress,
                stage_results: Vec::new(),
                records: statuses,
                record_order: order,
            },
            tracker,
            monitor: QualityMonitor::new(&config.alerts),
            clock,
            model: Arc::new(SimulationModel::new(config, seed)),
            controller: Arc::new(controller),
            semaphore: Arc::new(Semaphore::new(pool_size)),
            pool_size,
        }
    }

    /// Logs stage entry on every non-terminal record and returns their ids
    fn enter_stage(&mut self, stage: Stage) -> Vec<RecordId> {
        let at = self.clock.now();
        let mut entered = Vec::new();
        for id in &self.batch.record_order {
            if let Some(record) = self.batch.records.get_mut(id) {
                if !record.is_terminal() {
                    record.push_event(at, stage, None, RecordEventKind::StageEntered);
                    entered.push(id.clone());
                }
            }
        }
        entered
    }

    fn exit_stage(&mut self, stage: Stage, entered: &[RecordId]) {
        let at = self.clock.now();
        for id in entered {
            if let Some(record) = self.batch.records.get_mut(id) {
                let succeeded = !record.is_terminal();
                record.push_event(at, stage, None, RecordEventKind::StageExited { succeeded });
            }
        }
    }

    async fn run_substage(&mut self, stage: Stage, spec: &'static SubstageSpec) -> Result<()> {
        let started_at = self.clock.now();

        let mut carried = 0;
        let mut handles = Vec::new();
        for id in &self.batch.record_order {
            let Some(record) = self.batch.records.get(id) else {
                continue;
            };
            if record.is_terminal() {
                carried += 1;
                continue;
            }

            let task = RecordTask::new(record.clone(), stage, spec, self.model.clone(), started_at);
            let semaphore = self.semaphore.clone();
            let controller = self.controller.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| StrataError::WorkerPool(format!("Semaphore error: {e}")))?;
                Ok::<RecordTaskOutput, StrataError>(task.run(&controller).await)
            }));
        }
        log_substage_start!(stage, spec.name, handles.len(), carried);

        // join_all keeps dispatch order, whatever order the tasks finished in
        let mut outputs = Vec::with_capacity(handles.len());
        for joined in join_all(handles).await {
            outputs.push(joined??);
        }

        let duration_ms = makespan(outputs.iter().map(|o| o.report.elapsed_ms), self.pool_size);
        self.clock.advance(duration_ms);
        let ended_at = self.clock.now();

        let dispatched = outputs.len();
        let mut succeeded = 0;
        let mut retries = 0;
        let mut kinds: BTreeMap<FailureKind, usize> = BTreeMap::new();
        for output in outputs {
            retries += output.report.retries;
            match self.publish(stage, spec, started_at, output) {
                None => succeeded += 1,
                Some(kind) => *kinds.entry(kind).or_insert(0) += 1,
            }
        }
        let failed_here = dispatched - succeeded;

        let result = StageResult {
            stage,
            substage: Some(spec.name.to_string()),
            status: StageStatus::from_counts(succeeded, failed_here),
            started_at,
            ended_at,
            duration_ms,
            error_kind: most_frequent(&kinds),
            error_detail: error_detail(&kinds, failed_here, dispatched),
            records_processed: dispatched + carried,
            records_successful: succeeded,
            records_failed: failed_here + carried,
            records_dispatched: dispatched,
            records_carried_failed: carried,
            retries,
        };
        log_substage_complete!(result);
        self.batch.stage_results.push(result);
        Ok(())
    }

    /// Applies one record's output to the shared batch state
    ///
    /// Returns the failure kind when the record ended in this substage,
    /// either on its own attempts or on a compliance violation found while
    /// publishing its accesses.
    fn publish(
        &mut self,
        stage: Stage,
        spec: &SubstageSpec,
        started_at: DateTime<Utc>,
        output: RecordTaskOutput,
    ) -> Option<FailureKind> {
        let RecordTaskOutput {
            mut record,
            report,
            access_requests,
            score_updates,
        } = output;
        let offset = i64::try_from(report.elapsed_ms).unwrap_or(i64::MAX);
        let at = started_at + Duration::milliseconds(offset);

        // Every score the record passed through, in attempt order
        for (update_at, score) in score_updates {
            let obs = Observation {
                record_id: &record.record_id,
                stage,
                substage: spec.name,
                at: update_at,
            };
            self.monitor.observe_score(obs, score);
        }

        let mut findings = Vec::new();
        for request in access_requests {
            findings.extend(self.tracker.record_access(request, at));
        }
        for finding in &findings {
            record.push_event(
                finding.at,
                stage,
                Some(spec.name),
                RecordEventKind::ComplianceViolation {
                    kind: finding.kind,
                    severity: finding.severity,
                },
            );
        }
        record.compliance_findings.extend(findings.iter().cloned());
        record.apply_score(score_record(&record));

        let ending = findings
            .iter()
            .find(|f| f.severity == Severity::Critical || f.kind.ends_processing());
        if let Some(finding) = ending {
            if !record.is_terminal() {
                record.mark_terminal(FailureAttribution {
                    kind: FailureKind::SecurityViolation,
                    stage,
                    substage: spec.name.to_string(),
                    attempt: report.attempts,
                    at: finding.at,
                    detail: format!("{} on {}", finding.kind, finding.element_id),
                });
            }
        }

        let obs = Observation {
            record_id: &record.record_id,
            stage,
            substage: spec.name,
            at,
        };
        self.monitor.observe_score(obs, record.quality_score);
        if let Some(finding) = ending {
            self.monitor.observe_violation(obs, finding);
        } else if report.outcome.failure() == Some(FailureKind::SecurityViolation) {
            self.monitor.raise_compliance(obs, "security_violation");
        }

        let failed_here = if record.is_terminal() {
            record.failure.as_ref().map(|f| f.kind)
        } else {
            None
        };
        self.batch.records.insert(record.record_id.clone(), record);
        failed_here
    }

    fn finish(&mut self, outcome: BatchOutcome) {
        self.batch.outcome = outcome;
        self.batch.ended_at = Some(self.clock.now());
    }

    fn into_outcome(self) -> MigrationOutcome {
        let compliance = self.tracker.report();
        MigrationOutcome::new(self.batch, self.monitor.into_alerts(), compliance)
    }
}

/// Most frequent kind; ties go to the kind declared first
fn most_frequent(kinds: &BTreeMap<FailureKind, usize>) -> Option<FailureKind> {
    kinds
        .iter()
        .fold(None, |best: Option<(FailureKind, usize)>, (&kind, &count)| match best {
            Some((_, top)) if top >= count => best,
            _ => Some((kind, count)),
        })
        .map(|(kind, _)| kind)
}

fn error_detail(
    kinds: &BTreeMap<FailureKind, usize>,
    failed: usize,
    dispatched: usize,
) -> Option<String> {
    if failed == 0 {
        return None;
    }
    let breakdown: Vec<String> = kinds
        .iter()
        .map(|(kind, count)| format!("{kind}={count}"))
        .collect();
    Some(format!(
        "{failed} of {dispatched} records failed: {}",
        breakdown.join(", ")
    ))
}
