//! Per-record substage attempts
//!
//! Every attempt draws from its own RNG, seeded from the batch seed and the
//! attempt's coordinates (record, stage, substage, attempt number). Results are
//! therefore identical no matter how the worker pool schedules records.
//!
//! The failure kind of an attempt is the tag of the probability check that
//! fired. Ambient failure modes are checked first, in a fixed order; the
//! substage's own success check comes last and fails with the substage's
//! declared kind.

use super::retry::{RetryController, RetryEvent, RetryReport, RetryableAttempt, SimulatedAttempt};
use crate::config::{FailureModesConfig, StagesConfig, StrataConfig};
use crate::core::compliance::hash_value;
use crate::core::quality::{score_record, DegradationSimulator, OutcomeSite};
use crate::domain::compliance::{AccessRequest, ProtectionStatus};
use crate::domain::errors::FailureAttribution;
use crate::domain::ids::RecordId;
use crate::domain::record::protected_fields;
use crate::domain::stage::{FailureKind, Stage, SubstageSpec};
use crate::domain::status::{RecordEventKind, RecordMigrationStatus, RecordState};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Tagged outcome of one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    Failed(FailureKind),
}

impl AttemptOutcome {
    /// Failure kind, if the attempt failed
    pub fn failure(&self) -> Option<FailureKind> {
        match self {
            Self::Succeeded => None,
            Self::Failed(kind) => Some(*kind),
        }
    }
}

/// RNG for one draw site of one record in one substage
///
/// `purpose` separates independent draw sites that share coordinates
/// (the attempt itself, timeout handling, access logging).
pub fn attempt_rng(
    batch_seed: u64,
    record_id: &RecordId,
    stage: Stage,
    substage: &str,
    purpose: &str,
    attempt: u32,
) -> StdRng {
    let mut hasher = Sha256::new();
    hasher.update(batch_seed.to_le_bytes());
    for part in [record_id.as_str(), stage.as_str(), substage, purpose] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hasher.update(attempt.to_le_bytes());
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&hasher.finalize());
    StdRng::from_seed(seed)
}

fn fires<R: Rng + ?Sized>(rng: &mut R, probability: f64) -> bool {
    rng.gen::<f64>() < probability
}

/// Probability model for attempt outcomes and latencies
#[derive(Debug, Clone)]
pub struct FailureModel {
    failure_modes: FailureModesConfig,
    stages: StagesConfig,
}

impl FailureModel {
    pub fn new(failure_modes: FailureModesConfig, stages: StagesConfig) -> Self {
        Self {
            failure_modes,
            stages,
        }
    }

    /// Simulated latency of one attempt: the substage's share of the stage
    /// base duration, varied by ± `duration_variance`
    pub fn latency_ms<R: Rng + ?Sized>(&self, rng: &mut R, stage: Stage) -> u64 {
        let base = self.stages.substage_base_duration_ms(stage);
        let variance = self.stages.duration_variance;
        let factor = 1.0 + variance * (rng.gen::<f64>() * 2.0 - 1.0);
        (base * factor).round().max(0.0) as u64
    }

    /// Draws the outcome of one attempt
    pub fn draw<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        stage: Stage,
        spec: &SubstageSpec,
    ) -> AttemptOutcome {
        let modes = &self.failure_modes;
        let ambient = [
            (modes.network_failure_rate, FailureKind::NetworkTimeout),
            (modes.system_overload_rate, FailureKind::SystemOverload),
            (modes.data_corruption_rate, FailureKind::DataCorruption),
        ];
        for (rate, kind) in ambient {
            if fires(rng, rate) {
                return AttemptOutcome::Failed(kind);
            }
        }
        if spec.touches_protected && fires(rng, modes.security_violation_rate) {
            return AttemptOutcome::Failed(FailureKind::SecurityViolation);
        }

        let success_rate = self.stages.substage_success_rate(stage, spec.name);
        if fires(rng, success_rate) {
            AttemptOutcome::Succeeded
        } else {
            AttemptOutcome::Failed(spec.failure_kind)
        }
    }
}

/// Read-only simulation state shared by every record task of a batch
#[derive(Debug)]
pub struct SimulationModel {
    pub seed: u64,
    pub failures: FailureModel,
    pub degradation: DegradationSimulator,
    pub missing_justification_rate: f64,
}

impl SimulationModel {
    pub fn new(config: &StrataConfig, seed: u64) -> Self {
        Self {
            seed,
            failures: FailureModel::new(config.failure_modes.clone(), config.stages.clone()),
            degradation: DegradationSimulator::new(&config.quality),
            missing_justification_rate: config.compliance.missing_justification_rate,
        }
    }
}

/// Everything a record task hands back to the executor
#[derive(Debug)]
pub struct RecordTaskOutput {
    pub record: RecordMigrationStatus,
    pub report: RetryReport,
    /// Protected-field accesses to publish to the compliance tracker
    pub access_requests: Vec<AccessRequest>,
    /// Overall score after each degradation, in the order applied
    pub score_updates: Vec<(DateTime<Utc>, f64)>,
}

/// Degradation drawn by an attempt, charged once the retry controller
/// reports how the attempt ended
struct PendingDegradation {
    rng: StdRng,
    attempt: u32,
    failure: Option<FailureKind>,
    elapsed_ms: u64,
}

/// One record's run through one substage
///
/// Owns a working copy of the record's status; nothing shared is touched
/// until the executor publishes the output.
pub struct RecordTask {
    record: RecordMigrationStatus,
    stage: Stage,
    spec: &'static SubstageSpec,
    model: Arc<SimulationModel>,
    started_at: DateTime<Utc>,
    max_attempts: u32,
    pending: Option<PendingDegradation>,
    score_updates: Vec<(DateTime<Utc>, f64)>,
}

impl RecordTask {
    pub fn new(
        mut record: RecordMigrationStatus,
        stage: Stage,
        spec: &'static SubstageSpec,
        model: Arc<SimulationModel>,
        started_at: DateTime<Utc>,
    ) -> Self {
        record.state = RecordState::InProgress;
        record.current_stage = Some(stage);
        record.current_substage = Some(spec.name.to_string());
        Self {
            record,
            stage,
            spec,
            model,
            started_at,
            max_attempts: 1,
            pending: None,
            score_updates: Vec::new(),
        }
    }

    /// Runs the record through the substage under the retry controller
    pub async fn run(mut self, controller: &RetryController) -> RecordTaskOutput {
        self.max_attempts = controller.policy().max_attempts();
        let report = controller.execute(&mut self).await;
        self.finish(report)
    }

    fn at(&self, elapsed_ms: u64) -> DateTime<Utc> {
        self.started_at + chrono::Duration::milliseconds(elapsed_ms as i64)
    }

    fn degrade(
        &mut self,
        rng: &mut StdRng,
        attempt: u32,
        failure: Option<FailureKind>,
        elapsed_ms: u64,
    ) {
        let site = OutcomeSite {
            stage: self.stage,
            substage: self.spec.name,
            attempt,
        };
        let Some(entry) = self.model.degradation.simulate(
            rng,
            &self.record.shadow,
            self.record.criticality,
            site,
            failure,
        ) else {
            return;
        };

        let delta = entry.delta;
        let corruption = entry.corruption.as_ref().map(|c| c.action);
        self.model.degradation.apply(&mut self.record, entry);
        let score = score_record(&self.record);
        self.record.apply_score(score);

        let at = self.at(elapsed_ms);
        self.score_updates.push((at, score.overall));
        self.record.push_event(
            at,
            self.stage,
            Some(self.spec.name),
            RecordEventKind::Degraded {
                delta,
                failure,
                corruption,
                score_after: score.overall,
            },
        );
    }

    /// Charges the degradation of the attempt that just ended
    fn settle_pending(&mut self) {
        if let Some(mut pending) = self.pending.take() {
            self.degrade(
                &mut pending.rng,
                pending.attempt,
                pending.failure,
                pending.elapsed_ms,
            );
        }
    }

    /// An attempt that runs past the deadline is charged as an overload
    /// instead of its own outcome. A deadline passed during backoff charges
    /// nothing more: the failed attempt has already paid.
    fn charge_timeout(&mut self, attempt: u32, elapsed_ms: u64) {
        if self.pending.take().is_none() {
            return;
        }
        let mut rng = attempt_rng(
            self.model.seed,
            &self.record.record_id,
            self.stage,
            self.spec.name,
            "timeout",
            attempt,
        );
        self.degrade(
            &mut rng,
            attempt,
            Some(FailureKind::SystemOverload),
            elapsed_ms,
        );
    }

    fn finish(mut self, report: RetryReport) -> RecordTaskOutput {
        self.record.retries += report.retries;

        let end = self.at(report.elapsed_ms);
        match report.outcome {
            AttemptOutcome::Succeeded => {
                self.record.substages_completed += 1;
            }
            AttemptOutcome::Failed(kind) => {
                if kind == FailureKind::ValidationFailure {
                    self.record.push_event(
                        end,
                        self.stage,
                        Some(self.spec.name),
                        RecordEventKind::ValidationError {
                            detail: format!("record rejected by {}", self.spec.name),
                        },
                    );
                }
                let detail = if report.timed_out {
                    format!(
                        "exceeded substage timeout after {} attempt(s)",
                        report.attempts
                    )
                } else {
                    format!(
                        "{} on attempt {} of {}",
                        kind, report.attempts, self.max_attempts
                    )
                };
                self.record.mark_terminal(FailureAttribution {
                    kind,
                    stage: self.stage,
                    substage: self.spec.name.to_string(),
                    attempt: report.attempts,
                    at: end,
                    detail,
                });
            }
        }

        let access_requests = if self.spec.touches_protected {
            self.access_requests()
        } else {
            Vec::new()
        };

        RecordTaskOutput {
            record: self.record,
            report,
            access_requests,
            score_updates: self.score_updates,
        }
    }

    /// One access per protected field touched by this substage
    fn access_requests(&self) -> Vec<AccessRequest> {
        let mut rng = attempt_rng(
            self.model.seed,
            &self.record.record_id,
            self.stage,
            self.spec.name,
            "access",
            0,
        );
        let fields = self.record.shadow.fields();
        protected_fields(fields)
            .into_iter()
            .map(|(field, _)| {
                let missing = fires(&mut rng, self.model.missing_justification_rate);
                let resulting_status = if self.record.exposed_fields.contains(&field) {
                    ProtectionStatus::Exposed
                } else {
                    ProtectionStatus::Protected
                };
                AccessRequest {
                    record_id: self.record.record_id.clone(),
                    value_hash: hash_value(fields.get(&field).unwrap_or(&Value::Null)),
                    field,
                    accessor: self.stage.accessor_role().to_string(),
                    justification: (!missing).then(|| self.spec.justification.to_string()),
                    stage: self.stage,
                    substage: self.spec.name.to_string(),
                    resulting_status,
                }
            })
            .collect()
    }
}

impl RetryableAttempt for RecordTask {
    fn attempt(&mut self, attempt: u32, elapsed_ms: u64) -> SimulatedAttempt {
        let mut rng = attempt_rng(
            self.model.seed,
            &self.record.record_id,
            self.stage,
            self.spec.name,
            "attempt",
            attempt,
        );
        let latency_ms = self.model.failures.latency_ms(&mut rng, self.stage);
        let outcome = self.model.failures.draw(&mut rng, self.stage, self.spec);
        self.pending = Some(PendingDegradation {
            rng,
            attempt,
            failure: outcome.failure(),
            elapsed_ms: elapsed_ms.saturating_add(latency_ms),
        });
        SimulatedAttempt {
            outcome,
            latency_ms,
        }
    }

    fn on_event(&mut self, event: RetryEvent, elapsed_ms: u64) {
        match event {
            RetryEvent::TimedOut { attempt, .. } => self.charge_timeout(attempt, elapsed_ms),
            _ => self.settle_pending(),
        }
        let at = self.at(elapsed_ms);
        let kind = match event {
            RetryEvent::Succeeded { attempt } => RecordEventKind::AttemptSucceeded { attempt },
            RetryEvent::Failed {
                attempt,
                max_attempts,
                kind,
                will_retry,
                delay_ms,
            } => {
                if will_retry {
                    crate::log_retry_attempt!(
                        self.record.record_id,
                        self.spec.name,
                        attempt,
                        max_attempts,
                        kind,
                        delay_ms
                    );
                }
                RecordEventKind::AttemptFailed {
                    attempt,
                    max_attempts,
                    kind,
                    will_retry,
                }
            }
            RetryEvent::TimedOut {
                elapsed_ms,
                limit_ms,
                ..
            } => RecordEventKind::TimedOut {
                elapsed_ms,
                limit_ms,
            },
        };
        self.record
            .push_event(at, self.stage, Some(self.spec.name), kind);
    }
}
