//! Retry controller
//!
//! Wraps a per-record substage attempt with bounded retry and backoff. The
//! wrapped operation is anything implementing [`RetryableAttempt`]; the
//! controller owns the policy, the simulated deadline and the attempt
//! numbering, and reports every attempt back through
//! [`RetryableAttempt::on_event`].

use super::attempt::AttemptOutcome;
use crate::config::RetryConfig;
use crate::domain::stage::FailureKind;
use std::time::Duration;

/// Retry policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    /// 1.0 keeps the delay fixed
    pub backoff_multiplier: f64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// Creates a policy from the retry configuration
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.retry_attempts,
            initial_delay_ms: config.retry_delay_ms,
            backoff_multiplier: config.backoff_multiplier,
            max_delay_ms: config.max_delay_ms,
        }
    }

    /// A policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            initial_delay_ms: 0,
            backoff_multiplier: 1.0,
            max_delay_ms: 0,
        }
    }

    /// Total attempts allowed, first attempt included
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before the retry that follows failed attempt `attempt` (1-based)
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        if delay.is_finite() {
            (delay as u64).min(self.max_delay_ms)
        } else {
            self.max_delay_ms
        }
    }
}

/// Result of one simulated attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedAttempt {
    pub outcome: AttemptOutcome,
    /// Simulated time the attempt took
    pub latency_ms: u64,
}

/// What the controller reports about each attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetryEvent {
    Succeeded {
        attempt: u32,
    },
    Failed {
        attempt: u32,
        max_attempts: u32,
        kind: FailureKind,
        will_retry: bool,
        delay_ms: u64,
    },
    /// The substage deadline passed; the record fails as overloaded
    TimedOut {
        attempt: u32,
        elapsed_ms: u64,
        limit_ms: u64,
    },
}

/// A per-record operation the controller can retry
pub trait RetryableAttempt {
    /// Runs attempt number `attempt` (1-based) starting at `elapsed_ms`
    /// simulated milliseconds into the substage
    fn attempt(&mut self, attempt: u32, elapsed_ms: u64) -> SimulatedAttempt;

    /// Observes a controller decision at `elapsed_ms`
    fn on_event(&mut self, _event: RetryEvent, _elapsed_ms: u64) {}
}

/// Final report for one record in one substage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryReport {
    pub outcome: AttemptOutcome,
    pub attempts: u32,
    pub retries: u32,
    /// Simulated time spent, capped at the deadline
    pub elapsed_ms: u64,
    pub timed_out: bool,
}

impl RetryReport {
    pub fn succeeded(&self) -> bool {
        self.outcome == AttemptOutcome::Succeeded
    }
}

/// Retry controller
#[derive(Debug, Clone)]
pub struct RetryController {
    policy: RetryPolicy,
    deadline_ms: u64,
    pace_realtime: bool,
}

impl RetryController {
    /// Creates a controller with a per-record simulated deadline
    pub fn new(policy: RetryPolicy, deadline_ms: u64) -> Self {
        Self {
            policy,
            deadline_ms,
            pace_realtime: false,
        }
    }

    /// Actually sleeps for retry delays
    pub fn with_realtime_pacing(mut self, pace: bool) -> Self {
        self.pace_realtime = pace;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs the operation until it succeeds, fails persistently, exhausts
    /// its retries or runs past the deadline
    ///
    /// Transient failures are retried; data-integrity and compliance failures
    /// end the loop on the attempt that produced them. The reported outcome is
    /// always the outcome of the last attempt, or `SystemOverload` on timeout.
    pub async fn execute<A>(&self, op: &mut A) -> RetryReport
    where
        A: RetryableAttempt + ?Sized,
    {
        let max_attempts = self.policy.max_attempts();
        let mut elapsed_ms: u64 = 0;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let result = op.attempt(attempt, elapsed_ms);
            elapsed_ms = elapsed_ms.saturating_add(result.latency_ms);

            if elapsed_ms > self.deadline_ms {
                return self.time_out(op, attempt, elapsed_ms);
            }

            let kind = match result.outcome {
                AttemptOutcome::Succeeded => {
                    op.on_event(RetryEvent::Succeeded { attempt }, elapsed_ms);
                    return RetryReport {
                        outcome: result.outcome,
                        attempts: attempt,
                        retries: attempt - 1,
                        elapsed_ms,
                        timed_out: false,
                    };
                }
                AttemptOutcome::Failed(kind) => kind,
            };

            let will_retry = kind.is_transient() && attempt < max_attempts;
            let delay_ms = if will_retry {
                self.policy.delay_ms(attempt)
            } else {
                0
            };

            op.on_event(
                RetryEvent::Failed {
                    attempt,
                    max_attempts,
                    kind,
                    will_retry,
                    delay_ms,
                },
                elapsed_ms,
            );

            if !will_retry {
                return RetryReport {
                    outcome: result.outcome,
                    attempts: attempt,
                    retries: attempt - 1,
                    elapsed_ms,
                    timed_out: false,
                };
            }

            elapsed_ms = elapsed_ms.saturating_add(delay_ms);
            if elapsed_ms > self.deadline_ms {
                return self.time_out(op, attempt, elapsed_ms);
            }

            if self.pace_realtime && delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }

    fn time_out<A>(&self, op: &mut A, attempt: u32, elapsed_ms: u64) -> RetryReport
    where
        A: RetryableAttempt + ?Sized,
    {
        op.on_event(
            RetryEvent::TimedOut {
                attempt,
                elapsed_ms,
                limit_ms: self.deadline_ms,
            },
            self.deadline_ms,
        );
        RetryReport {
            outcome: AttemptOutcome::Failed(FailureKind::SystemOverload),
            attempts: attempt,
            retries: attempt - 1,
            elapsed_ms: self.deadline_ms,
            timed_out: true,
        }
    }
}
