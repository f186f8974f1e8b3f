//! Simulated clock
//!
//! Simulated time starts at the configured epoch and only moves when the
//! executor advances it by a substage's makespan. Wall-clock time never leaks
//! into results.

use chrono::{DateTime, Duration, Utc};

/// Monotonic simulated clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimClock {
    epoch: DateTime<Utc>,
    offset_ms: u64,
}

impl SimClock {
    pub fn new(epoch: DateTime<Utc>) -> Self {
        Self {
            epoch,
            offset_ms: 0,
        }
    }

    /// Current simulated time
    pub fn now(&self) -> DateTime<Utc> {
        self.at(self.offset_ms)
    }

    /// Simulated time `offset_ms` after the epoch
    pub fn at(&self, offset_ms: u64) -> DateTime<Utc> {
        self.epoch + Duration::milliseconds(i64::try_from(offset_ms).unwrap_or(i64::MAX))
    }

    /// Milliseconds elapsed since the epoch
    pub fn elapsed_ms(&self) -> u64 {
        self.offset_ms
    }

    /// Moves the clock forward
    pub fn advance(&mut self, ms: u64) {
        self.offset_ms = self.offset_ms.saturating_add(ms);
    }
}
