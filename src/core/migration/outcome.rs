//! Batch outcome
//!
//! Everything a finished batch hands to its caller: the status history, the
//! alerts, the compliance report and analytics derived from all three.

use crate::core::analytics::{analyze, BatchAnalytics};
use crate::core::compliance::ComplianceReport;
use crate::domain::quality::QualityAlert;
use crate::domain::status::{BatchMigrationStatus, BatchOutcome};
use serde::Serialize;

/// Result of running one batch
#[derive(Debug, Clone, Serialize)]
pub struct MigrationOutcome {
    pub batch: BatchMigrationStatus,
    pub alerts: Vec<QualityAlert>,
    pub compliance: ComplianceReport,
    pub analytics: BatchAnalytics,
}

impl MigrationOutcome {
    /// Assembles the outcome and computes its analytics
    pub fn new(
        batch: BatchMigrationStatus,
        alerts: Vec<QualityAlert>,
        compliance: ComplianceReport,
    ) -> Self {
        let analytics = analyze(&batch, &alerts, &compliance);
        Self {
            batch,
            alerts,
            compliance,
            analytics,
        }
    }

    /// Recomputes analytics from the stored history
    pub fn reanalyze(&self) -> BatchAnalytics {
        analyze(&self.batch, &self.alerts, &self.compliance)
    }

    pub fn is_complete(&self) -> bool {
        self.batch.is_complete()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.batch.outcome, BatchOutcome::Cancelled { .. })
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.batch.outcome, BatchOutcome::Aborted { .. })
    }

    /// Whether any record failed
    pub fn has_failures(&self) -> bool {
        self.analytics.failed_records > 0
    }
}
