//! Quality monitor and alert emitter
//!
//! Edge-triggered: each record keeps one armed/fired flag per severity
//! threshold. An alert fires on the transition below a threshold and the
//! threshold re-arms only once the score is back at or above it, so a record
//! sitting below a threshold produces exactly one alert for that interval.

use crate::config::AlertConfig;
use crate::domain::compliance::ComplianceFinding;
use crate::domain::ids::RecordId;
use crate::domain::quality::{AlertTrigger, QualityAlert, Severity};
use crate::domain::stage::Stage;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};

/// A severity threshold and the score that resolves its alerts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold {
    pub severity: Severity,
    pub value: f64,
    pub resolve_at: f64,
}

/// Where an observation was made
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    pub record_id: &'a RecordId,
    pub stage: Stage,
    pub substage: &'a str,
    pub at: DateTime<Utc>,
}

/// Quality monitor
#[derive(Debug)]
pub struct QualityMonitor {
    /// Least severe first
    thresholds: Vec<Threshold>,
    below: HashMap<RecordId, BTreeSet<Severity>>,
    open: HashMap<RecordId, Vec<usize>>,
    alerts: Vec<QualityAlert>,
}

impl QualityMonitor {
    /// Creates a monitor from the alert configuration
    pub fn new(config: &AlertConfig) -> Self {
        let mut levels = Vec::new();
        if let Some(low) = config.low_threshold {
            levels.push((Severity::Low, low));
        }
        levels.push((Severity::Medium, config.medium_threshold));
        levels.push((Severity::High, config.high_threshold));
        levels.push((Severity::Critical, config.critical_threshold));

        let thresholds = levels
            .iter()
            .enumerate()
            .map(|(i, (severity, value))| {
                // The next-higher threshold is the previous (less severe) level
                let resolve_at = if i == 0 {
                    (value + config.resolution_margin).min(1.0)
                } else {
                    levels[i - 1].1
                };
                Threshold {
                    severity: *severity,
                    value: *value,
                    resolve_at,
                }
            })
            .collect();

        Self {
            thresholds,
            below: HashMap::new(),
            open: HashMap::new(),
            alerts: Vec::new(),
        }
    }

    /// Configured thresholds, least severe first
    pub fn thresholds(&self) -> &[Threshold] {
        &self.thresholds
    }

    /// Observes a score update and returns the alerts it raised
    ///
    /// Crossing several thresholds at once raises one alert per threshold,
    /// least severe first. Open alerts whose resolution level is reached are
    /// resolved.
    pub fn observe_score(&mut self, obs: Observation<'_>, score: f64) -> Vec<QualityAlert> {
        self.resolve_recovered(obs.record_id, score, obs.at);

        let mut raised = Vec::new();
        for threshold in self.thresholds.clone() {
            let below = self.below.entry(obs.record_id.clone()).or_default();
            let crossed = if score < threshold.value {
                below.insert(threshold.severity)
            } else {
                below.remove(&threshold.severity);
                false
            };
            if crossed {
                raised.push(self.push_alert(
                    obs,
                    threshold.severity,
                    AlertTrigger::ScoreThreshold {
                        threshold: threshold.value,
                        score,
                    },
                ));
            }
        }
        raised
    }

    /// Observes a compliance violation
    ///
    /// Critical violations, and violations that end the record's processing
    /// (unauthorized access, unprotected exposure), always raise a critical
    /// alert whatever the record's score. Other findings are left to the
    /// compliance report.
    pub fn observe_violation(
        &mut self,
        obs: Observation<'_>,
        finding: &ComplianceFinding,
    ) -> Option<QualityAlert> {
        (finding.severity == Severity::Critical || finding.kind.ends_processing())
            .then(|| self.raise_compliance(obs, finding.kind.as_str()))
    }

    /// Raises a critical compliance alert for a named violation
    pub fn raise_compliance(&mut self, obs: Observation<'_>, violation: &str) -> QualityAlert {
        self.push_alert(
            obs,
            Severity::Critical,
            AlertTrigger::ComplianceViolation {
                violation: violation.to_string(),
            },
        )
    }

    /// Resolves an alert by id; returns false if unknown or already resolved
    pub fn resolve(&mut self, alert_id: &str, at: DateTime<Utc>) -> bool {
        match self.alerts.iter_mut().find(|a| a.id == alert_id) {
            Some(alert) if !alert.resolved => {
                alert.resolve(at);
                true
            }
            _ => false,
        }
    }

    /// All alerts in emission order
    pub fn alerts(&self) -> &[QualityAlert] {
        &self.alerts
    }

    /// Unresolved alerts in emission order
    pub fn open_alerts(&self) -> impl Iterator<Item = &QualityAlert> + '_ {
        self.alerts.iter().filter(|a| !a.resolved)
    }

    /// Consumes the monitor, returning every alert
    pub fn into_alerts(self) -> Vec<QualityAlert> {
        self.alerts
    }

    fn push_alert(
        &mut self,
        obs: Observation<'_>,
        severity: Severity,
        trigger: AlertTrigger,
    ) -> QualityAlert {
        let alert = QualityAlert {
            id: format!("alert-{:06}", self.alerts.len() + 1),
            severity,
            trigger,
            record_id: obs.record_id.clone(),
            stage: obs.stage,
            substage: obs.substage.to_string(),
            raised_at: obs.at,
            resolved: false,
            resolved_at: None,
        };
        crate::log_alert!(alert);
        if matches!(alert.trigger, AlertTrigger::ScoreThreshold { .. }) {
            self.open
                .entry(obs.record_id.clone())
                .or_default()
                .push(self.alerts.len());
        }
        self.alerts.push(alert.clone());
        alert
    }

    fn resolve_recovered(&mut self, record_id: &RecordId, score: f64, at: DateTime<Utc>) {
        let Some(open) = self.open.get_mut(record_id) else {
            return;
        };
        let thresholds = &self.thresholds;
        let alerts = &mut self.alerts;
        open.retain(|&index| {
            let alert = &mut alerts[index];
            let resolve_at = thresholds
                .iter()
                .find(|t| t.severity == alert.severity)
                .map(|t| t.resolve_at)
                .unwrap_or(1.0);
            if score >= resolve_at {
                alert.resolve(at);
                tracing::info!(
                    alert_id = %alert.id,
                    record_id = %record_id,
                    score = score,
                    "Quality alert resolved"
                );
                false
            } else {
                !alert.resolved
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::compliance::ViolationKind;
    use crate::domain::ids::ElementId;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap()
    }

    fn obs(id: &RecordId, minute: u32) -> Observation<'_> {
        Observation {
            record_id: id,
            stage: Stage::Transform,
            substage: "normalize",
            at: at(minute),
        }
    }

    fn severities(alerts: &[QualityAlert]) -> Vec<Severity> {
        alerts.iter().map(|a| a.severity).collect()
    }

    #[test]
    fn test_thresholds_and_resolution_levels() {
        let monitor = QualityMonitor::new(&AlertConfig::default());
        let t = monitor.thresholds();
        assert_eq!(t.len(), 3);
        assert_eq!(t[0].severity, Severity::Medium);
        assert!((t[0].resolve_at - 0.90).abs() < 1e-12);
        assert_eq!(t[1].resolve_at, 0.85);
        assert_eq!(t[2].resolve_at, 0.80);
    }

    #[test]
    fn test_edge_triggered_once_per_interval() {
        let mut monitor = QualityMonitor::new(&AlertConfig::default());
        let id = RecordId::new("r-1").unwrap();

        assert!(monitor.observe_score(obs(&id, 0), 0.95).is_empty());
        let raised = monitor.observe_score(obs(&id, 1), 0.83);
        assert_eq!(severities(&raised), vec![Severity::Medium]);

        // Still below medium: no storm
        assert!(monitor.observe_score(obs(&id, 2), 0.82).is_empty());
        assert!(monitor.observe_score(obs(&id, 3), 0.84).is_empty());
        assert_eq!(monitor.alerts().len(), 1);
    }

    #[test]
    fn test_multiple_crossings_least_severe_first() {
        let mut monitor = QualityMonitor::new(&AlertConfig::default());
        let id = RecordId::new("r-1").unwrap();
        let raised = monitor.observe_score(obs(&id, 0), 0.5);
        assert_eq!(
            severities(&raised),
            vec![Severity::Medium, Severity::High, Severity::Critical]
        );
        assert_eq!(raised[0].id, "alert-000001");
        assert_eq!(raised[2].id, "alert-000003");
    }

    #[test]
    fn test_rearm_after_recovery() {
        let mut monitor = QualityMonitor::new(&AlertConfig::default());
        let id = RecordId::new("r-1").unwrap();

        monitor.observe_score(obs(&id, 0), 0.84);
        monitor.observe_score(obs(&id, 1), 0.86);
        let raised = monitor.observe_score(obs(&id, 2), 0.84);
        assert_eq!(severities(&raised), vec![Severity::Medium]);
        assert_eq!(monitor.alerts().len(), 2);
    }

    #[test]
    fn test_resolution_on_next_higher_threshold() {
        let mut monitor = QualityMonitor::new(&AlertConfig::default());
        let id = RecordId::new("r-1").unwrap();

        monitor.observe_score(obs(&id, 0), 0.75);
        // High alert open; recovering past 0.80 re-arms but does not resolve
        monitor.observe_score(obs(&id, 1), 0.82);
        assert!(!monitor.alerts()[1].resolved);

        monitor.observe_score(obs(&id, 2), 0.86);
        assert!(monitor.alerts()[1].resolved);
        assert_eq!(monitor.alerts()[1].resolved_at, Some(at(2)));
        // Medium needs threshold + margin
        assert!(!monitor.alerts()[0].resolved);

        monitor.observe_score(obs(&id, 3), 0.91);
        assert!(monitor.alerts()[0].resolved);
        assert_eq!(monitor.open_alerts().count(), 0);
    }

    #[test]
    fn test_records_tracked_independently() {
        let mut monitor = QualityMonitor::new(&AlertConfig::default());
        let a = RecordId::new("a").unwrap();
        let b = RecordId::new("b").unwrap();
        assert_eq!(monitor.observe_score(obs(&a, 0), 0.84).len(), 1);
        assert_eq!(monitor.observe_score(obs(&b, 0), 0.84).len(), 1);
    }

    #[test]
    fn test_low_threshold_when_configured() {
        let config = AlertConfig {
            low_threshold: Some(0.95),
            ..AlertConfig::default()
        };
        let mut monitor = QualityMonitor::new(&config);
        let id = RecordId::new("r-1").unwrap();
        let raised = monitor.observe_score(obs(&id, 0), 0.9);
        assert_eq!(severities(&raised), vec![Severity::Low]);
    }

    #[test]
    fn test_critical_violation_alerts_regardless_of_score() {
        let mut monitor = QualityMonitor::new(&AlertConfig::default());
        let id = RecordId::new("r-1").unwrap();
        monitor.observe_score(obs(&id, 0), 0.99);

        let critical = ComplianceFinding {
            kind: ViolationKind::UnprotectedExposure,
            severity: Severity::Critical,
            element_id: ElementId::for_field(&id, "ssn"),
            stage: Stage::Validate,
            substage: "compliance_check".to_string(),
            at: at(1),
        };
        let alert = monitor.observe_violation(obs(&id, 1), &critical).unwrap();
        assert_eq!(alert.severity, Severity::Critical);
        assert!(matches!(
            alert.trigger,
            AlertTrigger::ComplianceViolation { ref violation } if violation == "unprotected_exposure"
        ));

        let medium = ComplianceFinding {
            kind: ViolationKind::MissingJustification,
            severity: Severity::Medium,
            ..critical
        };
        assert!(monitor.observe_violation(obs(&id, 2), &medium).is_none());
    }

    #[test]
    fn test_unauthorized_access_alerts_as_critical() {
        let mut monitor = QualityMonitor::new(&AlertConfig::default());
        let id = RecordId::new("r-1").unwrap();
        monitor.observe_score(obs(&id, 0), 1.0);

        let unauthorized = ComplianceFinding {
            kind: ViolationKind::UnauthorizedAccess,
            severity: Severity::High,
            element_id: ElementId::for_field(&id, "name"),
            stage: Stage::Load,
            substage: "write".to_string(),
            at: at(1),
        };
        let alert = monitor.observe_violation(obs(&id, 1), &unauthorized).unwrap();
        assert_eq!(alert.severity, Severity::Critical);
        assert!(matches!(
            alert.trigger,
            AlertTrigger::ComplianceViolation { ref violation } if violation == "unauthorized_access"
        ));
        assert_eq!(monitor.alerts().len(), 1);
    }

    #[test]
    fn test_external_resolve() {
        let mut monitor = QualityMonitor::new(&AlertConfig::default());
        let id = RecordId::new("r-1").unwrap();
        monitor.observe_score(obs(&id, 0), 0.84);
        assert!(monitor.resolve("alert-000001", at(5)));
        assert!(!monitor.resolve("alert-000001", at(6)));
        assert!(!monitor.resolve("alert-999999", at(6)));
    }
}
