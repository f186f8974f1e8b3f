//! Configuration schema types
//!
//! This module defines the configuration structure for Strata. Every field has
//! a default so a minimal TOML file (or none at all) yields a usable
//! configuration; [`StrataConfig::validate`] enforces the ranges before a batch
//! is constructed.

use crate::domain::record::Criticality;
use crate::domain::stage::Stage;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// One value per pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerStage<T> {
    pub extract: T,
    pub transform: T,
    pub validate: T,
    pub load: T,
}

impl<T> PerStage<T> {
    /// Value for a stage
    pub fn get(&self, stage: Stage) -> &T {
        match stage {
            Stage::Extract => &self.extract,
            Stage::Transform => &self.transform,
            Stage::Validate => &self.validate,
            Stage::Load => &self.load,
        }
    }

    /// Mutable value for a stage
    pub fn get_mut(&mut self, stage: Stage) -> &mut T {
        match stage {
            Stage::Extract => &mut self.extract,
            Stage::Transform => &mut self.transform,
            Stage::Validate => &mut self.validate,
            Stage::Load => &mut self.load,
        }
    }

    /// The same value for every stage
    pub fn uniform(value: T) -> Self
    where
        T: Clone,
    {
        Self {
            extract: value.clone(),
            transform: value.clone(),
            validate: value.clone(),
            load: value,
        }
    }
}

/// One value per criticality class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerClass<T> {
    pub critical: T,
    pub high: T,
    pub medium: T,
    pub low: T,
}

impl<T> PerClass<T> {
    /// Value for a class
    pub fn get(&self, class: Criticality) -> &T {
        match class {
            Criticality::Critical => &self.critical,
            Criticality::High => &self.high,
            Criticality::Medium => &self.medium,
            Criticality::Low => &self.low,
        }
    }
}

/// Main Strata configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrataConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Seed, clock and batch labels
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Stage and substage success probabilities and durations
    #[serde(default)]
    pub stages: StagesConfig,

    /// Ambient failure-mode rates
    #[serde(default)]
    pub failure_modes: FailureModesConfig,

    /// Quality degradation parameters
    #[serde(default)]
    pub quality: QualityConfig,

    /// Worker pool sizing
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,

    /// Retry policy for transient failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Alert thresholds
    #[serde(default)]
    pub alerts: AlertConfig,

    /// Protected-data access policy
    #[serde(default)]
    pub compliance: ComplianceConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StrataConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.simulation.validate()?;
        self.stages.validate()?;
        self.failure_modes.validate()?;
        self.quality.validate()?;
        self.concurrency.validate()?;
        self.retry.validate()?;
        self.alerts.validate()?;
        self.compliance.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

fn check_probability(name: &str, value: f64) -> Result<(), String> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(format!("{name} must be a probability in [0, 1], got {value}"));
    }
    Ok(())
}

fn check_finite(name: &str, value: f64) -> Result<(), String> {
    if !value.is_finite() {
        return Err(format!("{name} must be finite, got {value}"));
    }
    Ok(())
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

/// Simulation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Random seed; runs with the same seed and records are identical
    #[serde(default)]
    pub seed: Option<u64>,

    /// Start of the simulated clock
    #[serde(default = "default_epoch")]
    pub epoch: DateTime<Utc>,

    /// Legacy system label
    #[serde(default = "default_source_system")]
    pub source_system: String,

    /// Target system label
    #[serde(default = "default_target_system")]
    pub target_system: String,

    /// Migration strategy label (e.g. big_bang, phased, parallel_run)
    #[serde(default = "default_strategy")]
    pub strategy: String,

    /// Actually sleep for retry delays instead of only advancing the simulated clock
    #[serde(default)]
    pub pace_realtime: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: None,
            epoch: default_epoch(),
            source_system: default_source_system(),
            target_system: default_target_system(),
            strategy: default_strategy(),
            pace_realtime: false,
        }
    }
}

impl SimulationConfig {
    fn validate(&self) -> Result<(), String> {
        if self.source_system.trim().is_empty() {
            return Err("simulation.source_system cannot be empty".to_string());
        }
        if self.target_system.trim().is_empty() {
            return Err("simulation.target_system cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Stage and substage parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagesConfig {
    /// Success probability used by substages without their own rate
    #[serde(default = "default_stage_success_rates")]
    pub stage_success_rates: PerStage<f64>,

    /// Per-substage success probabilities, keyed by substage name
    #[serde(
        default = "default_substage_success_rates",
        deserialize_with = "deserialize_substage_rates"
    )]
    pub substage_success_rates: PerStage<BTreeMap<String, f64>>,

    /// Base simulated duration of each stage in milliseconds
    #[serde(default = "default_stage_base_duration_ms")]
    pub stage_base_duration_ms: PerStage<u64>,

    /// Duration variance as a ± fraction of the base
    #[serde(default = "default_duration_variance")]
    pub duration_variance: f64,

    /// Maximum simulated time a record may spend in one substage
    #[serde(default = "default_substage_timeout_ms")]
    pub substage_timeout_ms: u64,
}

impl Default for StagesConfig {
    fn default() -> Self {
        Self {
            stage_success_rates: default_stage_success_rates(),
            substage_success_rates: default_substage_success_rates(),
            stage_base_duration_ms: default_stage_base_duration_ms(),
            duration_variance: default_duration_variance(),
            substage_timeout_ms: default_substage_timeout_ms(),
        }
    }
}

impl StagesConfig {
    /// Success probability of a substage, falling back to its stage's rate
    pub fn substage_success_rate(&self, stage: Stage, substage: &str) -> f64 {
        self.substage_success_rates
            .get(stage)
            .get(substage)
            .copied()
            .unwrap_or(*self.stage_success_rates.get(stage))
    }

    /// Base simulated duration of one substage attempt
    pub fn substage_base_duration_ms(&self, stage: Stage) -> f64 {
        let count = stage.substages().len().max(1);
        *self.stage_base_duration_ms.get(stage) as f64 / count as f64
    }

    /// Substage timeout as a Duration
    pub fn substage_timeout(&self) -> Duration {
        Duration::from_millis(self.substage_timeout_ms)
    }

    fn validate(&self) -> Result<(), String> {
        for stage in Stage::ALL {
            check_probability(
                &format!("stages.stage_success_rates.{stage}"),
                *self.stage_success_rates.get(stage),
            )?;
            for (name, rate) in self.substage_success_rates.get(stage) {
                if stage.substage(name).is_none() {
                    let known: Vec<_> = stage.substages().iter().map(|s| s.name).collect();
                    return Err(format!(
                        "Unknown substage '{name}' for stage {stage}. Must be one of: {}",
                        known.join(", ")
                    ));
                }
                check_probability(
                    &format!("stages.substage_success_rates.{stage}.{name}"),
                    *rate,
                )?;
            }
        }

        if !self.duration_variance.is_finite() || !(0.0..1.0).contains(&self.duration_variance) {
            return Err(format!(
                "stages.duration_variance must be in [0, 1), got {}",
                self.duration_variance
            ));
        }

        if self.substage_timeout_ms == 0 {
            return Err("stages.substage_timeout_ms must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Ambient failure-mode rates, checked on every attempt before the substage's own check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureModesConfig {
    #[serde(default = "default_network_failure_rate")]
    pub network_failure_rate: f64,

    #[serde(default = "default_system_overload_rate")]
    pub system_overload_rate: f64,

    #[serde(default = "default_data_corruption_rate")]
    pub data_corruption_rate: f64,

    #[serde(default = "default_security_violation_rate")]
    pub security_violation_rate: f64,
}

impl Default for FailureModesConfig {
    fn default() -> Self {
        Self {
            network_failure_rate: default_network_failure_rate(),
            system_overload_rate: default_system_overload_rate(),
            data_corruption_rate: default_data_corruption_rate(),
            security_violation_rate: default_security_violation_rate(),
        }
    }
}

impl FailureModesConfig {
    /// All rates set to zero
    pub fn none() -> Self {
        Self {
            network_failure_rate: 0.0,
            system_overload_rate: 0.0,
            data_corruption_rate: 0.0,
            security_violation_rate: 0.0,
        }
    }

    fn validate(&self) -> Result<(), String> {
        check_probability("failure_modes.network_failure_rate", self.network_failure_rate)?;
        check_probability("failure_modes.system_overload_rate", self.system_overload_rate)?;
        check_probability("failure_modes.data_corruption_rate", self.data_corruption_rate)?;
        check_probability(
            "failure_modes.security_violation_rate",
            self.security_violation_rate,
        )?;
        Ok(())
    }
}

/// Quality degradation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Score lost per failure, scaled by the failure kind's severity
    #[serde(default = "default_degradation_per_failure")]
    pub degradation_per_failure: f64,

    /// Score lost per success; negative values recover quality
    #[serde(default)]
    pub degradation_per_success: f64,

    /// Clinical impact multiplier applied to degradation, by criticality class
    #[serde(default = "default_criticality_impact")]
    pub criticality_impact: PerClass<f64>,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            degradation_per_failure: default_degradation_per_failure(),
            degradation_per_success: 0.0,
            criticality_impact: default_criticality_impact(),
        }
    }
}

impl QualityConfig {
    fn validate(&self) -> Result<(), String> {
        check_finite("quality.degradation_per_failure", self.degradation_per_failure)?;
        check_finite("quality.degradation_per_success", self.degradation_per_success)?;
        for class in Criticality::ALL {
            let value = *self.criticality_impact.get(class);
            check_finite(&format!("quality.criticality_impact.{class}"), value)?;
            if value < 0.0 {
                return Err(format!(
                    "quality.criticality_impact.{class} cannot be negative, got {value}"
                ));
            }
        }
        Ok(())
    }
}

/// Upper bound on the worker pool size
pub const MAX_WORKER_POOL: usize = 1024;

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Records processed in parallel within a substage
    #[serde(default = "default_max_concurrent_records")]
    pub max_concurrent_records: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_records: default_max_concurrent_records(),
        }
    }
}

impl ConcurrencyConfig {
    fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_records == 0 || self.max_concurrent_records > MAX_WORKER_POOL {
            return Err(format!(
                "concurrency.max_concurrent_records must be between 1 and {MAX_WORKER_POOL}, got {}",
                self.max_concurrent_records
            ));
        }
        Ok(())
    }
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries allowed per record per substage (0 disables retries)
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Delay before the first retry in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Backoff multiplier; 1.0 keeps the delay fixed, >1.0 is exponential
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    fn validate(&self) -> Result<(), String> {
        check_finite("retry.backoff_multiplier", self.backoff_multiplier)?;
        if self.backoff_multiplier < 1.0 {
            return Err(format!(
                "retry.backoff_multiplier must be >= 1.0, got {}",
                self.backoff_multiplier
            ));
        }
        if self.max_delay_ms < self.retry_delay_ms {
            return Err(format!(
                "retry.max_delay_ms ({}) must be >= retry.retry_delay_ms ({})",
                self.max_delay_ms, self.retry_delay_ms
            ));
        }
        Ok(())
    }
}

/// Alert threshold configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_critical_threshold")]
    pub critical_threshold: f64,

    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,

    #[serde(default = "default_medium_threshold")]
    pub medium_threshold: f64,

    /// Optional low-severity threshold (disabled by default)
    #[serde(default)]
    pub low_threshold: Option<f64>,

    /// Recovery margin above the highest threshold needed to resolve its alert
    #[serde(default = "default_resolution_margin")]
    pub resolution_margin: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            critical_threshold: default_critical_threshold(),
            high_threshold: default_high_threshold(),
            medium_threshold: default_medium_threshold(),
            low_threshold: None,
            resolution_margin: default_resolution_margin(),
        }
    }
}

impl AlertConfig {
    fn validate(&self) -> Result<(), String> {
        check_probability("alerts.critical_threshold", self.critical_threshold)?;
        check_probability("alerts.high_threshold", self.high_threshold)?;
        check_probability("alerts.medium_threshold", self.medium_threshold)?;
        if let Some(low) = self.low_threshold {
            check_probability("alerts.low_threshold", low)?;
            if low <= self.medium_threshold {
                return Err(format!(
                    "alerts.low_threshold ({low}) must be above alerts.medium_threshold ({})",
                    self.medium_threshold
                ));
            }
        }
        if !(self.critical_threshold < self.high_threshold
            && self.high_threshold < self.medium_threshold)
        {
            return Err(format!(
                "alert thresholds must satisfy critical < high < medium, got {} / {} / {}",
                self.critical_threshold, self.high_threshold, self.medium_threshold
            ));
        }
        check_finite("alerts.resolution_margin", self.resolution_margin)?;
        if self.resolution_margin < 0.0 {
            return Err("alerts.resolution_margin cannot be negative".to_string());
        }
        Ok(())
    }
}

/// Compliance policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceConfig {
    /// Roles allowed to access protected fields
    #[serde(default = "default_permitted_roles")]
    pub permitted_roles: Vec<String>,

    /// Whether an access without justification is a violation
    #[serde(default = "default_true")]
    pub require_justification: bool,

    /// Probability that a protected access is logged without justification
    #[serde(default)]
    pub missing_justification_rate: f64,
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            permitted_roles: default_permitted_roles(),
            require_justification: true,
            missing_justification_rate: 0.0,
        }
    }
}

impl ComplianceConfig {
    fn validate(&self) -> Result<(), String> {
        if self.permitted_roles.iter().any(|r| r.trim().is_empty()) {
            return Err("compliance.permitted_roles cannot contain empty roles".to_string());
        }
        check_probability(
            "compliance.missing_justification_rate",
            self.missing_justification_rate,
        )?;
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default)]
    pub local_enabled: bool,

    /// Local log directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation (daily, hourly, never)
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }
        if self.local_enabled && self.local_path.is_empty() {
            return Err("logging.local_path cannot be empty when local_enabled = true".to_string());
        }
        Ok(())
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

fn default_source_system() -> String {
    "legacy_emr".to_string()
}

fn default_target_system() -> String {
    "modern_ehr".to_string()
}

fn default_strategy() -> String {
    "phased".to_string()
}

fn default_stage_success_rates() -> PerStage<f64> {
    PerStage {
        extract: 0.98,
        transform: 0.97,
        validate: 0.96,
        load: 0.98,
    }
}

fn default_substage_success_rates() -> PerStage<BTreeMap<String, f64>> {
    PerStage::uniform(BTreeMap::new())
}

/// Accepts any subset of stages; stages left out have no overrides
fn deserialize_substage_rates<'de, D>(
    deserializer: D,
) -> Result<PerStage<BTreeMap<String, f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let by_stage = BTreeMap::<Stage, BTreeMap<String, f64>>::deserialize(deserializer)?;
    let mut rates = default_substage_success_rates();
    for (stage, overrides) in by_stage {
        *rates.get_mut(stage) = overrides;
    }
    Ok(rates)
}

fn default_stage_base_duration_ms() -> PerStage<u64> {
    PerStage {
        extract: 1_500,
        transform: 3_000,
        validate: 1_200,
        load: 2_000,
    }
}

fn default_duration_variance() -> f64 {
    0.2
}

fn default_substage_timeout_ms() -> u64 {
    30_000
}

fn default_network_failure_rate() -> f64 {
    0.01
}

fn default_system_overload_rate() -> f64 {
    0.005
}

fn default_data_corruption_rate() -> f64 {
    0.005
}

fn default_security_violation_rate() -> f64 {
    0.001
}

fn default_degradation_per_failure() -> f64 {
    0.1
}

fn default_criticality_impact() -> PerClass<f64> {
    PerClass {
        critical: 1.5,
        high: 1.25,
        medium: 1.0,
        low: 0.75,
    }
}

fn default_max_concurrent_records() -> usize {
    16
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    250
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    5_000
}

fn default_critical_threshold() -> f64 {
    0.70
}

fn default_high_threshold() -> f64 {
    0.80
}

fn default_medium_threshold() -> f64 {
    0.85
}

fn default_resolution_margin() -> f64 {
    0.05
}

fn default_permitted_roles() -> Vec<String> {
    Stage::ALL
        .iter()
        .map(|s| s.accessor_role().to_string())
        .collect()
}

fn default_true() -> bool {
    true
}

fn default_local_path() -> String {
    "./logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = StrataConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_application_config_validation() {
        let mut config = ApplicationConfig::default();
        assert!(config.validate().is_ok());

        config.log_level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stage_probability_out_of_range() {
        let mut config = StrataConfig::default();
        config.stages.stage_success_rates.validate = 1.2;
        let err = config.validate().unwrap_err();
        assert!(err.contains("stages.stage_success_rates.validate"));

        config.stages.stage_success_rates.validate = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_substage_rate_lookup_and_fallback() {
        let mut config = StagesConfig::default();
        config
            .substage_success_rates
            .get_mut(Stage::Extract)
            .insert("connect".to_string(), 0.5);

        assert_eq!(config.substage_success_rate(Stage::Extract, "connect"), 0.5);
        assert_eq!(config.substage_success_rate(Stage::Extract, "query"), 0.98);
    }

    #[test]
    fn test_unknown_substage_rejected() {
        let mut config = StrataConfig::default();
        config
            .stages
            .substage_success_rates
            .get_mut(Stage::Load)
            .insert("connect".to_string(), 0.9);
        let err = config.validate().unwrap_err();
        assert!(err.contains("Unknown substage 'connect'"));
    }

    #[test]
    fn test_negative_degradation_is_accepted() {
        let mut config = StrataConfig::default();
        config.quality.degradation_per_success = -0.02;
        config.quality.degradation_per_failure = -0.01;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_non_finite_values_rejected() {
        let mut config = StrataConfig::default();
        config.quality.degradation_per_failure = f64::INFINITY;
        assert!(config.validate().is_err());

        let mut config = StrataConfig::default();
        config.quality.criticality_impact.high = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = StrataConfig::default();
        config.quality.criticality_impact.low = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_concurrency_bounds() {
        let mut config = ConcurrencyConfig::default();
        config.max_concurrent_records = 0;
        assert!(config.validate().is_err());
        config.max_concurrent_records = MAX_WORKER_POOL + 1;
        assert!(config.validate().is_err());
        config.max_concurrent_records = MAX_WORKER_POOL;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_alert_threshold_ordering() {
        let mut config = AlertConfig::default();
        assert!(config.validate().is_ok());

        config.high_threshold = 0.9;
        assert!(config.validate().is_err());

        let mut config = AlertConfig::default();
        config.low_threshold = Some(0.8);
        assert!(config.validate().is_err());
        config.low_threshold = Some(0.9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retry_validation() {
        let mut config = RetryConfig::default();
        config.backoff_multiplier = 0.5;
        assert!(config.validate().is_err());

        let mut config = RetryConfig::default();
        config.retry_delay_ms = 10_000;
        config.max_delay_ms = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duration_variance_range() {
        let mut config = StagesConfig::default();
        config.duration_variance = 1.0;
        assert!(config.validate().is_err());
        config.duration_variance = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_substage_base_duration_split() {
        let config = StagesConfig::default();
        assert_eq!(config.substage_base_duration_ms(Stage::Load), 1_000.0);
        assert_eq!(config.substage_base_duration_ms(Stage::Extract), 500.0);
    }

    #[test]
    fn test_default_permitted_roles_cover_every_stage() {
        let config = ComplianceConfig::default();
        for stage in Stage::ALL {
            assert!(config
                .permitted_roles
                .contains(&stage.accessor_role().to_string()));
        }
    }

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: StrataConfig = toml::from_str("[simulation]\nseed = 7\n").unwrap();
        assert_eq!(config.simulation.seed, Some(7));
        assert_eq!(config.concurrency.max_concurrent_records, 16);
        assert_eq!(config.retry.retry_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_substage_rates_for_one_stage_only() {
        let config: StrataConfig =
            toml::from_str("[stages.substage_success_rates.transform]\nmap_codes = 0.9\n").unwrap();
        assert_eq!(
            config.stages.substage_success_rate(Stage::Transform, "map_codes"),
            0.9
        );
        assert!(config.stages.substage_success_rates.extract.is_empty());

        let err = toml::from_str::<StrataConfig>("[stages.substage_success_rates.publish]\nx = 1.0\n");
        assert!(err.is_err());
    }

    #[test]
    fn test_logging_rotation_validation() {
        let mut config = LoggingConfig::default();
        config.local_rotation = "weekly".to_string();
        assert!(config.validate().is_err());
    }
}
