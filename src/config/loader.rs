//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::StrataConfig;
use crate::domain::errors::StrataError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into StrataConfig
/// 4. Applies environment variable overrides (STRATA_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns [`StrataError::Configuration`] if:
/// - File cannot be read
/// - TOML parsing fails
/// - Environment variable substitution fails
/// - Configuration validation fails
///
/// # Examples
///
/// ```no_run
/// use strata::config::loader::load_config;
///
/// let config = load_config("strata.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<StrataConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(StrataError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        StrataError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    load_config_str(&contents)
}

/// Loads configuration from TOML text
///
/// Applies the same substitution, overrides and validation as [`load_config`].
pub fn load_config_str(contents: &str) -> Result<StrataConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: StrataConfig = toml::from_str(&contents)
        .map_err(|e| StrataError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        StrataError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error if a referenced environment variable is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| StrataError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{}}}", var_name);
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(StrataError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Parses an override value, naming the variable on failure
fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            StrataError::Configuration(format!("Invalid value '{raw}' for environment variable {name}"))
        }),
        Err(_) => Ok(None),
    }
}

/// Applies environment variable overrides with STRATA_ prefix
///
/// Environment variables take precedence over the file.
fn apply_env_overrides(config: &mut StrataConfig) -> Result<()> {
    // Application overrides
    if let Ok(val) = std::env::var("STRATA_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    // Simulation overrides
    if let Some(seed) = parse_env::<u64>("STRATA_SIMULATION_SEED")? {
        config.simulation.seed = Some(seed);
    }
    if let Ok(val) = std::env::var("STRATA_SIMULATION_SOURCE_SYSTEM") {
        config.simulation.source_system = val;
    }
    if let Ok(val) = std::env::var("STRATA_SIMULATION_TARGET_SYSTEM") {
        config.simulation.target_system = val;
    }
    if let Ok(val) = std::env::var("STRATA_SIMULATION_STRATEGY") {
        config.simulation.strategy = val;
    }
    if let Some(pace) = parse_env::<bool>("STRATA_SIMULATION_PACE_REALTIME")? {
        config.simulation.pace_realtime = pace;
    }

    // Stage overrides
    if let Some(timeout) = parse_env::<u64>("STRATA_STAGES_SUBSTAGE_TIMEOUT_MS")? {
        config.stages.substage_timeout_ms = timeout;
    }

    // Failure mode overrides
    if let Some(rate) = parse_env::<f64>("STRATA_FAILURE_MODES_NETWORK_FAILURE_RATE")? {
        config.failure_modes.network_failure_rate = rate;
    }
    if let Some(rate) = parse_env::<f64>("STRATA_FAILURE_MODES_SYSTEM_OVERLOAD_RATE")? {
        config.failure_modes.system_overload_rate = rate;
    }
    if let Some(rate) = parse_env::<f64>("STRATA_FAILURE_MODES_DATA_CORRUPTION_RATE")? {
        config.failure_modes.data_corruption_rate = rate;
    }
    if let Some(rate) = parse_env::<f64>("STRATA_FAILURE_MODES_SECURITY_VIOLATION_RATE")? {
        config.failure_modes.security_violation_rate = rate;
    }

    // Concurrency overrides
    if let Some(max) = parse_env::<usize>("STRATA_CONCURRENCY_MAX_CONCURRENT_RECORDS")? {
        config.concurrency.max_concurrent_records = max;
    }

    // Retry overrides
    if let Some(attempts) = parse_env::<u32>("STRATA_RETRY_RETRY_ATTEMPTS")? {
        config.retry.retry_attempts = attempts;
    }
    if let Some(delay) = parse_env::<u64>("STRATA_RETRY_RETRY_DELAY_MS")? {
        config.retry.retry_delay_ms = delay;
    }
    if let Some(multiplier) = parse_env::<f64>("STRATA_RETRY_BACKOFF_MULTIPLIER")? {
        config.retry.backoff_multiplier = multiplier;
    }

    // Compliance overrides
    if let Ok(val) = std::env::var("STRATA_COMPLIANCE_PERMITTED_ROLES") {
        config.compliance.permitted_roles = val
            .split(',')
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
    }

    // Logging overrides
    if let Some(enabled) = parse_env::<bool>("STRATA_LOGGING_LOCAL_ENABLED")? {
        config.logging.local_enabled = enabled;
    }
    if let Ok(val) = std::env::var("STRATA_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}
