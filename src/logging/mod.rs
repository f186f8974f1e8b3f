//! Logging and observability
//!
//! Structured logging through `tracing`, with a console layer and an optional
//! rotating JSON file layer, plus the macros the pipeline uses for its
//! recurring events.
//!
//! # Example
//!
//! ```no_run
//! use strata::logging::init_logging;
//! use strata::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, LoggingGuard};

/// Log the start of a batch
///
/// # Example
///
/// ```no_run
/// use strata::log_batch_start;
/// use strata::domain::BatchId;
///
/// let batch_id = BatchId::from_u64_pair(1, 2);
/// log_batch_start!(&batch_id, 50, 42u64);
/// ```
#[macro_export]
macro_rules! log_batch_start {
    ($batch_id:expr, $size:expr, $seed:expr) => {
        tracing::info!(
            batch_id = %$batch_id,
            size = $size,
            seed = $seed,
            "Starting migration batch"
        );
    };
}

/// Log the end of a batch
#[macro_export]
macro_rules! log_batch_complete {
    ($batch_id:expr, $outcome:expr, $success_rate:expr, $duration:expr) => {
        tracing::info!(
            batch_id = %$batch_id,
            outcome = ?$outcome,
            success_rate = $success_rate,
            duration_ms = $duration.as_millis(),
            "Migration batch finished"
        );
    };
}

/// Log the start of a substage
///
/// # Example
///
/// ```no_run
/// use strata::log_substage_start;
/// use strata::domain::Stage;
///
/// log_substage_start!(Stage::Extract, "connect", 48, 2);
/// ```
#[macro_export]
macro_rules! log_substage_start {
    ($stage:expr, $substage:expr, $dispatched:expr, $carried:expr) => {
        tracing::debug!(
            stage = %$stage,
            substage = $substage,
            dispatched = $dispatched,
            carried_failed = $carried,
            "Starting substage"
        );
    };
}

/// Log the completion of a substage
#[macro_export]
macro_rules! log_substage_complete {
    ($result:expr) => {
        tracing::info!(
            stage = %$result.stage,
            substage = $result.substage.as_deref().unwrap_or(""),
            status = ?$result.status,
            processed = $result.records_processed,
            successful = $result.records_successful,
            failed = $result.records_failed,
            retries = $result.retries,
            duration_ms = $result.duration_ms,
            "Substage completed"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use strata::log_error_with_context;
/// use strata::domain::StrataError;
///
/// let error = StrataError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}

/// Log a record attempt that is about to be retried
///
/// # Example
///
/// ```no_run
/// use strata::log_retry_attempt;
/// use strata::domain::{FailureKind, RecordId};
///
/// let record_id = RecordId::new("patient-0001").unwrap();
/// log_retry_attempt!(record_id, "connect", 1, 4, FailureKind::NetworkTimeout, 250);
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($record_id:expr, $substage:expr, $attempt:expr, $max_attempts:expr, $kind:expr, $delay_ms:expr) => {
        tracing::debug!(
            record_id = %$record_id,
            substage = $substage,
            attempt = $attempt,
            max_attempts = $max_attempts,
            reason = %$kind,
            delay_ms = $delay_ms,
            "Retrying record"
        );
    };
}

/// Log a raised quality alert
#[macro_export]
macro_rules! log_alert {
    ($alert:expr) => {
        tracing::warn!(
            alert_id = %$alert.id,
            severity = %$alert.severity,
            record_id = %$alert.record_id,
            stage = %$alert.stage,
            substage = %$alert.substage,
            trigger = ?$alert.trigger,
            "Quality alert raised"
        );
    };
}
