//! Run command implementation
//!
//! This module implements the `run` command: load records, run one batch
//! through the pipeline, print a summary and optionally write the full
//! outcome as JSON.

use crate::adapters::{read_records, JsonFileSink, OutcomeSink};
use crate::config::{load_config, StrataConfig};
use crate::core::migration::{MigrationExecutor, MigrationOutcome};
use crate::domain::status::BatchOutcome;
use clap::Args;
use std::path::PathBuf;
use tokio::sync::watch;

/// Maximum number of recommendations and stage lines shown in the summary
const SUMMARY_LIMIT: usize = 10;

/// Arguments for the run command
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Input records (JSON array or JSON Lines)
    #[arg(short, long)]
    pub records: PathBuf,

    /// Write the full outcome as JSON to this path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Override the random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Override the worker pool size
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Override retries per record per substage
    #[arg(long)]
    pub retry_attempts: Option<u32>,

    /// Disable retries entirely
    #[arg(long, conflicts_with = "retry_attempts")]
    pub no_retry: bool,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting run command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("❌ {e}");
                return Ok(2); // Configuration error exit code
            }
        };
        self.apply_overrides(&mut config);
        if let Err(e) = config.validate() {
            eprintln!("❌ Invalid command-line override: {e}");
            return Ok(2);
        }

        let records = match read_records(&self.records).await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load records");
                eprintln!("❌ {e}");
                return Ok(5); // Fatal error exit code
            }
        };

        println!(
            "🚀 Migrating {} records from {} to {}",
            records.len(),
            config.simulation.source_system,
            config.simulation.target_system
        );

        let executor = MigrationExecutor::new(config)?.with_cancellation(shutdown_signal);
        let outcome = match executor.run_batch(records).await {
            Ok(o) => o,
            Err(e) => {
                tracing::error!(error = %e, "Batch could not start");
                eprintln!("❌ Batch could not start: {e}");
                return Ok(5);
            }
        };

        print_summary(&outcome);

        if let Some(path) = &self.output {
            let sink = JsonFileSink::new(path);
            if let Err(e) = sink.deliver(&outcome).await {
                tracing::error!(error = %e, "Failed to write outcome");
                eprintln!("❌ Failed to write outcome: {e}");
                return Ok(5);
            }
            println!("📄 Outcome written to {}", path.display());
        }

        Ok(exit_code(&outcome))
    }

    fn apply_overrides(&self, config: &mut StrataConfig) {
        if let Some(seed) = self.seed {
            tracing::info!(seed, "Overriding seed from CLI");
            config.simulation.seed = Some(seed);
        }
        if let Some(workers) = self.max_concurrent {
            tracing::info!(workers, "Overriding worker pool size from CLI");
            config.concurrency.max_concurrent_records = workers;
        }
        if let Some(retries) = self.retry_attempts {
            tracing::info!(retries, "Overriding retry attempts from CLI");
            config.retry.retry_attempts = retries;
        }
        if self.no_retry {
            tracing::info!("Disabling retries from CLI");
            config.retry.retry_attempts = 0;
        }
    }
}

/// Exit code for a finished batch
///
/// 0 when every record migrated, 1 when some failed, 3 when the batch was
/// cancelled or aborted.
pub fn exit_code(outcome: &MigrationOutcome) -> i32 {
    match outcome.batch.outcome {
        BatchOutcome::Cancelled { .. } | BatchOutcome::Aborted { .. } => 3,
        _ if outcome.has_failures() => 1,
        _ => 0,
    }
}

fn print_summary(outcome: &MigrationOutcome) {
    let analytics = &outcome.analytics;
    let batch = &outcome.batch;

    println!();
    println!("📊 Migration Summary:");
    println!("  Batch: {}", batch.batch_id);
    println!("  Seed: {}", batch.seed);
    println!("  Strategy: {}", batch.strategy);
    println!("  Total Records: {}", analytics.total_records);
    println!("  Migrated: {}", analytics.migrated_records);
    println!("  Failed: {}", analytics.failed_records);
    println!(
        "  Success Rate: {:.2}%",
        analytics.overall_success_rate * 100.0
    );
    println!(
        "  Quality: mean {:.3}, min {:.3}, max {:.3}",
        analytics.quality.mean, analytics.quality.min, analytics.quality.max
    );
    println!("  Retries: {}", analytics.total_retries);
    println!("  Compliance Score: {:.3}", analytics.compliance_score);
    println!(
        "  Alerts: {} raised, {} open",
        analytics.alerts_raised, analytics.alerts_open
    );
    println!();

    if !analytics.stage_success.is_empty() {
        println!("🧱 Stages:");
        for (stage, stats) in &analytics.stage_success {
            println!(
                "  {:<10} {:>6.2}%  ({} ok / {} failed, {} retries, {} ms)",
                stage.as_str(),
                stats.success_rate * 100.0,
                stats.records_successful,
                stats.records_failed,
                stats.retries,
                stats.duration_ms
            );
        }
        println!();
    }

    if !analytics.failure_kinds.is_empty() {
        println!("⚠️  Failures by kind:");
        for (kind, count) in &analytics.failure_kinds {
            println!("  - {kind}: {count}");
        }
        println!();
    }

    if !analytics.recommendations.is_empty() {
        println!("💡 Recommendations:");
        for message in analytics
            .recommendation_messages()
            .into_iter()
            .take(SUMMARY_LIMIT)
        {
            println!("  - {message}");
        }
        println!();
    }

    match &batch.outcome {
        BatchOutcome::Completed if analytics.failed_records == 0 => {
            println!("✅ Migration completed successfully!");
        }
        BatchOutcome::Completed => println!("⚠️  Migration completed with failures"),
        BatchOutcome::Cancelled { after_stage } => {
            println!(
                "⚠️  Migration cancelled after stage {}",
                after_stage.map(|s| s.to_string()).unwrap_or_else(|| "none".to_string())
            );
        }
        BatchOutcome::Aborted { reason, .. } => println!("❌ Migration aborted: {reason}"),
        BatchOutcome::InProgress => {}
    }
}
