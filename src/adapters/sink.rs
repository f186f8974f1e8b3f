//! Outcome sinks
//!
//! A sink receives the finished [`MigrationOutcome`] and hands it to the
//! reporting side. The core never formats reports itself.

use crate::core::migration::MigrationOutcome;
use crate::domain::context::ResultExt;
use crate::domain::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Destination for batch outcomes
#[async_trait]
pub trait OutcomeSink: Send + Sync {
    /// Delivers one outcome
    ///
    /// # Errors
    ///
    /// Returns an error if the outcome cannot be serialized or written.
    async fn deliver(&self, outcome: &MigrationOutcome) -> Result<()>;
}

/// Writes the outcome as pretty-printed JSON to a file
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl OutcomeSink for JsonFileSink {
    async fn deliver(&self, outcome: &MigrationOutcome) -> Result<()> {
        let json = serde_json::to_vec_pretty(outcome).context("Failed to serialize outcome")?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("Failed to write outcome to {}", self.path.display()))?;

        tracing::info!(
            path = %self.path.display(),
            batch_id = %outcome.batch.batch_id,
            "Outcome written"
        );
        Ok(())
    }
}

/// Keeps delivered outcomes as JSON values in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    delivered: Mutex<Vec<serde_json::Value>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcomes delivered so far, oldest first
    pub async fn delivered(&self) -> Vec<serde_json::Value> {
        self.delivered.lock().await.clone()
    }
}

#[async_trait]
impl OutcomeSink for MemorySink {
    async fn deliver(&self, outcome: &MigrationOutcome) -> Result<()> {
        let value = serde_json::to_value(outcome)?;
        self.delivered.lock().await.push(value);
        Ok(())
    }
}
