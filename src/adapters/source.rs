//! Record sources
//!
//! Records are read from JSON: either a single array of records or one record
//! per line (JSON Lines). Each record is `{"id": "...", "fields": {...}}`.

use crate::domain::context::ResultExt;
use crate::domain::errors::StrataError;
use crate::domain::record::Record;
use crate::domain::Result;
use std::path::Path;

/// Parses records from a JSON array or JSON Lines document
pub fn parse_records(contents: &str) -> Result<Vec<Record>> {
    let trimmed = contents.trim_start();
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }

    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str::<Record>(line)
                .map_err(|e| StrataError::Serialization(format!("line {}: {e}", i + 1)))
        })
        .collect()
}

/// Reads records from a file
pub async fn read_records(path: impl AsRef<Path>) -> Result<Vec<Record>> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read records from {}", path.display()))?;
    let records = parse_records(&contents)
        .with_context(|| format!("Failed to parse records in {}", path.display()))?;

    tracing::info!(path = %path.display(), count = records.len(), "Records loaded");
    Ok(records)
}
