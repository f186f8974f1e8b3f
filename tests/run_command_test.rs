//! End-to-end tests for the run command: records file in, outcome file out

use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use strata::adapters::{JsonFileSink, MemorySink, OutcomeSink};
use strata::cli::commands::run::RunArgs;
use strata::config::StrataConfig;
use strata::core::migration::run_batch;
use strata::domain::RecordBuilder;
use tempfile::TempDir;
use tokio::sync::watch;

const QUIET_CONFIG: &str = r#"
[simulation]
seed = 17

[stages.stage_success_rates]
extract = 1.0
transform = 1.0
validate = 1.0
load = 1.0

[failure_modes]
network_failure_rate = 0.0
system_overload_rate = 0.0
data_corruption_rate = 0.0
security_violation_rate = 0.0
"#;

fn write_records(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("records.jsonl");
    let lines = [
        json!({"id": "p-1", "fields": {"name": "Ada Example", "mrn": "MRN-1", "allergies": ["latex"]}}),
        json!({"id": "p-2", "fields": {"email": "b@example.org", "vitals": {"heart_rate": 80}}}),
        json!({"id": "p-3", "fields": {"registered_date": "2022-01-01"}}),
    ];
    let contents: Vec<String> = lines.iter().map(Value::to_string).collect();
    fs::write(&path, contents.join("\n")).unwrap();
    path
}

fn write_config(dir: &Path, contents: &str) -> String {
    let path = dir.join("strata.toml");
    fs::write(&path, contents).unwrap();
    path.to_string_lossy().to_string()
}

#[tokio::test]
async fn test_run_writes_outcome_and_exits_zero() {
    let dir = TempDir::new().unwrap();
    let config_path = write_config(dir.path(), QUIET_CONFIG);
    let output = dir.path().join("out").join("outcome.json");

    let args = RunArgs {
        records: write_records(dir.path()),
        output: Some(output.clone()),
        ..RunArgs::default()
    };
    let (_tx, rx) = watch::channel(false);
    let code = args.execute(&config_path, rx).await.unwrap();
    assert_eq!(code, 0);

    let written: Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(written["batch"]["size"], 3);
    assert_eq!(written["batch"]["seed"], 17);
    assert_eq!(written["analytics"]["migrated_records"], 3);
    assert_eq!(written["batch"]["record_order"], json!(["p-1", "p-2", "p-3"]));
}

#[tokio::test]
async fn test_run_with_failures_exits_one() {
    let dir = TempDir::new().unwrap();
    let failing = QUIET_CONFIG.replace("load = 1.0", "load = 0.0");
    let config_path = write_config(dir.path(), &failing);

    let args = RunArgs {
        records: write_records(dir.path()),
        no_retry: true,
        ..RunArgs::default()
    };
    let (_tx, rx) = watch::channel(false);
    assert_eq!(args.execute(&config_path, rx).await.unwrap(), 1);
}

#[tokio::test]
async fn test_run_with_bad_records_file_exits_five() {
    let dir = TempDir::new().unwrap();
    let config_path = write_config(dir.path(), QUIET_CONFIG);
    let records = dir.path().join("records.json");
    fs::write(&records, "{\"id\": \"p-1\"}\nnot json\n").unwrap();

    let args = RunArgs {
        records,
        ..RunArgs::default()
    };
    let (_tx, rx) = watch::channel(false);
    assert_eq!(args.execute(&config_path, rx).await.unwrap(), 5);
}

#[tokio::test]
async fn test_run_with_invalid_override_exits_two() {
    let dir = TempDir::new().unwrap();
    let config_path = write_config(dir.path(), QUIET_CONFIG);

    let args = RunArgs {
        records: write_records(dir.path()),
        max_concurrent: Some(0),
        ..RunArgs::default()
    };
    let (_tx, rx) = watch::channel(false);
    assert_eq!(args.execute(&config_path, rx).await.unwrap(), 2);
}

#[tokio::test]
async fn test_cancelled_run_exits_three() {
    let dir = TempDir::new().unwrap();
    let config_path = write_config(dir.path(), QUIET_CONFIG);

    let args = RunArgs {
        records: write_records(dir.path()),
        ..RunArgs::default()
    };
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();
    assert_eq!(args.execute(&config_path, rx).await.unwrap(), 3);
}

#[tokio::test]
async fn test_sinks_receive_the_same_outcome() {
    let dir = TempDir::new().unwrap();
    let mut config = StrataConfig::default();
    config.simulation.seed = Some(5);
    let record = RecordBuilder::new()
        .id("p-1")
        .unwrap()
        .field("ssn", json!("123-45-6789"))
        .build()
        .unwrap();
    let outcome = run_batch(vec![record], config).await.unwrap();

    let file_sink = JsonFileSink::new(dir.path().join("outcome.json"));
    let memory_sink = MemorySink::new();
    let sinks: Vec<&dyn OutcomeSink> = vec![&file_sink, &memory_sink];
    for sink in sinks {
        sink.deliver(&outcome).await.unwrap();
    }

    let from_file: Value =
        serde_json::from_str(&fs::read_to_string(file_sink.path()).unwrap()).unwrap();
    let delivered = memory_sink.delivered().await;
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0], from_file);
}
