//! Reproducibility tests
//!
//! A seeded batch must produce the same record outcomes, scores and alerts
//! regardless of worker pool size or task scheduling.

use fake::faker::address::en::StreetName;
use fake::faker::name::en::{FirstName, LastName};
use fake::Fake;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use strata::config::StrataConfig;
use strata::core::migration::{run_batch, MigrationOutcome};
use strata::domain::{Record, RecordBuilder};
use test_case::test_case;

fn patient(rng: &mut StdRng, i: usize) -> Record {
    let first: String = FirstName().fake_with_rng(rng);
    let last: String = LastName().fake_with_rng(rng);
    let street: String = StreetName().fake_with_rng(rng);

    let mut builder = RecordBuilder::new()
        .id(format!("patient-{i:04}"))
        .unwrap()
        .field("first_name", json!(first))
        .field("last_name", json!(last))
        .field("address", json!(street))
        .field("ssn", json!(format!("{:03}-45-{:04}", i % 1000, i)))
        .field("admission_date", json!("2023-06-14"));

    builder = match rng.gen_range(0..4) {
        0 => builder.field(
            "medications",
            json!([{"code": "RX-88", "dose": "500 mg", "status": "active"}]),
        ),
        1 => builder.field("conditions", json!([{"code": "E11.9", "system": "icd10"}])),
        2 => builder.field("observations", json!([{"code": "8867-4", "value": 64}])),
        _ => builder,
    };
    builder.build().unwrap()
}

fn batch(size: usize) -> Vec<Record> {
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);
    (0..size).map(|i| patient(&mut rng, i)).collect()
}

fn noisy_config(seed: u64, workers: usize) -> StrataConfig {
    let mut config = StrataConfig::default();
    config.simulation.seed = Some(seed);
    config.concurrency.max_concurrent_records = workers;
    config.failure_modes.network_failure_rate = 0.05;
    config.failure_modes.system_overload_rate = 0.02;
    config.failure_modes.data_corruption_rate = 0.02;
    config.failure_modes.security_violation_rate = 0.01;
    config.compliance.missing_justification_rate = 0.1;
    config.retry.retry_attempts = 2;
    config
}

/// Everything about a run that must not depend on scheduling
///
/// Timestamps and durations are left out: the simulated clock advances by
/// the substage makespan, which depends on the pool size.
fn fingerprint(outcome: &MigrationOutcome) -> Value {
    let records: Vec<Value> = outcome
        .batch
        .records_in_order()
        .map(|r| {
            json!({
                "id": r.record_id,
                "state": r.state,
                "score": r.quality_score,
                "dimensions": r.dimensions,
                "retries": r.retries,
                "failure": r.failure.as_ref().map(|f| json!({
                    "kind": f.kind,
                    "stage": f.stage,
                    "substage": f.substage,
                    "attempt": f.attempt,
                })),
                "exposed": r.exposed_fields,
                "shadow": r.shadow.fields(),
                "findings": r.compliance_findings.len(),
            })
        })
        .collect();

    let stages: Vec<Value> = outcome
        .batch
        .stage_results
        .iter()
        .map(|s| {
            json!({
                "stage": s.stage,
                "substage": s.substage,
                "status": s.status,
                "processed": s.records_processed,
                "successful": s.records_successful,
                "failed": s.records_failed,
                "retries": s.retries,
                "error_kind": s.error_kind,
                "error_detail": s.error_detail,
            })
        })
        .collect();

    let alerts: Vec<Value> = outcome
        .alerts
        .iter()
        .map(|a| {
            json!({
                "id": a.id,
                "severity": a.severity,
                "trigger": a.trigger,
                "record": a.record_id,
                "substage": a.substage,
                "resolved": a.resolved,
            })
        })
        .collect();

    json!({
        "batch_id": outcome.batch.batch_id,
        "records": records,
        "stages": stages,
        "alerts": alerts,
        "compliance_score": outcome.compliance.score,
        "violations": outcome.compliance.violations_by_kind,
        "recommendations": outcome.analytics.recommendations,
    })
}

#[tokio::test]
async fn test_same_seed_same_serialized_outcome() {
    let first = run_batch(batch(50), noisy_config(99, 8)).await.unwrap();
    let second = run_batch(batch(50), noisy_config(99, 8)).await.unwrap();

    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test_case(1 ; "sequential")]
#[test_case(3 ; "small pool")]
#[test_case(64 ; "pool larger than batch")]
#[tokio::test]
async fn test_pool_size_does_not_change_results(workers: usize) {
    let baseline = run_batch(batch(50), noisy_config(99, 16)).await.unwrap();
    let other = run_batch(batch(50), noisy_config(99, workers)).await.unwrap();

    assert_eq!(fingerprint(&baseline), fingerprint(&other));
}

#[tokio::test]
async fn test_different_seeds_diverge() {
    let a = run_batch(batch(50), noisy_config(1, 16)).await.unwrap();
    let b = run_batch(batch(50), noisy_config(2, 16)).await.unwrap();

    assert_ne!(a.batch.batch_id, b.batch.batch_id);
    assert_ne!(fingerprint(&a)["records"], fingerprint(&b)["records"]);
}

#[tokio::test]
async fn test_unseeded_run_can_be_replayed_from_recorded_seed() {
    let mut config = noisy_config(0, 16);
    config.simulation.seed = None;
    let original = run_batch(batch(20), config).await.unwrap();

    let replay = run_batch(batch(20), noisy_config(original.batch.seed, 16))
        .await
        .unwrap();

    assert_eq!(fingerprint(&original), fingerprint(&replay));
}
