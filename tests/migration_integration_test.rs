//! Integration tests for batch execution
//!
//! These tests verify that:
//! - Every substage accounts for every record in the batch
//! - Terminal records are carried forward and never dispatched again
//! - Retries stay within the per-substage budget
//! - Critical records lose more quality than low-criticality ones
//! - Cancellation stops the batch at a substage boundary

use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::faker::phone_number::en::PhoneNumber;
use fake::Fake;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use strata::config::{FailureModesConfig, PerStage, StrataConfig};
use strata::core::migration::{run_batch, MigrationExecutor};
use strata::domain::{
    BatchOutcome, Criticality, FailureKind, Record, RecordBuilder, RecordEventKind, RecordId,
    RecordState, Stage, StrataError,
};
use tokio::sync::watch;

fn admin_record(rng: &mut StdRng, i: usize) -> Record {
    let name: String = Name().fake_with_rng(rng);
    let email: String = SafeEmail().fake_with_rng(rng);
    let phone: String = PhoneNumber().fake_with_rng(rng);
    RecordBuilder::new()
        .id(format!("admin-{i:04}"))
        .unwrap()
        .field("name", json!(name))
        .field("email", json!(email))
        .field("phone", json!(phone))
        .field("registered_date", json!("2021-03-04"))
        .build()
        .unwrap()
}

fn critical_record(rng: &mut StdRng, i: usize) -> Record {
    let name: String = Name().fake_with_rng(rng);
    RecordBuilder::new()
        .id(format!("patient-{i:04}"))
        .unwrap()
        .field("name", json!(name))
        .field("mrn", json!(format!("MRN-{i:06}")))
        .field("birth_date", json!("1958-11-02"))
        .field(
            "medications",
            json!([{"code": "RX-311", "dose": "20 mg", "status": "active"}]),
        )
        .field("allergies", json!(["penicillin"]))
        .field("vitals", json!({"heart_rate": 72, "temperature": 36.8}))
        .build()
        .unwrap()
}

/// Alternating critical and low-criticality records
fn mixed_batch(size: usize, seed: u64) -> Vec<Record> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..size)
        .map(|i| {
            if i % 2 == 0 {
                critical_record(&mut rng, i)
            } else {
                admin_record(&mut rng, i)
            }
        })
        .collect()
}

fn config_with_seed(seed: u64) -> StrataConfig {
    let mut config = StrataConfig::default();
    config.simulation.seed = Some(seed);
    config
}

#[tokio::test]
async fn test_every_substage_accounts_for_every_record() {
    let mut config = config_with_seed(11);
    config.failure_modes.network_failure_rate = 0.05;
    config.failure_modes.data_corruption_rate = 0.02;
    config.stages.stage_success_rates = PerStage::uniform(0.95);

    let outcome = run_batch(mixed_batch(40, 1), config).await.unwrap();
    let batch = &outcome.batch;

    assert!(outcome.is_complete());
    assert_eq!(batch.stage_results.len(), Stage::total_substages());
    for result in &batch.stage_results {
        assert_eq!(result.records_processed, 40, "{result:?}");
        assert_eq!(
            result.records_successful + result.records_failed,
            result.records_processed
        );
        assert_eq!(
            result.records_dispatched + result.records_carried_failed,
            result.records_processed
        );
    }

    let analytics = &outcome.analytics;
    assert_eq!(analytics.total_records, 40);
    assert_eq!(analytics.migrated_records + analytics.failed_records, 40);
    assert!(batch
        .records
        .values()
        .all(|r| matches!(r.state, RecordState::Migrated | RecordState::Failed)));
}

#[tokio::test]
async fn test_terminal_records_are_never_dispatched_again() {
    let mut config = config_with_seed(23);
    config.stages.stage_success_rates = PerStage::uniform(0.9);
    config.retry.retry_attempts = 1;

    let outcome = run_batch(mixed_batch(30, 2), config).await.unwrap();
    let results = &outcome.batch.stage_results;

    // Each substage only dispatches the survivors of the previous one
    for pair in results.windows(2) {
        assert_eq!(pair[1].records_dispatched, pair[0].records_successful);
        assert_eq!(
            pair[1].records_carried_failed,
            pair[0].records_failed,
            "{:?} -> {:?}",
            pair[0].substage,
            pair[1].substage
        );
    }

    for record in outcome.batch.records.values() {
        let Some(terminal_at) = record
            .events
            .iter()
            .position(|e| matches!(e.kind, RecordEventKind::Terminal { .. }))
        else {
            assert_eq!(record.state, RecordState::Migrated);
            continue;
        };

        assert_eq!(record.state, RecordState::Failed);
        assert!(record.failure.is_some());
        for event in &record.events[terminal_at + 1..] {
            assert!(
                !matches!(
                    event.kind,
                    RecordEventKind::StageEntered
                        | RecordEventKind::AttemptSucceeded { .. }
                        | RecordEventKind::AttemptFailed { .. }
                        | RecordEventKind::Migrated
                ),
                "record {} had activity after becoming terminal: {:?}",
                record.record_id,
                event.kind
            );
        }
    }
}

#[tokio::test]
async fn test_retries_stay_within_budget() {
    let mut config = config_with_seed(5);
    config.failure_modes.network_failure_rate = 0.3;
    config.failure_modes.data_corruption_rate = 0.02;
    config.retry.retry_attempts = 2;
    config.retry.retry_delay_ms = 10;

    let outcome = run_batch(mixed_batch(30, 3), config).await.unwrap();

    let mut saw_retry = false;
    for record in outcome.batch.records.values() {
        let mut attempts: BTreeMap<(Stage, String), u32> = BTreeMap::new();
        for event in &record.events {
            match &event.kind {
                RecordEventKind::AttemptSucceeded { .. } | RecordEventKind::AttemptFailed { .. } => {
                    let substage = event.substage.clone().unwrap_or_default();
                    *attempts.entry((event.stage, substage)).or_default() += 1;
                }
                _ => {}
            }
            if let RecordEventKind::AttemptFailed {
                kind, will_retry, ..
            } = &event.kind
            {
                if !kind.is_transient() {
                    assert!(!will_retry, "{kind} must not be retried");
                }
                saw_retry |= *will_retry;
            }
        }
        for ((stage, substage), count) in attempts {
            assert!(
                count <= 3,
                "{} made {count} attempts at {stage}/{substage}",
                record.record_id
            );
        }
    }
    assert!(saw_retry);

    let total_retries: u32 = outcome.batch.stage_results.iter().map(|r| r.retries).sum();
    assert_eq!(total_retries, outcome.analytics.total_retries);
}

#[tokio::test]
async fn test_compounded_substage_failures_land_in_expected_range() {
    let mut config = config_with_seed(2024);
    config.failure_modes = FailureModesConfig::none();
    config.retry.retry_attempts = 0;
    config.stages.stage_success_rates = PerStage::uniform(0.95);

    let outcome = run_batch(mixed_batch(50, 4), config).await.unwrap();

    // 0.95 over eleven substages compounds to roughly 0.57
    let rate = outcome.analytics.overall_success_rate;
    assert!(rate > 0.4 && rate < 0.75, "success rate {rate}");
    assert_eq!(outcome.analytics.total_retries, 0);
    assert!(outcome.has_failures());
}

#[tokio::test]
async fn test_critical_records_degrade_faster_than_low() {
    let mut config = config_with_seed(77);
    config.failure_modes = FailureModesConfig::none();
    config.failure_modes.network_failure_rate = 0.25;
    config.stages.stage_success_rates = PerStage::uniform(1.0);
    config.retry.retry_attempts = 3;
    config.retry.retry_delay_ms = 10;

    let outcome = run_batch(mixed_batch(40, 5), config).await.unwrap();

    let mut deltas: BTreeMap<Criticality, Vec<f64>> = BTreeMap::new();
    for record in outcome.batch.records.values() {
        for event in &record.events {
            if let RecordEventKind::Degraded {
                delta,
                failure: Some(FailureKind::NetworkTimeout),
                ..
            } = event.kind
            {
                deltas.entry(record.criticality).or_default().push(delta);
            }
        }
    }

    let critical = &deltas[&Criticality::Critical];
    let low = &deltas[&Criticality::Low];
    assert!(!critical.is_empty() && !low.is_empty());

    // Same failure kind, impact 1.5 versus 0.75
    for (c, l) in critical.iter().zip(low) {
        assert!((c / l - 2.0).abs() < 1e-9, "critical {c} vs low {l}");
    }

    let by_class = &outcome.analytics.quality_by_criticality;
    assert_eq!(by_class[&Criticality::Critical].count, 20);
    assert_eq!(by_class[&Criticality::Low].count, 20);
}

#[tokio::test]
async fn test_data_corruption_hurts_critical_record_more() {
    let mut config = config_with_seed(12);
    config.failure_modes = FailureModesConfig::none();
    config.failure_modes.data_corruption_rate = 1.0;

    let critical = RecordBuilder::new()
        .id("critical")
        .unwrap()
        .field("mrn", json!("MRN-000001"))
        .field(
            "medications",
            json!([{"code": "RX-7", "dose": "5 mg", "status": "active"}]),
        )
        .build()
        .unwrap();
    let low = RecordBuilder::new()
        .id("low")
        .unwrap()
        .field("mrn", json!("MRN-000002"))
        .build()
        .unwrap();

    let outcome = run_batch(vec![critical, low], config).await.unwrap();
    let records = &outcome.batch.records;
    let critical = &records[&RecordId::new("critical").unwrap()];
    let low = &records[&RecordId::new("low").unwrap()];

    for record in [critical, low] {
        let failure = record.failure.as_ref().unwrap();
        assert_eq!(failure.kind, FailureKind::DataCorruption);
        assert_eq!(failure.substage, "connect");
        assert_eq!(failure.attempt, 1);
    }
    assert_eq!(critical.criticality, Criticality::Critical);
    assert_eq!(low.criticality, Criticality::Low);

    let critical_drop = 1.0 - critical.quality_score;
    let low_drop = 1.0 - low.quality_score;
    assert!(
        critical_drop > low_drop,
        "critical dropped {critical_drop}, low dropped {low_drop}"
    );
}

#[tokio::test]
async fn test_cancel_before_start_keeps_records_pending() {
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();

    let executor = MigrationExecutor::new(config_with_seed(9))
        .unwrap()
        .with_cancellation(rx);
    let outcome = executor.run_batch(mixed_batch(6, 6)).await.unwrap();

    assert!(outcome.is_cancelled());
    assert_eq!(
        outcome.batch.outcome,
        BatchOutcome::Cancelled { after_stage: None }
    );
    assert!(outcome.batch.stage_results.is_empty());
    assert!(outcome
        .batch
        .records
        .values()
        .all(|r| r.state != RecordState::Migrated));
}

#[tokio::test]
async fn test_cancel_mid_batch_stops_at_substage_boundary() {
    let mut config = config_with_seed(31);
    config.simulation.pace_realtime = true;
    config.failure_modes = FailureModesConfig::none();
    config.failure_modes.network_failure_rate = 0.5;
    config.retry.retry_attempts = 3;
    config.retry.retry_delay_ms = 200;

    let (tx, rx) = watch::channel(false);
    let executor = MigrationExecutor::new(config).unwrap().with_cancellation(rx);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = tx.send(true);
    });

    let outcome = executor.run_batch(mixed_batch(10, 7)).await.unwrap();

    assert!(outcome.is_cancelled());
    let results = &outcome.batch.stage_results;
    assert!(!results.is_empty());
    assert!(results.len() < Stage::total_substages());

    // The substage in flight finished with a full count
    for result in results {
        assert_eq!(result.records_processed, 10);
    }
    assert!(outcome
        .batch
        .records
        .values()
        .all(|r| r.state != RecordState::Migrated));
}

#[tokio::test]
async fn test_invalid_batches_are_rejected() {
    let err = run_batch(Vec::new(), config_with_seed(1)).await.unwrap_err();
    assert!(matches!(err, StrataError::Validation(_)));

    let mut records = mixed_batch(3, 8);
    records.push(records[0].clone());
    let err = run_batch(records, config_with_seed(1)).await.unwrap_err();
    assert!(err.to_string().contains("duplicate"));
}

#[tokio::test]
async fn test_outcome_serializes_for_reporting() {
    let outcome = run_batch(mixed_batch(4, 9), config_with_seed(3))
        .await
        .unwrap();
    let value = serde_json::to_value(&outcome).unwrap();

    assert_eq!(value["batch"]["size"], 4);
    assert_eq!(value["batch"]["seed"], 3);
    assert!(value["analytics"]["quality"]["mean"].is_number());
    assert!(value["compliance"]["score"].is_number());
    assert_eq!(
        value["batch"]["stage_results"].as_array().unwrap().len(),
        Stage::total_substages()
    );
}
