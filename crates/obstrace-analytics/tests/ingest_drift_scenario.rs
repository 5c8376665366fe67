//! End-to-end pipeline test: submit runs through the ingestion contract,
//! build profiles over two windows, promote a baseline, and confirm the
//! drift engine catches a tool-selection shift from a 65/35 split to an
//! 82/18 split (a chi-square-significant, medium-severity drift).

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use obstrace_analytics::baseline::BaselineManager;
use obstrace_analytics::drift::DriftEngine;
use obstrace_analytics::profile::ProfileBuilder;
use obstrace_core::{BaselineType, DriftType, Environment, Severity, TestMethod};
use obstrace_ingest::{IngestService, RunPayload};
use obstrace_store::Store;
use obstrace_types::config::DriftThresholds;
use uuid::Uuid;

fn run_payload_json(run_id: Uuid, started_at: DateTime<Utc>, selected: &str) -> serde_json::Value {
    serde_json::json!({
        "run_id": run_id,
        "agent_id": "agent-chi",
        "agent_version": "2.0.0",
        "environment": "production",
        "status": "success",
        "started_at": started_at.to_rfc3339(),
        "ended_at": (started_at + Duration::milliseconds(50)).to_rfc3339(),
        "steps": [],
        "failure": null,
        "decisions": [
            {
                "decision_id": Uuid::new_v4(),
                "step_id": null,
                "decision_type": "tool_selection",
                "selected": selected,
                "reason_code": "best_match_capability",
                "confidence": 0.9,
                "candidates": [selected],
                "metadata": {}
            }
        ],
        "quality_signals": []
    })
}

/// Submits `api_count` runs selecting "api" and `other_count` runs
/// selecting "scrape", one second apart starting at `window_start`.
async fn submit_runs(
    service: &IngestService,
    window_start: DateTime<Utc>,
    api_count: usize,
    other_count: usize,
) {
    let mut selections = Vec::with_capacity(api_count + other_count);
    selections.extend(std::iter::repeat("api").take(api_count));
    selections.extend(std::iter::repeat("scrape").take(other_count));

    for (i, selected) in selections.into_iter().enumerate() {
        let started_at = window_start + Duration::seconds(i as i64);
        let value = run_payload_json(Uuid::new_v4(), started_at, selected);
        let payload: RunPayload = serde_json::from_value(value).unwrap();
        service.submit_run(payload).await.unwrap();
    }
}

#[tokio::test]
async fn ingest_build_profile_create_baseline_and_detect_drift_end_to_end() {
    let store = Arc::new(Store::connect_in_memory().await.unwrap());
    let ingest = IngestService::new(store.clone());
    let builder = ProfileBuilder::new(store.clone(), store.clone());
    let baseline_manager = BaselineManager::new(store.clone(), store.clone());

    let baseline_window_start = Utc::now() - Duration::hours(3);
    let baseline_window_end = baseline_window_start + Duration::hours(1);
    let observed_window_start = Utc::now() - Duration::hours(1);
    let observed_window_end = observed_window_start + Duration::hours(1);

    // Baseline window: a 65/35 tool_selection split over 100 runs.
    submit_runs(&ingest, baseline_window_start, 65, 35).await;
    // Observed window: the same agent now favors "api" 82/100 times.
    submit_runs(&ingest, observed_window_start, 82, 18).await;

    let baseline_profile = builder
        .build_profile(
            "agent-chi",
            "2.0.0",
            Environment::Production,
            baseline_window_start,
            baseline_window_end,
            100,
        )
        .await
        .unwrap();
    assert_eq!(baseline_profile.sample_size, 100);

    let baseline = baseline_manager
        .create_baseline(
            baseline_profile.profile_id,
            BaselineType::Manual,
            Some("tool-selection baseline".to_string()),
            None,
        )
        .await
        .unwrap();
    let baseline = baseline_manager.activate(baseline.baseline_id).await.unwrap();

    let mut thresholds = DriftThresholds::default();
    thresholds.min_sample_size_drift_detection = 100;

    let engine = DriftEngine::new(store.clone(), builder, store.clone(), thresholds);
    let drifts = engine
        .detect_drift(&baseline, observed_window_start, observed_window_end)
        .await
        .unwrap();

    let api_drift = drifts
        .iter()
        .find(|d| d.drift_type == DriftType::Decision && d.metric == "tool_selection.api")
        .expect("expected a tool_selection.api drift record");

    assert!((api_drift.baseline_value - 0.65).abs() < 1e-9);
    assert!((api_drift.observed_value - 0.82).abs() < 1e-9);
    assert!((api_drift.delta_percent - 26.15).abs() < 0.1);
    assert_eq!(api_drift.test_method, TestMethod::ChiSquare);
    assert_eq!(api_drift.severity, Severity::Medium);
}
