//! Exercises the schema-layer invariants on `behavior_baselines` directly
//! against a SQLite file on disk, independent of whatever the repository
//! layer happens to expose: the triggers and unique index must hold even
//! for writes that bypass `BaselineRepository`.

use std::collections::HashMap;

use chrono::Utc;
use obstrace_core::{
    BaselineRepository, BaselineType, BehaviorBaseline, BehaviorProfile, Environment,
    ProfileRepository,
};
use obstrace_store::Store;
use sqlx::Row;
use uuid::Uuid;

async fn store_on_disk() -> (Store, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("obstrace.db");
    let config = obstrace_types::config::DatabaseConfig {
        url: format!("sqlite://{}?mode=rwc", path.display()),
        ..obstrace_types::config::DatabaseConfig::default()
    };
    (Store::connect(&config).await.unwrap(), dir)
}

fn sample_profile(agent_id: &str) -> BehaviorProfile {
    let now = Utc::now();
    BehaviorProfile {
        profile_id: Uuid::new_v4(),
        agent_id: agent_id.to_string(),
        agent_version: "1.0.0".to_string(),
        environment: Environment::Production,
        window_start: now - chrono::Duration::hours(1),
        window_end: now,
        sample_size: 100,
        decision_distributions: HashMap::new(),
        signal_distributions: HashMap::new(),
        latency_stats: HashMap::new(),
        created_at: now,
    }
}

fn sample_baseline(profile: &BehaviorProfile) -> BehaviorBaseline {
    BehaviorBaseline {
        baseline_id: Uuid::new_v4(),
        profile_id: profile.profile_id,
        agent_id: profile.agent_id.clone(),
        agent_version: profile.agent_version.clone(),
        environment: profile.environment,
        baseline_type: BaselineType::Manual,
        approved_by: None,
        approved_at: None,
        description: Some("initial baseline".to_string()),
        is_active: false,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn trigger_rejects_description_update() {
    let (store, _dir) = store_on_disk().await;
    let profile = store.upsert_profile(sample_profile("agent-immutable")).await.unwrap();
    let baseline = store.create_baseline(sample_baseline(&profile)).await.unwrap();

    let result = sqlx::query("UPDATE behavior_baselines SET description = ? WHERE baseline_id = ?")
        .bind("a rewritten description")
        .bind(baseline.baseline_id.to_string())
        .execute(store.pool())
        .await;

    assert!(result.is_err(), "trg_baseline_immutable should reject a description update");
}

#[tokio::test]
async fn trigger_rejects_blocked_keyword_description_on_insert() {
    let (store, _dir) = store_on_disk().await;
    let profile = store.upsert_profile(sample_profile("agent-privacy")).await.unwrap();
    let mut baseline = sample_baseline(&profile);
    baseline.description = Some("captures the full prompt text for review".to_string());

    let result = sqlx::query(
        "INSERT INTO behavior_baselines (baseline_id, profile_id, agent_id, agent_version, environment, \
         baseline_type, approved_by, approved_at, description, is_active, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(baseline.baseline_id.to_string())
    .bind(baseline.profile_id.to_string())
    .bind(&baseline.agent_id)
    .bind(&baseline.agent_version)
    .bind("production")
    .bind("manual")
    .bind(Option::<String>::None)
    .bind(Option::<String>::None)
    .bind(&baseline.description)
    .bind(0i64)
    .bind(baseline.created_at.to_rfc3339())
    .execute(store.pool())
    .await;

    assert!(result.is_err(), "trg_baseline_description_guard_insert should reject a blocked keyword");
}

#[tokio::test]
async fn trigger_rejects_description_over_length_bound() {
    let (store, _dir) = store_on_disk().await;
    let profile = store.upsert_profile(sample_profile("agent-length")).await.unwrap();
    let mut baseline = sample_baseline(&profile);
    baseline.description = Some("x".repeat(201));

    let result = store.create_baseline(baseline).await;
    assert!(result.is_err(), "a 201-character description should be rejected at the schema layer");
}

#[tokio::test]
async fn only_one_baseline_can_be_active_per_triple() {
    let (store, _dir) = store_on_disk().await;
    let profile_a = store.upsert_profile(sample_profile("agent-race")).await.unwrap();
    let profile_b = store.upsert_profile(sample_profile("agent-race")).await.unwrap();

    let baseline_a = store.create_baseline(sample_baseline(&profile_a)).await.unwrap();
    let baseline_b = store.create_baseline(sample_baseline(&profile_b)).await.unwrap();

    store.activate(baseline_a.baseline_id).await.unwrap();
    store.activate(baseline_b.baseline_id).await.unwrap();

    let row = sqlx::query(
        "SELECT COUNT(*) AS n FROM behavior_baselines \
         WHERE agent_id = ? AND agent_version = ? AND environment = 'production' AND is_active = 1",
    )
    .bind("agent-race")
    .bind("1.0.0")
    .fetch_one(store.pool())
    .await
    .unwrap();

    let active_count: i64 = row.try_get("n").unwrap();
    assert_eq!(active_count, 1, "activating a second baseline must deactivate the first");
}

