//! The Behavioral Profile/Baseline/Drift Detection Core:
//! profile building, baseline promotion, drift detection, and alerting.

pub mod alert;
pub mod baseline;
pub mod drift;
pub mod drift_query;
pub mod profile;

pub use alert::AlertEmitter;
pub use baseline::BaselineManager;
pub use drift::DriftEngine;
pub use drift_query::DriftQueryService;
pub use profile::{percentile, ProfileBuilder};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use obstrace_core::{
        BaselineType, Decision, DecisionType, Environment, NewRunTree, Run, RunRepository, RunStatus,
    };
    use obstrace_store::Store;
    use obstrace_types::config::DriftThresholds;
    use std::collections::HashMap;
    use std::sync::Arc;
    use uuid::Uuid;

    async fn insert_run_with_decision(
        store: &Arc<Store>,
        agent_id: &str,
        started_at: chrono::DateTime<Utc>,
        selected: &str,
    ) {
        let run_id = Uuid::new_v4();
        let run = Run {
            run_id,
            agent_id: agent_id.to_string(),
            agent_version: "1.0.0".to_string(),
            environment: Environment::Production,
            status: RunStatus::Success,
            started_at,
            ended_at: Some(started_at + Duration::milliseconds(100)),
            created_at: Utc::now(),
        };
        let decision = Decision {
            decision_id: Uuid::new_v4(),
            run_id,
            step_id: None,
            decision_type: DecisionType::ToolSelection,
            selected: selected.to_string(),
            reason_code: "best_match_capability".to_string(),
            confidence: Some(0.9),
            candidates: vec![selected.to_string()],
            metadata: HashMap::new(),
            recorded_at: started_at,
        };
        store
            .insert_run_tree(NewRunTree {
                run,
                steps: vec![],
                failure: None,
                decisions: vec![decision],
                quality_signals: vec![],
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn build_profile_fails_below_minimum_sample_size() {
        let store = Arc::new(Store::connect_in_memory().await.unwrap());
        let builder = ProfileBuilder::new(store.clone(), store);

        let result = builder
            .build_profile(
                "agent-a",
                "1.0.0",
                Environment::Production,
                Utc::now() - Duration::hours(1),
                Utc::now(),
                10,
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn baseline_lifecycle_activate_approve_reject_double_approve() {
        let store = Arc::new(Store::connect_in_memory().await.unwrap());
        let builder = ProfileBuilder::new(store.clone(), store.clone());
        let window_start = Utc::now() - Duration::hours(1);

        for i in 0..5 {
            insert_run_with_decision(&store, "agent-a", window_start + Duration::minutes(i), "toolA").await;
        }

        let profile = builder
            .build_profile("agent-a", "1.0.0", Environment::Production, window_start, Utc::now(), 5)
            .await
            .unwrap();

        let manager = BaselineManager::new(store.clone(), store.clone());
        let baseline = manager
            .create_baseline(profile.profile_id, BaselineType::Manual, Some("initial baseline".to_string()), None)
            .await
            .unwrap();

        let activated = manager.activate(baseline.baseline_id).await.unwrap();
        assert!(activated.is_active);

        let approved = manager.approve(baseline.baseline_id, "reviewer").await.unwrap();
        assert!(approved.is_approved());

        assert!(manager.approve(baseline.baseline_id, "reviewer-2").await.is_err());
    }

    #[tokio::test]
    async fn drift_engine_detects_shifted_decision_distribution() {
        let store = Arc::new(Store::connect_in_memory().await.unwrap());
        let builder = ProfileBuilder::new(store.clone(), store.clone());
        let baseline_window_start = Utc::now() - Duration::hours(2);
        let baseline_window_end = Utc::now() - Duration::hours(1);
        let observed_window_start = Utc::now() - Duration::minutes(30);
        let observed_window_end = Utc::now();

        for i in 0..20 {
            insert_run_with_decision(&store, "agent-a", baseline_window_start + Duration::seconds(i), "toolA").await;
        }
        for i in 0..20 {
            let selected = if i < 16 { "toolB" } else { "toolA" };
            insert_run_with_decision(&store, "agent-a", observed_window_start + Duration::seconds(i), selected).await;
        }

        let baseline_profile = builder
            .build_profile(
                "agent-a",
                "1.0.0",
                Environment::Production,
                baseline_window_start,
                baseline_window_end,
                10,
            )
            .await
            .unwrap();

        let manager = BaselineManager::new(store.clone(), store.clone());
        let baseline = manager
            .create_baseline(baseline_profile.profile_id, BaselineType::Manual, None, None)
            .await
            .unwrap();
        let baseline = manager.activate(baseline.baseline_id).await.unwrap();

        let mut thresholds = DriftThresholds::default();
        thresholds.min_sample_size_drift_detection = 10;
        thresholds.decision_min_delta_percent = 5.0;

        let engine = DriftEngine::new(store.clone(), builder, store.clone(), thresholds);
        let drifts = engine
            .detect_drift(&baseline, observed_window_start, observed_window_end)
            .await
            .unwrap();

        assert!(!drifts.is_empty(), "expected at least one drift record for a shifted distribution");
        assert!(drifts.iter().any(|d| d.metric.starts_with("tool_selection.")));
    }
}
