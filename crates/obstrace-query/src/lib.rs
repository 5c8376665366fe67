//! The Query & Aggregation Core.

pub mod service;

pub use service::{QueryService, RunStats};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use obstrace_core::{Environment, NewRunTree, Run, RunFilters, RunRepository, RunStatus};
    use obstrace_store::Store;
    use obstrace_types::Pagination;
    use std::sync::Arc;
    use uuid::Uuid;

    #[tokio::test]
    async fn stats_reports_zero_success_rate_when_empty() {
        let store = Arc::new(Store::connect_in_memory().await.unwrap());
        let service = QueryService::new(store.clone(), store);

        let stats = service.stats(&RunFilters::default()).await.unwrap();
        assert_eq!(stats.total_runs, 0);
        assert_eq!(stats.success_rate, 0.0);
    }

    #[tokio::test]
    async fn list_runs_orders_by_started_at_descending() {
        let store = Arc::new(Store::connect_in_memory().await.unwrap());
        let service = QueryService::new(store.clone(), store.clone());

        let earlier = Utc::now() - chrono::Duration::hours(1);
        let later = Utc::now();

        for (run_id, started_at) in [(Uuid::new_v4(), earlier), (Uuid::new_v4(), later)] {
            let run = Run {
                run_id,
                agent_id: "agent-a".to_string(),
                agent_version: "1.0.0".to_string(),
                environment: Environment::Production,
                status: RunStatus::Success,
                started_at,
                ended_at: Some(started_at),
                created_at: Utc::now(),
            };
            store
                .insert_run_tree(NewRunTree {
                    run,
                    steps: vec![],
                    failure: None,
                    decisions: vec![],
                    quality_signals: vec![],
                })
                .await
                .unwrap();
        }

        let runs = service
            .list_runs(&RunFilters::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(runs.len(), 2);
        assert!(runs[0].run.started_at > runs[1].run.started_at);
    }
}
