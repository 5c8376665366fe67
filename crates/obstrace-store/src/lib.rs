//! sqlx/SQLite implementations of the `obstrace-core` repository traits.

mod alert_repository;
mod baseline_repository;
mod convert;
mod drift_repository;
mod pool;
mod profile_repository;
mod run_repository;

pub use pool::Store;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use obstrace_core::{
        Environment, NewRunTree, Run, RunRepository, RunStatus,
    };
    use uuid::Uuid;

    async fn fresh_store() -> Store {
        Store::connect_in_memory().await.unwrap()
    }

    fn sample_run() -> Run {
        let now = Utc::now();
        Run {
            run_id: Uuid::new_v4(),
            agent_id: "agent-a".to_string(),
            agent_version: "1.0.0".to_string(),
            environment: Environment::Production,
            status: RunStatus::Success,
            started_at: now,
            ended_at: Some(now),
            created_at: now,
        }
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let store = fresh_store().await;
        let run = sample_run();
        let run_id = run.run_id;
        let tree = NewRunTree {
            run,
            steps: vec![],
            failure: None,
            decisions: vec![],
            quality_signals: vec![],
        };

        store.insert_run_tree(tree).await.unwrap();
        let fetched = store.get_run(run_id).await.unwrap().unwrap();
        assert_eq!(fetched.run.run_id, run_id);
        assert_eq!(fetched.run.agent_id, "agent-a");
    }

    #[tokio::test]
    async fn insert_is_idempotent_by_run_id() {
        use obstrace_core::InsertOutcome;

        let store = fresh_store().await;
        let run = sample_run();
        let tree = NewRunTree {
            run: run.clone(),
            steps: vec![],
            failure: None,
            decisions: vec![],
            quality_signals: vec![],
        };
        let tree_again = NewRunTree {
            run,
            steps: vec![],
            failure: None,
            decisions: vec![],
            quality_signals: vec![],
        };

        let first = store.insert_run_tree(tree).await.unwrap();
        assert!(matches!(first, InsertOutcome::Created(_)));

        let second = store.insert_run_tree(tree_again).await.unwrap();
        assert!(matches!(second, InsertOutcome::AlreadyExists(_)));
    }
}
