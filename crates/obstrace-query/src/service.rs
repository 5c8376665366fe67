//! Query Service: run listing/retrieval and the aggregate stats
//! endpoint. Stats are computed as a handful of bounded, parallel queries
//! rather than a full in-memory scan.

use std::collections::HashMap;
use std::sync::Arc;

use obstrace_core::{Failure, RunFilters, RunRepository, RunTree, StatsRepository, Step};
use obstrace_types::error::Result;
use obstrace_types::Pagination;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    pub total_runs: i64,
    pub total_failures: i64,
    pub success_rate: f64,
    pub avg_latency_ms: Option<f64>,
    pub failure_breakdown: HashMap<String, i64>,
    pub step_type_breakdown: HashMap<String, i64>,
}

pub struct QueryService {
    runs: Arc<dyn RunRepository>,
    stats: Arc<dyn StatsRepository>,
}

impl QueryService {
    pub fn new(runs: Arc<dyn RunRepository>, stats: Arc<dyn StatsRepository>) -> Self {
        Self { runs, stats }
    }

    pub async fn list_runs(&self, filters: &RunFilters, pagination: Pagination) -> Result<Vec<RunTree>> {
        self.runs.list_runs(filters, pagination).await
    }

    pub async fn get_run(&self, run_id: Uuid) -> Result<Option<RunTree>> {
        self.runs.get_run(run_id).await
    }

    pub async fn get_steps(&self, run_id: Uuid) -> Result<Vec<Step>> {
        self.runs.get_steps(run_id).await
    }

    pub async fn get_failures(&self, run_id: Uuid) -> Result<Vec<Failure>> {
        self.runs.get_failures(run_id).await
    }

    pub async fn stats(&self, filters: &RunFilters) -> Result<RunStats> {
        let (total_runs, total_failures, total_success, avg_latency_ms, failure_breakdown, step_type_breakdown) =
            tokio::try_join!(
                self.stats.total_runs(filters),
                self.stats.total_failures(filters),
                self.stats.total_success(filters),
                self.stats.avg_step_latency_ms(filters),
                self.stats.failure_breakdown(filters),
                self.stats.step_type_breakdown(filters),
            )?;

        let success_rate = if total_runs == 0 {
            0.0
        } else {
            (total_success as f64 / total_runs as f64) * 100.0
        };

        Ok(RunStats {
            total_runs,
            total_failures,
            success_rate,
            avg_latency_ms,
            failure_breakdown,
            step_type_breakdown,
        })
    }
}
