//! BehaviorProfile entity: a statistical snapshot of agent behavior over a
//! bounded time window.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::run::Environment;

/// Latency statistics computed over all runs in a window. Keys are fixed:
/// `mean_run_duration_ms`, `p50_run_duration_ms`, `p95_run_duration_ms`,
/// `p99_run_duration_ms`.
pub type LatencyStats = HashMap<String, f64>;

pub const LATENCY_METRIC_MEAN: &str = "mean_run_duration_ms";
pub const LATENCY_METRIC_P50: &str = "p50_run_duration_ms";
pub const LATENCY_METRIC_P95: &str = "p95_run_duration_ms";
pub const LATENCY_METRIC_P99: &str = "p99_run_duration_ms";

pub const LATENCY_METRICS: [&str; 4] = [
    LATENCY_METRIC_MEAN,
    LATENCY_METRIC_P50,
    LATENCY_METRIC_P95,
    LATENCY_METRIC_P99,
];

/// `decision_type -> (selected -> probability)`, each inner map summing to
/// 1.0 within floating tolerance. Zero-entry categories are omitted.
pub type DecisionDistributions = HashMap<String, HashMap<String, f64>>;

/// `signal_type -> (signal_code -> probability)`. The probability is the
/// fraction of signals of that type/code pair observed with `value = true`.
pub type SignalDistributions = HashMap<String, HashMap<String, f64>>;

/// A statistical snapshot computed over a bounded time window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorProfile {
    pub profile_id: Uuid,
    pub agent_id: String,
    pub agent_version: String,
    pub environment: Environment,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub sample_size: i64,
    pub decision_distributions: DecisionDistributions,
    pub signal_distributions: SignalDistributions,
    pub latency_stats: LatencyStats,
    pub created_at: DateTime<Utc>,
}
