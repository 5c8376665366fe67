//! Repository traits: the boundary between domain logic and storage. No
//! implementation lives here — `obstrace-store` provides the sqlx-backed
//! implementations.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use obstrace_types::{Pagination, Result};
use uuid::Uuid;

use crate::domain::{
    AlertChannel, AlertLog, BehaviorBaseline, BehaviorDrift, BehaviorProfile, DecisionType,
    DeliveryStatus, DriftType, Environment, Failure, RunStatus, Severity, SignalType, Step,
    TestMethod,
};

// ---------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------

/// A fully materialized run plus its children, exactly what the ingest
/// idempotent-replay path and the query "get single run" path return.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunTree {
    pub run: crate::domain::Run,
    pub steps: Vec<Step>,
    pub failure: Option<Failure>,
    pub decisions: Vec<crate::domain::Decision>,
    pub quality_signals: Vec<crate::domain::QualitySignal>,
}

/// The full nested tree as submitted by a client, already validated.
/// `run.created_at` is ignored on input (server-assigned) and
/// `failure.failure_id` likewise.
#[derive(Debug, Clone)]
pub struct NewRunTree {
    pub run: crate::domain::Run,
    pub steps: Vec<Step>,
    pub failure: Option<Failure>,
    pub decisions: Vec<crate::domain::Decision>,
    pub quality_signals: Vec<crate::domain::QualitySignal>,
}

/// Outcome of an idempotent insert: whether this call created the row or
/// found it already present (idempotency rule).
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    Created(RunTree),
    AlreadyExists(RunTree),
}

#[derive(Debug, Clone, Default)]
pub struct RunFilters {
    pub agent_id: Option<String>,
    pub agent_version: Option<String>,
    pub status: Option<RunStatus>,
    pub environment: Option<Environment>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait RunRepository: Send + Sync {
    /// Insert the full tree in one transaction, or return the existing
    /// tree unchanged if `run_id` was already stored.
    async fn insert_run_tree(&self, tree: NewRunTree) -> Result<InsertOutcome>;

    async fn get_run(&self, run_id: Uuid) -> Result<Option<RunTree>>;

    /// Ordered by `started_at` descending.
    async fn list_runs(
        &self,
        filters: &RunFilters,
        pagination: Pagination,
    ) -> Result<Vec<RunTree>>;

    async fn get_steps(&self, run_id: Uuid) -> Result<Vec<Step>>;
    async fn get_failures(&self, run_id: Uuid) -> Result<Vec<Failure>>;
}

/// The aggregate stats endpoint, run as bounded queries rather
/// than an in-memory scan.
#[async_trait]
pub trait StatsRepository: Send + Sync {
    async fn total_runs(&self, filters: &RunFilters) -> Result<i64>;
    async fn total_failures(&self, filters: &RunFilters) -> Result<i64>;
    async fn total_success(&self, filters: &RunFilters) -> Result<i64>;
    async fn avg_step_latency_ms(&self, filters: &RunFilters) -> Result<Option<f64>>;
    /// Keyed `"{failure_type}/{failure_code}"`.
    async fn failure_breakdown(&self, filters: &RunFilters) -> Result<HashMap<String, i64>>;
    /// Keyed by `step_type`.
    async fn step_type_breakdown(&self, filters: &RunFilters) -> Result<HashMap<String, i64>>;
}

// ---------------------------------------------------------------------
// Analytics source data (raw reads the profile builder/drift engine need
// from the primary tables; kept distinct from RunRepository since these
// are read patterns specific to windowed aggregation, not single-run
// access).
// ---------------------------------------------------------------------

#[async_trait]
pub trait ObservationRepository: Send + Sync {
    async fn count_runs_in_window(
        &self,
        agent_id: &str,
        agent_version: &str,
        environment: Environment,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<i64>;

    /// `decision_type -> (selected -> count)` over all decisions of runs in
    /// the window.
    async fn decision_counts_in_window(
        &self,
        agent_id: &str,
        agent_version: &str,
        environment: Environment,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<HashMap<DecisionType, HashMap<String, i64>>>;

    /// `signal_type -> (signal_code -> (true_count, total_count))`.
    async fn signal_counts_in_window(
        &self,
        agent_id: &str,
        agent_version: &str,
        environment: Environment,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<HashMap<SignalType, HashMap<String, (i64, i64)>>>;

    /// Millisecond durations of runs in the window that have `ended_at`
    /// set. Runs without an end time are excluded.
    async fn run_durations_ms_in_window(
        &self,
        agent_id: &str,
        agent_version: &str,
        environment: Environment,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<i64>>;
}

// ---------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ProfileFilters {
    pub agent_id: Option<String>,
    pub agent_version: Option<String>,
    pub environment: Option<Environment>,
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Insert-or-get: profiles are identified by
    /// `(agent, version, environment, window_start, window_end)`; a second
    /// build of the same window returns the previously stored profile
    /// rather than duplicating it (identity).
    async fn upsert_profile(&self, profile: BehaviorProfile) -> Result<BehaviorProfile>;
    async fn get_profile(&self, profile_id: Uuid) -> Result<Option<BehaviorProfile>>;
    async fn list_profiles(
        &self,
        filters: &ProfileFilters,
        pagination: Pagination,
    ) -> Result<Vec<BehaviorProfile>>;
}

// ---------------------------------------------------------------------
// Baselines
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct BaselineFilters {
    pub agent_id: Option<String>,
    pub agent_version: Option<String>,
    pub environment: Option<Environment>,
    pub is_active: Option<bool>,
}

#[async_trait]
pub trait BaselineRepository: Send + Sync {
    async fn create_baseline(&self, baseline: BehaviorBaseline) -> Result<BehaviorBaseline>;
    async fn get_baseline(&self, baseline_id: Uuid) -> Result<Option<BehaviorBaseline>>;
    async fn get_active(
        &self,
        agent_id: &str,
        agent_version: &str,
        environment: Environment,
    ) -> Result<Option<BehaviorBaseline>>;

    /// Activates `baseline_id` and deactivates any previously active
    /// baseline for the same triple, in one transaction.
    async fn activate(&self, baseline_id: Uuid) -> Result<BehaviorBaseline>;
    async fn deactivate(&self, baseline_id: Uuid) -> Result<BehaviorBaseline>;

    /// Allowed only if `approved_by` is not already set.
    async fn approve(&self, baseline_id: Uuid, approved_by: &str) -> Result<BehaviorBaseline>;

    async fn list_baselines(
        &self,
        filters: &BaselineFilters,
        pagination: Pagination,
    ) -> Result<Vec<BehaviorBaseline>>;
}

// ---------------------------------------------------------------------
// Drift
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct DriftFilters {
    pub agent_id: Option<String>,
    pub agent_version: Option<String>,
    pub environment: Option<Environment>,
    pub drift_type: Option<DriftType>,
    pub severity: Option<Severity>,
    pub resolved: Option<bool>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DriftTimelinePoint {
    pub timestamp: DateTime<Utc>,
    pub metric: String,
    pub value: f64,
    pub drift_detected: bool,
    pub drift_id: Option<Uuid>,
}

#[derive(Debug, Clone, serde::Serialize, Default)]
pub struct DriftSummary {
    pub total_drift_events: i64,
    pub unresolved_drift_events: i64,
    pub by_severity: HashMap<String, i64>,
    pub by_type: HashMap<String, i64>,
}

#[async_trait]
pub trait DriftRepository: Send + Sync {
    async fn insert_drift(&self, drift: BehaviorDrift) -> Result<BehaviorDrift>;
    async fn get_drift(&self, drift_id: Uuid) -> Result<Option<BehaviorDrift>>;
    async fn list_drift(
        &self,
        filters: &DriftFilters,
        pagination: Pagination,
    ) -> Result<Vec<BehaviorDrift>>;
    async fn resolve_drift(&self, drift_id: Uuid, resolved_at: DateTime<Utc>) -> Result<BehaviorDrift>;
    async fn timeline(
        &self,
        agent_id: &str,
        agent_version: Option<&str>,
        environment: Option<Environment>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DriftTimelinePoint>>;
    async fn summary(
        &self,
        agent_id: Option<&str>,
        environment: Option<Environment>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<DriftSummary>;
}

// ---------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------

#[async_trait]
pub trait AlertRepository: Send + Sync {
    async fn insert_alert(
        &self,
        drift_id: Uuid,
        alert_message: String,
        alert_channel: AlertChannel,
        delivery_status: DeliveryStatus,
    ) -> Result<AlertLog>;
    async fn list_alerts_for_drift(&self, drift_id: Uuid) -> Result<Vec<AlertLog>>;
}
