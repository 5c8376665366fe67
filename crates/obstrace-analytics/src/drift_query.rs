//! Drift query: read-only accessors over profiles, baselines,
//! drift events, drift timeline, and drift summary.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use obstrace_core::{
    BaselineFilters, BaselineRepository, BehaviorBaseline, BehaviorDrift, BehaviorProfile,
    DriftFilters, DriftRepository, DriftSummary, DriftTimelinePoint, Environment, ProfileFilters,
    ProfileRepository,
};
use obstrace_types::error::Result;
use obstrace_types::Pagination;
use uuid::Uuid;

pub struct DriftQueryService {
    profiles: Arc<dyn ProfileRepository>,
    baselines: Arc<dyn BaselineRepository>,
    drift: Arc<dyn DriftRepository>,
}

impl DriftQueryService {
    pub fn new(
        profiles: Arc<dyn ProfileRepository>,
        baselines: Arc<dyn BaselineRepository>,
        drift: Arc<dyn DriftRepository>,
    ) -> Self {
        Self { profiles, baselines, drift }
    }

    pub async fn get_profile(&self, profile_id: Uuid) -> Result<Option<BehaviorProfile>> {
        self.profiles.get_profile(profile_id).await
    }

    pub async fn list_profiles(&self, filters: &ProfileFilters, pagination: Pagination) -> Result<Vec<BehaviorProfile>> {
        self.profiles.list_profiles(filters, pagination).await
    }

    pub async fn get_baseline(&self, baseline_id: Uuid) -> Result<Option<BehaviorBaseline>> {
        self.baselines.get_baseline(baseline_id).await
    }

    pub async fn list_baselines(&self, filters: &BaselineFilters, pagination: Pagination) -> Result<Vec<BehaviorBaseline>> {
        self.baselines.list_baselines(filters, pagination).await
    }

    pub async fn get_drift(&self, drift_id: Uuid) -> Result<Option<BehaviorDrift>> {
        self.drift.get_drift(drift_id).await
    }

    pub async fn list_drift(&self, filters: &DriftFilters, pagination: Pagination) -> Result<Vec<BehaviorDrift>> {
        self.drift.list_drift(filters, pagination).await
    }

    pub async fn resolve_drift(&self, drift_id: Uuid, resolved_at: DateTime<Utc>) -> Result<BehaviorDrift> {
        self.drift.resolve_drift(drift_id, resolved_at).await
    }

    pub async fn timeline(
        &self,
        agent_id: &str,
        agent_version: Option<&str>,
        environment: Option<Environment>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DriftTimelinePoint>> {
        self.drift.timeline(agent_id, agent_version, environment, start, end).await
    }

    pub async fn summary(
        &self,
        agent_id: Option<&str>,
        environment: Option<Environment>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<DriftSummary> {
        self.drift.summary(agent_id, environment, start, end).await
    }
}
