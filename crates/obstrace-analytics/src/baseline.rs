//! Baseline manager: promotes a profile to an immutable
//! baseline and gates its activation.

use std::sync::Arc;

use chrono::Utc;
use obstrace_core::validation::check_description;
use obstrace_core::{BaselineFilters, BaselineRepository, BaselineType, BehaviorBaseline, Environment, ProfileRepository};
use obstrace_types::error::{ObsError, Result};
use obstrace_types::Pagination;
use uuid::Uuid;

pub struct BaselineManager {
    profiles: Arc<dyn ProfileRepository>,
    baselines: Arc<dyn BaselineRepository>,
}

impl BaselineManager {
    pub fn new(profiles: Arc<dyn ProfileRepository>, baselines: Arc<dyn BaselineRepository>) -> Self {
        Self { profiles, baselines }
    }

    #[tracing::instrument(skip(self, description))]
    pub async fn create_baseline(
        &self,
        profile_id: Uuid,
        baseline_type: BaselineType,
        description: Option<String>,
        approved_by: Option<String>,
    ) -> Result<BehaviorBaseline> {
        let profile = self
            .profiles
            .get_profile(profile_id)
            .await?
            .ok_or_else(|| ObsError::NotFound(format!("profile {profile_id}")))?;

        if let Some(desc) = &description {
            check_description(desc, "baseline.description")?;
        }

        let now = Utc::now();
        let baseline = BehaviorBaseline {
            baseline_id: Uuid::new_v4(),
            profile_id,
            agent_id: profile.agent_id,
            agent_version: profile.agent_version,
            environment: profile.environment,
            baseline_type,
            approved_by,
            approved_at: None,
            description,
            is_active: false,
            created_at: now,
        };

        self.baselines.create_baseline(baseline).await
    }

    pub async fn activate(&self, baseline_id: Uuid) -> Result<BehaviorBaseline> {
        self.baselines.activate(baseline_id).await
    }

    pub async fn deactivate(&self, baseline_id: Uuid) -> Result<BehaviorBaseline> {
        self.baselines.deactivate(baseline_id).await
    }

    pub async fn get_active(
        &self,
        agent_id: &str,
        agent_version: &str,
        environment: Environment,
    ) -> Result<Option<BehaviorBaseline>> {
        self.baselines.get_active(agent_id, agent_version, environment).await
    }

    /// Allowed only if the baseline is not already approved.
    pub async fn approve(&self, baseline_id: Uuid, approved_by: &str) -> Result<BehaviorBaseline> {
        let existing = self
            .baselines
            .get_baseline(baseline_id)
            .await?
            .ok_or_else(|| ObsError::NotFound(format!("baseline {baseline_id}")))?;
        if existing.is_approved() {
            return Err(ObsError::Conflict(format!("baseline {baseline_id} already approved")));
        }
        self.baselines.approve(baseline_id, approved_by).await
    }

    pub async fn list_baselines(
        &self,
        filters: &BaselineFilters,
        pagination: Pagination,
    ) -> Result<Vec<BehaviorBaseline>> {
        self.baselines.list_baselines(filters, pagination).await
    }
}
