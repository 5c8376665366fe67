//! BehaviorBaseline entity: an approved profile snapshot activated as the
//! reference point drift detection compares observations against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::run::Environment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineType {
    Version,
    TimeWindow,
    Manual,
}

/// An immutable approved profile, activated for a specific
/// `(agent_id, agent_version, environment)` triple. Every field except
/// `is_active` and the first-time `approved_by`/`approved_at` pair is
/// immutable once the row is created (invariant (ii)).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorBaseline {
    pub baseline_id: Uuid,
    pub profile_id: Uuid,
    pub agent_id: String,
    pub agent_version: String,
    pub environment: Environment,
    pub baseline_type: BaselineType,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl BehaviorBaseline {
    pub fn is_approved(&self) -> bool {
        self.approved_by.is_some()
    }
}
