//! BehaviorDrift entity: a statistically significant change detected
//! between a baseline profile and an observation-window profile.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::run::Environment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftType {
    Decision,
    Signal,
    Latency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestMethod {
    ChiSquare,
    PercentThreshold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Magnitude-based, non-evaluative classification.
    pub fn from_delta_percent(delta_percent: f64, low_max: f64, medium_max: f64) -> Self {
        let magnitude = delta_percent.abs();
        if magnitude <= low_max {
            Severity::Low
        } else if magnitude <= medium_max {
            Severity::Medium
        } else {
            Severity::High
        }
    }
}

/// A statistically significant deviation of an observation window from its
/// baseline, recorded per-metric. Only `resolved_at` is mutable after
/// creation (invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorDrift {
    pub drift_id: Uuid,
    pub baseline_id: Uuid,
    pub agent_id: String,
    pub agent_version: String,
    pub environment: Environment,
    pub drift_type: DriftType,
    pub metric: String,
    pub baseline_value: f64,
    pub observed_value: f64,
    pub delta: f64,
    pub delta_percent: f64,
    pub significance: f64,
    pub test_method: TestMethod,
    pub severity: Severity,
    pub detected_at: DateTime<Utc>,
    pub observation_window_start: DateTime<Utc>,
    pub observation_window_end: DateTime<Utc>,
    pub observation_sample_size: i64,
    pub resolved_at: Option<DateTime<Utc>>,
}
