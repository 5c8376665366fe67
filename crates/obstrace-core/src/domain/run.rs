//! Run, Step, and Failure entities.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bounded, typed primitive for metadata maps: a typed envelope rather
/// than a free-form document. Nested objects and arrays are rejected at the
/// validation layer before a value ever reaches this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

pub type Metadata = HashMap<String, MetadataValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Staging,
    Development,
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Production
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failure,
    Partial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    Plan,
    Retrieve,
    Tool,
    Respond,
    Other,
}

/// One attempted execution of an agent, from start to end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub run_id: Uuid,
    pub agent_id: String,
    pub agent_version: String,
    pub environment: Environment,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Run {
    /// Duration of the run in milliseconds, when `ended_at` is present.
    /// Runs without an end time are excluded from latency statistics
    ///.
    pub fn duration_ms(&self) -> Option<i64> {
        self.ended_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}

/// One atomic action within a run, ordered by `seq`. A retry is a distinct
/// Step, never an overwrite of a prior one (invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub step_id: Uuid,
    pub run_id: Uuid,
    pub seq: u32,
    pub step_type: StepType,
    pub name: String,
    pub latency_ms: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureType {
    Tool,
    Model,
    Retrieval,
    Orchestration,
}

/// A semantic classification attached to a failed run, optionally linked to
/// a step. Server-assigns `failure_id` at write time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Failure {
    pub failure_id: Uuid,
    pub run_id: Uuid,
    pub step_id: Option<Uuid>,
    pub failure_type: FailureType,
    pub failure_code: String,
    pub message: String,
}
