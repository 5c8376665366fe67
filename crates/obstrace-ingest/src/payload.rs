//! Wire shape for `POST /v1/runs`. Deserialized independently
//! from the domain types so a malformed payload never forces a partially
//! constructed domain entity into existence.

use chrono::{DateTime, Utc};
use obstrace_core::Metadata;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct RunPayload {
    pub run_id: Uuid,
    pub agent_id: String,
    pub agent_version: String,
    #[serde(default)]
    pub environment: EnvironmentPayload,
    pub status: RunStatusPayload,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub steps: Vec<StepPayload>,
    #[serde(default)]
    pub failure: Option<FailurePayload>,
    #[serde(default)]
    pub decisions: Vec<DecisionPayload>,
    #[serde(default)]
    pub quality_signals: Vec<QualitySignalPayload>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentPayload {
    #[default]
    Production,
    Staging,
    Development,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatusPayload {
    Success,
    Failure,
    Partial,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepTypePayload {
    Plan,
    Retrieve,
    Tool,
    Respond,
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StepPayload {
    pub step_id: Uuid,
    pub seq: u32,
    pub step_type: StepTypePayload,
    pub name: String,
    pub latency_ms: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureTypePayload {
    Tool,
    Model,
    Retrieval,
    Orchestration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FailurePayload {
    pub step_id: Option<Uuid>,
    pub failure_type: FailureTypePayload,
    pub failure_code: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionTypePayload {
    ToolSelection,
    RetrievalStrategy,
    ResponseMode,
    RetryStrategy,
    OrchestrationPath,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecisionPayload {
    pub decision_id: Uuid,
    pub step_id: Option<Uuid>,
    pub decision_type: DecisionTypePayload,
    pub selected: String,
    pub reason_code: String,
    pub confidence: Option<f64>,
    #[serde(default)]
    pub candidates: Vec<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalTypePayload {
    Hallucination,
    Toxicity,
    Relevance,
    Grounding,
    Format,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QualitySignalPayload {
    pub signal_id: Uuid,
    pub step_id: Option<Uuid>,
    pub signal_type: SignalTypePayload,
    pub signal_code: String,
    pub value: bool,
    pub weight: Option<f64>,
    #[serde(default)]
    pub metadata: Metadata,
}
