//! Decision entity and its fixed decision_type -> reason_code membership
//! table: each `reason_code` is validated against the subset permitted for
//! its `decision_type`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::run::Metadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    ToolSelection,
    RetrievalStrategy,
    ResponseMode,
    RetryStrategy,
    OrchestrationPath,
}

impl DecisionType {
    pub const ALL: [DecisionType; 5] = [
        DecisionType::ToolSelection,
        DecisionType::RetrievalStrategy,
        DecisionType::ResponseMode,
        DecisionType::RetryStrategy,
        DecisionType::OrchestrationPath,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionType::ToolSelection => "tool_selection",
            DecisionType::RetrievalStrategy => "retrieval_strategy",
            DecisionType::ResponseMode => "response_mode",
            DecisionType::RetryStrategy => "retry_strategy",
            DecisionType::OrchestrationPath => "orchestration_path",
        }
    }

    /// The fixed set of `reason_code`s permitted for this decision type.
    pub fn permitted_reason_codes(&self) -> &'static [&'static str] {
        match self {
            DecisionType::ToolSelection => &[
                "best_match_capability",
                "lowest_cost",
                "lowest_latency",
                "fallback_after_failure",
                "user_specified",
            ],
            DecisionType::RetrievalStrategy => &[
                "semantic_search",
                "keyword_search",
                "hybrid_search",
                "cache_hit",
                "no_retrieval_needed",
            ],
            DecisionType::ResponseMode => &[
                "direct_answer",
                "clarification_needed",
                "deferred_to_human",
                "structured_output",
            ],
            DecisionType::RetryStrategy => &[
                "transient_error",
                "rate_limited",
                "timeout",
                "validation_failure",
                "no_retry",
            ],
            DecisionType::OrchestrationPath => &[
                "single_agent",
                "sequential_handoff",
                "parallel_fanout",
                "escalation",
            ],
        }
    }

    pub fn reason_code_is_permitted(&self, reason_code: &str) -> bool {
        self.permitted_reason_codes().contains(&reason_code)
    }
}

/// A structured record of a selection made by the agent at a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub decision_id: Uuid,
    pub run_id: Uuid,
    pub step_id: Option<Uuid>,
    pub decision_type: DecisionType,
    pub selected: String,
    pub reason_code: String,
    pub confidence: Option<f64>,
    pub candidates: Vec<String>,
    pub metadata: Metadata,
    pub recorded_at: DateTime<Utc>,
}
