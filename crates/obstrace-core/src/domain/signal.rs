//! QualitySignal entity and its fixed signal_type -> signal_code membership
//! table: each `signal_code` is validated within its `signal_type`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::run::Metadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    Hallucination,
    Toxicity,
    Relevance,
    Grounding,
    Format,
}

impl SignalType {
    pub const ALL: [SignalType; 5] = [
        SignalType::Hallucination,
        SignalType::Toxicity,
        SignalType::Relevance,
        SignalType::Grounding,
        SignalType::Format,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::Hallucination => "hallucination",
            SignalType::Toxicity => "toxicity",
            SignalType::Relevance => "relevance",
            SignalType::Grounding => "grounding",
            SignalType::Format => "format",
        }
    }

    /// The fixed set of `signal_code`s permitted for this signal type.
    pub fn permitted_signal_codes(&self) -> &'static [&'static str] {
        match self {
            SignalType::Hallucination => &["none", "minor", "severe"],
            SignalType::Toxicity => &["clean", "flagged"],
            SignalType::Relevance => &["on_topic", "partially_relevant", "off_topic"],
            SignalType::Grounding => &["fully_grounded", "partially_grounded", "ungrounded"],
            SignalType::Format => &["valid", "malformed", "truncated"],
        }
    }

    pub fn signal_code_is_permitted(&self, signal_code: &str) -> bool {
        self.permitted_signal_codes().contains(&signal_code)
    }
}

/// A boolean observation at a step, typed and coded from a fixed enum,
/// optionally weighted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualitySignal {
    pub signal_id: Uuid,
    pub run_id: Uuid,
    pub step_id: Option<Uuid>,
    pub signal_type: SignalType,
    pub signal_code: String,
    pub value: bool,
    pub weight: Option<f64>,
    pub metadata: Metadata,
    pub recorded_at: DateTime<Utc>,
}
