//! AlertLog entity: one record per attempted delivery to a notification sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertChannel {
    Log,
    Database,
    Webhook,
    Slack,
    Pagerduty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Failed,
    Pending,
    Retry,
}

/// A single neutral, informational alert emitted per drift and dispatched
/// to one configured sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertLog {
    pub alert_id: Uuid,
    pub drift_id: Uuid,
    pub alert_message: String,
    pub alert_channel: AlertChannel,
    pub sent_at: DateTime<Utc>,
    pub delivery_status: DeliveryStatus,
}
