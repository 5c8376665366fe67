//! Alert emitter: renders one neutral, informational message per
//! drift and dispatches it to every independently-enabled sink.

use std::sync::Arc;
use std::time::Duration;

use obstrace_core::{AlertChannel, AlertLog, AlertRepository, BehaviorDrift, DeliveryStatus};
use obstrace_types::config::AlertSinksConfig;
use obstrace_types::error::Result;
use reqwest::Client;

/// Phrases the rendered message must never contain.
const FORBIDDEN_PHRASES: &[&str] = &[
    "better", "worse", "correct", "incorrect", "optimal", "suboptimal", "degraded", "improved",
    "fix", "should",
];

fn render_message(drift: &BehaviorDrift) -> String {
    format!(
        "drift detected for agent={} version={} environment={:?}: metric={} baseline_value={:.6} \
         observed_value={:.6} delta_percent={:.2} severity={:?} baseline_id={} test_method={:?} \
         significance={:.6} detected_at={} observation_window=[{}, {}] observation_sample_size={}",
        drift.agent_id,
        drift.agent_version,
        drift.environment,
        drift.metric,
        drift.baseline_value,
        drift.observed_value,
        drift.delta_percent,
        drift.severity,
        drift.baseline_id,
        drift.test_method,
        drift.significance,
        drift.detected_at.to_rfc3339(),
        drift.observation_window_start.to_rfc3339(),
        drift.observation_window_end.to_rfc3339(),
        drift.observation_sample_size,
    )
}

fn assert_neutral(message: &str) {
    let lower = message.to_ascii_lowercase();
    debug_assert!(
        FORBIDDEN_PHRASES.iter().all(|phrase| !lower.contains(phrase)),
        "alert message template contains an evaluative phrase"
    );
}

pub struct AlertEmitter {
    alerts: Arc<dyn AlertRepository>,
    sinks: AlertSinksConfig,
    http: Client,
    webhook_deadline: Duration,
}

impl AlertEmitter {
    pub fn new(alerts: Arc<dyn AlertRepository>, sinks: AlertSinksConfig) -> Self {
        let webhook_deadline = Duration::from_millis(sinks.webhook_timeout_ms);
        let http = Client::builder()
            .build()
            .expect("failed to build webhook http client");
        Self {
            alerts,
            sinks,
            http,
            webhook_deadline,
        }
    }

    /// Dispatches to every enabled sink independently; a sink failure is
    /// logged and recorded but never aborts the remaining sinks.
    #[tracing::instrument(skip(self, drift), fields(drift_id = %drift.drift_id))]
    pub async fn emit(&self, drift: &BehaviorDrift) -> Result<Vec<AlertLog>> {
        let message = render_message(drift);
        assert_neutral(&message);

        let mut logs = Vec::new();

        tracing::info!(%message, "behavior drift alert");
        logs.push(
            self.alerts
                .insert_alert(drift.drift_id, message.clone(), AlertChannel::Log, DeliveryStatus::Sent)
                .await?,
        );

        if self.sinks.database_enabled {
            logs.push(
                self.alerts
                    .insert_alert(drift.drift_id, message.clone(), AlertChannel::Database, DeliveryStatus::Sent)
                    .await?,
            );
        }

        if let Some(url) = &self.sinks.webhook_url {
            let status = self.post_webhook(url, drift, &message).await;
            logs.push(
                self.alerts
                    .insert_alert(drift.drift_id, message.clone(), AlertChannel::Webhook, status)
                    .await?,
            );
        }

        Ok(logs)
    }

    async fn post_webhook(&self, url: &str, drift: &BehaviorDrift, message: &str) -> DeliveryStatus {
        let body = serde_json::json!({
            "drift_id": drift.drift_id,
            "agent_id": drift.agent_id,
            "agent_version": drift.agent_version,
            "metric": drift.metric,
            "severity": drift.severity,
            "message": message,
        });

        let send = self.http.post(url).json(&body).send();
        match tokio::time::timeout(self.webhook_deadline, send).await {
            Ok(Ok(response)) if response.status().is_success() => DeliveryStatus::Sent,
            Ok(Ok(response)) => {
                tracing::warn!(status = %response.status(), "webhook sink rejected alert");
                DeliveryStatus::Failed
            }
            Ok(Err(error)) => {
                tracing::warn!(%error, "webhook sink unreachable");
                DeliveryStatus::Failed
            }
            Err(_) => {
                tracing::warn!(deadline_ms = self.webhook_deadline.as_millis() as u64, "webhook sink exceeded its deadline");
                DeliveryStatus::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use obstrace_core::{DriftType, Environment, Severity, TestMethod};
    use uuid::Uuid;

    fn sample_drift() -> BehaviorDrift {
        BehaviorDrift {
            drift_id: Uuid::new_v4(),
            baseline_id: Uuid::new_v4(),
            agent_id: "agent-a".to_string(),
            agent_version: "1.0.0".to_string(),
            environment: Environment::Production,
            drift_type: DriftType::Latency,
            metric: "p95_run_duration_ms".to_string(),
            baseline_value: 100.0,
            observed_value: 130.0,
            delta: 30.0,
            delta_percent: 30.0,
            significance: 1.0,
            test_method: TestMethod::PercentThreshold,
            severity: Severity::Medium,
            detected_at: Utc::now(),
            observation_window_start: Utc::now(),
            observation_window_end: Utc::now(),
            observation_sample_size: 200,
            resolved_at: None,
        }
    }

    #[test]
    fn rendered_message_contains_no_evaluative_phrase() {
        let message = render_message(&sample_drift()).to_ascii_lowercase();
        for phrase in FORBIDDEN_PHRASES {
            assert!(!message.contains(phrase), "message unexpectedly contains '{phrase}'");
        }
    }

    #[test]
    fn rendered_message_carries_required_fields() {
        let drift = sample_drift();
        let message = render_message(&drift);
        assert!(message.contains(&drift.agent_id));
        assert!(message.contains(&drift.baseline_id.to_string()));
        assert!(message.contains("delta_percent"));
        assert!(message.contains("observation_sample_size"));
    }
}
