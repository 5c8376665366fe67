//! `AlertRepository` against `alert_log`.

use async_trait::async_trait;
use obstrace_core::{AlertChannel, AlertLog, AlertRepository, DeliveryStatus};
use obstrace_types::error::{ObsError, Result};
use sqlx::Row;
use uuid::Uuid;

use crate::convert::fmt_dt;
use crate::pool::Store;

fn channel_str(value: AlertChannel) -> &'static str {
    match value {
        AlertChannel::Log => "log",
        AlertChannel::Database => "database",
        AlertChannel::Webhook => "webhook",
        AlertChannel::Slack => "slack",
        AlertChannel::Pagerduty => "pagerduty",
    }
}

fn parse_channel(value: &str) -> Result<AlertChannel> {
    match value {
        "log" => Ok(AlertChannel::Log),
        "database" => Ok(AlertChannel::Database),
        "webhook" => Ok(AlertChannel::Webhook),
        "slack" => Ok(AlertChannel::Slack),
        "pagerduty" => Ok(AlertChannel::Pagerduty),
        other => Err(ObsError::Internal(format!("corrupt alert channel: {other}"))),
    }
}

fn status_str(value: DeliveryStatus) -> &'static str {
    match value {
        DeliveryStatus::Sent => "sent",
        DeliveryStatus::Failed => "failed",
        DeliveryStatus::Pending => "pending",
        DeliveryStatus::Retry => "retry",
    }
}

fn parse_status(value: &str) -> Result<DeliveryStatus> {
    match value {
        "sent" => Ok(DeliveryStatus::Sent),
        "failed" => Ok(DeliveryStatus::Failed),
        "pending" => Ok(DeliveryStatus::Pending),
        "retry" => Ok(DeliveryStatus::Retry),
        other => Err(ObsError::Internal(format!("corrupt delivery status: {other}"))),
    }
}

fn alert_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<AlertLog> {
    let alert_id: String = row.try_get("alert_id")?;
    let drift_id: String = row.try_get("drift_id")?;
    let alert_channel: String = row.try_get("alert_channel")?;
    let delivery_status: String = row.try_get("delivery_status")?;
    let sent_at: String = row.try_get("sent_at")?;

    Ok(AlertLog {
        alert_id: Uuid::parse_str(&alert_id)
            .map_err(|e| ObsError::Internal(format!("corrupt alert_id: {e}")))?,
        drift_id: Uuid::parse_str(&drift_id)
            .map_err(|e| ObsError::Internal(format!("corrupt drift_id: {e}")))?,
        alert_message: row.try_get("alert_message")?,
        alert_channel: parse_channel(&alert_channel)?,
        sent_at: crate::convert::parse_dt(&sent_at, "alert.sent_at")?,
        delivery_status: parse_status(&delivery_status)?,
    })
}

#[async_trait]
impl AlertRepository for Store {
    async fn insert_alert(
        &self,
        drift_id: Uuid,
        alert_message: String,
        alert_channel: AlertChannel,
        delivery_status: DeliveryStatus,
    ) -> Result<AlertLog> {
        let alert = AlertLog {
            alert_id: Uuid::new_v4(),
            drift_id,
            alert_message,
            alert_channel,
            sent_at: chrono::Utc::now(),
            delivery_status,
        };

        self.timeout(
            sqlx::query(
                "INSERT INTO alert_log (alert_id, drift_id, alert_message, alert_channel, sent_at, delivery_status) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(alert.alert_id.to_string())
            .bind(alert.drift_id.to_string())
            .bind(&alert.alert_message)
            .bind(channel_str(alert.alert_channel))
            .bind(fmt_dt(&alert.sent_at))
            .bind(status_str(alert.delivery_status))
            .execute(&self.pool),
        )
        .await?;

        Ok(alert)
    }

    async fn list_alerts_for_drift(&self, drift_id: Uuid) -> Result<Vec<AlertLog>> {
        let rows = self
            .timeout(
                sqlx::query(
                    "SELECT alert_id, drift_id, alert_message, alert_channel, sent_at, delivery_status \
                     FROM alert_log WHERE drift_id = ? ORDER BY sent_at ASC",
                )
                .bind(drift_id.to_string())
                .fetch_all(&self.pool),
            )
            .await?;
        rows.iter().map(alert_from_row).collect()
    }
}
