//! `DriftRepository` against `behavior_drift`. Rows are immutable except
//! `resolved_at`, enforced by `trg_drift_immutable`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use obstrace_core::{
    BehaviorDrift, DriftFilters, DriftRepository, DriftSummary, DriftTimelinePoint, Environment,
};
use obstrace_types::error::{ObsError, Result};
use obstrace_types::Pagination;
use sqlx::{QueryBuilder, Row, Sqlite};
use uuid::Uuid;

use crate::convert::*;
use crate::pool::Store;

const SELECT: &str = "SELECT drift_id, baseline_id, agent_id, agent_version, environment, drift_type, \
    metric, baseline_value, observed_value, delta, delta_percent, significance, test_method, severity, \
    detected_at, observation_window_start, observation_window_end, observation_sample_size, resolved_at \
    FROM behavior_drift";

fn drift_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<BehaviorDrift> {
    let drift_id: String = row.try_get("drift_id")?;
    let baseline_id: String = row.try_get("baseline_id")?;
    let environment: String = row.try_get("environment")?;
    let drift_type: String = row.try_get("drift_type")?;
    let test_method: String = row.try_get("test_method")?;
    let severity: String = row.try_get("severity")?;
    let detected_at: String = row.try_get("detected_at")?;
    let observation_window_start: String = row.try_get("observation_window_start")?;
    let observation_window_end: String = row.try_get("observation_window_end")?;
    let resolved_at: Option<String> = row.try_get("resolved_at")?;

    Ok(BehaviorDrift {
        drift_id: Uuid::parse_str(&drift_id)
            .map_err(|e| ObsError::Internal(format!("corrupt drift_id: {e}")))?,
        baseline_id: Uuid::parse_str(&baseline_id)
            .map_err(|e| ObsError::Internal(format!("corrupt baseline_id: {e}")))?,
        agent_id: row.try_get("agent_id")?,
        agent_version: row.try_get("agent_version")?,
        environment: parse_environment(&environment)?,
        drift_type: parse_drift_type(&drift_type)?,
        metric: row.try_get("metric")?,
        baseline_value: row.try_get("baseline_value")?,
        observed_value: row.try_get("observed_value")?,
        delta: row.try_get("delta")?,
        delta_percent: row.try_get("delta_percent")?,
        significance: row.try_get("significance")?,
        test_method: parse_test_method(&test_method)?,
        severity: parse_severity(&severity)?,
        detected_at: parse_dt(&detected_at, "drift.detected_at")?,
        observation_window_start: parse_dt(
            &observation_window_start,
            "drift.observation_window_start",
        )?,
        observation_window_end: parse_dt(&observation_window_end, "drift.observation_window_end")?,
        observation_sample_size: row.try_get("observation_sample_size")?,
        resolved_at: resolved_at
            .map(|v| parse_dt(&v, "drift.resolved_at"))
            .transpose()?,
    })
}

#[async_trait]
impl DriftRepository for Store {
    async fn insert_drift(&self, drift: BehaviorDrift) -> Result<BehaviorDrift> {
        self.timeout(
            sqlx::query(
                "INSERT INTO behavior_drift (drift_id, baseline_id, agent_id, agent_version, environment, \
                 drift_type, metric, baseline_value, observed_value, delta, delta_percent, significance, \
                 test_method, severity, detected_at, observation_window_start, observation_window_end, \
                 observation_sample_size, resolved_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(drift.drift_id.to_string())
            .bind(drift.baseline_id.to_string())
            .bind(&drift.agent_id)
            .bind(&drift.agent_version)
            .bind(environment_str(drift.environment))
            .bind(drift_type_str(drift.drift_type))
            .bind(&drift.metric)
            .bind(drift.baseline_value)
            .bind(drift.observed_value)
            .bind(drift.delta)
            .bind(drift.delta_percent)
            .bind(drift.significance)
            .bind(test_method_str(drift.test_method))
            .bind(severity_str(drift.severity))
            .bind(fmt_dt(&drift.detected_at))
            .bind(fmt_dt(&drift.observation_window_start))
            .bind(fmt_dt(&drift.observation_window_end))
            .bind(drift.observation_sample_size)
            .bind(drift.resolved_at.as_ref().map(fmt_dt))
            .execute(&self.pool),
        )
        .await?;

        Ok(drift)
    }

    async fn get_drift(&self, drift_id: Uuid) -> Result<Option<BehaviorDrift>> {
        let row = self
            .timeout(
                sqlx::query(&format!("{SELECT} WHERE drift_id = ?"))
                    .bind(drift_id.to_string())
                    .fetch_optional(&self.pool),
            )
            .await?;
        row.as_ref().map(drift_from_row).transpose()
    }

    async fn list_drift(
        &self,
        filters: &DriftFilters,
        pagination: Pagination,
    ) -> Result<Vec<BehaviorDrift>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT);
        let mut first = true;
        macro_rules! cond {
            () => {{
                qb.push(if first { " WHERE " } else { " AND " });
                first = false;
            }};
        }
        if let Some(v) = &filters.agent_id {
            cond!();
            qb.push("agent_id = ").push_bind(v.as_str());
        }
        if let Some(v) = &filters.agent_version {
            cond!();
            qb.push("agent_version = ").push_bind(v.as_str());
        }
        if let Some(v) = filters.environment {
            cond!();
            qb.push("environment = ").push_bind(environment_str(v));
        }
        if let Some(v) = filters.drift_type {
            cond!();
            qb.push("drift_type = ").push_bind(drift_type_str(v));
        }
        if let Some(v) = filters.severity {
            cond!();
            qb.push("severity = ").push_bind(severity_str(v));
        }
        if let Some(v) = filters.resolved {
            cond!();
            if v {
                qb.push("resolved_at IS NOT NULL");
            } else {
                qb.push("resolved_at IS NULL");
            }
        }
        qb.push(" ORDER BY detected_at DESC LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let rows = self.timeout(qb.build().fetch_all(&self.pool)).await?;
        rows.iter().map(drift_from_row).collect()
    }

    async fn resolve_drift(&self, drift_id: Uuid, resolved_at: DateTime<Utc>) -> Result<BehaviorDrift> {
        self.timeout(
            sqlx::query("UPDATE behavior_drift SET resolved_at = ? WHERE drift_id = ?")
                .bind(fmt_dt(&resolved_at))
                .bind(drift_id.to_string())
                .execute(&self.pool),
        )
        .await?;

        self.get_drift(drift_id)
            .await?
            .ok_or_else(|| ObsError::NotFound(format!("drift {drift_id} not found")))
    }

    async fn timeline(
        &self,
        agent_id: &str,
        agent_version: Option<&str>,
        environment: Option<Environment>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DriftTimelinePoint>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT drift_id, metric, observed_value, detected_at FROM behavior_drift WHERE agent_id = ",
        );
        qb.push_bind(agent_id);
        qb.push(" AND detected_at >= ")
            .push_bind(fmt_dt(&start))
            .push(" AND detected_at <= ")
            .push_bind(fmt_dt(&end));
        if let Some(v) = agent_version {
            qb.push(" AND agent_version = ").push_bind(v.to_string());
        }
        if let Some(v) = environment {
            qb.push(" AND environment = ").push_bind(environment_str(v));
        }
        qb.push(" ORDER BY detected_at ASC");

        let rows = self.timeout(qb.build().fetch_all(&self.pool)).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let drift_id: String = row.try_get("drift_id")?;
            let detected_at: String = row.try_get("detected_at")?;
            out.push(DriftTimelinePoint {
                timestamp: parse_dt(&detected_at, "drift.detected_at")?,
                metric: row.try_get("metric")?,
                value: row.try_get("observed_value")?,
                drift_detected: true,
                drift_id: Some(
                    Uuid::parse_str(&drift_id)
                        .map_err(|e| ObsError::Internal(format!("corrupt drift_id: {e}")))?,
                ),
            });
        }
        Ok(out)
    }

    async fn summary(
        &self,
        agent_id: Option<&str>,
        environment: Option<Environment>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<DriftSummary> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT severity, drift_type, resolved_at FROM behavior_drift WHERE detected_at >= ",
        );
        qb.push_bind(fmt_dt(&start))
            .push(" AND detected_at <= ")
            .push_bind(fmt_dt(&end));
        if let Some(v) = agent_id {
            qb.push(" AND agent_id = ").push_bind(v.to_string());
        }
        if let Some(v) = environment {
            qb.push(" AND environment = ").push_bind(environment_str(v));
        }

        let rows = self.timeout(qb.build().fetch_all(&self.pool)).await?;
        let mut summary = DriftSummary::default();
        let mut by_severity: HashMap<String, i64> = HashMap::new();
        let mut by_type: HashMap<String, i64> = HashMap::new();
        for row in &rows {
            summary.total_drift_events += 1;
            let resolved_at: Option<String> = row.try_get("resolved_at")?;
            if resolved_at.is_none() {
                summary.unresolved_drift_events += 1;
            }
            let severity: String = row.try_get("severity")?;
            let drift_type: String = row.try_get("drift_type")?;
            *by_severity.entry(severity).or_insert(0) += 1;
            *by_type.entry(drift_type).or_insert(0) += 1;
        }
        summary.by_severity = by_severity;
        summary.by_type = by_type;
        Ok(summary)
    }
}
