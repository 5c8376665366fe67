//! `BaselineRepository` against `behavior_baselines`. Immutability of every
//! field but `is_active`/`approved_by`/`approved_at` is enforced by the
//! `trg_baseline_immutable` trigger in the schema; this layer only needs to
//! avoid issuing updates that would trip it.

use async_trait::async_trait;
use obstrace_core::{BaselineFilters, BaselineRepository, BehaviorBaseline};
use obstrace_types::error::{ObsError, Result};
use obstrace_types::Pagination;
use sqlx::{QueryBuilder, Row, Sqlite};
use uuid::Uuid;

use crate::convert::*;
use crate::pool::Store;

fn baseline_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<BehaviorBaseline> {
    let baseline_id: String = row.try_get("baseline_id")?;
    let profile_id: String = row.try_get("profile_id")?;
    let environment: String = row.try_get("environment")?;
    let baseline_type: String = row.try_get("baseline_type")?;
    let approved_at: Option<String> = row.try_get("approved_at")?;
    let created_at: String = row.try_get("created_at")?;
    let is_active: i64 = row.try_get("is_active")?;

    Ok(BehaviorBaseline {
        baseline_id: Uuid::parse_str(&baseline_id).map_err(|e| {
            ObsError::Internal(format!("corrupt baseline_id: {e}"))
        })?,
        profile_id: Uuid::parse_str(&profile_id)
            .map_err(|e| ObsError::Internal(format!("corrupt profile_id: {e}")))?,
        agent_id: row.try_get("agent_id")?,
        agent_version: row.try_get("agent_version")?,
        environment: parse_environment(&environment)?,
        baseline_type: parse_baseline_type(&baseline_type)?,
        approved_by: row.try_get("approved_by")?,
        approved_at: approved_at
            .map(|v| parse_dt(&v, "baseline.approved_at"))
            .transpose()?,
        description: row.try_get("description")?,
        is_active: is_active != 0,
        created_at: parse_dt(&created_at, "baseline.created_at")?,
    })
}

const SELECT: &str = "SELECT baseline_id, profile_id, agent_id, agent_version, environment, \
    baseline_type, approved_by, approved_at, description, is_active, created_at FROM behavior_baselines";

#[async_trait]
impl BaselineRepository for Store {
    async fn create_baseline(&self, baseline: BehaviorBaseline) -> Result<BehaviorBaseline> {
        let insert = sqlx::query(
            "INSERT INTO behavior_baselines (baseline_id, profile_id, agent_id, agent_version, environment, \
             baseline_type, approved_by, approved_at, description, is_active, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(baseline.baseline_id.to_string())
        .bind(baseline.profile_id.to_string())
        .bind(&baseline.agent_id)
        .bind(&baseline.agent_version)
        .bind(environment_str(baseline.environment))
        .bind(baseline_type_str(baseline.baseline_type))
        .bind(&baseline.approved_by)
        .bind(baseline.approved_at.as_ref().map(fmt_dt))
        .bind(&baseline.description)
        .bind(baseline.is_active as i64)
        .bind(fmt_dt(&baseline.created_at))
        .execute(&self.pool);

        match tokio::time::timeout(self.query_timeout, insert).await {
            Err(_) => Err(ObsError::Timeout(
                "database query exceeded its deadline".into(),
            )),
            Ok(Err(error)) if is_unique_violation(&error) => Err(ObsError::Conflict(
                "an active baseline already exists for this agent/version/environment".into(),
            )),
            Ok(Err(error)) => Err(ObsError::from(error)),
            Ok(Ok(_)) => Ok(baseline),
        }
    }

    async fn get_baseline(&self, baseline_id: Uuid) -> Result<Option<BehaviorBaseline>> {
        let row = self
            .timeout(
                sqlx::query(&format!("{SELECT} WHERE baseline_id = ?"))
                    .bind(baseline_id.to_string())
                    .fetch_optional(&self.pool),
            )
            .await?;
        row.as_ref().map(baseline_from_row).transpose()
    }

    async fn get_active(
        &self,
        agent_id: &str,
        agent_version: &str,
        environment: obstrace_core::Environment,
    ) -> Result<Option<BehaviorBaseline>> {
        let row = self
            .timeout(
                sqlx::query(&format!(
                    "{SELECT} WHERE agent_id = ? AND agent_version = ? AND environment = ? AND is_active = 1"
                ))
                .bind(agent_id)
                .bind(agent_version)
                .bind(environment_str(environment))
                .fetch_optional(&self.pool),
            )
            .await?;
        row.as_ref().map(baseline_from_row).transpose()
    }

    async fn activate(&self, baseline_id: Uuid) -> Result<BehaviorBaseline> {
        let mut txn = self.pool.begin().await?;

        let row = self
            .timeout(
                sqlx::query(&format!("{SELECT} WHERE baseline_id = ?"))
                    .bind(baseline_id.to_string())
                    .fetch_optional(&mut *txn),
            )
            .await?
            .ok_or_else(|| ObsError::NotFound(format!("baseline {baseline_id} not found")))?;
        let target = baseline_from_row(&row)?;

        self.timeout(
            sqlx::query(
                "UPDATE behavior_baselines SET is_active = 0 \
                 WHERE agent_id = ? AND agent_version = ? AND environment = ? AND is_active = 1",
            )
            .bind(&target.agent_id)
            .bind(&target.agent_version)
            .bind(environment_str(target.environment))
            .execute(&mut *txn),
        )
        .await?;

        self.timeout(
            sqlx::query("UPDATE behavior_baselines SET is_active = 1 WHERE baseline_id = ?")
                .bind(baseline_id.to_string())
                .execute(&mut *txn),
        )
        .await?;

        txn.commit().await?;

        Ok(BehaviorBaseline {
            is_active: true,
            ..target
        })
    }

    async fn deactivate(&self, baseline_id: Uuid) -> Result<BehaviorBaseline> {
        self.timeout(
            sqlx::query("UPDATE behavior_baselines SET is_active = 0 WHERE baseline_id = ?")
                .bind(baseline_id.to_string())
                .execute(&self.pool),
        )
        .await?;

        self.get_baseline(baseline_id)
            .await?
            .ok_or_else(|| ObsError::NotFound(format!("baseline {baseline_id} not found")))
    }

    async fn approve(&self, baseline_id: Uuid, approved_by: &str) -> Result<BehaviorBaseline> {
        let existing = self
            .get_baseline(baseline_id)
            .await?
            .ok_or_else(|| ObsError::NotFound(format!("baseline {baseline_id} not found")))?;

        if existing.is_approved() {
            return Err(ObsError::Conflict(format!(
                "baseline {baseline_id} is already approved"
            )));
        }

        let approved_at = chrono::Utc::now();
        self.timeout(
            sqlx::query(
                "UPDATE behavior_baselines SET approved_by = ?, approved_at = ? WHERE baseline_id = ?",
            )
            .bind(approved_by)
            .bind(fmt_dt(&approved_at))
            .bind(baseline_id.to_string())
            .execute(&self.pool),
        )
        .await?;

        Ok(BehaviorBaseline {
            approved_by: Some(approved_by.to_string()),
            approved_at: Some(approved_at),
            ..existing
        })
    }

    async fn list_baselines(
        &self,
        filters: &BaselineFilters,
        pagination: Pagination,
    ) -> Result<Vec<BehaviorBaseline>> {
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
        if let Some(v) = filters.is_active {
            cond!();
            qb.push("is_active = ").push_bind(v as i64);
        }
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let rows = self.timeout(qb.build().fetch_all(&self.pool)).await?;
        rows.iter().map(baseline_from_row).collect()
    }
}
