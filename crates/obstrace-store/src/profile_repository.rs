//! `ProfileRepository` against `behavior_profiles`.

use async_trait::async_trait;
use obstrace_core::{BehaviorProfile, ProfileFilters, ProfileRepository};
use obstrace_types::{error::Result, Pagination};
use sqlx::{QueryBuilder, Row, Sqlite};
use uuid::Uuid;

use crate::convert::*;
use crate::pool::Store;

fn profile_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<BehaviorProfile> {
    let profile_id: String = row.try_get("profile_id")?;
    let environment: String = row.try_get("environment")?;
    let window_start: String = row.try_get("window_start")?;
    let window_end: String = row.try_get("window_end")?;
    let created_at: String = row.try_get("created_at")?;
    let decision_distributions: String = row.try_get("decision_distributions")?;
    let signal_distributions: String = row.try_get("signal_distributions")?;
    let latency_stats: String = row.try_get("latency_stats")?;

    Ok(BehaviorProfile {
        profile_id: Uuid::parse_str(&profile_id).map_err(|e| {
            obstrace_types::error::ObsError::Internal(format!("corrupt profile_id: {e}"))
        })?,
        agent_id: row.try_get("agent_id")?,
        agent_version: row.try_get("agent_version")?,
        environment: parse_environment(&environment)?,
        window_start: parse_dt(&window_start, "profile.window_start")?,
        window_end: parse_dt(&window_end, "profile.window_end")?,
        sample_size: row.try_get("sample_size")?,
        decision_distributions: serde_json::from_str(&decision_distributions)?,
        signal_distributions: serde_json::from_str(&signal_distributions)?,
        latency_stats: serde_json::from_str(&latency_stats)?,
        created_at: parse_dt(&created_at, "profile.created_at")?,
    })
}

#[async_trait]
impl ProfileRepository for Store {
    async fn upsert_profile(&self, profile: BehaviorProfile) -> Result<BehaviorProfile> {
        let existing = self
            .timeout(
                sqlx::query(
                    "SELECT profile_id, agent_id, agent_version, environment, window_start, window_end, \
                     sample_size, decision_distributions, signal_distributions, latency_stats, created_at \
                     FROM behavior_profiles \
                     WHERE agent_id = ? AND agent_version = ? AND environment = ? AND window_start = ? AND window_end = ?",
                )
                .bind(&profile.agent_id)
                .bind(&profile.agent_version)
                .bind(environment_str(profile.environment))
                .bind(fmt_dt(&profile.window_start))
                .bind(fmt_dt(&profile.window_end))
                .fetch_optional(&self.pool),
            )
            .await?;

        if let Some(row) = existing {
            return profile_from_row(&row);
        }

        self.timeout(
            sqlx::query(
                "INSERT INTO behavior_profiles (profile_id, agent_id, agent_version, environment, window_start, window_end, \
                 sample_size, decision_distributions, signal_distributions, latency_stats, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(profile.profile_id.to_string())
            .bind(&profile.agent_id)
            .bind(&profile.agent_version)
            .bind(environment_str(profile.environment))
            .bind(fmt_dt(&profile.window_start))
            .bind(fmt_dt(&profile.window_end))
            .bind(profile.sample_size)
            .bind(serde_json::to_string(&profile.decision_distributions)?)
            .bind(serde_json::to_string(&profile.signal_distributions)?)
            .bind(serde_json::to_string(&profile.latency_stats)?)
            .bind(fmt_dt(&profile.created_at))
            .execute(&self.pool),
        )
        .await?;

        Ok(profile)
    }

    async fn get_profile(&self, profile_id: Uuid) -> Result<Option<BehaviorProfile>> {
        let row = self
            .timeout(
                sqlx::query(
                    "SELECT profile_id, agent_id, agent_version, environment, window_start, window_end, \
                     sample_size, decision_distributions, signal_distributions, latency_stats, created_at \
                     FROM behavior_profiles WHERE profile_id = ?",
                )
                .bind(profile_id.to_string())
                .fetch_optional(&self.pool),
            )
            .await?;
        row.as_ref().map(profile_from_row).transpose()
    }

    async fn list_profiles(
        &self,
        filters: &ProfileFilters,
        pagination: Pagination,
    ) -> Result<Vec<BehaviorProfile>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT profile_id, agent_id, agent_version, environment, window_start, window_end, \
             sample_size, decision_distributions, signal_distributions, latency_stats, created_at \
             FROM behavior_profiles",
        );
        let mut first = true;
        if let Some(agent_id) = &filters.agent_id {
            qb.push(" WHERE agent_id = ").push_bind(agent_id.as_str());
            first = false;
        }
        if let Some(agent_version) = &filters.agent_version {
            qb.push(if first { " WHERE " } else { " AND " });
            qb.push("agent_version = ").push_bind(agent_version.as_str());
            first = false;
        }
        if let Some(environment) = filters.environment {
            qb.push(if first { " WHERE " } else { " AND " });
            qb.push("environment = ").push_bind(environment_str(environment));
        }
        qb.push(" ORDER BY window_start DESC LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let rows = self.timeout(qb.build().fetch_all(&self.pool)).await?;
        rows.iter().map(profile_from_row).collect()
    }
}
