//! `RunRepository`, `StatsRepository`, and `ObservationRepository` against
//! the `agent_runs` family of tables.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use obstrace_core::{
    Decision, DecisionType, Environment, Failure, InsertOutcome, NewRunTree, QualitySignal, Run,
    RunFilters, RunRepository, RunTree, SignalType, Step, StatsRepository, ObservationRepository,
};
use obstrace_types::error::{ObsError, Result};
use obstrace_types::Pagination;
use sqlx::{QueryBuilder, Row, Sqlite};
use uuid::Uuid;

use crate::convert::*;
use crate::pool::Store;

fn push_run_filters<'a>(qb: &mut QueryBuilder<'a, Sqlite>, filters: &'a RunFilters) {
    let mut first = true;
    macro_rules! cond {
        () => {{
            qb.push(if first { " WHERE " } else { " AND " });
            first = false;
        }};
    }
    if let Some(agent_id) = &filters.agent_id {
        cond!();
        qb.push("agent_id = ").push_bind(agent_id.as_str());
    }
    if let Some(agent_version) = &filters.agent_version {
        cond!();
        qb.push("agent_version = ").push_bind(agent_version.as_str());
    }
    if let Some(status) = filters.status {
        cond!();
        qb.push("status = ").push_bind(run_status_str(status));
    }
    if let Some(environment) = filters.environment {
        cond!();
        qb.push("environment = ")
            .push_bind(environment_str(environment));
    }
    if let Some(start_time) = filters.start_time {
        cond!();
        qb.push("started_at >= ").push_bind(fmt_dt(&start_time));
    }
    if let Some(end_time) = filters.end_time {
        cond!();
        qb.push("started_at <= ").push_bind(fmt_dt(&end_time));
    }
}

impl Store {
    async fn fetch_run_only(&self, run_id: Uuid) -> Result<Option<Run>> {
        let row = self
            .timeout(
                sqlx::query(
                    "SELECT run_id, agent_id, agent_version, environment, status, started_at, ended_at, created_at \
                     FROM agent_runs WHERE run_id = ?",
                )
                .bind(run_id.to_string())
                .fetch_optional(&self.pool),
            )
            .await?;

        let Some(row) = row else { return Ok(None) };
        Ok(Some(run_from_row(&row)?))
    }

    async fn fetch_steps(&self, run_id: Uuid) -> Result<Vec<Step>> {
        let rows = self
            .timeout(
                sqlx::query(
                    "SELECT step_id, run_id, seq, step_type, name, latency_ms, started_at, ended_at, metadata \
                     FROM agent_steps WHERE run_id = ? ORDER BY seq ASC",
                )
                .bind(run_id.to_string())
                .fetch_all(&self.pool),
            )
            .await?;
        rows.iter().map(step_from_row).collect()
    }

    async fn fetch_failures(&self, run_id: Uuid) -> Result<Vec<Failure>> {
        let rows = self
            .timeout(
                sqlx::query(
                    "SELECT failure_id, run_id, step_id, failure_type, failure_code, message \
                     FROM agent_failures WHERE run_id = ?",
                )
                .bind(run_id.to_string())
                .fetch_all(&self.pool),
            )
            .await?;
        rows.iter().map(failure_from_row).collect()
    }

    async fn fetch_decisions(&self, run_id: Uuid) -> Result<Vec<Decision>> {
        let rows = self
            .timeout(
                sqlx::query(
                    "SELECT decision_id, run_id, step_id, decision_type, selected, reason_code, confidence, \
                     candidates, metadata, recorded_at FROM agent_decisions WHERE run_id = ?",
                )
                .bind(run_id.to_string())
                .fetch_all(&self.pool),
            )
            .await?;
        rows.iter().map(decision_from_row).collect()
    }

    async fn fetch_signals(&self, run_id: Uuid) -> Result<Vec<QualitySignal>> {
        let rows = self
            .timeout(
                sqlx::query(
                    "SELECT signal_id, run_id, step_id, signal_type, signal_code, value, weight, metadata, \
                     recorded_at FROM agent_quality_signals WHERE run_id = ?",
                )
                .bind(run_id.to_string())
                .fetch_all(&self.pool),
            )
            .await?;
        rows.iter().map(signal_from_row).collect()
    }

    async fn assemble_tree(&self, run: Run) -> Result<RunTree> {
        let run_id = run.run_id;
        let steps = self.fetch_steps(run_id).await?;
        let failures = self.fetch_failures(run_id).await?;
        let decisions = self.fetch_decisions(run_id).await?;
        let quality_signals = self.fetch_signals(run_id).await?;
        Ok(RunTree {
            run,
            steps,
            failure: failures.into_iter().next(),
            decisions,
            quality_signals,
        })
    }

    /// Re-reads the row a losing `insert_run_tree` raced against. Only
    /// valid to call once the insert has been confirmed to already exist.
    async fn assemble_existing(&self, run_id: Uuid) -> Result<RunTree> {
        let run = self.fetch_run_only(run_id).await?.ok_or_else(|| {
            ObsError::Internal(format!(
                "run {run_id} conflicted on insert but its row could not be re-read"
            ))
        })?;
        self.assemble_tree(run).await
    }
}

fn run_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Run> {
    let run_id: String = row.try_get("run_id")?;
    let started_at: String = row.try_get("started_at")?;
    let ended_at: Option<String> = row.try_get("ended_at")?;
    let created_at: String = row.try_get("created_at")?;
    let environment: String = row.try_get("environment")?;
    let status: String = row.try_get("status")?;
    Ok(Run {
        run_id: Uuid::parse_str(&run_id)
            .map_err(|e| obstrace_types::error::ObsError::Internal(format!("corrupt run_id: {e}")))?,
        agent_id: row.try_get("agent_id")?,
        agent_version: row.try_get("agent_version")?,
        environment: parse_environment(&environment)?,
        status: parse_run_status(&status)?,
        started_at: parse_dt(&started_at, "run.started_at")?,
        ended_at: ended_at
            .map(|v| parse_dt(&v, "run.ended_at"))
            .transpose()?,
        created_at: parse_dt(&created_at, "run.created_at")?,
    })
}

fn step_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Step> {
    let step_id: String = row.try_get("step_id")?;
    let run_id: String = row.try_get("run_id")?;
    let step_type: String = row.try_get("step_type")?;
    let started_at: String = row.try_get("started_at")?;
    let ended_at: String = row.try_get("ended_at")?;
    let metadata: String = row.try_get("metadata")?;
    let seq: i64 = row.try_get("seq")?;
    Ok(Step {
        step_id: Uuid::parse_str(&step_id).map_err(|e| {
            obstrace_types::error::ObsError::Internal(format!("corrupt step_id: {e}"))
        })?,
        run_id: Uuid::parse_str(&run_id).map_err(|e| {
            obstrace_types::error::ObsError::Internal(format!("corrupt run_id: {e}"))
        })?,
        seq: seq as u32,
        step_type: parse_step_type(&step_type)?,
        name: row.try_get("name")?,
        latency_ms: row.try_get("latency_ms")?,
        started_at: parse_dt(&started_at, "step.started_at")?,
        ended_at: parse_dt(&ended_at, "step.ended_at")?,
        metadata: serde_json::from_str(&metadata)?,
    })
}

fn failure_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Failure> {
    let failure_id: String = row.try_get("failure_id")?;
    let run_id: String = row.try_get("run_id")?;
    let step_id: Option<String> = row.try_get("step_id")?;
    let failure_type: String = row.try_get("failure_type")?;
    Ok(Failure {
        failure_id: Uuid::parse_str(&failure_id).map_err(|e| {
            obstrace_types::error::ObsError::Internal(format!("corrupt failure_id: {e}"))
        })?,
        run_id: Uuid::parse_str(&run_id).map_err(|e| {
            obstrace_types::error::ObsError::Internal(format!("corrupt run_id: {e}"))
        })?,
        step_id: step_id
            .map(|v| {
                Uuid::parse_str(&v).map_err(|e| {
                    obstrace_types::error::ObsError::Internal(format!("corrupt step_id: {e}"))
                })
            })
            .transpose()?,
        failure_type: parse_failure_type(&failure_type)?,
        failure_code: row.try_get("failure_code")?,
        message: row.try_get("message")?,
    })
}

fn decision_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Decision> {
    let decision_id: String = row.try_get("decision_id")?;
    let run_id: String = row.try_get("run_id")?;
    let step_id: Option<String> = row.try_get("step_id")?;
    let decision_type: String = row.try_get("decision_type")?;
    let candidates: String = row.try_get("candidates")?;
    let metadata: String = row.try_get("metadata")?;
    let recorded_at: String = row.try_get("recorded_at")?;
    Ok(Decision {
        decision_id: Uuid::parse_str(&decision_id).map_err(|e| {
            obstrace_types::error::ObsError::Internal(format!("corrupt decision_id: {e}"))
        })?,
        run_id: Uuid::parse_str(&run_id).map_err(|e| {
            obstrace_types::error::ObsError::Internal(format!("corrupt run_id: {e}"))
        })?,
        step_id: step_id
            .map(|v| {
                Uuid::parse_str(&v).map_err(|e| {
                    obstrace_types::error::ObsError::Internal(format!("corrupt step_id: {e}"))
                })
            })
            .transpose()?,
        decision_type: parse_decision_type(&decision_type)?,
        selected: row.try_get("selected")?,
        reason_code: row.try_get("reason_code")?,
        confidence: row.try_get("confidence")?,
        candidates: serde_json::from_str(&candidates)?,
        metadata: serde_json::from_str(&metadata)?,
        recorded_at: parse_dt(&recorded_at, "decision.recorded_at")?,
    })
}

fn signal_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<QualitySignal> {
    let signal_id: String = row.try_get("signal_id")?;
    let run_id: String = row.try_get("run_id")?;
    let step_id: Option<String> = row.try_get("step_id")?;
    let signal_type: String = row.try_get("signal_type")?;
    let metadata: String = row.try_get("metadata")?;
    let recorded_at: String = row.try_get("recorded_at")?;
    let value: i64 = row.try_get("value")?;
    Ok(QualitySignal {
        signal_id: Uuid::parse_str(&signal_id).map_err(|e| {
            obstrace_types::error::ObsError::Internal(format!("corrupt signal_id: {e}"))
        })?,
        run_id: Uuid::parse_str(&run_id).map_err(|e| {
            obstrace_types::error::ObsError::Internal(format!("corrupt run_id: {e}"))
        })?,
        step_id: step_id
            .map(|v| {
                Uuid::parse_str(&v).map_err(|e| {
                    obstrace_types::error::ObsError::Internal(format!("corrupt step_id: {e}"))
                })
            })
            .transpose()?,
        signal_type: parse_signal_type(&signal_type)?,
        signal_code: row.try_get("signal_code")?,
        value: value != 0,
        weight: row.try_get("weight")?,
        metadata: serde_json::from_str(&metadata)?,
        recorded_at: parse_dt(&recorded_at, "signal.recorded_at")?,
    })
}

#[async_trait]
impl RunRepository for Store {
    async fn insert_run_tree(&self, tree: NewRunTree) -> Result<InsertOutcome> {
        let run_id = tree.run.run_id;

        // Fast path: the common replay case never needs to open a
        // transaction at all.
        if let Some(existing) = self.fetch_run_only(run_id).await? {
            let existing_tree = self.assemble_tree(existing).await?;
            return Ok(InsertOutcome::AlreadyExists(existing_tree));
        }

        let mut txn = self.pool.begin().await?;
        let run = &tree.run;

        let insert = sqlx::query(
            "INSERT INTO agent_runs (run_id, agent_id, agent_version, environment, status, started_at, ended_at, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(run.run_id.to_string())
        .bind(&run.agent_id)
        .bind(&run.agent_version)
        .bind(environment_str(run.environment))
        .bind(run_status_str(run.status))
        .bind(fmt_dt(&run.started_at))
        .bind(run.ended_at.as_ref().map(fmt_dt))
        .bind(fmt_dt(&run.created_at))
        .execute(&mut *txn);

        // A second writer may have won the race between the fast-path
        // check above and this INSERT; the uniqueness constraint on
        // `run_id` is the actual source of truth. Losing the race is not
        // an error: the caller gets the same idempotent-replay response it
        // would have gotten had it lost the race before the check.
        match tokio::time::timeout(self.query_timeout, insert).await {
            Err(_) => return Err(ObsError::Timeout(
                "database query exceeded its deadline".into(),
            )),
            Ok(Err(error)) if is_unique_violation(&error) => {
                drop(txn);
                return Ok(InsertOutcome::AlreadyExists(
                    self.assemble_existing(run_id).await?,
                ));
            }
            Ok(Err(error)) => return Err(ObsError::from(error)),
            Ok(Ok(_)) => {}
        }

        for step in &tree.steps {
            self.timeout(
                sqlx::query(
                    "INSERT INTO agent_steps (step_id, run_id, seq, step_type, name, latency_ms, started_at, ended_at, metadata) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(step.step_id.to_string())
                .bind(step.run_id.to_string())
                .bind(step.seq as i64)
                .bind(step_type_str(step.step_type))
                .bind(&step.name)
                .bind(step.latency_ms)
                .bind(fmt_dt(&step.started_at))
                .bind(fmt_dt(&step.ended_at))
                .bind(serde_json::to_string(&step.metadata)?)
                .execute(&mut *txn),
            )
            .await?;
        }

        if let Some(failure) = &tree.failure {
            self.timeout(
                sqlx::query(
                    "INSERT INTO agent_failures (failure_id, run_id, step_id, failure_type, failure_code, message) \
                     VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(failure.failure_id.to_string())
                .bind(failure.run_id.to_string())
                .bind(failure.step_id.map(|v| v.to_string()))
                .bind(failure_type_str(failure.failure_type))
                .bind(&failure.failure_code)
                .bind(&failure.message)
                .execute(&mut *txn),
            )
            .await?;
        }

        for decision in &tree.decisions {
            self.timeout(
                sqlx::query(
                    "INSERT INTO agent_decisions (decision_id, run_id, step_id, decision_type, selected, reason_code, confidence, candidates, metadata, recorded_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(decision.decision_id.to_string())
                .bind(decision.run_id.to_string())
                .bind(decision.step_id.map(|v| v.to_string()))
                .bind(decision.decision_type.as_str())
                .bind(&decision.selected)
                .bind(&decision.reason_code)
                .bind(decision.confidence)
                .bind(serde_json::to_string(&decision.candidates)?)
                .bind(serde_json::to_string(&decision.metadata)?)
                .bind(fmt_dt(&decision.recorded_at))
                .execute(&mut *txn),
            )
            .await?;
        }

        for signal in &tree.quality_signals {
            self.timeout(
                sqlx::query(
                    "INSERT INTO agent_quality_signals (signal_id, run_id, step_id, signal_type, signal_code, value, weight, metadata, recorded_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(signal.signal_id.to_string())
                .bind(signal.run_id.to_string())
                .bind(signal.step_id.map(|v| v.to_string()))
                .bind(signal.signal_type.as_str())
                .bind(&signal.signal_code)
                .bind(signal.value as i64)
                .bind(signal.weight)
                .bind(serde_json::to_string(&signal.metadata)?)
                .bind(fmt_dt(&signal.recorded_at))
                .execute(&mut *txn),
            )
            .await?;
        }

        txn.commit().await?;

        let tree = RunTree {
            run: tree.run,
            steps: tree.steps,
            failure: tree.failure,
            decisions: tree.decisions,
            quality_signals: tree.quality_signals,
        };
        Ok(InsertOutcome::Created(tree))
    }

    async fn get_run(&self, run_id: Uuid) -> Result<Option<RunTree>> {
        let Some(run) = self.fetch_run_only(run_id).await? else {
            return Ok(None);
        };
        Ok(Some(self.assemble_tree(run).await?))
    }

    async fn list_runs(&self, filters: &RunFilters, pagination: Pagination) -> Result<Vec<RunTree>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT run_id, agent_id, agent_version, environment, status, started_at, ended_at, created_at FROM agent_runs",
        );
        push_run_filters(&mut qb, filters);
        qb.push(" ORDER BY started_at DESC LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let rows = self.timeout(qb.build().fetch_all(&self.pool)).await?;
        let mut trees = Vec::with_capacity(rows.len());
        for row in &rows {
            let run = run_from_row(row)?;
            trees.push(self.assemble_tree(run).await?);
        }
        Ok(trees)
    }

    async fn get_steps(&self, run_id: Uuid) -> Result<Vec<Step>> {
        self.fetch_steps(run_id).await
    }

    async fn get_failures(&self, run_id: Uuid) -> Result<Vec<Failure>> {
        self.fetch_failures(run_id).await
    }
}

#[async_trait]
impl StatsRepository for Store {
    async fn total_runs(&self, filters: &RunFilters) -> Result<i64> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) AS n FROM agent_runs");
        push_run_filters(&mut qb, filters);
        let row = self.timeout(qb.build().fetch_one(&self.pool)).await?;
        Ok(row.try_get("n")?)
    }

    async fn total_failures(&self, filters: &RunFilters) -> Result<i64> {
        let mut narrowed = filters.clone();
        narrowed.status = Some(obstrace_core::RunStatus::Failure);
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) AS n FROM agent_runs");
        push_run_filters(&mut qb, &narrowed);
        let row = self.timeout(qb.build().fetch_one(&self.pool)).await?;
        Ok(row.try_get("n")?)
    }

    async fn total_success(&self, filters: &RunFilters) -> Result<i64> {
        let mut narrowed = filters.clone();
        narrowed.status = Some(obstrace_core::RunStatus::Success);
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) AS n FROM agent_runs");
        push_run_filters(&mut qb, &narrowed);
        let row = self.timeout(qb.build().fetch_one(&self.pool)).await?;
        Ok(row.try_get("n")?)
    }

    async fn avg_step_latency_ms(&self, filters: &RunFilters) -> Result<Option<f64>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT AVG(s.latency_ms) AS avg_latency FROM agent_steps s JOIN agent_runs r ON r.run_id = s.run_id",
        );
        let mut first = true;
        if filters.agent_id.is_some()
            || filters.agent_version.is_some()
            || filters.status.is_some()
            || filters.environment.is_some()
            || filters.start_time.is_some()
            || filters.end_time.is_some()
        {
            qb.push(" WHERE ");
            first = false;
        }
        macro_rules! cond {
            ($cond:expr) => {
                if !first {
                    qb.push(" AND ");
                }
                qb.push($cond);
                first = false;
            };
        }
        if let Some(v) = &filters.agent_id {
            cond!("r.agent_id = ");
            qb.push_bind(v.as_str());
        }
        if let Some(v) = &filters.agent_version {
            cond!("r.agent_version = ");
            qb.push_bind(v.as_str());
        }
        if let Some(v) = filters.status {
            cond!("r.status = ");
            qb.push_bind(run_status_str(v));
        }
        if let Some(v) = filters.environment {
            cond!("r.environment = ");
            qb.push_bind(environment_str(v));
        }
        if let Some(v) = filters.start_time {
            cond!("r.started_at >= ");
            qb.push_bind(fmt_dt(&v));
        }
        if let Some(v) = filters.end_time {
            cond!("r.started_at <= ");
            qb.push_bind(fmt_dt(&v));
        }
        let row = self.timeout(qb.build().fetch_one(&self.pool)).await?;
        Ok(row.try_get("avg_latency")?)
    }

    async fn failure_breakdown(&self, filters: &RunFilters) -> Result<HashMap<String, i64>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT f.failure_type, f.failure_code, COUNT(*) AS n FROM agent_failures f JOIN agent_runs r ON r.run_id = f.run_id",
        );
        push_run_filters(&mut qb, filters);
        qb.push(" GROUP BY f.failure_type, f.failure_code");
        let rows = self.timeout(qb.build().fetch_all(&self.pool)).await?;
        let mut out = HashMap::new();
        for row in &rows {
            let failure_type: String = row.try_get("failure_type")?;
            let failure_code: String = row.try_get("failure_code")?;
            let n: i64 = row.try_get("n")?;
            out.insert(format!("{failure_type}/{failure_code}"), n);
        }
        Ok(out)
    }

    async fn step_type_breakdown(&self, filters: &RunFilters) -> Result<HashMap<String, i64>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT s.step_type, COUNT(*) AS n FROM agent_steps s JOIN agent_runs r ON r.run_id = s.run_id",
        );
        push_run_filters(&mut qb, filters);
        qb.push(" GROUP BY s.step_type");
        let rows = self.timeout(qb.build().fetch_all(&self.pool)).await?;
        let mut out = HashMap::new();
        for row in &rows {
            let step_type: String = row.try_get("step_type")?;
            let n: i64 = row.try_get("n")?;
            out.insert(step_type, n);
        }
        Ok(out)
    }
}

#[async_trait]
impl ObservationRepository for Store {
    async fn count_runs_in_window(
        &self,
        agent_id: &str,
        agent_version: &str,
        environment: Environment,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<i64> {
        let row = self
            .timeout(
                sqlx::query(
                    "SELECT COUNT(*) AS n FROM agent_runs \
                     WHERE agent_id = ? AND agent_version = ? AND environment = ? AND started_at >= ? AND started_at < ?",
                )
                .bind(agent_id)
                .bind(agent_version)
                .bind(environment_str(environment))
                .bind(fmt_dt(&window_start))
                .bind(fmt_dt(&window_end))
                .fetch_one(&self.pool),
            )
            .await?;
        Ok(row.try_get("n")?)
    }

    async fn decision_counts_in_window(
        &self,
        agent_id: &str,
        agent_version: &str,
        environment: Environment,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<HashMap<DecisionType, HashMap<String, i64>>> {
        let rows = self
            .timeout(
                sqlx::query(
                    "SELECT d.decision_type, d.selected, COUNT(*) AS n \
                     FROM agent_decisions d JOIN agent_runs r ON r.run_id = d.run_id \
                     WHERE r.agent_id = ? AND r.agent_version = ? AND r.environment = ? \
                       AND r.started_at >= ? AND r.started_at < ? \
                     GROUP BY d.decision_type, d.selected",
                )
                .bind(agent_id)
                .bind(agent_version)
                .bind(environment_str(environment))
                .bind(fmt_dt(&window_start))
                .bind(fmt_dt(&window_end))
                .fetch_all(&self.pool),
            )
            .await?;

        let mut out: HashMap<DecisionType, HashMap<String, i64>> = HashMap::new();
        for row in &rows {
            let decision_type: String = row.try_get("decision_type")?;
            let selected: String = row.try_get("selected")?;
            let n: i64 = row.try_get("n")?;
            out.entry(parse_decision_type(&decision_type)?)
                .or_default()
                .insert(selected, n);
        }
        Ok(out)
    }

    async fn signal_counts_in_window(
        &self,
        agent_id: &str,
        agent_version: &str,
        environment: Environment,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<HashMap<SignalType, HashMap<String, (i64, i64)>>> {
        let rows = self
            .timeout(
                sqlx::query(
                    "SELECT s.signal_type, s.signal_code, SUM(s.value) AS true_count, COUNT(*) AS total_count \
                     FROM agent_quality_signals s JOIN agent_runs r ON r.run_id = s.run_id \
                     WHERE r.agent_id = ? AND r.agent_version = ? AND r.environment = ? \
                       AND r.started_at >= ? AND r.started_at < ? \
                     GROUP BY s.signal_type, s.signal_code",
                )
                .bind(agent_id)
                .bind(agent_version)
                .bind(environment_str(environment))
                .bind(fmt_dt(&window_start))
                .bind(fmt_dt(&window_end))
                .fetch_all(&self.pool),
            )
            .await?;

        let mut out: HashMap<SignalType, HashMap<String, (i64, i64)>> = HashMap::new();
        for row in &rows {
            let signal_type: String = row.try_get("signal_type")?;
            let signal_code: String = row.try_get("signal_code")?;
            let true_count: i64 = row.try_get("true_count")?;
            let total_count: i64 = row.try_get("total_count")?;
            out.entry(parse_signal_type(&signal_type)?)
                .or_default()
                .insert(signal_code, (true_count, total_count));
        }
        Ok(out)
    }

    async fn run_durations_ms_in_window(
        &self,
        agent_id: &str,
        agent_version: &str,
        environment: Environment,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<i64>> {
        let rows = self
            .timeout(
                sqlx::query(
                    "SELECT started_at, ended_at FROM agent_runs \
                     WHERE agent_id = ? AND agent_version = ? AND environment = ? \
                       AND started_at >= ? AND started_at < ? AND ended_at IS NOT NULL",
                )
                .bind(agent_id)
                .bind(agent_version)
                .bind(environment_str(environment))
                .bind(fmt_dt(&window_start))
                .bind(fmt_dt(&window_end))
                .fetch_all(&self.pool),
            )
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let started_at: String = row.try_get("started_at")?;
            let ended_at: String = row.try_get("ended_at")?;
            let started_at = parse_dt(&started_at, "run.started_at")?;
            let ended_at = parse_dt(&ended_at, "run.ended_at")?;
            out.push((ended_at - started_at).num_milliseconds());
        }
        Ok(out)
    }
}
