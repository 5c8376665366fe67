//! Run listing/retrieval and the aggregate stats endpoint.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use obstrace_core::{Environment, RunFilters, RunStatus};
use obstrace_types::Pagination;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/runs", get(list_runs))
        .route("/v1/runs/:run_id", get(get_run))
        .route("/v1/runs/:run_id/steps", get(get_steps))
        .route("/v1/runs/:run_id/failures", get(get_failures))
        .route("/v1/stats", get(stats))
}

#[derive(Debug, Deserialize)]
struct RunListParams {
    agent_id: Option<String>,
    agent_version: Option<String>,
    status: Option<RunStatus>,
    environment: Option<Environment>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    page: Option<u32>,
    page_size: Option<u32>,
}

fn filters_and_pagination(params: &RunListParams) -> Result<(RunFilters, Pagination), ApiError> {
    let pagination = Pagination::clamp(params.page.unwrap_or(1), params.page_size.unwrap_or(50))
        .map_err(|message| obstrace_types::error::ObsError::validation("page", message))?;
    let filters = RunFilters {
        agent_id: params.agent_id.clone(),
        agent_version: params.agent_version.clone(),
        status: params.status,
        environment: params.environment,
        start_time: params.start_time,
        end_time: params.end_time,
    };
    Ok((filters, pagination))
}

async fn list_runs(State(state): State<AppState>, Query(params): Query<RunListParams>) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (filters, pagination) = filters_and_pagination(&params)?;
    let runs = state.query.list_runs(&filters, pagination).await?;
    Ok(Json(runs))
}

async fn get_run(State(state): State<AppState>, Path(run_id): Path<Uuid>) -> Result<impl axum::response::IntoResponse, ApiError> {
    let tree = state
        .query
        .get_run(run_id)
        .await?
        .ok_or_else(|| obstrace_types::error::ObsError::NotFound(format!("run {run_id}")))?;
    Ok(Json(tree))
}

async fn get_steps(State(state): State<AppState>, Path(run_id): Path<Uuid>) -> Result<impl axum::response::IntoResponse, ApiError> {
    let steps = state.query.get_steps(run_id).await?;
    Ok(Json(steps))
}

async fn get_failures(State(state): State<AppState>, Path(run_id): Path<Uuid>) -> Result<impl axum::response::IntoResponse, ApiError> {
    let failures = state.query.get_failures(run_id).await?;
    Ok(Json(failures))
}

async fn stats(State(state): State<AppState>, Query(params): Query<RunListParams>) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (filters, _pagination) = filters_and_pagination(&params)?;
    let stats = state.query.stats(&filters).await?;
    Ok(Json(stats))
}
