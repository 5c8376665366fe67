//! Profile/baseline/drift read endpoints plus the administrative baseline
//! and drift-detection writes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use obstrace_core::{BaselineFilters, BaselineType, DriftFilters, DriftType, Environment, ProfileFilters, Severity};
use obstrace_types::error::ObsError;
use obstrace_types::Pagination;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/phase3/profiles", get(list_profiles))
        .route("/v1/phase3/profiles/:id", get(get_profile))
        .route("/v1/phase3/baselines", get(list_baselines).post(create_baseline))
        .route("/v1/phase3/baselines/:id", get(get_baseline))
        .route("/v1/phase3/baselines/:id/activate", post(activate_baseline))
        .route("/v1/phase3/baselines/:id/deactivate", post(deactivate_baseline))
        .route("/v1/phase3/baselines/:id/approve", post(approve_baseline))
        .route("/v1/phase3/drift", get(list_drift).post(run_detection))
        .route("/v1/phase3/drift/:id", get(get_drift))
        .route("/v1/phase3/drift/:id/resolve", post(resolve_drift))
        .route("/v1/phase3/drift/timeline", get(timeline))
        .route("/v1/phase3/drift/summary", get(summary))
}

fn pagination_from(page: Option<u32>, page_size: Option<u32>) -> Result<Pagination, ApiError> {
    Pagination::clamp(page.unwrap_or(1), page_size.unwrap_or(50))
        .map_err(|message| ObsError::validation("page", message).into())
}

// ---------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ProfileListParams {
    agent_id: Option<String>,
    agent_version: Option<String>,
    environment: Option<Environment>,
    page: Option<u32>,
    page_size: Option<u32>,
}

async fn list_profiles(State(state): State<AppState>, Query(params): Query<ProfileListParams>) -> Result<Json<Vec<obstrace_core::BehaviorProfile>>, ApiError> {
    let filters = ProfileFilters {
        agent_id: params.agent_id,
        agent_version: params.agent_version,
        environment: params.environment,
    };
    let pagination = pagination_from(params.page, params.page_size)?;
    Ok(Json(state.drift_query.list_profiles(&filters, pagination).await?))
}

async fn get_profile(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<obstrace_core::BehaviorProfile>, ApiError> {
    let profile = state
        .drift_query
        .get_profile(id)
        .await?
        .ok_or_else(|| ObsError::NotFound(format!("profile {id}")))?;
    Ok(Json(profile))
}

// ---------------------------------------------------------------------
// Baselines
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct BaselineListParams {
    agent_id: Option<String>,
    agent_version: Option<String>,
    environment: Option<Environment>,
    is_active: Option<bool>,
    page: Option<u32>,
    page_size: Option<u32>,
}

async fn list_baselines(State(state): State<AppState>, Query(params): Query<BaselineListParams>) -> Result<Json<Vec<obstrace_core::BehaviorBaseline>>, ApiError> {
    let filters = BaselineFilters {
        agent_id: params.agent_id,
        agent_version: params.agent_version,
        environment: params.environment,
        is_active: params.is_active,
    };
    let pagination = pagination_from(params.page, params.page_size)?;
    Ok(Json(state.drift_query.list_baselines(&filters, pagination).await?))
}

async fn get_baseline(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<obstrace_core::BehaviorBaseline>, ApiError> {
    let baseline = state
        .drift_query
        .get_baseline(id)
        .await?
        .ok_or_else(|| ObsError::NotFound(format!("baseline {id}")))?;
    Ok(Json(baseline))
}

#[derive(Debug, Deserialize)]
struct CreateBaselineRequest {
    profile_id: Uuid,
    baseline_type: BaselineType,
    description: Option<String>,
    approved_by: Option<String>,
}

async fn create_baseline(
    State(state): State<AppState>,
    Json(request): Json<CreateBaselineRequest>,
) -> Result<(StatusCode, Json<obstrace_core::BehaviorBaseline>), ApiError> {
    let baseline = state
        .baselines
        .create_baseline(request.profile_id, request.baseline_type, request.description, request.approved_by)
        .await?;
    Ok((StatusCode::CREATED, Json(baseline)))
}

async fn activate_baseline(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<obstrace_core::BehaviorBaseline>, ApiError> {
    Ok(Json(state.baselines.activate(id).await?))
}

async fn deactivate_baseline(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<obstrace_core::BehaviorBaseline>, ApiError> {
    Ok(Json(state.baselines.deactivate(id).await?))
}

#[derive(Debug, Deserialize)]
struct ApproveBaselineRequest {
    approved_by: String,
}

async fn approve_baseline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ApproveBaselineRequest>,
) -> Result<Json<obstrace_core::BehaviorBaseline>, ApiError> {
    Ok(Json(state.baselines.approve(id, &request.approved_by).await?))
}

// ---------------------------------------------------------------------
// Drift
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DriftListParams {
    agent_id: Option<String>,
    agent_version: Option<String>,
    environment: Option<Environment>,
    drift_type: Option<DriftType>,
    severity: Option<Severity>,
    resolved: Option<bool>,
    page: Option<u32>,
    page_size: Option<u32>,
}

async fn list_drift(State(state): State<AppState>, Query(params): Query<DriftListParams>) -> Result<Json<Vec<obstrace_core::BehaviorDrift>>, ApiError> {
    let filters = DriftFilters {
        agent_id: params.agent_id,
        agent_version: params.agent_version,
        environment: params.environment,
        drift_type: params.drift_type,
        severity: params.severity,
        resolved: params.resolved,
    };
    let pagination = pagination_from(params.page, params.page_size)?;
    Ok(Json(state.drift_query.list_drift(&filters, pagination).await?))
}

async fn get_drift(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<obstrace_core::BehaviorDrift>, ApiError> {
    let drift = state
        .drift_query
        .get_drift(id)
        .await?
        .ok_or_else(|| ObsError::NotFound(format!("drift {id}")))?;
    Ok(Json(drift))
}

async fn resolve_drift(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<obstrace_core::BehaviorDrift>, ApiError> {
    Ok(Json(state.drift_query.resolve_drift(id, Utc::now()).await?))
}

#[derive(Debug, Deserialize)]
struct RunDetectionRequest {
    baseline_id: Uuid,
    observation_start: DateTime<Utc>,
    observation_end: DateTime<Utc>,
}

/// On-demand drift computation (profile/drift jobs MAY run under
/// the request/response model). Emits an alert for every drift produced.
async fn run_detection(
    State(state): State<AppState>,
    Json(request): Json<RunDetectionRequest>,
) -> Result<(StatusCode, Json<Vec<obstrace_core::BehaviorDrift>>), ApiError> {
    let baseline = state
        .drift_query
        .get_baseline(request.baseline_id)
        .await?
        .ok_or_else(|| ObsError::NotFound(format!("baseline {}", request.baseline_id)))?;

    let drifts = state
        .drift_engine
        .detect_drift(&baseline, request.observation_start, request.observation_end)
        .await?;

    for drift in &drifts {
        if let Err(error) = state.alerts.emit(drift).await {
            tracing::warn!(%error, drift_id = %drift.drift_id, "alert dispatch failed");
        }
    }

    Ok((StatusCode::CREATED, Json(drifts)))
}

// ---------------------------------------------------------------------
// Timeline & summary
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TimelineParams {
    agent_id: String,
    agent_version: Option<String>,
    environment: Option<Environment>,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    days: Option<i64>,
}

async fn timeline(State(state): State<AppState>, Query(params): Query<TimelineParams>) -> Result<Json<Vec<obstrace_core::DriftTimelinePoint>>, ApiError> {
    let end = params.end_date.unwrap_or_else(Utc::now);
    let start = params
        .start_date
        .unwrap_or_else(|| end - chrono::Duration::days(params.days.unwrap_or(7)));
    let points = state
        .drift_query
        .timeline(&params.agent_id, params.agent_version.as_deref(), params.environment, start, end)
        .await?;
    Ok(Json(points))
}

#[derive(Debug, Deserialize)]
struct SummaryParams {
    agent_id: Option<String>,
    environment: Option<Environment>,
    days: Option<i64>,
}

async fn summary(State(state): State<AppState>, Query(params): Query<SummaryParams>) -> Result<Json<obstrace_core::DriftSummary>, ApiError> {
    let end = Utc::now();
    let start = end - chrono::Duration::days(params.days.unwrap_or(7));
    let summary = state
        .drift_query
        .summary(params.agent_id.as_deref(), params.environment, start, end)
        .await?;
    Ok(Json(summary))
}
