//! `POST /v1/runs`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};

use obstrace_ingest::{RunPayload, SubmitOutcome};

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/runs", post(submit_run))
}

async fn submit_run(State(state): State<AppState>, Json(payload): Json<RunPayload>) -> Result<Response, ApiError> {
    let outcome = state.ingest.submit_run(payload).await?;
    let (status, tree) = match outcome {
        SubmitOutcome::Created(tree) => (StatusCode::CREATED, tree),
        SubmitOutcome::Replayed(tree) => (StatusCode::OK, tree),
    };
    Ok((status, Json(tree)).into_response())
}
