//! Maps [`ObsError`] onto HTTP responses: every error surfaces as
//! `{ "detail": <message> }` with no stack traces and no sensitive data.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use obstrace_types::error::ObsError;
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

pub struct ApiError(pub ObsError);

impl From<ObsError> for ApiError {
    fn from(error: ObsError) -> Self {
        ApiError(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self.0 {
            ObsError::Validation { .. } => (StatusCode::BAD_REQUEST, self.0.to_string()),
            ObsError::NotFound(_) => (StatusCode::NOT_FOUND, self.0.to_string()),
            ObsError::Conflict(_) => (StatusCode::CONFLICT, self.0.to_string()),
            ObsError::InsufficientData(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.0.to_string()),
            ObsError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, self.0.to_string()),
            ObsError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, self.0.to_string()),
            ObsError::Internal(error) => {
                tracing::error!(%error, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
