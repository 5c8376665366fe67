//! Route handlers, organized by resource.

pub mod drift;
pub mod health;
pub mod ingest;
pub mod query;

use axum::Router;

use crate::state::AppState;

/// Assembles the complete router over shared state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(ingest::routes())
        .merge(query::routes())
        .merge(drift::routes())
        .with_state(state)
}
