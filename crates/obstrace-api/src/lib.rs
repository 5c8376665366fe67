//! The HTTP surface over the ingest, query, and drift services.

pub mod error;
pub mod logging;
pub mod routes;
pub mod state;

pub use state::AppState;

use axum::Router;

/// Builds the full router, with the tracing layer applied: every request is
/// observable, and error responses carry no stack traces.
pub fn app(state: AppState) -> Router {
    routes::router(state).layer(logging::trace_layer())
}
