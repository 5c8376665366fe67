//! Structured logging setup: an `EnvFilter`-driven subscriber plus the
//! tower-http tracing layer applied to every request.

use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global tracing subscriber. Safe to call more than once
/// per process (e.g. across test binaries); a second call is a no-op.
pub fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = if json {
        tracing_subscriber::registry().with(env_filter).with(fmt::layer().json()).try_init()
    } else {
        tracing_subscriber::registry().with(env_filter).with(fmt::layer()).try_init()
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already initialized");
    }
}

/// The tower-http layer recording method/path/status/latency for every
/// request, matched to the same span tree `#[tracing::instrument]` writes
/// into across the service crates.
pub fn trace_layer() -> TraceLayer<tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
}
