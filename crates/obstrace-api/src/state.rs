//! Shared application state for all API handlers.

use std::sync::Arc;

use obstrace_analytics::{AlertEmitter, BaselineManager, DriftEngine, DriftQueryService, ProfileBuilder};
use obstrace_ingest::IngestService;
use obstrace_query::QueryService;
use obstrace_store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub ingest: Arc<IngestService>,
    pub query: Arc<QueryService>,
    pub profiles: Arc<ProfileBuilder>,
    pub baselines: Arc<BaselineManager>,
    pub drift_engine: Arc<DriftEngine>,
    pub drift_query: Arc<DriftQueryService>,
    pub alerts: Arc<AlertEmitter>,
}
