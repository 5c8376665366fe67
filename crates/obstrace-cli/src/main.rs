//! `obstrace` binary: runs the HTTP server or dispatches to an
//! administrative subcommand against the same store.

mod admin;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use obstrace_analytics::{AlertEmitter, BaselineManager, DriftEngine, DriftQueryService, ProfileBuilder};
use obstrace_api::state::AppState;
use obstrace_ingest::IngestService;
use obstrace_query::QueryService;
use obstrace_store::Store;
use obstrace_types::config::Config;

#[derive(Debug, Parser)]
#[command(name = "obstrace", about = "Behavioral observability pipeline for AI agent executions")]
struct Cli {
    /// Path to a YAML config file, layered under environment variables.
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Starts the HTTP server.
    Serve,
    /// Runs an administrative operation directly against the store.
    Admin(admin::AdminArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    obstrace_api::logging::init_tracing(std::env::var("OBSTRACE_LOG_JSON").is_ok());

    let store = Arc::new(Store::connect(&config.database).await?);

    match cli.command {
        Commands::Serve => serve(config, store).await,
        Commands::Admin(args) => admin::run(args, store, config.drift).await,
    }
}

async fn serve(config: Config, store: Arc<Store>) -> anyhow::Result<()> {
    let ingest = Arc::new(IngestService::new(store.clone()));
    let query = Arc::new(QueryService::new(store.clone(), store.clone()));
    let profiles = Arc::new(ProfileBuilder::new(store.clone(), store.clone()));
    let baselines = Arc::new(BaselineManager::new(store.clone(), store.clone()));
    let drift_engine = Arc::new(DriftEngine::new(
        store.clone(),
        ProfileBuilder::new(store.clone(), store.clone()),
        store.clone(),
        config.drift.clone(),
    ));
    let drift_query = Arc::new(DriftQueryService::new(store.clone(), store.clone(), store.clone()));
    let alerts = Arc::new(AlertEmitter::new(store.clone(), config.alerts.clone()));

    let state = AppState { store: store.clone(), ingest, query, profiles, baselines, drift_engine, drift_query, alerts };

    let app = obstrace_api::app(state);
    let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %config.server.bind_address, "obstrace server listening");
    axum::serve(listener, app).await?;

    store.close().await;
    Ok(())
}
