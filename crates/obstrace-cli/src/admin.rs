//! Administrative subcommands: baseline lifecycle management and on-demand
//! drift detection, run directly against the store (no HTTP round trip).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use obstrace_analytics::{BaselineManager, DriftEngine, ProfileBuilder};
use obstrace_core::BaselineType;
use obstrace_store::Store;
use obstrace_types::config::DriftThresholds;
use uuid::Uuid;

#[derive(Debug, Args)]
pub struct AdminArgs {
    #[command(subcommand)]
    pub command: AdminCommand,
}

#[derive(Debug, Subcommand)]
pub enum AdminCommand {
    /// Baseline lifecycle management.
    Baseline {
        #[command(subcommand)]
        command: BaselineCommand,
    },
    /// On-demand drift detection.
    Drift {
        #[command(subcommand)]
        command: DriftCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum BaselineCommand {
    /// Promote a profile to a new (inactive) baseline.
    Create {
        #[arg(long)]
        profile_id: Uuid,
        #[arg(long, value_enum)]
        baseline_type: BaselineTypeArg,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        approved_by: Option<String>,
    },
    /// Activate a baseline, deactivating any previously active one.
    Activate {
        #[arg(long)]
        baseline_id: Uuid,
    },
    Deactivate {
        #[arg(long)]
        baseline_id: Uuid,
    },
    Approve {
        #[arg(long)]
        baseline_id: Uuid,
        #[arg(long)]
        approved_by: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum DriftCommand {
    /// Compute drift between `baseline_id`'s profile and an observation window.
    Run {
        #[arg(long)]
        baseline_id: Uuid,
        #[arg(long)]
        observation_start: DateTime<Utc>,
        #[arg(long)]
        observation_end: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum BaselineTypeArg {
    Version,
    TimeWindow,
    Manual,
}

impl From<BaselineTypeArg> for BaselineType {
    fn from(value: BaselineTypeArg) -> Self {
        match value {
            BaselineTypeArg::Version => BaselineType::Version,
            BaselineTypeArg::TimeWindow => BaselineType::TimeWindow,
            BaselineTypeArg::Manual => BaselineType::Manual,
        }
    }
}

pub async fn run(args: AdminArgs, store: Arc<Store>, thresholds: DriftThresholds) -> anyhow::Result<()> {
    match args.command {
        AdminCommand::Baseline { command } => run_baseline(command, store).await,
        AdminCommand::Drift { command } => run_drift(command, store, thresholds).await,
    }
}

async fn run_baseline(command: BaselineCommand, store: Arc<Store>) -> anyhow::Result<()> {
    let manager = BaselineManager::new(store.clone(), store);
    let baseline = match command {
        BaselineCommand::Create { profile_id, baseline_type, description, approved_by } => {
            manager.create_baseline(profile_id, baseline_type.into(), description, approved_by).await?
        }
        BaselineCommand::Activate { baseline_id } => manager.activate(baseline_id).await?,
        BaselineCommand::Deactivate { baseline_id } => manager.deactivate(baseline_id).await?,
        BaselineCommand::Approve { baseline_id, approved_by } => manager.approve(baseline_id, &approved_by).await?,
    };
    println!("{}", serde_json::to_string_pretty(&baseline)?);
    Ok(())
}

async fn run_drift(command: DriftCommand, store: Arc<Store>, thresholds: DriftThresholds) -> anyhow::Result<()> {
    let DriftCommand::Run { baseline_id, observation_start, observation_end } = command;

    let baseline = obstrace_core::BaselineRepository::get_baseline(store.as_ref(), baseline_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("baseline {baseline_id} not found"))?;

    let builder = ProfileBuilder::new(store.clone(), store.clone());
    let engine = DriftEngine::new(store.clone(), builder, store, thresholds);
    let drifts = engine.detect_drift(&baseline, observation_start, observation_end).await?;

    println!("{}", serde_json::to_string_pretty(&drifts)?);
    tracing::info!(count = drifts.len(), "drift detection complete");
    Ok(())
}
