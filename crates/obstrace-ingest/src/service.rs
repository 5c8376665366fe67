//! `submit_run` orchestration: validate, then delegate to the
//! repository's idempotent transactional writer.

use std::sync::Arc;

use obstrace_core::{RunRepository, RunTree};
use obstrace_types::error::Result;

use crate::payload::RunPayload;
use crate::validate::validate_run_payload;

/// Whether this call created the row or found an identical one already
/// stored (idempotency rule; maps to HTTP 201 vs 200).
pub enum SubmitOutcome {
    Created(RunTree),
    Replayed(RunTree),
}

pub struct IngestService {
    runs: Arc<dyn RunRepository>,
}

impl IngestService {
    pub fn new(runs: Arc<dyn RunRepository>) -> Self {
        Self { runs }
    }

    #[tracing::instrument(skip(self, payload), fields(run_id = %payload.run_id))]
    pub async fn submit_run(&self, payload: RunPayload) -> Result<SubmitOutcome> {
        let tree = validate_run_payload(payload)?;
        let outcome = self.runs.insert_run_tree(tree).await?;
        Ok(match outcome {
            obstrace_core::InsertOutcome::Created(tree) => {
                tracing::info!("run ingested");
                SubmitOutcome::Created(tree)
            }
            obstrace_core::InsertOutcome::AlreadyExists(tree) => {
                tracing::debug!("run ingestion replayed");
                SubmitOutcome::Replayed(tree)
            }
        })
    }
}
