//! Converts a [`RunPayload`] into a validated [`NewRunTree`]. Every rejection
//! carries the offending field path so the HTTP layer can surface a precise
//! `validation` error.

use std::collections::HashSet;

use chrono::Utc;
use obstrace_core::validation::{
    check_metadata_map, check_short_identifier, check_text_field, check_unit_interval,
    MAX_AGENT_ID_LEN, MAX_AGENT_VERSION_LEN,
};
use obstrace_core::{
    Decision, DecisionType, Environment, Failure, FailureType, NewRunTree, QualitySignal, Run,
    RunStatus, SignalType, Step, StepType,
};
use obstrace_types::error::{ObsError, Result};
use uuid::Uuid;

use crate::payload::{
    DecisionPayload, DecisionTypePayload, EnvironmentPayload, FailurePayload, FailureTypePayload,
    QualitySignalPayload, RunPayload, RunStatusPayload, SignalTypePayload, StepPayload,
    StepTypePayload,
};

const MAX_FAILURE_MESSAGE_LEN: usize = 500;
const MAX_NAME_LEN: usize = 200;
const MAX_CANDIDATES: usize = 20;

fn environment_from_payload(value: EnvironmentPayload) -> Environment {
    match value {
        EnvironmentPayload::Production => Environment::Production,
        EnvironmentPayload::Staging => Environment::Staging,
        EnvironmentPayload::Development => Environment::Development,
    }
}

fn status_from_payload(value: RunStatusPayload) -> RunStatus {
    match value {
        RunStatusPayload::Success => RunStatus::Success,
        RunStatusPayload::Failure => RunStatus::Failure,
        RunStatusPayload::Partial => RunStatus::Partial,
    }
}

fn step_type_from_payload(value: StepTypePayload) -> StepType {
    match value {
        StepTypePayload::Plan => StepType::Plan,
        StepTypePayload::Retrieve => StepType::Retrieve,
        StepTypePayload::Tool => StepType::Tool,
        StepTypePayload::Respond => StepType::Respond,
        StepTypePayload::Other => StepType::Other,
    }
}

fn failure_type_from_payload(value: FailureTypePayload) -> FailureType {
    match value {
        FailureTypePayload::Tool => FailureType::Tool,
        FailureTypePayload::Model => FailureType::Model,
        FailureTypePayload::Retrieval => FailureType::Retrieval,
        FailureTypePayload::Orchestration => FailureType::Orchestration,
    }
}

fn decision_type_from_payload(value: DecisionTypePayload) -> DecisionType {
    match value {
        DecisionTypePayload::ToolSelection => DecisionType::ToolSelection,
        DecisionTypePayload::RetrievalStrategy => DecisionType::RetrievalStrategy,
        DecisionTypePayload::ResponseMode => DecisionType::ResponseMode,
        DecisionTypePayload::RetryStrategy => DecisionType::RetryStrategy,
        DecisionTypePayload::OrchestrationPath => DecisionType::OrchestrationPath,
    }
}

fn signal_type_from_payload(value: SignalTypePayload) -> SignalType {
    match value {
        SignalTypePayload::Hallucination => SignalType::Hallucination,
        SignalTypePayload::Toxicity => SignalType::Toxicity,
        SignalTypePayload::Relevance => SignalType::Relevance,
        SignalTypePayload::Grounding => SignalType::Grounding,
        SignalTypePayload::Format => SignalType::Format,
    }
}

/// Validate and lower a wire payload into domain types ready for storage.
/// `step_id`/`run_id` cross references are checked against the steps in the
/// same payload; `failure_id`/`decision_id` are freshly assigned here since
/// the wire shape doesn't carry them for nested children other than steps
/// and the decision/signal ids supplied by the caller.
pub fn validate_run_payload(payload: RunPayload) -> Result<NewRunTree> {
    check_short_identifier(&payload.agent_id, MAX_AGENT_ID_LEN, "agent_id")?;
    check_short_identifier(&payload.agent_version, MAX_AGENT_VERSION_LEN, "agent_version")?;

    if let Some(ended_at) = payload.ended_at {
        if ended_at < payload.started_at {
            return Err(ObsError::validation(
                "ended_at",
                "run ended_at must be >= started_at",
            ));
        }
    }

    let status = status_from_payload(payload.status);
    let environment = environment_from_payload(payload.environment);

    let mut seqs: Vec<u32> = payload.steps.iter().map(|s| s.seq).collect();
    seqs.sort_unstable();
    let expected: Vec<u32> = (0..payload.steps.len() as u32).collect();
    if seqs != expected {
        return Err(ObsError::validation(
            "steps[].seq",
            "step seq values must form the contiguous set {0, 1, ..., n-1}",
        ));
    }

    let mut known_step_ids: HashSet<Uuid> = HashSet::with_capacity(payload.steps.len());
    let mut steps = Vec::with_capacity(payload.steps.len());
    for (index, step) in payload.steps.into_iter().enumerate() {
        steps.push(validate_step(payload.run_id, index, step)?);
        known_step_ids.insert(steps.last().unwrap().step_id);
    }

    if status == RunStatus::Failure && payload.failure.is_none() {
        return Err(ObsError::validation(
            "failure",
            "status = failure requires at least one failure object",
        ));
    }

    let failure = payload
        .failure
        .map(|f| validate_failure(payload.run_id, f, &known_step_ids))
        .transpose()?;

    let mut decisions = Vec::with_capacity(payload.decisions.len());
    for (index, decision) in payload.decisions.into_iter().enumerate() {
        decisions.push(validate_decision(
            payload.run_id,
            index,
            decision,
            &known_step_ids,
        )?);
    }

    let mut quality_signals = Vec::with_capacity(payload.quality_signals.len());
    for (index, signal) in payload.quality_signals.into_iter().enumerate() {
        quality_signals.push(validate_signal(payload.run_id, index, signal, &known_step_ids)?);
    }

    let now = Utc::now();
    let run = Run {
        run_id: payload.run_id,
        agent_id: payload.agent_id,
        agent_version: payload.agent_version,
        environment,
        status,
        started_at: payload.started_at,
        ended_at: payload.ended_at,
        created_at: now,
    };

    Ok(NewRunTree {
        run,
        steps,
        failure,
        decisions,
        quality_signals,
    })
}

fn validate_step(run_id: Uuid, index: usize, payload: StepPayload) -> Result<Step> {
    let path_prefix = format!("steps[{index}]");

    if payload.ended_at < payload.started_at {
        return Err(ObsError::validation(
            format!("{path_prefix}.ended_at"),
            "step ended_at must be >= started_at",
        ));
    }
    if payload.latency_ms < 0 {
        return Err(ObsError::validation(
            format!("{path_prefix}.latency_ms"),
            "latency_ms must be >= 0",
        ));
    }
    check_short_identifier(&payload.name, MAX_NAME_LEN, &format!("{path_prefix}.name"))?;
    check_metadata_map(&payload.metadata, &format!("{path_prefix}.metadata"))?;

    Ok(Step {
        step_id: payload.step_id,
        run_id,
        seq: payload.seq,
        step_type: step_type_from_payload(payload.step_type),
        name: payload.name,
        latency_ms: payload.latency_ms,
        started_at: payload.started_at,
        ended_at: payload.ended_at,
        metadata: payload.metadata,
    })
}

fn validate_failure(
    run_id: Uuid,
    payload: FailurePayload,
    known_step_ids: &HashSet<Uuid>,
) -> Result<Failure> {
    if let Some(step_id) = payload.step_id {
        if !known_step_ids.contains(&step_id) {
            return Err(ObsError::validation(
                "failure.step_id",
                "step_id does not reference a step in this run",
            ));
        }
    }
    check_short_identifier(&payload.failure_code, MAX_NAME_LEN, "failure.failure_code")?;
    check_text_field(&payload.message, MAX_FAILURE_MESSAGE_LEN, "failure.message")?;

    Ok(Failure {
        failure_id: Uuid::new_v4(),
        run_id,
        step_id: payload.step_id,
        failure_type: failure_type_from_payload(payload.failure_type),
        failure_code: payload.failure_code,
        message: payload.message,
    })
}

fn validate_decision(
    run_id: Uuid,
    index: usize,
    payload: DecisionPayload,
    known_step_ids: &HashSet<Uuid>,
) -> Result<Decision> {
    let path_prefix = format!("decisions[{index}]");

    if let Some(step_id) = payload.step_id {
        if !known_step_ids.contains(&step_id) {
            return Err(ObsError::validation(
                format!("{path_prefix}.step_id"),
                "step_id does not reference a step in this run",
            ));
        }
    }

    let decision_type = decision_type_from_payload(payload.decision_type);
    if !decision_type.reason_code_is_permitted(&payload.reason_code) {
        return Err(ObsError::validation(
            format!("{path_prefix}.reason_code"),
            format!(
                "reason_code '{}' is not permitted for decision_type '{}'",
                payload.reason_code,
                decision_type.as_str()
            ),
        ));
    }
    if let Some(confidence) = payload.confidence {
        check_unit_interval(confidence, &format!("{path_prefix}.confidence"))?;
    }
    if payload.candidates.len() > MAX_CANDIDATES {
        return Err(ObsError::validation(
            format!("{path_prefix}.candidates"),
            format!("candidates list exceeds {MAX_CANDIDATES} entries"),
        ));
    }
    check_short_identifier(&payload.selected, MAX_NAME_LEN, &format!("{path_prefix}.selected"))?;
    check_metadata_map(&payload.metadata, &format!("{path_prefix}.metadata"))?;

    Ok(Decision {
        decision_id: payload.decision_id,
        run_id,
        step_id: payload.step_id,
        decision_type,
        selected: payload.selected,
        reason_code: payload.reason_code,
        confidence: payload.confidence,
        candidates: payload.candidates,
        metadata: payload.metadata,
        recorded_at: Utc::now(),
    })
}

fn validate_signal(
    run_id: Uuid,
    index: usize,
    payload: QualitySignalPayload,
    known_step_ids: &HashSet<Uuid>,
) -> Result<QualitySignal> {
    let path_prefix = format!("quality_signals[{index}]");

    if let Some(step_id) = payload.step_id {
        if !known_step_ids.contains(&step_id) {
            return Err(ObsError::validation(
                format!("{path_prefix}.step_id"),
                "step_id does not reference a step in this run",
            ));
        }
    }

    let signal_type = signal_type_from_payload(payload.signal_type);
    if !signal_type.signal_code_is_permitted(&payload.signal_code) {
        return Err(ObsError::validation(
            format!("{path_prefix}.signal_code"),
            format!(
                "signal_code '{}' is not permitted for signal_type '{}'",
                payload.signal_code,
                signal_type.as_str()
            ),
        ));
    }
    if let Some(weight) = payload.weight {
        check_unit_interval(weight, &format!("{path_prefix}.weight"))?;
    }
    check_metadata_map(&payload.metadata, &format!("{path_prefix}.metadata"))?;

    Ok(QualitySignal {
        signal_id: payload.signal_id,
        run_id,
        step_id: payload.step_id,
        signal_type,
        signal_code: payload.signal_code,
        value: payload.value,
        weight: payload.weight,
        metadata: payload.metadata,
        recorded_at: Utc::now(),
    })
}
