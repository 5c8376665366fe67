//! Row <-> domain conversions shared by every repository impl in this
//! crate. Enum columns are stored as their `as_str()` text; JSON columns
//! (`metadata`, `candidates`, distribution maps) round-trip through
//! `serde_json`.

use chrono::{DateTime, Utc};
use obstrace_core::{
    BaselineType, DecisionType, DriftType, Environment, FailureType, RunStatus, Severity,
    SignalType, StepType, TestMethod,
};
use obstrace_types::error::{ObsError, Result};

/// True when `error` is a uniqueness-constraint violation, i.e. the row a
/// caller tried to insert already exists under its primary key or a unique
/// index.
pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub fn parse_dt(value: &str, path: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| ObsError::Internal(format!("corrupt timestamp at {path}: {error}")))
}

pub fn fmt_dt(value: &DateTime<Utc>) -> String {
    value.to_rfc3339()
}

pub fn parse_environment(value: &str) -> Result<Environment> {
    match value {
        "production" => Ok(Environment::Production),
        "staging" => Ok(Environment::Staging),
        "development" => Ok(Environment::Development),
        other => Err(ObsError::Internal(format!("corrupt environment: {other}"))),
    }
}

pub fn environment_str(value: Environment) -> &'static str {
    match value {
        Environment::Production => "production",
        Environment::Staging => "staging",
        Environment::Development => "development",
    }
}

pub fn parse_run_status(value: &str) -> Result<RunStatus> {
    match value {
        "success" => Ok(RunStatus::Success),
        "failure" => Ok(RunStatus::Failure),
        "partial" => Ok(RunStatus::Partial),
        other => Err(ObsError::Internal(format!("corrupt run status: {other}"))),
    }
}

pub fn run_status_str(value: RunStatus) -> &'static str {
    match value {
        RunStatus::Success => "success",
        RunStatus::Failure => "failure",
        RunStatus::Partial => "partial",
    }
}

pub fn parse_step_type(value: &str) -> Result<StepType> {
    match value {
        "plan" => Ok(StepType::Plan),
        "retrieve" => Ok(StepType::Retrieve),
        "tool" => Ok(StepType::Tool),
        "respond" => Ok(StepType::Respond),
        "other" => Ok(StepType::Other),
        other => Err(ObsError::Internal(format!("corrupt step type: {other}"))),
    }
}

pub fn step_type_str(value: StepType) -> &'static str {
    match value {
        StepType::Plan => "plan",
        StepType::Retrieve => "retrieve",
        StepType::Tool => "tool",
        StepType::Respond => "respond",
        StepType::Other => "other",
    }
}

pub fn parse_failure_type(value: &str) -> Result<FailureType> {
    match value {
        "tool" => Ok(FailureType::Tool),
        "model" => Ok(FailureType::Model),
        "retrieval" => Ok(FailureType::Retrieval),
        "orchestration" => Ok(FailureType::Orchestration),
        other => Err(ObsError::Internal(format!("corrupt failure type: {other}"))),
    }
}

pub fn failure_type_str(value: FailureType) -> &'static str {
    match value {
        FailureType::Tool => "tool",
        FailureType::Model => "model",
        FailureType::Retrieval => "retrieval",
        FailureType::Orchestration => "orchestration",
    }
}

pub fn parse_decision_type(value: &str) -> Result<DecisionType> {
    DecisionType::ALL
        .into_iter()
        .find(|d| d.as_str() == value)
        .ok_or_else(|| ObsError::Internal(format!("corrupt decision type: {value}")))
}

pub fn parse_signal_type(value: &str) -> Result<SignalType> {
    SignalType::ALL
        .into_iter()
        .find(|s| s.as_str() == value)
        .ok_or_else(|| ObsError::Internal(format!("corrupt signal type: {value}")))
}

pub fn parse_baseline_type(value: &str) -> Result<BaselineType> {
    match value {
        "version" => Ok(BaselineType::Version),
        "time_window" => Ok(BaselineType::TimeWindow),
        "manual" => Ok(BaselineType::Manual),
        other => Err(ObsError::Internal(format!("corrupt baseline type: {other}"))),
    }
}

pub fn baseline_type_str(value: BaselineType) -> &'static str {
    match value {
        BaselineType::Version => "version",
        BaselineType::TimeWindow => "time_window",
        BaselineType::Manual => "manual",
    }
}

pub fn parse_drift_type(value: &str) -> Result<DriftType> {
    match value {
        "decision" => Ok(DriftType::Decision),
        "signal" => Ok(DriftType::Signal),
        "latency" => Ok(DriftType::Latency),
        other => Err(ObsError::Internal(format!("corrupt drift type: {other}"))),
    }
}

pub fn drift_type_str(value: DriftType) -> &'static str {
    match value {
        DriftType::Decision => "decision",
        DriftType::Signal => "signal",
        DriftType::Latency => "latency",
    }
}

pub fn parse_test_method(value: &str) -> Result<TestMethod> {
    match value {
        "chi_square" => Ok(TestMethod::ChiSquare),
        "percent_threshold" => Ok(TestMethod::PercentThreshold),
        other => Err(ObsError::Internal(format!("corrupt test method: {other}"))),
    }
}

pub fn test_method_str(value: TestMethod) -> &'static str {
    match value {
        TestMethod::ChiSquare => "chi_square",
        TestMethod::PercentThreshold => "percent_threshold",
    }
}

pub fn parse_severity(value: &str) -> Result<Severity> {
    match value {
        "low" => Ok(Severity::Low),
        "medium" => Ok(Severity::Medium),
        "high" => Ok(Severity::High),
        other => Err(ObsError::Internal(format!("corrupt severity: {other}"))),
    }
}

pub fn severity_str(value: Severity) -> &'static str {
    match value {
        Severity::Low => "low",
        Severity::Medium => "medium",
        Severity::High => "high",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn timestamp_round_trips_through_rfc3339(
            secs in 0i64..32_503_680_000,
            millis in 0u32..1000,
        ) {
            let dt = Utc.timestamp_opt(secs, millis * 1_000_000).unwrap();
            let parsed = parse_dt(&fmt_dt(&dt), "test").unwrap();
            prop_assert_eq!(dt, parsed);
        }
    }
}
