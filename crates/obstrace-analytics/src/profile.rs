//! Profile builder: aggregates raw observations over a window
//! into a `BehaviorProfile` snapshot.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use obstrace_core::domain::profile::{
    LATENCY_METRIC_MEAN, LATENCY_METRIC_P50, LATENCY_METRIC_P95, LATENCY_METRIC_P99,
};
use obstrace_core::{
    BehaviorProfile, DecisionDistributions, Environment, LatencyStats, ObservationRepository,
    ProfileRepository, SignalDistributions,
};
use obstrace_types::error::{ObsError, Result};
use uuid::Uuid;

/// Percentile via linear interpolation between closest ranks, a fixed and
/// documented choice. `values` need not be sorted.
pub fn percentile(values: &[i64], pct: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<f64> = values.iter().map(|&v| v as f64).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = (pct / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let frac = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

fn latency_stats(durations_ms: &[i64]) -> LatencyStats {
    let mut stats = LatencyStats::new();
    if durations_ms.is_empty() {
        return stats;
    }
    let mean = durations_ms.iter().sum::<i64>() as f64 / durations_ms.len() as f64;
    stats.insert(LATENCY_METRIC_MEAN.to_string(), mean);
    stats.insert(LATENCY_METRIC_P50.to_string(), percentile(durations_ms, 50.0));
    stats.insert(LATENCY_METRIC_P95.to_string(), percentile(durations_ms, 95.0));
    stats.insert(LATENCY_METRIC_P99.to_string(), percentile(durations_ms, 99.0));
    stats
}

fn decision_distributions(
    counts: std::collections::HashMap<obstrace_core::DecisionType, std::collections::HashMap<String, i64>>,
) -> DecisionDistributions {
    let mut out = DecisionDistributions::new();
    for (decision_type, by_selected) in counts {
        let total: i64 = by_selected.values().sum();
        if total == 0 {
            continue;
        }
        let normalized = by_selected
            .into_iter()
            .filter(|(_, n)| *n > 0)
            .map(|(selected, n)| (selected, n as f64 / total as f64))
            .collect();
        out.insert(decision_type.as_str().to_string(), normalized);
    }
    out
}

/// `value = true` fraction per signal_code, the form the drift engine also
/// uses.
fn signal_distributions(
    counts: std::collections::HashMap<obstrace_core::SignalType, std::collections::HashMap<String, (i64, i64)>>,
) -> SignalDistributions {
    let mut out = SignalDistributions::new();
    for (signal_type, by_code) in counts {
        let normalized: std::collections::HashMap<String, f64> = by_code
            .into_iter()
            .filter(|(_, (_, total))| *total > 0)
            .map(|(code, (true_count, total))| (code, true_count as f64 / total as f64))
            .collect();
        if !normalized.is_empty() {
            out.insert(signal_type.as_str().to_string(), normalized);
        }
    }
    out
}

pub struct ProfileBuilder {
    observations: Arc<dyn ObservationRepository>,
    profiles: Arc<dyn ProfileRepository>,
}

impl ProfileBuilder {
    pub fn new(observations: Arc<dyn ObservationRepository>, profiles: Arc<dyn ProfileRepository>) -> Self {
        Self { observations, profiles }
    }

    #[tracing::instrument(skip(self), fields(%agent_id, %agent_version))]
    pub async fn build_profile(
        &self,
        agent_id: &str,
        agent_version: &str,
        environment: Environment,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        min_sample_size: i64,
    ) -> Result<BehaviorProfile> {
        let sample_size = self
            .observations
            .count_runs_in_window(agent_id, agent_version, environment, window_start, window_end)
            .await?;

        if sample_size < min_sample_size {
            return Err(ObsError::InsufficientData(format!(
                "{sample_size} runs in window, need at least {min_sample_size}"
            )));
        }

        let (decision_counts, signal_counts, durations_ms) = tokio::try_join!(
            self.observations
                .decision_counts_in_window(agent_id, agent_version, environment, window_start, window_end),
            self.observations
                .signal_counts_in_window(agent_id, agent_version, environment, window_start, window_end),
            self.observations
                .run_durations_ms_in_window(agent_id, agent_version, environment, window_start, window_end),
        )?;

        let profile = BehaviorProfile {
            profile_id: Uuid::new_v4(),
            agent_id: agent_id.to_string(),
            agent_version: agent_version.to_string(),
            environment,
            window_start,
            window_end,
            sample_size,
            decision_distributions: decision_distributions(decision_counts),
            signal_distributions: signal_distributions(signal_counts),
            latency_stats: latency_stats(&durations_ms),
            created_at: Utc::now(),
        };

        self.profiles.upsert_profile(profile).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_linear_interpolation() {
        let values = vec![10, 20, 30, 40];
        assert_eq!(percentile(&values, 0.0), 10.0);
        assert_eq!(percentile(&values, 100.0), 40.0);
        assert!((percentile(&values, 50.0) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn percentile_empty_is_zero() {
        assert_eq!(percentile(&[], 95.0), 0.0);
    }

    #[test]
    fn latency_stats_excludes_nothing_it_was_given() {
        let stats = latency_stats(&[100, 200, 300]);
        assert_eq!(stats.get(LATENCY_METRIC_MEAN).copied(), Some(200.0));
    }

    proptest::proptest! {
        /// Every decision_type with at least one observed count normalizes
        /// to a probability distribution summing to 1.0.
        #[test]
        fn decision_distribution_sums_to_one(
            counts in proptest::collection::vec(1i64..500, 1..6),
        ) {
            let mut by_selected = std::collections::HashMap::new();
            for (i, n) in counts.into_iter().enumerate() {
                by_selected.insert(format!("candidate-{i}"), n);
            }
            let mut input = std::collections::HashMap::new();
            input.insert(obstrace_core::DecisionType::ToolSelection, by_selected);

            let distributions = decision_distributions(input);
            let probabilities = &distributions[obstrace_core::DecisionType::ToolSelection.as_str()];
            let total: f64 = probabilities.values().sum();
            proptest::prop_assert!((total - 1.0).abs() < 1e-9);
        }

        /// Same property for signal distributions, which carry a
        /// (true_count, total_count) pair per signal_code instead of a
        /// flat count.
        #[test]
        fn signal_distribution_stays_within_unit_interval(
            true_count in 0i64..100,
            total in 1i64..100,
        ) {
            let true_count = true_count.min(total);
            let mut by_code = std::collections::HashMap::new();
            by_code.insert("format_ok".to_string(), (true_count, total));
            let mut input = std::collections::HashMap::new();
            input.insert(obstrace_core::SignalType::Format, by_code);

            let distributions = signal_distributions(input);
            let probability = distributions[obstrace_core::SignalType::Format.as_str()]["format_ok"];
            proptest::prop_assert!((0.0..=1.0).contains(&probability));
        }
    }
}
