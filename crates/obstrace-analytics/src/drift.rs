//! Drift detection engine: compares an observation-window
//! profile against an active baseline and emits statistically significant
//! `BehaviorDrift` records.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use obstrace_core::domain::profile::LATENCY_METRICS;
use obstrace_core::{BehaviorBaseline, BehaviorDrift, BehaviorProfile, DriftRepository, DriftType, ProfileRepository, Severity, TestMethod};
use obstrace_types::config::DriftThresholds;
use obstrace_types::error::{ObsError, Result};
use statrs::distribution::{ChiSquared, ContinuousCDF};
use uuid::Uuid;

use crate::profile::ProfileBuilder;

fn delta_percent(baseline_value: f64, observed_value: f64) -> f64 {
    if baseline_value == 0.0 {
        0.0
    } else {
        ((observed_value - baseline_value) / baseline_value) * 100.0
    }
}

/// Chi-square goodness-of-fit p-value over the union of categories, each
/// side scaled by its own effective sample size.
fn chi_square_p_value(
    categories: &HashSet<String>,
    baseline_probs: &HashMap<String, f64>,
    baseline_n: i64,
    observed_probs: &HashMap<String, f64>,
    observed_n: i64,
) -> f64 {
    if categories.len() < 2 {
        return 1.0;
    }

    let mut statistic = 0.0;
    for category in categories {
        let expected = baseline_probs.get(category).copied().unwrap_or(0.0) * baseline_n as f64;
        let observed = observed_probs.get(category).copied().unwrap_or(0.0) * observed_n as f64;
        if expected > 0.0 {
            statistic += (observed - expected).powi(2) / expected;
        }
    }

    let df = (categories.len() - 1) as f64;
    match ChiSquared::new(df) {
        Ok(dist) => dist.sf(statistic),
        Err(_) => 1.0,
    }
}

pub struct DriftEngine {
    profiles: Arc<dyn ProfileRepository>,
    profile_builder: ProfileBuilder,
    drift: Arc<dyn DriftRepository>,
    thresholds: DriftThresholds,
}

impl DriftEngine {
    pub fn new(
        profiles: Arc<dyn ProfileRepository>,
        profile_builder: ProfileBuilder,
        drift: Arc<dyn DriftRepository>,
        thresholds: DriftThresholds,
    ) -> Self {
        Self { profiles, profile_builder, drift, thresholds }
    }

    #[tracing::instrument(skip(self, baseline), fields(baseline_id = %baseline.baseline_id))]
    pub async fn detect_drift(
        &self,
        baseline: &BehaviorBaseline,
        observation_start: DateTime<Utc>,
        observation_end: DateTime<Utc>,
    ) -> Result<Vec<BehaviorDrift>> {
        let baseline_profile = self
            .profiles
            .get_profile(baseline.profile_id)
            .await?
            .ok_or_else(|| ObsError::NotFound(format!("profile {}", baseline.profile_id)))?;

        let observed_profile = self
            .profile_builder
            .build_profile(
                &baseline.agent_id,
                &baseline.agent_version,
                baseline.environment,
                observation_start,
                observation_end,
                self.thresholds.min_sample_size_drift_detection,
            )
            .await?;

        let mut drifts = Vec::new();
        drifts.extend(self.decision_drift(baseline, &baseline_profile, &observed_profile));
        drifts.extend(self.signal_drift(baseline, &baseline_profile, &observed_profile));
        drifts.extend(self.latency_drift(baseline, &baseline_profile, &observed_profile));

        let mut persisted = Vec::with_capacity(drifts.len());
        for drift in drifts {
            persisted.push(self.drift.insert_drift(drift).await?);
        }
        Ok(persisted)
    }

    fn decision_drift(
        &self,
        baseline: &BehaviorBaseline,
        baseline_profile: &BehaviorProfile,
        observed_profile: &BehaviorProfile,
    ) -> Vec<BehaviorDrift> {
        let mut out = Vec::new();
        let decision_types: HashSet<String> = baseline_profile
            .decision_distributions
            .keys()
            .chain(observed_profile.decision_distributions.keys())
            .cloned()
            .collect();

        for decision_type in decision_types {
            let empty = HashMap::new();
            let baseline_dist = baseline_profile.decision_distributions.get(&decision_type).unwrap_or(&empty);
            let observed_dist = observed_profile.decision_distributions.get(&decision_type).unwrap_or(&empty);
            let cats: HashSet<String> = baseline_dist.keys().chain(observed_dist.keys()).cloned().collect();

            let p_value = chi_square_p_value(
                &cats,
                baseline_dist,
                baseline_profile.sample_size,
                observed_dist,
                observed_profile.sample_size,
            );

            if p_value >= self.thresholds.decision_p_value_threshold {
                continue;
            }

            for category in &cats {
                let baseline_value = baseline_dist.get(category).copied().unwrap_or(0.0);
                let observed_value = observed_dist.get(category).copied().unwrap_or(0.0);
                let delta = observed_value - baseline_value;
                let pct = delta_percent(baseline_value, observed_value);

                if pct.abs() <= self.thresholds.decision_min_delta_percent {
                    continue;
                }

                out.push(self.build_drift(
                    baseline,
                    DriftType::Decision,
                    format!("{decision_type}.{category}"),
                    baseline_value,
                    observed_value,
                    delta,
                    pct,
                    p_value,
                    TestMethod::ChiSquare,
                    observed_profile,
                ));
            }
        }
        out
    }

    fn signal_drift(
        &self,
        baseline: &BehaviorBaseline,
        baseline_profile: &BehaviorProfile,
        observed_profile: &BehaviorProfile,
    ) -> Vec<BehaviorDrift> {
        let mut out = Vec::new();
        let signal_types: HashSet<String> = baseline_profile
            .signal_distributions
            .keys()
            .chain(observed_profile.signal_distributions.keys())
            .cloned()
            .collect();

        for signal_type in signal_types {
            let empty = HashMap::new();
            let baseline_dist = baseline_profile.signal_distributions.get(&signal_type).unwrap_or(&empty);
            let observed_dist = observed_profile.signal_distributions.get(&signal_type).unwrap_or(&empty);
            let cats: HashSet<String> = baseline_dist.keys().chain(observed_dist.keys()).cloned().collect();

            let p_value = chi_square_p_value(
                &cats,
                baseline_dist,
                baseline_profile.sample_size,
                observed_dist,
                observed_profile.sample_size,
            );

            if p_value >= self.thresholds.signal_p_value_threshold {
                continue;
            }

            for code in &cats {
                let baseline_value = baseline_dist.get(code).copied().unwrap_or(0.0);
                let observed_value = observed_dist.get(code).copied().unwrap_or(0.0);
                let delta = observed_value - baseline_value;
                let pct = delta_percent(baseline_value, observed_value);

                if pct.abs() <= self.thresholds.signal_min_delta_percent {
                    continue;
                }

                out.push(self.build_drift(
                    baseline,
                    DriftType::Signal,
                    format!("{signal_type}.{code}"),
                    baseline_value,
                    observed_value,
                    delta,
                    pct,
                    p_value,
                    TestMethod::ChiSquare,
                    observed_profile,
                ));
            }
        }
        out
    }

    fn latency_drift(
        &self,
        baseline: &BehaviorBaseline,
        baseline_profile: &BehaviorProfile,
        observed_profile: &BehaviorProfile,
    ) -> Vec<BehaviorDrift> {
        let mut out = Vec::new();
        for metric in LATENCY_METRICS {
            let baseline_value = baseline_profile.latency_stats.get(metric).copied().unwrap_or(0.0);
            let observed_value = observed_profile.latency_stats.get(metric).copied().unwrap_or(0.0);
            let delta = observed_value - baseline_value;
            let pct = delta_percent(baseline_value, observed_value);

            if pct.abs() < self.thresholds.latency_min_delta_percent {
                continue;
            }

            out.push(self.build_drift(
                baseline,
                DriftType::Latency,
                metric.to_string(),
                baseline_value,
                observed_value,
                delta,
                pct,
                1.0,
                TestMethod::PercentThreshold,
                observed_profile,
            ));
        }
        out
    }

    #[allow(clippy::too_many_arguments)]
    fn build_drift(
        &self,
        baseline: &BehaviorBaseline,
        drift_type: DriftType,
        metric: String,
        baseline_value: f64,
        observed_value: f64,
        delta: f64,
        delta_percent: f64,
        significance: f64,
        test_method: TestMethod,
        observed_profile: &BehaviorProfile,
    ) -> BehaviorDrift {
        BehaviorDrift {
            drift_id: Uuid::new_v4(),
            baseline_id: baseline.baseline_id,
            agent_id: baseline.agent_id.clone(),
            agent_version: baseline.agent_version.clone(),
            environment: baseline.environment,
            drift_type,
            metric,
            baseline_value,
            observed_value,
            delta,
            delta_percent,
            significance,
            test_method,
            severity: Severity::from_delta_percent(
                delta_percent,
                self.thresholds.severity_low_max_delta_percent,
                self.thresholds.severity_medium_max_delta_percent,
            ),
            detected_at: Utc::now(),
            observation_window_start: observed_profile.window_start,
            observation_window_end: observed_profile.window_end,
            observation_sample_size: observed_profile.sample_size,
            resolved_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_percent_zero_baseline_is_zero() {
        assert_eq!(delta_percent(0.0, 0.5), 0.0);
    }

    #[test]
    fn delta_percent_matches_spec_example() {
        // baseline_value ~ 0.65, observed_value ~ 0.82 -> delta_percent ~ 26.2
        let pct = delta_percent(0.65, 0.82);
        assert!((pct - 26.15).abs() < 0.1);
    }

    #[test]
    fn severity_matches_spec_example() {
        let pct = delta_percent(0.65, 0.82);
        assert_eq!(Severity::from_delta_percent(pct, 15.0, 30.0), Severity::Medium);
    }

    #[test]
    fn chi_square_identical_distributions_yields_high_p_value() {
        let mut probs = HashMap::new();
        probs.insert("a".to_string(), 0.5);
        probs.insert("b".to_string(), 0.5);
        let cats: HashSet<String> = probs.keys().cloned().collect();
        let p = chi_square_p_value(&cats, &probs, 100, &probs, 100);
        assert!(p > 0.9);
    }
}
