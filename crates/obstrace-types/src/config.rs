//! Process-wide configuration, loaded once at service startup (env vars
//! layered over an optional YAML document) and threaded through as
//! immutable state for the lifetime of the process.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Database connection pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
    /// Deadline applied to every individual outbound query; a query that
    /// hasn't returned by then fails with `ObsError::Timeout` rather than
    /// being retried.
    pub query_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:obstrace.db".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_seconds: 30,
            idle_timeout_seconds: 600,
            query_timeout_ms: 2_000,
        }
    }
}

/// Bind addresses and worker tuning for the ingest/query/drift HTTP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub worker_threads: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            worker_threads: 4,
        }
    }
}

/// Thresholds controlling the drift detection engine .
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftThresholds {
    pub decision_p_value_threshold: f64,
    pub decision_min_delta_percent: f64,
    pub signal_p_value_threshold: f64,
    pub signal_min_delta_percent: f64,
    pub latency_min_delta_percent: f64,
    pub severity_low_max_delta_percent: f64,
    pub severity_medium_max_delta_percent: f64,
    pub min_sample_size_profile: i64,
    pub min_sample_size_drift_detection: i64,
}

impl Default for DriftThresholds {
    fn default() -> Self {
        Self {
            decision_p_value_threshold: 0.05,
            decision_min_delta_percent: 10.0,
            signal_p_value_threshold: 0.05,
            signal_min_delta_percent: 15.0,
            latency_min_delta_percent: 20.0,
            severity_low_max_delta_percent: 15.0,
            severity_medium_max_delta_percent: 30.0,
            min_sample_size_profile: 100,
            min_sample_size_drift_detection: 50,
        }
    }
}

/// Alert sink toggles. The log sink is always enabled; the rest are
/// independently opt-in via presence of a URL/token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertSinksConfig {
    pub database_enabled: bool,
    pub webhook_url: Option<String>,
    pub slack_webhook_url: Option<String>,
    pub pagerduty_routing_key: Option<String>,
    /// Deadline for the webhook POST; a sink that hasn't responded by then
    /// is recorded as failed rather than left to hang.
    #[serde(default = "default_webhook_timeout_ms")]
    pub webhook_timeout_ms: u64,
}

fn default_webhook_timeout_ms() -> u64 {
    5_000
}

impl Default for AlertSinksConfig {
    fn default() -> Self {
        Self {
            database_enabled: false,
            webhook_url: None,
            slack_webhook_url: None,
            pagerduty_routing_key: None,
            webhook_timeout_ms: default_webhook_timeout_ms(),
        }
    }
}

/// Top-level process configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub drift: DriftThresholds,
    #[serde(default)]
    pub alerts: AlertSinksConfig,
}

impl Config {
    /// Load configuration from (in increasing priority order): built-in
    /// defaults, an optional YAML file at `path`, then environment
    /// variables prefixed `OBSTRACE__` with `__` as the nesting separator
    /// (e.g. `OBSTRACE__DATABASE__URL`).
    pub fn load(yaml_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?);

        if let Some(path) = yaml_path {
            if std::path::Path::new(path).exists() {
                builder = builder.add_source(config::File::with_name(path));
            }
        }

        let builder = builder.add_source(
            config::Environment::with_prefix("OBSTRACE")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder.build()?;
        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::default();
        assert_eq!(cfg.database.max_connections, 10);
        assert_eq!(cfg.database.query_timeout_ms, 2_000);
        assert_eq!(cfg.drift.min_sample_size_profile, 100);
        assert!(cfg.alerts.webhook_url.is_none());
    }

    #[test]
    fn load_without_yaml_falls_back_to_defaults() {
        let cfg = Config::load(Some("/nonexistent/path.yaml")).unwrap();
        assert_eq!(cfg.server.bind_address, "0.0.0.0:8080");
    }

    #[test]
    fn load_reads_overrides_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obstrace.yaml");
        std::fs::write(
            &path,
            "database:\n  max_connections: 42\nserver:\n  bind_address: \"127.0.0.1:9090\"\n",
        )
        .unwrap();

        let cfg = Config::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(cfg.database.max_connections, 42);
        assert_eq!(cfg.server.bind_address, "127.0.0.1:9090");
        // Fields absent from the file keep their defaults.
        assert_eq!(cfg.database.query_timeout_ms, 2_000);
    }
}
