//! Connection pool setup and embedded migrations.

use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use obstrace_types::config::DatabaseConfig;
use obstrace_types::error::{ObsError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

/// Owns the pool and knows how to bring a fresh database up to the current
/// schema.
#[derive(Clone)]
pub struct Store {
    pub(crate) pool: SqlitePool,
    pub(crate) query_timeout: Duration,
}

impl Store {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect_with(options)
            .await?;

        let store = Self {
            pool,
            query_timeout: Duration::from_millis(config.query_timeout_ms),
        };
        store.migrate().await?;
        Ok(store)
    }

    /// In-memory database for tests, schema applied immediately.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = Self {
            pool,
            query_timeout: Duration::from_millis(DatabaseConfig::default().query_timeout_ms),
        };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|error| ObsError::Internal(format!("migration failed: {error}")))?;
        Ok(())
    }

    /// Runs `fut` under the configured per-query deadline. Every database
    /// call a repository makes goes through this so a stalled connection or
    /// a lock-contended write surfaces as [`ObsError::Timeout`] rather than
    /// hanging the caller indefinitely.
    pub(crate) async fn timeout<T, Fut>(&self, fut: Fut) -> Result<T>
    where
        Fut: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(inner) => inner.map_err(ObsError::from),
            Err(_) => Err(ObsError::Timeout(
                "database query exceeded its deadline".into(),
            )),
        }
    }

    pub async fn health_check(&self) -> Result<()> {
        self.timeout(sqlx::query("SELECT 1").execute(&self.pool))
            .await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
