pub mod managers;
pub mod models;
pub mod registry;
pub mod schema;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::error::{ModelError, ModelResult};
use registry::ResolvedSchema;

pub use managers::Managers;

/// Shared handle to the storage engine and the resolved entity schema
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    schema: Arc<ResolvedSchema>,
}

impl Database {
    /// Open the connection pool.
    ///
    /// Connection failures surface as `StorageUnavailable` after a single
    /// attempt.
    pub async fn connect(config: &DatabaseConfig) -> ModelResult<Self> {
        info!("Initializing database connection pool");
        let schema = Arc::new(models::resolve_schema()?);

        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(ModelError::StorageUnavailable)?
            .foreign_keys(true)
            .create_if_missing(true);

        let in_memory = config.url.contains(":memory:") || config.url.contains("mode=memory");
        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout());
        pool_options = if in_memory {
            // dropping the last connection would drop the database
            pool_options.idle_timeout(None).max_lifetime(None)
        } else {
            pool_options.idle_timeout(config.idle_timeout())
        };

        let pool = pool_options.connect_with(options).await.map_err(|e| {
            warn!(error = %e, "Database connection failed");
            ModelError::StorageUnavailable(e)
        })?;

        let db = Self { pool, schema };
        db.health_check().await?;

        info!("Database connection pool initialized successfully");
        Ok(db)
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: SqlitePool) -> ModelResult<Self> {
        let schema = Arc::new(models::resolve_schema()?);
        Ok(Self { pool, schema })
    }

    /// Round-trip a trivial query and report its latency
    pub async fn health_check(&self) -> ModelResult<Duration> {
        let start = Instant::now();
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(ModelError::StorageUnavailable)?;
        let latency = start.elapsed();
        debug!(latency_ms = latency.as_millis() as u64, "Database health check passed");
        Ok(latency)
    }

    /// Create every registered table that does not exist yet
    pub async fn create_schema(&self) -> ModelResult<()> {
        schema::create_all(&self.pool, &self.schema).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn schema(&self) -> &ResolvedSchema {
        &self.schema
    }

    /// Managers sharing this handle's pool
    pub fn managers(&self) -> Managers {
        Managers::new(self.clone())
    }

    /// Gracefully close the database connection pool
    pub async fn close(self) {
        info!("Closing database connection pool");
        self.pool.close().await;
        info!("Database connection pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_in_memory_and_create_schema() {
        let db = Database::connect(&DatabaseConfig::in_memory()).await.unwrap();
        db.create_schema().await.unwrap();
        // idempotent
        db.create_schema().await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(db.pool())
        .await
        .unwrap();
        let tables: Vec<_> = tables.into_iter().map(|(name,)| name).collect();
        assert_eq!(
            tables,
            vec!["devices", "grilling_sessions", "temperature_alerts", "users"]
        );
    }

    #[tokio::test]
    async fn test_foreign_keys_are_enforced() {
        let db = Database::connect(&DatabaseConfig::in_memory()).await.unwrap();
        let (enabled,): (i64,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[tokio::test]
    async fn test_unreachable_database_is_storage_unavailable() {
        let config = DatabaseConfig {
            url: "sqlite:///nonexistent-dir/sub/grill.db".to_string(),
            acquire_timeout_secs: 1,
            ..DatabaseConfig::in_memory()
        };
        let err = Database::connect(&config).await.unwrap_err();
        assert!(err.is_transient(), "unexpected error: {err:?}");
    }

    #[tokio::test]
    async fn test_closed_pool_is_storage_unavailable() {
        let db = Database::connect(&DatabaseConfig::in_memory()).await.unwrap();
        let handle = db.clone();
        db.close().await;
        assert!(handle.health_check().await.unwrap_err().is_transient());
    }
}
