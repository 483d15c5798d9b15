//! Database connection pool management.

use shared::retry::{Retry, RetryError};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// Creates a PostgreSQL connection pool with the given configuration.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect(&config.url)
        .await
}

/// Creates the pool, retrying the initial connection.
///
/// The tracker cannot run without storage, so exhaustion is returned to the
/// caller, which is expected to abort startup.
pub async fn connect_with_retry(
    config: &DatabaseConfig,
    retry: &Retry,
) -> Result<PgPool, RetryError<sqlx::Error>> {
    let pool = retry
        .critical("database_connect", || create_pool(config))
        .await?;
    info!(
        max_connections = config.max_connections,
        "Database connection established"
    );
    Ok(pool)
}
