//! Connection pool and schema migrations
//!
//! Imports hold one transaction for the whole file, so the pool keeps a
//! per-connection `statement_timeout` to stop a stuck import from pinning
//! row locks indefinitely.

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::error::DatabaseError;

pub type DatabasePool = PgPool;

const DEFAULT_URL: &str = "postgres://localhost/claims";

/// Pool settings
///
/// ```rust
/// use infra_db::DatabaseConfig;
/// use std::time::Duration;
///
/// let config = DatabaseConfig::new("postgres://localhost/claims")
///     .max_connections(20)
///     .statement_timeout(Duration::from_secs(120));
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long `acquire` waits for a free connection
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    /// Server-side limit per statement; `None` leaves the server default
    pub statement_timeout: Option<Duration>,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(10 * 60),
            statement_timeout: Some(Duration::from_secs(5 * 60)),
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }

    pub fn without_statement_timeout(mut self) -> Self {
        self.statement_timeout = None;
        self
    }

    fn connect_options(&self) -> Result<PgConnectOptions, DatabaseError> {
        let mut options = PgConnectOptions::from_str(&self.url)
            .map_err(|e| DatabaseError::ConnectionFailed(format!("invalid database url: {}", e)))?
            .application_name("claims-records");
        if let Some(timeout) = self.statement_timeout {
            options = options.options([("statement_timeout", timeout.as_millis().to_string())]);
        }
        Ok(options)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new(DEFAULT_URL)
    }
}

/// Connects a pool
///
/// # Errors
///
/// `DatabaseError::ConnectionFailed` for a malformed URL or when no
/// connection can be opened.
pub async fn create_pool(config: DatabaseConfig) -> Result<DatabasePool, DatabaseError> {
    info!(
        max_connections = config.max_connections,
        statement_timeout_ms = config.statement_timeout.map(|t| t.as_millis() as u64),
        "Creating database pool"
    );

    let options = config.connect_options()?;
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .connect_with(options)
        .await
        .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

    info!("Database pool ready");
    Ok(pool)
}

pub async fn create_pool_from_url(url: &str) -> Result<DatabasePool, DatabaseError> {
    create_pool(DatabaseConfig::new(url)).await
}

/// Applies pending migrations from the workspace `migrations/` directory
pub async fn run_migrations(pool: &DatabasePool) -> Result<(), DatabaseError> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    info!("Schema migrations applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DatabaseConfig::default();
        assert_eq!(config.url, DEFAULT_URL);
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.statement_timeout, Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_builder_overrides() {
        let config = DatabaseConfig::new("postgres://test")
            .max_connections(50)
            .acquire_timeout(Duration::from_secs(5))
            .without_statement_timeout();

        assert_eq!(config.max_connections, 50);
        assert_eq!(config.acquire_timeout, Duration::from_secs(5));
        assert!(config.statement_timeout.is_none());
    }

    #[test]
    fn test_malformed_url_is_connection_error() {
        let err = DatabaseConfig::new("not a url").connect_options().unwrap_err();
        assert!(matches!(err, DatabaseError::ConnectionFailed(_)));
    }

    #[test]
    fn test_connect_options_parse() {
        assert!(DatabaseConfig::new("postgres://user:pw@db:5433/claims")
            .connect_options()
            .is_ok());
    }
}
