//! PostgreSQL test containers
//!
//! Each [`TestDatabase`] owns a throwaway `postgres:16-alpine` container with
//! the embedded migrations applied, so tests see the exact schema the server
//! runs against. Docker is required; tests using these helpers are
//! `#[ignore]`d by default:
//!
//! ```bash
//! cargo test -p test_utils -- --ignored
//! ```

use sqlx::PgPool;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};

use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresClaimStore};

const IMAGE: (&str, &str) = ("postgres", "16-alpine");
const USER: &str = "claims";
const PASSWORD: &str = "claims";
const DATABASE: &str = "claims_test";
const READY_LINE: &str = "database system is ready to accept connections";

/// Children before parents
const TABLES: [&str; 4] = ["claim_notes", "claim_flags", "claim_details", "claims"];

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn connection_url(host: &str, port: u16) -> String {
    format!("postgres://{USER}:{PASSWORD}@{host}:{port}/{DATABASE}")
}

/// A migrated database in its own container, dropped with the value
pub struct TestDatabase {
    _container: ContainerAsync<GenericImage>,
    pub url: String,
    pub pool: PgPool,
}

impl TestDatabase {
    pub async fn start() -> Result<Self, BoxError> {
        let (name, tag) = IMAGE;
        let container = GenericImage::new(name, tag)
            .with_exposed_port(5432.tcp())
            .with_wait_for(WaitFor::message_on_stderr(READY_LINE))
            .with_env_var("POSTGRES_USER", USER)
            .with_env_var("POSTGRES_PASSWORD", PASSWORD)
            .with_env_var("POSTGRES_DB", DATABASE)
            .start()
            .await?;

        let host = container.get_host().await?.to_string();
        let port = container.get_host_port_ipv4(5432).await?;
        let url = connection_url(&host, port);

        let pool = create_pool(DatabaseConfig::new(url.clone()).max_connections(5)).await?;
        run_migrations(&pool).await?;

        Ok(Self {
            _container: container,
            url,
            pool,
        })
    }

    pub fn store(&self) -> PostgresClaimStore {
        PostgresClaimStore::new(self.pool.clone())
    }

    /// Empties every table, keeping the schema
    pub async fn clear_data(&self) -> Result<(), BoxError> {
        sqlx::query(&format!("TRUNCATE TABLE {} CASCADE", TABLES.join(", ")))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Starts a fresh database for one test
pub async fn create_isolated_test_database() -> Result<TestDatabase, BoxError> {
    TestDatabase::start().await
}
