//! Infrastructure Database Layer
//!
//! This crate provides PostgreSQL storage for the claims records service
//! using SQLx: connection pooling, embedded migrations, the claims
//! repository and the adapter implementing the domain's `ClaimStore` port.
//!
//! # Architecture
//!
//! The crate follows the repository pattern. Repositories own the SQL and
//! return row types; adapters translate rows into domain models and database
//! errors into port errors.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresClaimStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/claims")).await?;
//! run_migrations(&pool).await?;
//! let store = PostgresClaimStore::new(pool);
//! ```

pub mod adapters;
pub mod error;
pub mod pool;
pub mod repositories;

pub use adapters::PostgresClaimStore;
pub use error::DatabaseError;
pub use pool::{create_pool, create_pool_from_url, run_migrations, DatabaseConfig, DatabasePool};
