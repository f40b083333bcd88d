//! Domain Adapters
//!
//! Adapter implementations for domain ports, connecting the claims domain
//! to the PostgreSQL database layer. Each adapter:
//! - Implements the domain's port trait
//! - Translates between domain models and database row types
//! - Uses the repository layer for database operations

pub mod claims;

pub use claims::{PostgresClaimSession, PostgresClaimStore};
