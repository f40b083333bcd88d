//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! claims records test suite.
//!
//! # Modules
//!
//! - `fixtures`: Sample claims and import files
//! - `builders`: Builders for claims and pipe-delimited files
//! - `database`: PostgreSQL test container management
//! - `assertions`: Assertion helpers for import reports and records
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
