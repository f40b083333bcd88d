//! Repository implementations
//!
//! Repositories encapsulate SQL queries and map database rows to plain row
//! types. Queries are checked at runtime, so the crate builds without a
//! database.

pub mod claims;

pub use claims::ClaimsRepository;
