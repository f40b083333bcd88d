//! Core Kernel - Foundational types shared by the claims records service
//!
//! This crate provides the building blocks used across the workspace:
//! - Claim, flag and note identifiers
//! - Non-negative monetary amounts with precise decimal arithmetic
//! - Port abstractions (errors, health checks) for the hexagonal architecture

pub mod money;
pub mod identifiers;
pub mod ports;
pub mod error;

pub use money::{Amount, AmountError};
pub use identifiers::{ClaimId, FlagId, NoteId};
pub use ports::{
    PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth,
    OperationMetadata,
};
pub use error::CoreError;
