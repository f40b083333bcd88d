//! Port-side error, health and audit types
//!
//! Domain crates declare their storage ports as traits extending
//! [`DomainPort`] and [`HealthCheckable`]; adapters (PostgreSQL, the in-memory
//! mock) translate their own failures into [`PortError`] so that callers
//! never see a driver error type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Failure reported by a port implementation
#[derive(Debug, Error)]
pub enum PortError {
    #[error("Not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    /// Input rejected by the adapter; `field` names the offending input
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Write collided with existing data, e.g. a duplicate claim id
    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("Timeout after {duration_ms}ms: {operation}")]
    Timeout { operation: String, duration_ms: u64 },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },
}

impl PortError {
    pub fn not_found(entity_type: impl Into<String>, id: impl fmt::Display) -> Self {
        PortError::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        PortError::Validation {
            message: message.into(),
            field: None,
        }
    }

    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        PortError::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        PortError::Conflict {
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        PortError::Connection {
            message: message.into(),
            source: None,
        }
    }

    pub fn timeout(operation: impl Into<String>, elapsed: Duration) -> Self {
        PortError::Timeout {
            operation: operation.into(),
            duration_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        PortError::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Connection loss and timeouts; the same call may succeed later
    pub fn is_transient(&self) -> bool {
        matches!(self, PortError::Connection { .. } | PortError::Timeout { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PortError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, PortError::Conflict { .. })
    }
}

/// Marker for storage ports shared across async tasks
pub trait DomainPort: Send + Sync + 'static {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterHealth {
    Healthy,
    /// Serving, with reduced capacity or elevated latency
    Degraded,
    Unhealthy,
}

/// Outcome of one adapter health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub adapter_id: String,
    pub status: AdapterHealth,
    pub latency_ms: u64,
    pub message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl HealthCheckResult {
    pub fn healthy(adapter_id: impl Into<String>, latency: Duration) -> Self {
        Self::with_status(adapter_id, AdapterHealth::Healthy, latency, None)
    }

    pub fn unhealthy(
        adapter_id: impl Into<String>,
        latency: Duration,
        message: impl Into<String>,
    ) -> Self {
        Self::with_status(adapter_id, AdapterHealth::Unhealthy, latency, Some(message.into()))
    }

    fn with_status(
        adapter_id: impl Into<String>,
        status: AdapterHealth,
        latency: Duration,
        message: Option<String>,
    ) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            status,
            latency_ms: latency.as_millis() as u64,
            message,
            checked_at: Utc::now(),
        }
    }

    /// Healthy or degraded adapters still accept requests
    pub fn is_operational(&self) -> bool {
        matches!(self.status, AdapterHealth::Healthy | AdapterHealth::Degraded)
    }
}

#[async_trait::async_trait]
pub trait HealthCheckable: Send + Sync {
    async fn health_check(&self) -> HealthCheckResult;
}

/// Who asked for a write, carried into log lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationMetadata {
    /// Request id of the originating HTTP call
    pub correlation_id: Option<String>,
    pub initiated_by: Option<String>,
}

impl OperationMetadata {
    pub fn with_correlation_id(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: Some(correlation_id.into()),
            ..Default::default()
        }
    }

    pub fn initiated_by(mut self, user: impl Into<String>) -> Self {
        self.initiated_by = Some(user.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_names_entity_and_id() {
        let error = PortError::not_found("Claim", 99001);
        assert!(error.is_not_found());
        assert!(!error.is_transient());
        assert_eq!(error.to_string(), "Not found: Claim with id 99001");
    }

    #[test]
    fn test_timeout_is_transient() {
        let timeout = PortError::timeout("import transaction", Duration::from_millis(1500));
        assert!(timeout.is_transient());
        assert_eq!(timeout.to_string(), "Timeout after 1500ms: import transaction");

        assert!(!PortError::validation("unknown status").is_transient());
        assert!(PortError::connection("reset by peer").is_transient());
    }

    #[test]
    fn test_health_constructors() {
        let ok = HealthCheckResult::healthy("postgres", Duration::from_millis(3));
        assert!(ok.is_operational());
        assert_eq!(ok.latency_ms, 3);
        assert!(ok.message.is_none());

        let down = HealthCheckResult::unhealthy("postgres", Duration::ZERO, "refused");
        assert!(!down.is_operational());
        assert_eq!(down.message.as_deref(), Some("refused"));
    }

    #[test]
    fn test_operation_metadata() {
        let metadata = OperationMetadata::with_correlation_id("req-123").initiated_by("admin");
        assert_eq!(metadata.correlation_id.as_deref(), Some("req-123"));
        assert_eq!(metadata.initiated_by.as_deref(), Some("admin"));
    }
}
