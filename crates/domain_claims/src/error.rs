//! Claims domain errors

use thiserror::Error;

/// Errors that can occur in the claims domain
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimError {
    #[error("Claim not found: {0}")]
    ClaimNotFound(String),

    #[error("Invalid status '{0}', expected one of: Paid, Denied, Under Review")]
    InvalidStatus(String),

    #[error("{0} is required")]
    MissingField(String),

    #[error("{field} exceeds {max} characters")]
    TooLong { field: String, max: usize },

    #[error("Note text is empty")]
    EmptyNote,
}
