//! API error handling

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use core_kernel::PortError;
use domain_claims::{ExportError, FormatError, ImportError};

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// The uploaded file could not be read as a claims file
    #[error("Format error: {message}")]
    Format {
        message: String,
        details: Vec<String>,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        details: Vec<String>,
    },

    /// The storage transaction failed
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Validation error without field details
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            details: Vec::new(),
        }
    }

    fn format(message: String, error: &FormatError) -> Self {
        let details = match error {
            FormatError::MissingColumns(columns) | FormatError::UnknownColumns(columns) => {
                columns.clone()
            }
            _ => Vec::new(),
        };
        ApiError::Format { message, details }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message, details) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, Vec::new()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, Vec::new()),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Unauthorized".to_string(),
                Vec::new(),
            ),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, Vec::new()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, Vec::new()),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", msg, Vec::new())
            }
            ApiError::Format { message, details } => {
                (StatusCode::BAD_REQUEST, "format_error", message, details)
            }
            ApiError::Validation { message, details } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", message, details)
            }
            ApiError::Storage(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error", msg, Vec::new())
            }
            ApiError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg, Vec::new())
            }
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg, Vec::new())
            }
        };

        if status.is_server_error() {
            error!(status = status.as_u16(), error = error_type, %message, "Request failed");
        }

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            details: (!details.is_empty()).then_some(details),
        };

        (status, Json(body)).into_response()
    }
}

impl From<PortError> for ApiError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            PortError::Validation { message, field } => ApiError::Validation {
                message,
                details: field.into_iter().collect(),
            },
            PortError::Conflict { message } => ApiError::Conflict(message),
            PortError::Connection { .. } | PortError::Timeout { .. } => {
                ApiError::Unavailable(err.to_string())
            }
            PortError::Internal { .. } => ApiError::Storage(err.to_string()),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match &err {
            ImportError::Format { error, .. } => ApiError::format(err.to_string(), error),
            ImportError::Storage(port) if port.is_conflict() => ApiError::Conflict(err.to_string()),
            ImportError::Storage(_) => ApiError::Storage(err.to_string()),
        }
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::InvalidRange { .. } => ApiError::BadRequest(err.to_string()),
            ExportError::Storage(port) => ApiError::from(port),
            ExportError::Csv(_) | ExportError::Json(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<FormatError> for ApiError {
    fn from(err: FormatError) -> Self {
        ApiError::format(err.to_string(), &err)
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(err.body_text())
        } else {
            ApiError::BadRequest(err.body_text())
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut details: Vec<String> = err
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let reasons: Vec<String> = errors
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                format!("{}: {}", field, reasons.join(", "))
            })
            .collect();
        details.sort();
        ApiError::Validation {
            message: "Request validation failed".to_string(),
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_claims::transfer::FileRole;

    #[test]
    fn test_format_error_is_bad_request_with_columns() {
        let err: ApiError = ImportError::Format {
            file: FileRole::Claims,
            error: FormatError::MissingColumns(vec!["status".to_string()]),
        }
        .into();
        match &err {
            ApiError::Format { details, .. } => assert_eq!(details, &vec!["status".to_string()]),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_storage_conflict_maps_to_409() {
        let err: ApiError = ImportError::Storage(PortError::conflict("duplicate key")).into();
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);

        let err: ApiError = ImportError::Storage(PortError::internal("disk full")).into();
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_port_errors() {
        let not_found: ApiError = PortError::not_found("Claim", 5).into();
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let invalid: ApiError = PortError::validation("note must not be empty").into();
        assert_eq!(invalid.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
