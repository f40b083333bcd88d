//! API middleware

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::{info, warn};

use crate::auth::{bearer_token, permissions, validate_token, Claims};
use crate::error::ApiError;
use crate::AppState;

/// Header carrying the request identifier
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Validates the bearer token and stores its [`Claims`] as a request extension
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let claims = bearer_token(header)
        .and_then(|token| validate_token(token, &state.config.jwt_secret))
        .map_err(|e| {
            warn!(uri = %request.uri(), error = %e, "Authentication failed");
            ApiError::Unauthorized
        })?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Restricts a route to data administrators
///
/// Must run inside [`auth_middleware`].
pub async fn require_data_admin(request: Request<Body>, next: Next) -> Result<Response, ApiError> {
    let claims = request
        .extensions()
        .get::<Claims>()
        .ok_or(ApiError::Unauthorized)?;

    if let Err(e) = claims.require_role(permissions::DATA_ADMIN) {
        warn!(user = %claims.sub, uri = %request.uri(), "Data admin role required");
        return Err(ApiError::Forbidden(e.to_string()));
    }

    Ok(next.run(request).await)
}

/// Audit logging middleware
///
/// Logs all API requests for compliance and debugging
pub async fn audit_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let user_id = request
        .extensions()
        .get::<Claims>()
        .map(|c| c.sub.clone())
        .unwrap_or_else(|| "anonymous".to_string());
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let start = Utc::now();

    let response = next.run(request).await;

    let duration = Utc::now() - start;
    let status = response.status();

    info!(
        method = %method,
        uri = %uri,
        user = %user_id,
        request_id = %request_id,
        status = %status.as_u16(),
        duration_ms = duration.num_milliseconds(),
        "API request"
    );

    response
}
