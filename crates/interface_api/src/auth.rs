//! Bearer-token authentication
//!
//! Tokens are HS256 JWTs signed with `ApiConfig::jwt_secret`. The subject
//! becomes the author of flags and notes; roles gate the bulk data routes.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Seconds of clock skew tolerated when checking `exp`
const EXPIRY_LEEWAY_SECS: u64 = 30;

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User name, recorded as flag and note author
    pub sub: String,
    pub roles: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    /// `admin` satisfies every role check
    pub fn has_role(&self, role: &str) -> bool {
        self.roles
            .iter()
            .any(|r| r == role || r == permissions::ADMIN)
    }

    pub fn require_role(&self, role: &str) -> Result<(), AuthError> {
        if self.has_role(role) {
            Ok(())
        } else {
            Err(AuthError::MissingPermission(role.to_string()))
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Missing permission: {0}")]
    MissingPermission(String),
}

/// Signs a token valid for `expiration_secs`
pub fn create_token(
    user: &str,
    roles: Vec<String>,
    secret: &str,
    expiration_secs: u64,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.to_string(),
        roles,
        exp: (now + Duration::seconds(expiration_secs as i64)).timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::InvalidToken)
}

pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::default();
    validation.leeway = EXPIRY_LEEWAY_SECS;

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })
}

/// Extracts the token from an `Authorization: Bearer ...` header value
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)
}

pub mod permissions {
    pub const ADMIN: &str = "admin";
    /// Bulk import, export, purge and the dashboard
    pub const DATA_ADMIN: &str = "data:admin";
}
