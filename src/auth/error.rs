// Authentication and authorization error types

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::auth::models::Role;

/// Message shared by every bearer-token failure so clients cannot tell
/// an expired token from a forged one.
const UNAUTHENTICATED_MESSAGE: &str = "Could not validate credentials";

/// Authentication and authorization error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    // Credential check
    #[error("invalid email or password")]
    InvalidCredentials,

    // Token decoding; the boundary collapses these into one 401
    #[error("token has expired")]
    Expired,
    #[error("token signature is invalid")]
    SignatureInvalid,
    #[error("token is malformed")]
    Malformed,
    #[error("token has the wrong type")]
    WrongTokenType,
    #[error("no valid access token presented")]
    Unauthenticated,

    // Authorization
    /// Resolved role is not in the route's allowed set
    #[error("role '{actual}' is not allowed on this route")]
    Forbidden { actual: Role },
    #[error("account is inactive")]
    InactiveAccount,

    /// Directory lookup timed out or its backend is unreachable
    #[error("user directory unavailable: {0}")]
    DirectoryUnavailable(String),

    #[error("email already registered")]
    Conflict,

    #[error("validation error: {0}")]
    Validation(String),
    #[error("user not found")]
    NotFound,
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error_code: &'static str,
    pub message: String,
}

impl AuthError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials
            | AuthError::Expired
            | AuthError::SignatureInvalid
            | AuthError::Malformed
            | AuthError::WrongTokenType
            | AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden { .. } | AuthError::InactiveAccount => StatusCode::FORBIDDEN,
            AuthError::DirectoryUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::Conflict => StatusCode::CONFLICT,
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for any failure that means "no usable bearer token"
    pub fn is_token_failure(&self) -> bool {
        matches!(
            self,
            AuthError::Expired
                | AuthError::SignatureInvalid
                | AuthError::Malformed
                | AuthError::WrongTokenType
                | AuthError::Unauthenticated
        )
    }

    /// Only infrastructure faults are worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::DirectoryUnavailable(_))
    }

    /// Client-facing code and message. Never carries internal detail.
    fn error_body(&self) -> ErrorResponse {
        let (error_code, message) = match self {
            AuthError::InvalidCredentials => ("INVALID_CREDENTIALS", "Invalid email or password".to_string()),
            e if e.is_token_failure() => ("UNAUTHENTICATED", UNAUTHENTICATED_MESSAGE.to_string()),
            AuthError::Forbidden { .. } => ("FORBIDDEN", "Insufficient permissions".to_string()),
            AuthError::InactiveAccount => ("INACTIVE_ACCOUNT", "Account is inactive".to_string()),
            AuthError::DirectoryUnavailable(_) => {
                ("SERVICE_UNAVAILABLE", "Service temporarily unavailable".to_string())
            }
            AuthError::Conflict => ("CONFLICT", "Email already registered".to_string()),
            AuthError::Validation(msg) => ("VALIDATION_ERROR", msg.clone()),
            AuthError::NotFound => ("NOT_FOUND", "User not found".to_string()),
            _ => ("INTERNAL_ERROR", "An internal server error occurred".to_string()),
        };
        ErrorResponse { error_code, message }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        // Specific failure kinds stay in the logs only
        match &self {
            e if e.is_token_failure() => warn!("Rejected bearer token: {}", e),
            AuthError::InvalidCredentials => warn!("Failed login attempt"),
            AuthError::Forbidden { actual } => warn!("Authorization failed for role '{}'", actual),
            AuthError::InactiveAccount => warn!("Request from inactive account"),
            AuthError::DirectoryUnavailable(msg) => error!("User directory unavailable: {}", msg),
            AuthError::Internal(msg) => error!("Internal auth error: {}", msg),
            other => debug!("Auth request rejected: {}", other),
        }

        let status = self.status_code();
        let mut response = (status, Json(self.error_body())).into_response();

        if self.is_token_failure() {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        if self.is_retryable() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }

        response
    }
}

/// Directory backend faults. Pool exhaustion and I/O failures are
/// transient; everything else is an internal error.
impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AuthError::DirectoryUnavailable(err.to_string())
            }
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => AuthError::Conflict,
            _ => AuthError::Internal(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AuthError::Validation(errors.to_string())
    }
}
