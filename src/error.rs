//! Error types for the todo backend
//!
//! Provides unified error handling using thiserror. Each subsystem has its own
//! error enum; `AppError` is what handlers and middleware turn into HTTP
//! responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Store Error ==
/// Errors raised by a coordination store backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store has been closed and accepts no further commands
    #[error("store is closed")]
    Closed,

    /// The backend could not be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Operation applied to a value of the wrong kind (e.g. INCR on text)
    #[error("wrong value type for key: {0}")]
    WrongType(String),

    /// Key or value rejected before reaching the backend
    #[error("invalid store request: {0}")]
    InvalidRequest(String),

    /// Any other backend failure
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Convenience Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// == Auth Error ==
/// Token issuing and validation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No bearer token on the request
    #[error("missing bearer token")]
    MissingToken,

    /// Token structure could not be decoded
    #[error("malformed token")]
    Malformed,

    /// Signature does not verify against the configured secret
    #[error("invalid token signature")]
    InvalidSignature,

    /// Token was issued by someone else
    #[error("invalid token issuer")]
    InvalidIssuer,

    /// Token lifetime has elapsed
    #[error("token expired")]
    Expired,

    /// Username/password pair did not match
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Token could not be signed
    #[error("token signing failed: {0}")]
    Signing(String),

    /// Password could not be hashed
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
            _ => AuthError::Malformed,
        }
    }
}

// == Queue Error ==
/// Task submission failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The queue no longer accepts tasks
    #[error("task queue is closed")]
    Closed,

    /// The bounded buffer is full (only from non-blocking submission)
    #[error("task queue is full")]
    Full,
}

// == App Error ==
/// Unified error type surfaced to HTTP clients.
#[derive(Error, Debug)]
pub enum AppError {
    /// Authentication failed
    #[error(transparent)]
    Unauthorized(#[from] AuthError),

    /// Client exceeded its request budget
    #[error("rate limit exceeded")]
    RateLimited,

    /// Rate limiter could not consult the store
    #[error("rate limiter unavailable: {0}")]
    RateLimitStore(StoreError),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Resource is busy (lock held elsewhere) or already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Deadline elapsed before the handler answered
    #[error("Request timeout")]
    Timeout,

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(AuthError::Signing(_) | AuthError::Hashing(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::RateLimitStore(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Timeout => StatusCode::REQUEST_TIMEOUT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to clients. Internal details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            AppError::RateLimitStore(_) => "rate limiter unavailable".to_string(),
            AppError::Internal(_) => "Internal Server Error".to_string(),
            AppError::Unauthorized(AuthError::Signing(_) | AuthError::Hashing(_)) => {
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        AppError::Internal(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(json!({
            "error": self.public_message()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for handlers.
pub type Result<T> = std::result::Result<T, AppError>;
