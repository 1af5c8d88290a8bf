//! Response DTOs for the todo API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

/// Response body for register and login
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub user_id: u64,
    pub token: String,
    /// Token lifetime in seconds
    pub expires_in: u64,
}

/// Response body for the health endpoint (GET /api/v1/health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded"
    pub status: String,
    /// Whether the coordination store answered a ping
    pub store: bool,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Builds a health report from the store probe result.
    pub fn from_probe(store_ok: bool) -> Self {
        Self {
            status: if store_ok { "healthy" } else { "degraded" }.to_string(),
            store: store_ok,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error body emitted by pipeline stages that know the trace id
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub trace_id: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            trace_id: trace_id.into(),
        }
    }
}
