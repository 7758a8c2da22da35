// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

/// HTTP API error with appropriate status codes and client-friendly messages.
///
/// Every error a handler can surface is one of these variants; the dispatch
/// boundary (`IntoResponse`) is the single point where they become the
/// `{"code": <int>, "message": "<string>"}` envelope.
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request (malformed input, query or body)
    Request(String),

    // 401 Unauthorized (action requires a signed-in user)
    Authorization(String),

    // 403 Forbidden (bad login, invalid token, access-rule denial)
    Credential(String),

    // 404 Not Found (missing collection or record)
    NotFound(String),

    // 409 Conflict (duplicate unique identity on register)
    Conflict(String),

    // 500 Internal Server Error (programming defect; detail stays server-side)
    Internal(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Request(_) => 400,
            ApiError::Authorization(_) => 401,
            ApiError::Credential(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::Internal(_) => 500,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::Request(msg) => msg,
            ApiError::Authorization(msg) => msg,
            ApiError::Credential(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            // Never leak internal detail to the client
            ApiError::Internal(_) => "Server Error",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({
            "code": self.status_code(),
            "message": self.message(),
        })
    }
}

// Static constructor methods
impl ApiError {
    pub fn request(message: impl Into<String>) -> Self {
        ApiError::Request(message.into())
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        ApiError::Authorization(message.into())
    }

    pub fn credential(message: impl Into<String>) -> Self {
        ApiError::Credential(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }
}

// Convert module-level error types to ApiError
impl From<crate::query::QueryError> for ApiError {
    fn from(err: crate::query::QueryError) -> Self {
        match err {
            crate::query::QueryError::Storage(store_err) => store_err.into(),
            other => ApiError::request(other.to_string()),
        }
    }
}

impl From<crate::storage::StoreError> for ApiError {
    // Storage misses on read paths are 404s; write paths remap to Request
    // at the call site before this conversion applies.
    fn from(err: crate::storage::StoreError) -> Self {
        match err {
            crate::storage::StoreError::MissingCollection(_)
            | crate::storage::StoreError::MissingEntry(_) => {
                ApiError::not_found("Resource not found")
            }
            crate::storage::StoreError::InvalidData(msg) => ApiError::request(msg),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON serialization error: {}", err);
        ApiError::internal("Failed to format response")
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        if let ApiError::Internal(detail) = &self {
            tracing::error!("unhandled server error: {}", detail);
        }
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}
