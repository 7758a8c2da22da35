pub mod data;
pub mod jsonstore;
pub mod users;
pub mod util;

use axum::body::Bytes;
use serde_json::Value;

use crate::error::ApiError;
use crate::storage::Record;

/// Parse a request body as JSON; anything unparseable becomes null and is
/// rejected by whatever field validation runs next.
pub(crate) fn parse_json_body(bytes: &Bytes) -> Value {
    serde_json::from_slice(bytes).unwrap_or(Value::Null)
}

/// Parse a request body that must be a JSON object.
pub(crate) fn parse_object_body(bytes: &Bytes) -> Result<Record, ApiError> {
    match parse_json_body(bytes) {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::request("Request error")),
    }
}
