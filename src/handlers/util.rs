use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

use super::parse_json_body;
use crate::state::AppState;

/// GET /util/:flag - current state of a runtime flag.
pub async fn status(State(state): State<Arc<AppState>>, Path(flag): Path<String>) -> Response {
    match flag.as_str() {
        "throttle" => Json(Value::from(state.util.throttle())).into_response(),
        _ => StatusCode::NO_CONTENT.into_response(),
    }
}

/// POST /util - toggle runtime flags, e.g. `{"throttle": true}`.
pub async fn configure(State(state): State<Arc<AppState>>, body: Bytes) -> Json<Value> {
    if let Value::Object(flags) = parse_json_body(&body) {
        for (key, value) in flags {
            let enabled = truthy(&value);
            tracing::info!("{} {}", key, if enabled { "enabled" } else { "disabled" });
            if key == "throttle" {
                state.util.set_throttle(enabled);
            }
        }
    }
    Json(Value::from(""))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
