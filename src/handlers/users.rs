use std::sync::Arc;

use axum::{body::Bytes, extract::State, http::StatusCode, Extension, Json};
use serde_json::Value;

use super::parse_json_body;
use crate::error::ApiError;
use crate::middleware::RequestIdentity;
use crate::state::AppState;

/// POST /users/register - create an account; responds with the user record
/// and a fresh `accessToken`.
pub async fn register(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let body = parse_json_body(&body);
    let result = state.auth.register(&state.protected, &body)?;
    Ok(Json(Value::Object(result)))
}

/// POST /users/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let body = parse_json_body(&body);
    let result = state.auth.login(&state.protected, &body)?;
    Ok(Json(Value::Object(result)))
}

/// GET /users/logout - invalidate the current session. No response body, so
/// clients get a 204 without a Content-Type header.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<RequestIdentity>,
) -> Result<StatusCode, ApiError> {
    state.auth.logout(&state.protected, identity.user())?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /users/me - the authenticated user, password hash stripped.
pub async fn me(
    Extension(identity): Extension<RequestIdentity>,
) -> Result<Json<Value>, ApiError> {
    let user = identity
        .user()
        .ok_or_else(|| ApiError::authorization("Unauthorized"))?;
    let mut result = user.clone();
    result.remove("hashedPassword");
    Ok(Json(Value::Object(result)))
}
