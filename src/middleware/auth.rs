use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::Record;

/// Identity resolved for one request: the authenticated user (if a bearer
/// token was presented) and the elevated-privilege flag.
#[derive(Clone, Debug, Default)]
pub struct RequestIdentity {
    pub user: Option<Record>,
    pub is_admin: bool,
}

impl RequestIdentity {
    pub fn user(&self) -> Option<&Record> {
        self.user.as_ref()
    }
}

/// Token-validation middleware, run on every request that reaches the
/// router (CORS preflights are answered a layer further out).
///
/// No `X-Authorization` header means an anonymous request. A header that
/// does not resolve to a live session and user fails the whole request with
/// 403 "Invalid access token"; a stale token is never silently ignored.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let is_admin = request.headers().contains_key("x-admin");
    let user = match request
        .headers()
        .get("x-authorization")
        .and_then(|value| value.to_str().ok())
    {
        Some(token) => Some(state.auth.authenticate(&state.protected, token)?),
        None => None,
    };

    request
        .extensions_mut()
        .insert(RequestIdentity { user, is_admin });
    Ok(next.run(request).await)
}
