use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Extension, Json,
};
use serde_json::Value;

use super::parse_object_body;
use crate::error::ApiError;
use crate::middleware::RequestIdentity;
use crate::query::{self, ListDirectives, QueryOutcome};
use crate::rules::Action;
use crate::state::AppState;

/// GET /data - list the names of existing collections.
pub async fn collections(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(Value::from(state.public.collections()))
}

/// GET /data/:collection - list records, optionally shaped by the query
/// directives (where, sortBy, offset, pageSize, distinct, count, select,
/// load).
pub async fn list(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    Extension(identity): Extension<RequestIdentity>,
) -> Result<Json<Value>, ApiError> {
    let directives = ListDirectives::from_query(&params);
    let records = state.public.list(&collection)?;
    let outcome = query::apply(&directives, records, &state.public, &state.protected)?;

    let mut data = match outcome {
        QueryOutcome::Count(count) => Value::from(count),
        QueryOutcome::Records(records) => {
            Value::Array(records.into_iter().map(Value::Object).collect())
        }
    };
    state.rules.apply(
        Action::Read,
        &collection,
        identity.user(),
        &mut data,
        None,
        identity.is_admin,
        &state.public,
    )?;
    Ok(Json(data))
}

/// GET /data/:collection/:id - single record.
pub async fn show(
    State(state): State<Arc<AppState>>,
    Path((collection, id)): Path<(String, String)>,
    Extension(identity): Extension<RequestIdentity>,
) -> Result<Json<Value>, ApiError> {
    let record = state.public.get(&collection, &id)?;
    let mut data = Value::Object(record);
    state.rules.apply(
        Action::Read,
        &collection,
        identity.user(),
        &mut data,
        None,
        identity.is_admin,
        &state.public,
    )?;
    Ok(Json(data))
}

/// POST /data/:collection - create a record; `_ownerId` is stamped from the
/// authenticated user.
pub async fn create(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    Extension(identity): Extension<RequestIdentity>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let mut body = parse_object_body(&body)?;
    let mut data = Value::Null;
    state.rules.apply(
        Action::Create,
        &collection,
        identity.user(),
        &mut data,
        Some(&mut body),
        identity.is_admin,
        &state.public,
    )?;

    if let Some(user) = identity.user() {
        if let Some(user_id) = user.get("_id") {
            body.insert("_ownerId".to_string(), user_id.clone());
        }
    }

    let created = state
        .public
        .add(&collection, &body)
        .map_err(|_| ApiError::request("Request error"))?;
    Ok(Json(Value::Object(created)))
}

/// POST /data/:collection/:id is not a thing; records are replaced with PUT.
pub async fn create_with_id() -> ApiError {
    ApiError::request("Use PUT to update records")
}

/// PUT /data/:collection/:id - full replace, preserving system fields.
pub async fn replace(
    State(state): State<Arc<AppState>>,
    Path((collection, id)): Path<(String, String)>,
    Extension(identity): Extension<RequestIdentity>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let mut body = parse_object_body(&body)?;
    let existing = state.public.get(&collection, &id)?;
    let mut data = Value::Object(existing);
    state.rules.apply(
        Action::Update,
        &collection,
        identity.user(),
        &mut data,
        Some(&mut body),
        identity.is_admin,
        &state.public,
    )?;

    let updated = state
        .public
        .set(&collection, &id, &body)
        .map_err(|_| ApiError::request("Request error"))?;
    Ok(Json(Value::Object(updated)))
}

/// PATCH /data/:collection/:id - shallow merge.
pub async fn modify(
    State(state): State<Arc<AppState>>,
    Path((collection, id)): Path<(String, String)>,
    Extension(identity): Extension<RequestIdentity>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let mut body = parse_object_body(&body)?;
    let existing = state.public.get(&collection, &id)?;
    let mut data = Value::Object(existing);
    state.rules.apply(
        Action::Update,
        &collection,
        identity.user(),
        &mut data,
        Some(&mut body),
        identity.is_admin,
        &state.public,
    )?;

    let updated = state
        .public
        .merge(&collection, &id, &body)
        .map_err(|_| ApiError::request("Request error"))?;
    Ok(Json(Value::Object(updated)))
}

/// DELETE /data/:collection/:id - remove; responds with `{_deletedOn}`.
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path((collection, id)): Path<(String, String)>,
    Extension(identity): Extension<RequestIdentity>,
) -> Result<Json<Value>, ApiError> {
    let existing = state.public.get(&collection, &id)?;
    let mut data = Value::Object(existing);
    state.rules.apply(
        Action::Delete,
        &collection,
        identity.user(),
        &mut data,
        None,
        identity.is_admin,
        &state.public,
    )?;

    let deleted = state
        .public
        .delete(&collection, &id)
        .map_err(|_| ApiError::request("Request error"))?;
    Ok(Json(Value::Object(deleted)))
}

/// PUT/PATCH/DELETE on a bare collection.
pub async fn missing_id() -> ApiError {
    ApiError::request("Missing entry ID")
}

/// Anything nested deeper than /data/:collection/:id.
pub async fn too_many_tokens() -> ApiError {
    ApiError::request("Request error")
}
