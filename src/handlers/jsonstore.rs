use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{parse_json_body, parse_object_body};
use crate::error::ApiError;
use crate::state::AppState;

// The jsonstore service is a raw nested key/value tree: path tokens address
// nodes directly, no access rules and no system-field handling apply.

fn tokens(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// GET /jsonstore/*path - traverse the tree; a missing node is a 204.
pub async fn fetch(State(state): State<Arc<AppState>>, Path(path): Path<String>) -> Response {
    let tree = state.jsonstore.read();
    let mut node: &Value = &tree;
    for token in tokens(&path) {
        match node.get(&token) {
            Some(next) => node = next,
            None => return StatusCode::NO_CONTENT.into_response(),
        }
    }
    Json(node.clone()).into_response()
}

/// GET /jsonstore
pub async fn fetch_root() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// POST /jsonstore/*path - create intermediate nodes on demand, then store
/// the body under a fresh `_id`.
pub async fn create(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let mut record = parse_object_body(&body)?;
    let mut tree = state.jsonstore.write();
    let mut node: &mut Value = &mut tree;
    for token in tokens(&path) {
        let map = node
            .as_object_mut()
            .ok_or_else(|| ApiError::request("Request error"))?;
        node = map
            .entry(token)
            .or_insert_with(|| Value::Object(Map::new()));
    }
    let map = node
        .as_object_mut()
        .ok_or_else(|| ApiError::request("Request error"))?;

    let id = Uuid::new_v4().to_string();
    record.insert("_id".to_string(), Value::from(id.clone()));
    map.insert(id, Value::Object(record.clone()));
    Ok(Json(Value::Object(record)))
}

/// PUT /jsonstore/*path - replace an existing node; a missing target is a
/// 204, never an implicit create.
pub async fn replace(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    body: Bytes,
) -> Response {
    let body = parse_json_body(&body);
    let tokens = tokens(&path);
    let Some((last, parents)) = tokens.split_last() else {
        return ApiError::request("Request error").into_response();
    };

    let mut tree = state.jsonstore.write();
    let mut node: &mut Value = &mut tree;
    for token in parents {
        match node.get_mut(token) {
            Some(next) => node = next,
            None => return StatusCode::NO_CONTENT.into_response(),
        }
    }
    match node.as_object_mut() {
        Some(map) if map.contains_key(last) => {
            map.insert(last.clone(), body.clone());
            Json(body).into_response()
        }
        _ => StatusCode::NO_CONTENT.into_response(),
    }
}

/// PATCH /jsonstore/*path - shallow merge into an existing node.
pub async fn modify(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    body: Bytes,
) -> Response {
    let body = parse_json_body(&body);
    let mut tree = state.jsonstore.write();
    let mut node: &mut Value = &mut tree;
    for token in tokens(&path) {
        match node.get_mut(&token) {
            Some(next) => node = next,
            None => return StatusCode::NO_CONTENT.into_response(),
        }
    }
    if let (Some(target), Some(patch)) = (node.as_object_mut(), body.as_object()) {
        for (key, value) in patch {
            target.insert(key.clone(), value.clone());
        }
    }
    Json(node.clone()).into_response()
}

/// DELETE /jsonstore/*path - remove a node and return it; a missing node
/// yields a JSON null.
pub async fn remove(State(state): State<Arc<AppState>>, Path(path): Path<String>) -> Response {
    let tokens = tokens(&path);
    let Some((last, parents)) = tokens.split_last() else {
        return ApiError::request("Request error").into_response();
    };

    let mut tree = state.jsonstore.write();
    let mut node: &mut Value = &mut tree;
    for token in parents {
        match node.get_mut(token) {
            Some(next) => node = next,
            None => return Json(Value::Null).into_response(),
        }
    }
    match node.as_object_mut().and_then(|map| map.remove(last)) {
        Some(removed) => Json(removed).into_response(),
        None => Json(Value::Null).into_response(),
    }
}
