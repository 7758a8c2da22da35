use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderName, Method, Uri},
    middleware as layers,
    routing::{any, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::error::ApiError;
use crate::handlers::{data, jsonstore, users, util};
use crate::middleware::{authenticate, throttle};
use crate::state::AppState;

/// Assemble the full router. Layer order (outermost first): trace, CORS
/// (answers preflights before anything else runs), throttle, token
/// validation, then the route table.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .merge(data_routes())
        .merge(users_routes())
        .merge(jsonstore_routes())
        .merge(util_routes())
        .fallback(unknown_service)
        .layer(layers::from_fn_with_state(state.clone(), authenticate))
        .layer(layers::from_fn_with_state(state.clone(), throttle))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn data_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/data", get(data::collections))
        .route(
            "/data/:collection",
            get(data::list)
                .post(data::create)
                .put(data::missing_id)
                .patch(data::missing_id)
                .delete(data::missing_id),
        )
        .route(
            "/data/:collection/:id",
            get(data::show)
                .post(data::create_with_id)
                .put(data::replace)
                .patch(data::modify)
                .delete(data::remove),
        )
        .route("/data/:collection/:id/*rest", any(data::too_many_tokens))
}

fn users_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/register", post(users::register))
        .route("/users/login", post(users::login))
        .route("/users/logout", get(users::logout))
        .route("/users/me", get(users::me))
}

fn jsonstore_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jsonstore", get(jsonstore::fetch_root))
        .route(
            "/jsonstore/*path",
            get(jsonstore::fetch)
                .post(jsonstore::create)
                .put(jsonstore::replace)
                .patch(jsonstore::modify)
                .delete(jsonstore::remove),
        )
}

fn util_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/util", post(util::configure))
        .route("/util/:flag", get(util::status))
}

/// Development-mode CORS: wildcard origin, fixed method and header lists.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            HeaderName::from_static("x-requested-with"),
            HeaderName::from_static("x-http-method-override"),
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static("x-authorization"),
            HeaderName::from_static("x-admin"),
        ])
        .max_age(Duration::from_secs(86400))
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "name": "Nebula API (Rust)",
        "version": version,
        "description": "Pluggable in-memory REST data server",
        "endpoints": {
            "data": "/data/:collection[/:id] (rule-checked collection CRUD)",
            "users": "/users/register, /users/login, /users/logout, /users/me",
            "jsonstore": "/jsonstore/... (raw key/value tree)",
            "util": "/util, /util/:flag (runtime flags)",
        }
    }))
}

/// Unknown top-level services answer 400, not 404.
async fn unknown_service(uri: Uri) -> ApiError {
    let service = uri
        .path()
        .trim_start_matches('/')
        .split('/')
        .next()
        .unwrap_or("");
    tracing::error!("missing service {}", service);
    ApiError::request(format!("Service \"{}\" is not supported", service))
}
