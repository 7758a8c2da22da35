use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use rand::Rng;

/// Simulated-latency middleware: when the runtime throttle flag is on,
/// hold every response back by a random 500-1000 ms so clients can exercise
/// their loading states.
pub async fn throttle(
    State(state): State<Arc<crate::state::AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    if state.util.throttle() {
        let delay = rand::thread_rng().gen_range(500..=1000);
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    response
}
