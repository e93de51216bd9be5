use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Reports service version and whether the backing store answers a ping.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let (status, store) = match state.backend.ping().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::warn!("Health check failed: {e}");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    };
    let overall = if status.is_success() { "ok" } else { "degraded" };
    (
        status,
        Json(json!({
            "status": overall,
            "version": env!("CARGO_PKG_VERSION"),
            "service": "frontdesk-api",
            "store": {
                "backend": state.config.store_backend.as_str(),
                "status": store
            }
        })),
    )
}
