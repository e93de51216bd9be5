pub mod desk;
pub mod health;
pub mod knowledge;
pub mod requests;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/ask", post(desk::handle_ask))
        .route("/api/v1/dashboard", get(desk::handle_dashboard))
        // Escalation lifecycle
        .route("/api/v1/requests", post(requests::handle_create))
        .route("/api/v1/requests/pending", get(requests::handle_pending))
        .route("/api/v1/requests/resolved", get(requests::handle_resolved))
        .route(
            "/api/v1/requests/unresolved",
            get(requests::handle_unresolved),
        )
        .route("/api/v1/requests/:id", get(requests::handle_get))
        .route(
            "/api/v1/requests/:id/resolve",
            post(requests::handle_resolve),
        )
        .route(
            "/api/v1/requests/:id/unresolved",
            post(requests::handle_unresolved_transition),
        )
        // Knowledge base
        .route(
            "/api/v1/knowledge",
            get(knowledge::handle_list).post(knowledge::handle_add),
        )
        .route("/api/v1/knowledge/:id", delete(knowledge::handle_delete))
        .with_state(state)
}
