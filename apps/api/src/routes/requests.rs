use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::HelpRequest;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateRequestBody {
    pub customer_phone: String,
    pub question: String,
    pub context: Option<String>,
}

#[derive(Deserialize)]
pub struct ResolveBody {
    pub answer: String,
}

/// POST /api/v1/requests
pub async fn handle_create(
    State(state): State<AppState>,
    Json(body): Json<CreateRequestBody>,
) -> Result<(StatusCode, Json<HelpRequest>), AppError> {
    let request = state
        .desk
        .escalate(&body.customer_phone, &body.question, body.context.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /api/v1/requests/:id
pub async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HelpRequest>, AppError> {
    Ok(Json(state.desk.requests().get_help_request(&id).await?))
}

/// GET /api/v1/requests/pending
pub async fn handle_pending(
    State(state): State<AppState>,
) -> Result<Json<Vec<HelpRequest>>, AppError> {
    Ok(Json(state.desk.requests().get_pending_requests().await?))
}

/// GET /api/v1/requests/resolved
pub async fn handle_resolved(
    State(state): State<AppState>,
) -> Result<Json<Vec<HelpRequest>>, AppError> {
    Ok(Json(state.desk.requests().get_resolved_requests().await?))
}

/// GET /api/v1/requests/unresolved
pub async fn handle_unresolved(
    State(state): State<AppState>,
) -> Result<Json<Vec<HelpRequest>>, AppError> {
    Ok(Json(state.desk.requests().get_unresolved_requests().await?))
}

/// POST /api/v1/requests/:id/resolve
pub async fn handle_resolve(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ResolveBody>,
) -> Result<Json<HelpRequest>, AppError> {
    Ok(Json(state.desk.resolve(&id, &body.answer).await?))
}

/// POST /api/v1/requests/:id/unresolved
pub async fn handle_unresolved_transition(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HelpRequest>, AppError> {
    Ok(Json(state.desk.retract(&id).await?))
}
