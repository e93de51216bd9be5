use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{KnowledgeBaseEntry, KnowledgeSource};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AddEntryBody {
    pub question: String,
    pub answer: String,
    pub source: Option<String>,
}

/// GET /api/v1/knowledge
pub async fn handle_list(
    State(state): State<AppState>,
) -> Result<Json<Vec<KnowledgeBaseEntry>>, AppError> {
    Ok(Json(state.desk.knowledge().get_all_entries().await?))
}

/// POST /api/v1/knowledge
pub async fn handle_add(
    State(state): State<AppState>,
    Json(body): Json<AddEntryBody>,
) -> Result<(StatusCode, Json<KnowledgeBaseEntry>), AppError> {
    let source = match body.source.as_deref() {
        None => KnowledgeSource::Supervisor,
        Some(raw) => raw.parse().map_err(AppError::Validation)?,
    };
    let entry = state
        .desk
        .knowledge()
        .add_entry(&body.question, &body.answer, source)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// DELETE /api/v1/knowledge/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.desk.knowledge().delete_entry(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("knowledge entry {id} not found")))
    }
}
