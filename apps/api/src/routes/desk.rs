use axum::{extract::State, Json};
use serde::Deserialize;

use crate::errors::AppError;
use crate::escalation::{AskOutcome, DashboardSummary};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AskBody {
    pub customer_phone: String,
    pub question: String,
    pub context: Option<String>,
}

/// POST /api/v1/ask
/// Answers from the knowledge base or escalates to a supervisor.
pub async fn handle_ask(
    State(state): State<AppState>,
    Json(body): Json<AskBody>,
) -> Result<Json<AskOutcome>, AppError> {
    let outcome = state
        .desk
        .ask(&body.customer_phone, &body.question, body.context.as_deref())
        .await?;
    Ok(Json(outcome))
}

/// GET /api/v1/dashboard
pub async fn handle_dashboard(
    State(state): State<AppState>,
) -> Result<Json<DashboardSummary>, AppError> {
    Ok(Json(state.desk.dashboard().await?))
}
