//! Natural-language question endpoint, backed by the NLQ orchestrator.

use crate::{error::AppError, events::RequestId, nlq::NlqAnswer, server::AppState};
use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SqlQueryRequest {
    pub question: String,
}

/// POST /api/v1/sql-query
pub async fn sql_query(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    Json(payload): Json<SqlQueryRequest>,
) -> Result<Json<NlqAnswer>, AppError> {
    let question = payload.question.trim();
    if question.is_empty() {
        return Err(AppError::Validation("Question must not be empty".to_string()));
    }

    // The logging middleware inserts the correlation id; a fresh one covers
    // routers mounted without it.
    let request_id = request_id
        .map(|Extension(RequestId(id))| id)
        .unwrap_or_else(Uuid::new_v4);

    let answer = state.nlq.answer_question(request_id, question).await?;
    Ok(Json(answer))
}
