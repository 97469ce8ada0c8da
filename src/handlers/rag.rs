//! Retrieval-augmented question endpoint: embed the question, fetch the
//! nearest persona records from the vector store, and let the LLM answer
//! from those records only.

use crate::{
    error::AppError,
    events::{ApiEvent, EventKind, RequestId},
    providers,
    server::AppState,
    vector::SearchHit,
};
use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

fn default_limit() -> usize {
    3
}

#[derive(Debug, Deserialize)]
pub struct RagQueryRequest {
    pub question: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Serialize)]
pub struct RagQueryResponse {
    pub question: String,
    pub answer: String,
    pub sources: Vec<SearchHit>,
}

/// POST /api/v1/query
pub async fn rag_query(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    Json(payload): Json<RagQueryRequest>,
) -> Result<Json<RagQueryResponse>, AppError> {
    let question = payload.question.trim();
    if question.is_empty() {
        return Err(AppError::Validation("Question must not be empty".to_string()));
    }

    let vector = state
        .vector
        .as_ref()
        .ok_or_else(|| AppError::Config("Vector search is not enabled".to_string()))?;

    let request_id = request_id
        .map(|Extension(RequestId(id))| id)
        .unwrap_or_else(Uuid::new_v4);

    let embedding =
        providers::gemini::embed_content(&state.http_client, &state.config.gemini, question)
            .await?;
    let hits = vector.search(&embedding, payload.limit.clamp(1, 20)).await?;

    let context = hits
        .iter()
        .map(|hit| hit.payload.to_string())
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = format!(
        "Pregunta: {question}\n\nRegistros de empleados relevantes:\n{context}\n\n\
         Responde la pregunta únicamente con los registros suministrados. \
         Responde en español y de forma concisa."
    );

    state.event_log.record(ApiEvent::new(
        request_id,
        EventKind::AiRequest {
            model: Some(state.config.gemini.model.clone()),
            prompt: prompt.clone(),
            parameters: None,
        },
    ));

    let started = Instant::now();
    let answer =
        providers::gemini::generate_text(&state.http_client, &state.config.gemini, &prompt, None)
            .await?;

    state.event_log.record(ApiEvent::new(
        request_id,
        EventKind::AiResponse {
            response: answer.clone(),
            processing_time_ms: Some(started.elapsed().as_secs_f64() * 1000.0),
        },
    ));

    Ok(Json(RagQueryResponse {
        question: question.to_string(),
        answer,
        sources: hits,
    }))
}
