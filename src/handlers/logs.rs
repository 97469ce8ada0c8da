//! Read and maintenance endpoints for the in-memory API event log.

use crate::{
    error::AppError,
    events::{ApiEvent, LogQuery, LogStats},
    server::AppState,
};
use axum::{
    extract::{Query, State},
    Json,
};
use serde_json::json;

/// GET /api/v1/logs
pub async fn get_logs(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<ApiEvent>>, AppError> {
    let events = state.event_log.query(&query)?;
    Ok(Json(events))
}

/// GET /api/v1/logs/stats
pub async fn get_log_stats(State(state): State<AppState>) -> Json<LogStats> {
    Json(state.event_log.stats())
}

/// DELETE /api/v1/logs/clear
pub async fn clear_logs(State(state): State<AppState>) -> Json<serde_json::Value> {
    let cleared = state.event_log.clear();
    tracing::info!(cleared, "API event log cleared");
    Json(json!({"message": format!("Cleared {cleared} logs from memory")}))
}
