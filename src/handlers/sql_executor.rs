//! Direct SQL execution endpoint. Every statement passes through the safety
//! filter before it reaches the database.

use crate::{error::AppError, gateway, server::AppState, sqlguard};
use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct ExecuteSqlRequest {
    pub query: String,
}

/// POST /api/v1/execute-sql — returns the bare sequence of row mappings.
pub async fn execute_sql(
    State(state): State<AppState>,
    Json(payload): Json<ExecuteSqlRequest>,
) -> Result<Json<Vec<Map<String, Value>>>, AppError> {
    if !sqlguard::is_safe_query(&payload.query) {
        tracing::warn!(query = %payload.query, "Rejected unsafe SQL query");
        return Err(AppError::Validation(
            "Query not allowed. Only read-only SELECT statements are permitted.".to_string(),
        ));
    }

    let results = gateway::execute_query(&state.db, &payload.query).await?;
    Ok(Json(results))
}
