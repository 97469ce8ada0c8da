//! CRUD endpoints for personal records.

use crate::{
    error::AppError,
    models::persona::{Persona, PersonaInput},
    server::AppState,
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_list_limit")]
    pub limit: i64,
}

fn default_list_limit() -> i64 {
    100
}

/// POST /api/v1/personas/
pub async fn create_persona(
    State(state): State<AppState>,
    Json(input): Json<PersonaInput>,
) -> Result<Json<Persona>, AppError> {
    let persona = sqlx::query_as::<_, Persona>(
        "INSERT INTO personas (primer_nombre, segundo_nombre, apellidos, fecha_nacimiento,
                               genero, correo, celular, nro_documento, tipo_documento)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING *",
    )
    .bind(&input.primer_nombre)
    .bind(&input.segundo_nombre)
    .bind(&input.apellidos)
    .bind(input.fecha_nacimiento)
    .bind(input.genero)
    .bind(&input.correo)
    .bind(&input.celular)
    .bind(&input.nro_documento)
    .bind(input.tipo_documento)
    .fetch_one(&state.db)
    .await
    .map_err(|err| match err {
        // Unique constraint (correo / nro_documento) is a caller error
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Validation(format!("Error creating persona: {db}"))
        }
        other => AppError::Database(other),
    })?;

    tracing::info!(persona_id = persona.id, "Persona created");
    Ok(Json(persona))
}

/// GET /api/v1/personas/
pub async fn list_personas(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Persona>>, AppError> {
    let personas =
        sqlx::query_as::<_, Persona>("SELECT * FROM personas ORDER BY id LIMIT ? OFFSET ?")
            .bind(params.limit)
            .bind(params.skip)
            .fetch_all(&state.db)
            .await?;

    Ok(Json(personas))
}

/// GET /api/v1/personas/{id}
pub async fn get_persona(
    State(state): State<AppState>,
    Path(persona_id): Path<i64>,
) -> Result<Json<Persona>, AppError> {
    let persona = fetch_persona(&state, persona_id).await?;
    Ok(Json(persona))
}

/// PUT /api/v1/personas/{id}
pub async fn update_persona(
    State(state): State<AppState>,
    Path(persona_id): Path<i64>,
    Json(input): Json<PersonaInput>,
) -> Result<Json<Persona>, AppError> {
    // 404 before attempting the update
    fetch_persona(&state, persona_id).await?;

    let persona = sqlx::query_as::<_, Persona>(
        "UPDATE personas
         SET primer_nombre = ?, segundo_nombre = ?, apellidos = ?, fecha_nacimiento = ?,
             genero = ?, correo = ?, celular = ?, nro_documento = ?, tipo_documento = ?
         WHERE id = ?
         RETURNING *",
    )
    .bind(&input.primer_nombre)
    .bind(&input.segundo_nombre)
    .bind(&input.apellidos)
    .bind(input.fecha_nacimiento)
    .bind(input.genero)
    .bind(&input.correo)
    .bind(&input.celular)
    .bind(&input.nro_documento)
    .bind(input.tipo_documento)
    .bind(persona_id)
    .fetch_one(&state.db)
    .await
    .map_err(|err| match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Validation(format!("Error updating persona: {db}"))
        }
        other => AppError::Database(other),
    })?;

    Ok(Json(persona))
}

/// DELETE /api/v1/personas/{id}
pub async fn delete_persona(
    State(state): State<AppState>,
    Path(persona_id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = sqlx::query("DELETE FROM personas WHERE id = ?")
        .bind(persona_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Persona {persona_id}")));
    }

    Ok(Json(json!({"message": "Persona deleted successfully"})))
}

pub(crate) async fn fetch_persona(state: &AppState, persona_id: i64) -> Result<Persona, AppError> {
    sqlx::query_as::<_, Persona>("SELECT * FROM personas WHERE id = ?")
        .bind(persona_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Persona {persona_id}")))
}
