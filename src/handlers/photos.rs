//! Photo upload and retrieval, one directory per persona on the local
//! filesystem. Files are renamed to a UUID on upload; the original name is
//! only echoed back in the upload response.

use crate::{error::AppError, handlers::personas::fetch_persona, server::AppState};
use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::path::{Path as FsPath, PathBuf};
use uuid::Uuid;

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// POST /api/v1/photos/upload/{person_id}
pub async fn upload_photo(
    State(state): State<AppState>,
    Path(person_id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    fetch_persona(&state, person_id).await?;

    let field = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
        .ok_or_else(|| AppError::Validation("Missing file field".to_string()))?;

    let original_filename = field
        .file_name()
        .map(str::to_string)
        .ok_or_else(|| AppError::Validation("Uploaded file has no filename".to_string()))?;
    let content_type = field.content_type().map(str::to_string);

    let extension = file_extension(&original_filename).ok_or_else(|| {
        AppError::Validation(format!(
            "File format not allowed. Use one of: {}",
            ALLOWED_EXTENSIONS.join(", ")
        ))
    })?;
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(AppError::Validation(format!(
            "File format not allowed. Use one of: {}",
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }

    let content = field
        .bytes()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;
    if content.len() > state.config.storage.max_photo_bytes {
        return Err(AppError::Validation(format!(
            "File too large (maximum {} bytes)",
            state.config.storage.max_photo_bytes
        )));
    }

    let filename = format!("{}.{extension}", Uuid::new_v4());
    let person_dir = person_directory(&state, person_id);
    tokio::fs::create_dir_all(&person_dir)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create photo directory: {e}")))?;

    let file_path = person_dir.join(&filename);
    tokio::fs::write(&file_path, &content)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to store photo: {e}")))?;

    tracing::info!(person_id, filename = %filename, size = content.len(), "Photo stored");

    Ok(Json(json!({
        "person_id": person_id,
        "filename": filename,
        "original_filename": original_filename,
        "size": content.len(),
        "content_type": content_type,
        "url": format!("/api/v1/photos/person/{person_id}/{filename}"),
    })))
}

/// GET /api/v1/photos/person/{person_id}
pub async fn list_person_photos(
    State(state): State<AppState>,
    Path(person_id): Path<i64>,
) -> Result<Json<Vec<serde_json::Value>>, AppError> {
    fetch_persona(&state, person_id).await?;

    let person_dir = person_directory(&state, person_id);
    let mut photos = Vec::new();

    let mut entries = match tokio::fs::read_dir(&person_dir).await {
        Ok(entries) => entries,
        // No directory yet means no photos
        Err(_) => return Ok(Json(photos)),
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
            let filename = entry.file_name().to_string_lossy().into_owned();
            photos.push(json!({
                "filename": filename,
                "url": format!("/api/v1/photos/person/{person_id}/{filename}"),
            }));
        }
    }

    Ok(Json(photos))
}

/// GET /api/v1/photos/person/{person_id}/{filename}
pub async fn get_person_photo(
    State(state): State<AppState>,
    Path((person_id, filename)): Path<(i64, String)>,
) -> Result<impl IntoResponse, AppError> {
    fetch_persona(&state, person_id).await?;

    let file_path = person_directory(&state, person_id).join(sanitize_filename(&filename)?);
    serve_photo(&file_path, &filename).await
}

/// DELETE /api/v1/photos/person/{person_id}/{filename}
pub async fn delete_person_photo(
    State(state): State<AppState>,
    Path((person_id, filename)): Path<(i64, String)>,
) -> Result<Json<serde_json::Value>, AppError> {
    fetch_persona(&state, person_id).await?;

    let file_path = person_directory(&state, person_id).join(sanitize_filename(&filename)?);
    if !file_path.is_file() {
        return Err(AppError::NotFound(format!(
            "Photo {filename} for persona {person_id}"
        )));
    }

    tokio::fs::remove_file(&file_path)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to delete photo: {e}")))?;

    Ok(Json(json!({
        "message": format!("Photo {filename} deleted for persona {person_id}")
    })))
}

/// GET /api/v1/photos/{filename} — legacy lookup across all persona
/// directories, kept for older clients.
pub async fn get_photo_legacy(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let file_path = find_photo(&state, &filename).await?;
    serve_photo(&file_path, &filename).await
}

/// DELETE /api/v1/photos/{filename} — legacy delete across all persona
/// directories.
pub async fn delete_photo_legacy(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let file_path = find_photo(&state, &filename).await?;

    tokio::fs::remove_file(&file_path)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to delete photo: {e}")))?;

    Ok(Json(json!({"message": format!("Photo {filename} deleted")})))
}

async fn serve_photo(
    file_path: &FsPath,
    filename: &str,
) -> Result<impl IntoResponse, AppError> {
    let bytes = tokio::fs::read(file_path)
        .await
        .map_err(|_| AppError::NotFound(format!("Photo {filename}")))?;

    let content_type = mime_guess::from_path(filename)
        .first_or_octet_stream()
        .to_string();

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type)],
        bytes,
    ))
}

async fn find_photo(state: &AppState, filename: &str) -> Result<PathBuf, AppError> {
    let safe_name = sanitize_filename(filename)?;
    let base = PathBuf::from(&state.config.storage.photo_dir);

    let mut dirs = tokio::fs::read_dir(&base)
        .await
        .map_err(|_| AppError::NotFound(format!("Photo {filename}")))?;

    while let Ok(Some(entry)) = dirs.next_entry().await {
        let candidate = entry.path().join(safe_name);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    Err(AppError::NotFound(format!("Photo {filename}")))
}

fn person_directory(state: &AppState, person_id: i64) -> PathBuf {
    PathBuf::from(&state.config.storage.photo_dir).join(person_id.to_string())
}

/// Reject path separators and parent references so a filename cannot escape
/// the photo directory.
fn sanitize_filename(filename: &str) -> Result<&str, AppError> {
    if filename.is_empty()
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
    {
        return Err(AppError::Validation(format!("Invalid filename: {filename}")));
    }
    Ok(filename)
}

fn file_extension(filename: &str) -> Option<String> {
    FsPath::new(filename)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}
