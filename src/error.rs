use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application error types
///
/// Every fallible operation in the service surfaces one of these variants;
/// the `IntoResponse` impl is the single place where they are mapped to
/// transport status codes.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed input: bad filter/time argument, unsafe SQL, invalid upload
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing entity (persona, photo)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Question outside the employee-records domain
    #[error("Domain mismatch: {0}")]
    DomainMismatch(String),

    /// SQL statement failed at the database; rollback already performed
    #[error("Execution error: {0}")]
    Execution(String),

    /// The LLM returned no usable text
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// Upstream service (LLM / vector store) returned an error response
    #[error("Upstream error ({status}): {message}")]
    Upstream { status: StatusCode, message: String },

    /// Transport-level failure reaching an upstream service
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Database pool/driver error outside gateway execution
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::DomainMismatch(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::HttpRequest(_) => StatusCode::BAD_GATEWAY,
            Self::Execution(_)
            | Self::GenerationFailed(_)
            | Self::Upstream { .. }
            | Self::Database(_)
            | Self::Config(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn error_type_name(error: &AppError) -> &'static str {
    match error {
        AppError::Validation(_) => "validation_error",
        AppError::NotFound(_) => "not_found",
        AppError::DomainMismatch(_) => "domain_mismatch",
        AppError::Execution(_) => "execution_error",
        AppError::GenerationFailed(_) => "generation_failed",
        AppError::Upstream { .. } => "upstream_error",
        AppError::HttpRequest(_) => "http_request_error",
        AppError::Database(_) => "database_error",
        AppError::Config(_) => "config_error",
        AppError::Internal(_) => "internal_error",
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            // Preserve the upstream message for diagnostics
            Self::Upstream { message, .. } => message.clone(),
            other => other.to_string(),
        };

        tracing::error!(
            status = status.as_u16(),
            error_type = error_type_name(&self),
            message = %message,
            "Request failed"
        );

        let body = Json(json!({
            "error": {
                "message": message,
                "type": error_type_name(&self),
            }
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
