//! Thin client for the Gemini Generate Content / Embed Content APIs.

use crate::{
    config::GeminiConfig,
    error::AppError,
    models::gemini::{
        Content, EmbedContentRequest, EmbedContentResponse, GenerateContentRequest,
        GenerateContentResponse, Part,
    },
};
use axum::http::StatusCode;
use reqwest::Client;
use std::time::Duration;

/// Call Gemini Generate Content API
/// Note: Model name is part of the URL path
pub async fn generate_content(
    client: &Client,
    config: &GeminiConfig,
    request: GenerateContentRequest,
) -> Result<GenerateContentResponse, AppError> {
    // Gemini API format: /v1beta/models/{model}:generateContent
    let url = format!("{}/models/{}:generateContent", config.base_url, config.model);

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .timeout(Duration::from_secs(config.timeout_seconds))
        .query(&[("key", &config.api_key)])
        .json(&request)
        .send()
        .await?;

    check_status(response).await?.json().await.map_err(Into::into)
}

/// Convenience wrapper: send a single-turn prompt, return the first
/// candidate's text or `GenerationFailed` when the model produced none.
pub async fn generate_text(
    client: &Client,
    config: &GeminiConfig,
    prompt: &str,
    system: Option<&str>,
) -> Result<String, AppError> {
    let request = GenerateContentRequest::from_prompt(prompt, system);
    let response = generate_content(client, config, request).await?;

    response
        .first_text()
        .ok_or_else(|| AppError::GenerationFailed("Model returned no text".to_string()))
}

/// Call Gemini Embed Content API, returning the embedding vector.
pub async fn embed_content(
    client: &Client,
    config: &GeminiConfig,
    text: &str,
) -> Result<Vec<f32>, AppError> {
    let url = format!(
        "{}/models/{}:embedContent",
        config.base_url, config.embedding_model
    );

    let request = EmbedContentRequest {
        model: format!("models/{}", config.embedding_model),
        content: Content {
            role: "user".to_string(),
            parts: vec![Part {
                text: text.to_string(),
            }],
        },
    };

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .timeout(Duration::from_secs(config.timeout_seconds))
        .query(&[("key", &config.api_key)])
        .json(&request)
        .send()
        .await?;

    let body: EmbedContentResponse = check_status(response).await?.json().await?;
    Ok(body.embedding.values)
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AppError> {
    if !response.status().is_success() {
        let status =
            StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(AppError::Upstream {
            status,
            message: error_text,
        });
    }
    Ok(response)
}
