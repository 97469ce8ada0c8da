//! Thin REST client for the Qdrant vector store.
//!
//! Persona records are embedded with the Gemini embedding model and upserted
//! as points; similarity search returns payloads with scores. The vector
//! store is an optional feature: callers decide whether a failure is fatal.

use crate::{
    config::{GeminiConfig, VectorConfig},
    error::AppError,
    models::persona::Persona,
    providers,
};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// One similarity search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: Value,
    pub score: f32,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: Vec<SearchHit>,
}

#[derive(Clone)]
pub struct VectorStore {
    client: reqwest::Client,
    config: VectorConfig,
}

impl VectorStore {
    pub fn new(client: reqwest::Client, config: VectorConfig) -> Self {
        Self { client, config }
    }

    pub fn collection(&self) -> &str {
        &self.config.collection
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_seconds)
    }

    /// Create the collection if it does not exist yet. Cosine distance over
    /// vectors of the configured size.
    pub async fn ensure_collection(&self) -> Result<(), AppError> {
        let url = format!(
            "{}/collections/{}",
            self.config.base_url, self.config.collection
        );

        let exists = self
            .client
            .get(&url)
            .timeout(self.timeout())
            .send()
            .await?
            .status()
            .is_success();
        if exists {
            return Ok(());
        }

        let response = self
            .client
            .put(&url)
            .timeout(self.timeout())
            .json(&json!({
                "vectors": {
                    "size": self.config.vector_size,
                    "distance": "Cosine",
                }
            }))
            .send()
            .await?;
        check_status(response).await?;

        tracing::info!(collection = %self.config.collection, "Vector collection created");
        Ok(())
    }

    /// Embed and upsert the given personas. The persona id doubles as the
    /// point id, so re-upserting an updated record overwrites its point.
    pub async fn upsert_personas(
        &self,
        gemini: &GeminiConfig,
        personas: &[Persona],
    ) -> Result<usize, AppError> {
        if personas.is_empty() {
            return Ok(0);
        }

        let mut points = Vec::with_capacity(personas.len());
        for persona in personas {
            let vector = providers::gemini::embed_content(
                &self.client,
                gemini,
                &persona.embedding_text(),
            )
            .await?;

            points.push(json!({
                "id": persona.id,
                "vector": vector,
                "payload": persona,
            }));
        }

        let url = format!(
            "{}/collections/{}/points?wait=true",
            self.config.base_url, self.config.collection
        );
        let response = self
            .client
            .put(&url)
            .timeout(self.timeout())
            .json(&json!({"points": points}))
            .send()
            .await?;
        check_status(response).await?;

        Ok(points.len())
    }

    /// Top-`limit` nearest points to `vector`, payloads included.
    pub async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<SearchHit>, AppError> {
        let url = format!(
            "{}/collections/{}/points/search",
            self.config.base_url, self.config.collection
        );
        let response = self
            .client
            .post(&url)
            .timeout(self.timeout())
            .json(&json!({
                "vector": vector,
                "limit": limit,
                "with_payload": true,
            }))
            .send()
            .await?;
        let response = check_status(response).await?;

        let parsed: SearchResponse = response.json().await?;
        Ok(parsed.result)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "unreadable error body".to_string());
    Err(AppError::Upstream {
        status: StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
        message: format!("Vector store error: {message}"),
    })
}
