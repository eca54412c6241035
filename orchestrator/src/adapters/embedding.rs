use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::error::AdapterError;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AdapterError>;
}

/// Client for the embedding service (`POST /embed`).
#[derive(Clone)]
pub struct EmbeddingServiceClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl EmbeddingServiceClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Embedder for EmbeddingServiceClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AdapterError> {
        let resp = self
            .client
            .post(format!("{}/embed", self.base_url))
            .json(&json!({ "texts": texts }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AdapterError::Status {
                service: "embedding-service",
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }

        let data: EmbedResponse = resp.json().await?;
        if data.embeddings.len() != texts.len() {
            return Err(AdapterError::Malformed {
                service: "embedding-service",
                detail: format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    data.embeddings.len()
                ),
            });
        }
        Ok(data.embeddings)
    }
}
