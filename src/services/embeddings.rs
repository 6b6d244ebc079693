// Concrete `EmbeddingProvider` (§4.4): Gemini's `embedContent`/`batchEmbedContents`
// REST API, grounded on the same bare-reqwest-client shape as
// `services/oauth.rs` and `services/llm.rs::GeminiAgentClient`. The vendor
// choice is out of scope per §1; this is the one adapter needed to make the
// trait concrete.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::services::vector_store::{EmbeddingProvider, VectorStoreError};
use crate::models::vector_document::EMBEDDING_DIMENSION;

const GEMINI_EMBED_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const EMBEDDING_MODEL: &str = "text-embedding-004";

#[derive(Debug, Clone)]
pub struct GeminiEmbeddingConfig {
    pub api_key: String,
}

pub struct GeminiEmbeddingProvider {
    config: GeminiEmbeddingConfig,
    http: reqwest::Client,
}

impl GeminiEmbeddingProvider {
    pub fn new(config: GeminiEmbeddingConfig) -> Self {
        Self { config, http: reqwest::Client::new() }
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, VectorStoreError> {
        if self.config.api_key.is_empty() {
            return Err(VectorStoreError::Embedding("embedding provider is not configured".to_string()));
        }

        let url = format!(
            "{GEMINI_EMBED_ENDPOINT}/{EMBEDDING_MODEL}:batchEmbedContents?key={}",
            self.config.api_key
        );
        let requests: Vec<Value> = texts
            .iter()
            .map(|text| {
                json!({
                    "model": format!("models/{EMBEDDING_MODEL}"),
                    "content": { "parts": [{ "text": text }] },
                })
            })
            .collect();

        let response = self
            .http
            .post(&url)
            .json(&json!({ "requests": requests }))
            .send()
            .await
            .map_err(|e| VectorStoreError::Embedding(e.to_string()))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VectorStoreError::Embedding(body));
        }

        let parsed: Value = response.json().await.map_err(|e| VectorStoreError::Embedding(e.to_string()))?;
        let embeddings = parsed
            .get("embeddings")
            .and_then(|e| e.as_array())
            .ok_or_else(|| VectorStoreError::Embedding("malformed batch embedding response".to_string()))?;

        embeddings
            .iter()
            .map(|e| {
                let values = e
                    .get("values")
                    .and_then(|v| v.as_array())
                    .ok_or_else(|| VectorStoreError::Embedding("malformed embedding entry".to_string()))?;
                values
                    .iter()
                    .map(|v| v.as_f64().map(|f| f as f32).ok_or_else(|| {
                        VectorStoreError::Embedding("non-numeric embedding component".to_string())
                    }))
                    .collect::<Result<Vec<f32>, VectorStoreError>>()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_dimension_constant_is_768() {
        assert_eq!(EMBEDDING_DIMENSION, 768);
    }
}
