//! Client for the external embedding model service.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::EmbeddingError;
use crate::models::Config;
use crate::utils::retry::{RetryPolicy, with_retry};

/// Request body for the /embed endpoint.
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    inputs: &'a [&'a str],
}

/// Response from the /embed endpoint: one vector per input, in order.
#[derive(Debug, Deserialize)]
struct EmbedResponse(Vec<Vec<f32>>);

/// Health response from the /health endpoint.
#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
}

/// Client for the embedding model service.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    client: Client,
    base_url: String,
    model: String,
    batch_size: usize,
    retry: RetryPolicy,
}

impl EmbeddingClient {
    pub fn new(config: &Config) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.embedding.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.embedding.url.trim_end_matches('/').to_string(),
            model: config.embedding.model.clone(),
            batch_size: config.performance.batch_size.max(1),
            retry: config.retry_policy(),
        })
    }

    /// Check if the embedding service is up and the model is loaded.
    pub async fn health(&self) -> Result<HealthResponse, EmbeddingError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| EmbeddingError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Server {
                status: status.as_u16(),
                message: body,
            });
        }

        // A 200 is the health signal; the body is informational and may
        // be empty or non-JSON.
        let text = response.text().await.unwrap_or_default();
        Ok(serde_json::from_str(&text).unwrap_or(HealthResponse {
            status: Some("healthy".to_string()),
            model_id: None,
        }))
    }

    /// Embed a list of document texts, preserving order. Requests are
    /// issued in batches; each batch is retried independently.
    pub async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(self.batch_size) {
            let rows = with_retry(&self.retry, || self.embed_batch(chunk))
                .await
                .into_result()?;

            if rows.len() != chunk.len() {
                return Err(EmbeddingError::InvalidResponse(format!(
                    "expected {} embeddings, got {}",
                    chunk.len(),
                    rows.len()
                )));
            }
            all_embeddings.extend(rows);
        }

        Ok(all_embeddings)
    }

    /// Embed a single search query.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let inputs = [text];
        let rows = with_retry(&self.retry, || self.embed_batch(&inputs))
            .await
            .into_result()?;
        rows.into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("empty embedding response".to_string()))
    }

    /// Embed one batch with a single request.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!("{}/embed", self.base_url);
        let request = EmbedRequest {
            model: &self.model,
            inputs: texts,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbeddingError::Timeout
                } else {
                    EmbeddingError::Request(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Server {
                status: status.as_u16(),
                message: body,
            });
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        Ok(embed_response.0)
    }

    /// Get the base URL of the embedding service.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the configured model name.
    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Seam over the embedding backend, so indexing and search can run
/// against an in-memory embedder in tests.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed document texts, one vector per input, in order.
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single search query.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Name of the model producing the vectors.
    fn model(&self) -> &str;
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        EmbeddingClient::embed_documents(self, texts).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        EmbeddingClient::embed_query(self, text).await
    }

    fn model(&self) -> &str {
        EmbeddingClient::model(self)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = EmbeddingClient::new(&Config::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_base_url_trimming() {
        let mut config = Config::default();
        config.embedding.url = "http://localhost:8080/".to_string();
        let client = EmbeddingClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_embed_request_shape() {
        let request = EmbedRequest {
            model: "all-MiniLM-L6-v2",
            inputs: &["first", "second"],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "all-MiniLM-L6-v2");
        assert_eq!(json["inputs"][1], "second");
    }

    #[test]
    fn test_embed_response_is_bare_array() {
        let parsed: EmbedResponse =
            serde_json::from_str("[[0.1, 0.2], [0.3, 0.4]]").unwrap();
        assert_eq!(parsed.0.len(), 2);
        assert_eq!(parsed.0[1], vec![0.3, 0.4]);
    }
}
