//! Remote embedding service client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::errors::{SibylError, SibylResult};
use crate::domain::models::EmbeddingConfig;
use crate::domain::ports::Embedder;

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embedder backed by an HTTP embedding endpoint.
///
/// The response must contain one vector per input, in input order, each of
/// the configured dimension. A transient failure is retried once before the
/// batch is reported as failed.
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model_id: String,
    dimension: usize,
    max_input_tokens: usize,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig, endpoint: String) -> SibylResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SibylError::Configuration(format!("embedding client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            model_id: config.model_id.clone(),
            dimension: config.dimension,
            max_input_tokens: config.max_input_tokens,
        })
    }

    async fn request(&self, texts: &[String]) -> SibylResult<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&EmbedRequest {
                model: &self.model_id,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| SibylError::Embedding {
                reason: format!("request failed: {e}"),
                retryable: true,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SibylError::Embedding {
                reason: format!("endpoint returned {status}"),
                retryable: status.is_server_error() || status.as_u16() == 429,
            });
        }

        let body: EmbedResponse = response.json().await.map_err(|e| SibylError::Embedding {
            reason: format!("invalid response body: {e}"),
            retryable: false,
        })?;

        if body.embeddings.len() != texts.len() {
            return Err(SibylError::Embedding {
                reason: format!(
                    "expected {} vectors, got {}",
                    texts.len(),
                    body.embeddings.len()
                ),
                retryable: false,
            });
        }

        for vector in &body.embeddings {
            if vector.len() != self.dimension {
                return Err(SibylError::Embedding {
                    reason: format!(
                        "expected dimension {}, got {}",
                        self.dimension,
                        vector.len()
                    ),
                    retryable: false,
                });
            }
        }

        Ok(body.embeddings)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> SibylResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Err(SibylError::Embedding {
                reason: "cannot embed an empty batch".to_string(),
                retryable: false,
            });
        }

        for text in texts {
            if text.trim().is_empty() {
                return Err(SibylError::Embedding {
                    reason: "cannot embed empty text".to_string(),
                    retryable: false,
                });
            }
        }

        debug!(batch_size = texts.len(), "embedding batch via {}", self.endpoint);

        match self.request(texts).await {
            Ok(vectors) => Ok(vectors),
            Err(err) if err.is_retryable() => {
                warn!(error = %err, "embedding request failed, retrying once");
                tokio::time::sleep(Duration::from_millis(250)).await;
                self.request(texts).await
            }
            Err(err) => Err(err),
        }
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn max_input_tokens(&self) -> usize {
        self.max_input_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder_for(endpoint: String) -> HttpEmbedder {
        HttpEmbedder::new(&EmbeddingConfig::default(), endpoint).unwrap()
    }

    #[tokio::test]
    async fn test_successful_batch() {
        let mut server = mockito::Server::new_async().await;
        let vector: Vec<f32> = vec![0.0; 384];
        let body = serde_json::json!({ "embeddings": [vector] });
        let mock = server
            .mock("POST", "/embed")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let embedder = embedder_for(format!("{}/embed", server.url()));
        let vectors = embedder
            .embed_batch(&["hello".to_string()])
            .await
            .unwrap();

        assert_eq!(vectors.len(), 1);
        assert_eq!(vectors[0].len(), 384);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({ "embeddings": [[0.5, 0.5]] });
        server
            .mock("POST", "/embed")
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let embedder = embedder_for(format!("{}/embed", server.url()));
        let result = embedder.embed_batch(&["hello".to_string()]).await;

        assert!(matches!(
            result,
            Err(SibylError::Embedding { retryable: false, .. })
        ));
    }

    #[tokio::test]
    async fn test_server_error_retried_then_succeeds() {
        let mut server = mockito::Server::new_async().await;
        let failing = server
            .mock("POST", "/embed")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;
        let vector: Vec<f32> = vec![0.0; 384];
        let succeeding = server
            .mock("POST", "/embed")
            .with_status(200)
            .with_body(serde_json::json!({ "embeddings": [vector] }).to_string())
            .expect(1)
            .create_async()
            .await;

        let embedder = embedder_for(format!("{}/embed", server.url()));
        let vectors = embedder.embed_batch(&["hello".to_string()]).await.unwrap();

        assert_eq!(vectors.len(), 1);
        failing.assert_async().await;
        succeeding.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_text_rejected_before_request() {
        let embedder = embedder_for("http://localhost:1/embed".to_string());
        let result = embedder.embed_batch(&[String::new()]).await;
        assert!(matches!(
            result,
            Err(SibylError::Embedding { retryable: false, .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_batch_rejected_before_request() {
        let embedder = embedder_for("http://localhost:1/embed".to_string());
        let result = embedder.embed_batch(&[]).await;
        assert!(matches!(
            result,
            Err(SibylError::Embedding { retryable: false, .. })
        ));
    }
}
