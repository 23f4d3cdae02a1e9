//! Gemini embedding client
//!
//! Talks to the Generative Language REST API. Queries are embedded with the
//! `RETRIEVAL_QUERY` task type, documents with `RETRIEVAL_DOCUMENT`.

use super::Embedder;
use crate::config::EmbeddingConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// The API accepts at most 100 requests per batch call
const MAX_BATCH_SIZE: usize = 100;

/// Gemini embedding client
pub struct GeminiEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dimension: usize,
    base_url: String,
    batch_size: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'static str,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

impl<'a> EmbedContentRequest<'a> {
    fn new(model: &'a str, text: &'a str, task_type: &'static str) -> Self {
        Self {
            model,
            content: Content {
                parts: [Part { text }],
            },
            task_type,
        }
    }
}

impl GeminiEmbedder {
    /// Create a new Gemini embedder
    pub fn new(api_key: String, config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let model = if config.model.starts_with("models/") {
            config.model.clone()
        } else {
            format!("models/{}", config.model)
        };

        Ok(Self {
            client,
            api_key,
            model,
            dimension: config.dimension,
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            batch_size: config.batch_size.clamp(1, MAX_BATCH_SIZE),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}:{}", self.base_url, self.model, method)
    }

    async fn post<B: Serialize, R: DeserializeOwned>(&self, method: &str, body: &B) -> Result<R> {
        let response = self
            .client
            .post(self.endpoint(method))
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::EmbeddingError {
                message: format!("Request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        response.json::<R>().await.map_err(|e| AppError::EmbeddingError {
            message: format!("Failed to parse response: {}", e),
        })
    }
}

/// Map an HTTP failure onto the error taxonomy.
///
/// Credential problems are configuration errors and are never retried.
fn status_error(status: StatusCode, body: String) -> AppError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Configuration {
            message: format!("Embedding API rejected credentials ({}): {}", status, body),
        },
        StatusCode::BAD_REQUEST => AppError::Validation {
            message: format!("Embedding API rejected request: {}", body),
        },
        _ => AppError::EmbeddingError {
            message: format!("API error {}: {}", status, body),
        },
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbedContentRequest::new(&self.model, text, "RETRIEVAL_QUERY");
        let response: EmbedContentResponse = self.post("embedContent", &request).await?;
        Ok(response.embedding.values)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let request = BatchEmbedRequest {
                requests: batch
                    .iter()
                    .map(|t| EmbedContentRequest::new(&self.model, t, "RETRIEVAL_DOCUMENT"))
                    .collect(),
            };
            let response: BatchEmbedResponse = self.post("batchEmbedContents", &request).await?;

            if response.embeddings.len() != batch.len() {
                return Err(AppError::EmbeddingError {
                    message: format!(
                        "Expected {} embeddings, received {}",
                        batch.len(),
                        response.embeddings.len()
                    ),
                });
            }
            all_embeddings.extend(response.embeddings.into_iter().map(|e| e.values));
        }

        Ok(all_embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EmbeddingConfig {
        EmbeddingConfig {
            api_base: Some("http://localhost:9999/v1beta/".into()),
            model: "embedding-001".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_endpoint_format() {
        let embedder = GeminiEmbedder::new("key".into(), &config()).unwrap();
        assert_eq!(
            embedder.endpoint("embedContent"),
            "http://localhost:9999/v1beta/models/embedding-001:embedContent"
        );
        assert_eq!(embedder.dimension(), 768);
    }

    #[test]
    fn test_request_shape() {
        let request = EmbedContentRequest::new("models/embedding-001", "kefir", "RETRIEVAL_QUERY");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["taskType"], "RETRIEVAL_QUERY");
        assert_eq!(json["content"]["parts"][0]["text"], "kefir");
    }

    #[test]
    fn test_status_classification() {
        assert!(!status_error(StatusCode::UNAUTHORIZED, String::new()).is_transient());
        assert!(!status_error(StatusCode::BAD_REQUEST, String::new()).is_transient());
        assert!(status_error(StatusCode::TOO_MANY_REQUESTS, String::new()).is_transient());
        assert!(status_error(StatusCode::SERVICE_UNAVAILABLE, String::new()).is_transient());
    }
}
