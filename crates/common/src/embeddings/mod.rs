//! Embedding service abstraction
//!
//! Provides a unified interface for embedding providers:
//! - Gemini (models/embedding-001, 768 dimensions) over REST
//! - Hash (deterministic, offline; for tests and local development)
//!
//! [`ResilientEmbedder`] adds bounded exponential backoff for the
//! startup check and ingestion-time embedding.

mod gemini;
mod hash;
mod retry;

pub use gemini::GeminiEmbedder;
pub use hash::HashEmbedder;
pub use retry::{retry_with_backoff, ResilientEmbedder, RetryPolicy};

use crate::config::EmbeddingConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single query text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple document texts (batch)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "gemini" => {
            let key = config
                .api_key
                .clone()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| AppError::Configuration {
                    message: "Gemini API key required".to_string(),
                })?;
            Ok(Arc::new(GeminiEmbedder::new(key, config)?))
        }
        "hash" => Ok(Arc::new(HashEmbedder::new(config.dimension))),
        other => Err(AppError::Configuration {
            message: format!("Unknown embedding provider: {}", other),
        }),
    }
}
