//! Configuration management for August services
//!
//! Supports loading configuration from:
//! - `.env` files (via dotenvy)
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use crate::errors::{AppError, Result};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Vector database configuration
    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    /// Lexical (BM25) index configuration
    #[serde(default)]
    pub lexical: LexicalConfig,

    /// Hybrid retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Ingestion configuration
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Retry policy for embedding and vector-store writes
    #[serde(default)]
    pub retry: RetryConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: gemini, hash
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Batch size for embedding requests
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VectorStoreConfig {
    /// Vector store provider: qdrant, memory
    #[serde(default = "default_vector_provider")]
    pub provider: String,

    /// Qdrant REST URL
    pub url: Option<String>,

    /// Qdrant API key (optional for local deployments)
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_vector_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LexicalConfig {
    /// Directory holding one BM25 snapshot per collection
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,

    /// BM25 term frequency saturation
    #[serde(default = "default_k1")]
    pub k1: f32,

    /// BM25 length normalization
    #[serde(default = "default_b")]
    pub b: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Results returned when the caller does not specify k
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Fusion weight of the vector ranking
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f32,

    /// Fusion weight of the lexical ranking
    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f32,

    /// Reciprocal rank fusion constant
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestionConfig {
    /// Target chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between adjacent chunks in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Points written to the vector store per request
    #[serde(default = "default_upsert_batch_size")]
    pub upsert_batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Delay growth factor between attempts
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error) or a full EnvFilter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Service name attached to log lines
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_embedding_provider() -> String { "gemini".to_string() }
fn default_embedding_model() -> String { crate::DEFAULT_EMBEDDING_MODEL.to_string() }
fn default_embedding_dimension() -> usize { crate::DEFAULT_EMBEDDING_DIMENSION }
fn default_embedding_timeout() -> u64 { 30 }
fn default_batch_size() -> usize { 100 }
fn default_vector_provider() -> String { "qdrant".to_string() }
fn default_vector_timeout() -> u64 { 30 }
fn default_snapshot_dir() -> PathBuf { PathBuf::from("bm25_indices") }
fn default_k1() -> f32 { 1.5 }
fn default_b() -> f32 { 0.75 }
fn default_top_k() -> usize { crate::DEFAULT_TOP_K }
fn default_vector_weight() -> f32 { 0.6 }
fn default_lexical_weight() -> f32 { 0.4 }
fn default_rrf_k() -> f32 { 60.0 }
fn default_chunk_size() -> usize { 2000 }
fn default_chunk_overlap() -> usize { 100 }
fn default_upsert_batch_size() -> usize { 64 }
fn default_max_attempts() -> u32 { 3 }
fn default_initial_delay() -> u64 { 1000 }
fn default_multiplier() -> f64 { 2.0 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_service_name() -> String { "august".to_string() }

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            provider: default_vector_provider(),
            url: None,
            api_key: None,
            timeout_secs: default_vector_timeout(),
        }
    }
}

impl Default for LexicalConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: default_snapshot_dir(),
            k1: default_k1(),
            b: default_b(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            vector_weight: default_vector_weight(),
            lexical_weight: default_lexical_weight(),
            rrf_k: default_rrf_k(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            upsert_batch_size: default_upsert_batch_size(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            multiplier: default_multiplier(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            service_name: default_service_name(),
        }
    }
}

impl RetryConfig {
    /// Delay before the second attempt
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

impl AppConfig {
    /// Load configuration from `.env`, files and environment
    pub fn load() -> std::result::Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__VECTOR_STORE__URL=http://localhost:6333
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific file, still honoring environment overrides
    pub fn from_file(path: &str) -> std::result::Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Check the settings that would otherwise fail at first use.
    ///
    /// Missing credentials or URLs are fatal at startup and never retried.
    pub fn validate(&self) -> Result<()> {
        match self.embedding.provider.as_str() {
            "gemini" if self.embedding.api_key.as_deref().map_or(true, str::is_empty) => {
                return Err(configuration("embedding.api_key is required for the gemini provider"));
            }
            "gemini" | "hash" => {}
            other => {
                return Err(configuration(format!("unknown embedding provider: {other}")));
            }
        }

        if self.embedding.dimension == 0 {
            return Err(configuration("embedding.dimension must be positive"));
        }

        match self.vector_store.provider.as_str() {
            "qdrant" if self.vector_store.url.as_deref().map_or(true, str::is_empty) => {
                return Err(configuration("vector_store.url is required for the qdrant provider"));
            }
            "qdrant" | "memory" => {}
            other => {
                return Err(configuration(format!("unknown vector store provider: {other}")));
            }
        }

        let retrieval = &self.retrieval;
        if retrieval.vector_weight < 0.0 || retrieval.lexical_weight < 0.0 {
            return Err(configuration("fusion weights must not be negative"));
        }
        if retrieval.vector_weight + retrieval.lexical_weight <= 0.0 {
            return Err(configuration("at least one fusion weight must be positive"));
        }
        if retrieval.top_k == 0 {
            return Err(configuration("retrieval.top_k must be positive"));
        }

        if self.ingestion.chunk_size == 0 {
            return Err(configuration("ingestion.chunk_size must be positive"));
        }
        if self.ingestion.chunk_overlap >= self.ingestion.chunk_size {
            return Err(configuration("ingestion.chunk_overlap must be smaller than chunk_size"));
        }

        if self.retry.max_attempts == 0 {
            return Err(configuration("retry.max_attempts must be at least 1"));
        }

        Ok(())
    }
}

fn configuration(message: impl Into<String>) -> AppError {
    AppError::Configuration {
        message: message.into(),
    }
}
