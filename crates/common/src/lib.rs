//! August Common Library
//!
//! Shared code for the August retrieval crates including:
//! - Document and chunk data model
//! - Embedding client abstraction with retry
//! - Error types and handling
//! - Configuration management
//! - Metrics and tracing setup

pub mod config;
pub mod embeddings;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod telemetry;

// Re-export commonly used types
pub use config::AppConfig;
pub use embeddings::{Embedder, ResilientEmbedder, RetryPolicy};
pub use errors::{AppError, Result};
pub use models::{Chunk, Document, DocumentMetadata};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "models/embedding-001";

/// Default embedding dimension
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;

/// Default number of results per query
pub const DEFAULT_TOP_K: usize = 5;
