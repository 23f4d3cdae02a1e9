//! Error types for August services
//!
//! Provides a single error taxonomy shared by ingestion and retrieval:
//! - Distinct error types for different failure modes
//! - Transient vs. permanent classification for the retry wrapper
//! - Error codes for machine-readable identification

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    ParseError,

    // Resource errors (4xxx)
    NotFound,
    CollectionNotFound,

    // Index state errors (5xxx)
    InconsistentIndexState,

    // Backend errors (8xxx)
    UpstreamError,
    EmbeddingError,
    VectorStoreError,
    RetrievalFailed,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::ParseError => 1002,

            ErrorCode::NotFound => 4001,
            ErrorCode::CollectionNotFound => 4002,

            ErrorCode::InconsistentIndexState => 5001,

            ErrorCode::UpstreamError => 8001,
            ErrorCode::EmbeddingError => 8002,
            ErrorCode::VectorStoreError => 8003,
            ErrorCode::RetrievalFailed => 8004,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Parse error: {message}")]
    Parse { message: String },

    // Resource errors
    #[error("Resource not found: {resource_type} {id}")]
    NotFound { resource_type: String, id: String },

    #[error("Collection not found: {name}")]
    CollectionNotFound { name: String },

    // Index state errors
    #[error("Indices for collection {collection} are inconsistent: {message}")]
    InconsistentIndexState { collection: String, message: String },

    // Backend errors
    #[error("Embedding service error: {message}")]
    EmbeddingError { message: String },

    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError { backend: String, message: String },

    #[error("Retrieval failed for collection {collection}: {message}")]
    RetrievalFailed { collection: String, message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a missing file or collection
    pub fn not_found(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        AppError::NotFound {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::Parse { .. } => ErrorCode::ParseError,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::CollectionNotFound { .. } => ErrorCode::CollectionNotFound,
            AppError::InconsistentIndexState { .. } => ErrorCode::InconsistentIndexState,
            AppError::EmbeddingError { .. } => ErrorCode::EmbeddingError,
            AppError::VectorStoreError { .. } => ErrorCode::VectorStoreError,
            AppError::RetrievalFailed { .. } => ErrorCode::RetrievalFailed,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Io(_) => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Whether a retry could plausibly succeed.
    ///
    /// Only network/service hiccups on the embedding or vector backends are
    /// transient. Configuration, parse and missing-resource errors never are.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::EmbeddingError { .. }
                | AppError::VectorStoreError { .. }
                | AppError::HttpClient(_)
        )
    }

    /// Whether the error means "nothing there" rather than "something broke"
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::NotFound { .. } | AppError::CollectionNotFound { .. }
        )
    }
}
