//! Multi-modal retrieval system
//!
//! Provides three retrieval modes:
//! - Vector search (semantic similarity via embeddings)
//! - BM25 search (lexical matching over persisted snapshots)
//! - Hybrid search (weighted RRF fusion of vector + BM25)

mod bm25;
mod fusion;
mod hybrid;
mod query;
mod vector;

pub use bm25::{Bm25Index, Bm25Params, LexicalIndex};
pub use fusion::{FusionResult, WeightedRrf};
pub use hybrid::{HybridRetriever, RetrieverAvailability};
pub use query::QueryInput;
pub use vector::{
    CollectionStatus, Distance, InMemoryVectorStore, QdrantStore, VectorIndex, VectorPoint,
    VectorStore,
};

use august_common::errors::{AppError, Result};
use august_common::Chunk;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Retrieved chunk with relevance score.
///
/// Scores are method specific: cosine similarity for vector results, BM25
/// score for lexical results, normalized fusion score for hybrid results.
/// Only the ordering is comparable across methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk: Chunk,

    /// Relevance score (higher is better)
    pub score: f32,

    /// Retrieval mode that produced this result
    pub retrieval_mode: RetrievalMode,
}

/// Retrieval mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    /// Vector similarity search
    Vector,
    /// BM25 lexical search
    #[serde(rename = "bm25")]
    BM25,
    /// Combined hybrid search
    Hybrid,
}

impl RetrievalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMode::Vector => "vector",
            RetrievalMode::BM25 => "bm25",
            RetrievalMode::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetrievalMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vector" => Ok(RetrievalMode::Vector),
            "bm25" | "lexical" => Ok(RetrievalMode::BM25),
            "hybrid" => Ok(RetrievalMode::Hybrid),
            other => Err(AppError::Validation {
                message: format!(
                    "Invalid search method: {}. Use 'vector', 'bm25', or 'hybrid'",
                    other
                ),
            }),
        }
    }
}

/// Search request parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Collection to search
    pub collection: String,

    /// Query, either plain text or a message carrying `content`
    pub query: QueryInput,

    /// Retrieval mode
    pub mode: RetrievalMode,

    /// Maximum results to return; the retriever's default when unset
    pub limit: Option<usize>,
}

impl SearchRequest {
    pub fn new(collection: impl Into<String>, query: impl Into<QueryInput>) -> Self {
        Self {
            collection: collection.into(),
            query: query.into(),
            mode: RetrievalMode::Hybrid,
            limit: None,
        }
    }

    pub fn with_mode(mut self, mode: RetrievalMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// The query capability consumed by response generation.
///
/// An empty result means "no grounding context found", never a failure.
#[async_trait::async_trait]
pub trait Retriever: Send + Sync {
    /// Retrieve chunks matching the query
    async fn retrieve(&self, request: &SearchRequest) -> Result<Vec<RetrievedChunk>>;
}
