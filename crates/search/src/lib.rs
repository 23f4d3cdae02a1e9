//! August Search
//!
//! Hybrid retrieval over two indices kept for every collection:
//! - a dense vector index (Qdrant or in-memory) fed by an embedding provider
//! - a BM25 lexical index persisted as per-collection snapshots
//!
//! [`HybridRetriever`] merges both with weighted reciprocal rank fusion and
//! degrades to whichever index is still available.

pub mod retrieval;
pub mod services;

pub use retrieval::{
    HybridRetriever, LexicalIndex, QueryInput, RetrievalMode, RetrievedChunk, Retriever,
    RetrieverAvailability, SearchRequest, VectorIndex,
};
pub use services::{build_retriever, connect};
