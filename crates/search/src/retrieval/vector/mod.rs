//! Vector similarity search
//!
//! [`VectorIndex`] owns the embedding side of retrieval: it embeds chunk
//! texts on write and query texts on read, and delegates storage to a
//! [`VectorStore`] backend (Qdrant over REST, or in-memory).
//!
//! Writes retry transient failures. Query embedding is a single attempt so
//! that an embedding outage reaches the hybrid fallback without delay.

mod memory;
mod qdrant;

pub use memory::InMemoryVectorStore;
pub use qdrant::QdrantStore;

use august_common::embeddings::{retry_with_backoff, Embedder, ResilientEmbedder, RetryPolicy};
use august_common::errors::{AppError, Result};
use august_common::{metrics, Chunk};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Similarity metric of a collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distance {
    #[default]
    Cosine,
    Dot,
    Euclid,
}

impl Distance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Distance::Cosine => "Cosine",
            Distance::Dot => "Dot",
            Distance::Euclid => "Euclid",
        }
    }
}

/// Outcome of an idempotent collection creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionStatus {
    Created,
    AlreadyExists,
}

/// A chunk together with its embedding, as stored by a backend
#[derive(Debug, Clone)]
pub struct VectorPoint {
    /// Deterministic id derived from the chunk identity
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub chunk: Chunk,
}

impl VectorPoint {
    pub fn new(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self {
            id: point_id(&chunk),
            vector,
            chunk,
        }
    }
}

/// Re-ingesting an identical chunk overwrites its previous point
pub fn point_id(chunk: &Chunk) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, chunk.identity().as_bytes())
}

/// Storage backend for vectors
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Backend name for logs and errors
    fn backend(&self) -> &str;

    async fn collection_exists(&self, name: &str) -> Result<bool>;

    /// Create the collection unless it already exists
    async fn create_collection(
        &self,
        name: &str,
        vector_size: usize,
        distance: Distance,
    ) -> Result<CollectionStatus>;

    /// Drop the collection and all of its points; `false` if it was absent
    async fn delete_collection(&self, name: &str) -> Result<bool>;

    async fn upsert(&self, name: &str, points: &[VectorPoint]) -> Result<()>;

    /// Top-k points by similarity, best first.
    ///
    /// Fails with [`AppError::CollectionNotFound`] if the collection is absent.
    async fn search(&self, name: &str, vector: &[f32], k: usize) -> Result<Vec<(Chunk, f32)>>;
}

/// Vector index over one backend and one embedding provider
pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    /// Query-time embedder, called once per search
    embedder: Arc<dyn Embedder>,
    /// Ingestion-time embedder with retry
    resilient: ResilientEmbedder,
    policy: RetryPolicy,
    batch_size: usize,
}

impl VectorIndex {
    /// Create a vector index. Ingestion embeds through the retry policy.
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        policy: RetryPolicy,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            resilient: ResilientEmbedder::new(embedder.clone(), policy.clone()),
            embedder,
            policy,
            batch_size: batch_size.max(1),
        }
    }

    /// Probe the embedding provider, retrying transient failures
    pub async fn initialize(&self) -> Result<()> {
        self.resilient.initialize().await
    }

    /// Dimension produced by the embedding provider
    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    pub fn backend(&self) -> &str {
        self.store.backend()
    }

    pub async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.store.collection_exists(name).await
    }

    /// Create a cosine collection; succeeds without change if it exists
    pub async fn create_collection(&self, name: &str, vector_size: usize) -> Result<CollectionStatus> {
        self.create_collection_with(name, vector_size, Distance::Cosine).await
    }

    pub async fn create_collection_with(
        &self,
        name: &str,
        vector_size: usize,
        distance: Distance,
    ) -> Result<CollectionStatus> {
        if vector_size == 0 {
            return Err(AppError::Validation {
                message: "vector size must be positive".to_string(),
            });
        }

        let status = self.store.create_collection(name, vector_size, distance).await?;
        match status {
            CollectionStatus::Created => {
                info!(collection = name, vector_size, distance = distance.as_str(), "New collection created")
            }
            CollectionStatus::AlreadyExists => info!(collection = name, "Collection already exists"),
        }
        Ok(status)
    }

    pub async fn delete_collection(&self, name: &str) -> Result<bool> {
        self.store.delete_collection(name).await
    }

    /// Embed and store chunks, batch by batch.
    ///
    /// Embedding and each backend write retry transient failures under the
    /// policy. A failure part-way leaves earlier batches written.
    #[instrument(skip(self, chunks), fields(collection = name, chunk_count = chunks.len()))]
    pub async fn upsert(&self, name: &str, chunks: &[Chunk]) -> Result<usize> {
        let mut written = 0;

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.resilient.embed_batch(&texts).await?;

            if vectors.len() != batch.len() {
                return Err(AppError::EmbeddingError {
                    message: format!("Expected {} embeddings, received {}", batch.len(), vectors.len()),
                });
            }

            let points: Vec<VectorPoint> = batch
                .iter()
                .cloned()
                .zip(vectors)
                .map(|(chunk, vector)| VectorPoint::new(chunk, vector))
                .collect();

            retry_with_backoff(&self.policy, "vector_upsert", || self.store.upsert(name, &points)).await?;

            written += points.len();
            debug!(written, total = chunks.len(), "Upserted batch");
        }

        info!(written, backend = self.store.backend(), "Chunks stored in vector index");
        Ok(written)
    }

    /// Top-k chunks by similarity to the query text.
    ///
    /// Returns an empty list, not an error, when the collection is absent.
    pub async fn search(&self, name: &str, query: &str, k: usize) -> Result<Vec<(Chunk, f32)>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let embedding = self.embedder.embed(query).await;
        metrics::record_embedding(
            start.elapsed().as_secs_f64(),
            self.embedder.model_name(),
            1,
            embedding.is_ok(),
        );
        let embedding = embedding?;

        match self.store.search(name, &embedding, k).await {
            Ok(results) => {
                debug!(collection = name, count = results.len(), "Vector search complete");
                Ok(results)
            }
            Err(e) if e.is_not_found() => {
                warn!(collection = name, "Collection does not exist");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}
