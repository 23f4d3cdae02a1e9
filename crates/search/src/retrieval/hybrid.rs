//! Hybrid retrieval combining vector and BM25 search
//!
//! Both indices are queried concurrently and merged with weighted RRF. The
//! retriever owns the degradation policy: a vector outage never causes a
//! total failure while a lexical snapshot exists.
//!
//! ```text
//! both available   -> fused (on runtime error: lexical only)
//! lexical only     -> lexical only
//! vector only      -> vector only
//! neither          -> empty
//! ```

use super::{
    bm25::{Bm25Index, LexicalIndex},
    fusion::WeightedRrf,
    query::QueryInput,
    vector::VectorIndex,
    RetrievalMode, RetrievedChunk, Retriever, SearchRequest,
};
use august_common::errors::{AppError, Result};
use august_common::metrics;
use august_common::{Chunk, DEFAULT_TOP_K};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// Which indices can serve a collection
#[derive(Debug, Clone, Default)]
pub struct RetrieverAvailability {
    /// The vector collection exists
    pub vector: bool,
    /// Loaded lexical handle, if a snapshot exists
    pub lexical: Option<Arc<Bm25Index>>,
}

impl RetrieverAvailability {
    pub fn is_available(&self) -> bool {
        self.vector || self.lexical.is_some()
    }
}

/// Hybrid retriever combining vector and BM25
pub struct HybridRetriever {
    vector: Arc<VectorIndex>,
    lexical: Arc<LexicalIndex>,
    fusion: WeightedRrf,
    /// Result count for requests that do not set a limit
    default_k: usize,
    /// Collections confirmed to exist in the vector store
    vector_ready: RwLock<HashSet<String>>,
}

fn ranked(results: Vec<(Chunk, f32)>, mode: RetrievalMode) -> Vec<RetrievedChunk> {
    results
        .into_iter()
        .map(|(chunk, score)| RetrievedChunk {
            chunk,
            score,
            retrieval_mode: mode,
        })
        .collect()
}

impl HybridRetriever {
    /// Create a new hybrid retriever
    pub fn new(vector: Arc<VectorIndex>, lexical: Arc<LexicalIndex>, fusion: WeightedRrf) -> Self {
        Self {
            vector,
            lexical,
            fusion,
            default_k: DEFAULT_TOP_K,
            vector_ready: RwLock::new(HashSet::new()),
        }
    }

    pub fn with_default_k(mut self, k: usize) -> Self {
        self.default_k = k.max(1);
        self
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }

    pub fn vector_index(&self) -> &Arc<VectorIndex> {
        &self.vector
    }

    pub fn lexical_index(&self) -> &Arc<LexicalIndex> {
        &self.lexical
    }

    pub fn fusion(&self) -> &WeightedRrf {
        &self.fusion
    }

    async fn vector_available(&self, collection: &str) -> bool {
        if self.vector_ready.read().await.contains(collection) {
            return true;
        }

        match self.vector.collection_exists(collection).await {
            Ok(true) => {
                self.vector_ready.write().await.insert(collection.to_string());
                true
            }
            Ok(false) => {
                debug!(collection, "Vector collection does not exist");
                false
            }
            Err(e) => {
                warn!(collection, error = %e, "Vector index unreachable");
                false
            }
        }
    }

    /// Prepare both indices for a collection.
    ///
    /// When no lexical snapshot exists and `chunks` is non-empty, a snapshot
    /// is built from them and persisted.
    #[instrument(skip(self, chunks), fields(supplied = chunks.map(|c| c.len())))]
    pub async fn setup(&self, collection: &str, chunks: Option<&[Chunk]>) -> Result<RetrieverAvailability> {
        let vector = self.vector_available(collection).await;

        let lexical = match self.lexical.load(collection).await? {
            Some(handle) => Some(handle),
            None => match chunks {
                Some(chunks) if !chunks.is_empty() => {
                    let index = self.lexical.build(chunks);
                    self.lexical.persist(collection, &index).await?;
                    Some(self.lexical.install(collection, index).await)
                }
                _ => None,
            },
        };

        info!(
            collection,
            vector,
            lexical = lexical.is_some(),
            "Retriever initialized"
        );
        Ok(RetrieverAvailability { vector, lexical })
    }

    /// Drop cached handles and initialize again from the backends
    pub async fn reinitialize(&self, collection: &str) -> Result<RetrieverAvailability> {
        self.vector_ready.write().await.remove(collection);
        self.lexical.invalidate(collection).await;
        self.setup(collection, None).await
    }

    /// Delete a collection from both indices
    pub async fn delete_collection(&self, collection: &str) -> Result<()> {
        self.vector_ready.write().await.remove(collection);
        let vector = self.vector.delete_collection(collection).await?;
        let lexical = self.lexical.remove(collection).await?;
        info!(collection, vector, lexical, "Collection deleted");
        Ok(())
    }

    /// Ranked chunks for the query, best first
    pub async fn hybrid_search(
        &self,
        query: impl Into<QueryInput>,
        collection: &str,
        k: usize,
    ) -> Result<Vec<Chunk>> {
        let results = self.hybrid_search_scored(query, collection, k).await?;
        Ok(results.into_iter().map(|r| r.chunk).collect())
    }

    /// Hybrid search keeping scores and the mode that produced each result
    pub async fn hybrid_search_scored(
        &self,
        query: impl Into<QueryInput>,
        collection: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        let query = query.into().into_text();
        if query.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let results = self.search_hybrid(&query, collection, k).await?;
        metrics::record_search(start.elapsed().as_secs_f64(), "hybrid", results.len());
        Ok(results)
    }

    #[instrument(skip(self))]
    async fn search_hybrid(&self, query: &str, collection: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let vector_ok = self.vector_available(collection).await;
        let lexical = self.lexical.load(collection).await;

        match (vector_ok, lexical) {
            (true, Ok(Some(handle))) => match self.fused(query, collection, k, &handle).await {
                Ok(results) => Ok(results),
                Err(e) => {
                    warn!(error = %e, "Hybrid search failed, falling back to lexical search");
                    metrics::record_fallback("hybrid_failed");
                    Ok(ranked(handle.search(query, k), RetrievalMode::BM25))
                }
            },
            (false, Ok(Some(handle))) => {
                warn!("Vector index unavailable, using lexical search only");
                metrics::record_fallback("vector_unavailable");
                Ok(ranked(handle.search(query, k), RetrievalMode::BM25))
            }
            (true, lexical) => {
                if let Err(e) = &lexical {
                    warn!(error = %e, "Lexical snapshot unreadable, using vector search only");
                } else {
                    warn!("No lexical snapshot, using vector search only");
                }
                metrics::record_fallback("lexical_unavailable");

                let results = self
                    .vector
                    .search(collection, query, k)
                    .await
                    .map_err(|e| AppError::RetrievalFailed {
                        collection: collection.to_string(),
                        message: e.to_string(),
                    })?;
                Ok(ranked(results, RetrievalMode::Vector))
            }
            (false, Ok(None)) => {
                warn!("No retriever available for collection");
                metrics::record_fallback("no_index");
                Ok(Vec::new())
            }
            (false, Err(e)) => Err(AppError::RetrievalFailed {
                collection: collection.to_string(),
                message: format!("vector index unavailable and lexical snapshot unreadable: {}", e),
            }),
        }
    }

    async fn fused(
        &self,
        query: &str,
        collection: &str,
        k: usize,
        handle: &Bm25Index,
    ) -> Result<Vec<RetrievedChunk>> {
        let (vector_results, lexical_results) = tokio::join!(
            self.vector.search(collection, query, k),
            async { handle.search(query, k) }
        );

        let fused = self.fusion.fuse(
            ranked(vector_results?, RetrievalMode::Vector),
            ranked(lexical_results, RetrievalMode::BM25),
            k,
        );
        debug!(count = fused.len(), "Fused results");

        Ok(fused.into_iter().map(|r| r.chunk).collect())
    }

    /// Vector similarity search only; empty when the collection is absent
    pub async fn vector_search(
        &self,
        query: impl Into<QueryInput>,
        collection: &str,
        k: usize,
    ) -> Result<Vec<(Chunk, f32)>> {
        let query = query.into().into_text();
        if query.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let results = self.vector.search(collection, &query, k).await?;
        metrics::record_search(start.elapsed().as_secs_f64(), "vector", results.len());
        Ok(results)
    }

    /// Lexical search only; empty when no snapshot exists
    pub async fn lexical_search(
        &self,
        query: impl Into<QueryInput>,
        collection: &str,
        k: usize,
    ) -> Result<Vec<(Chunk, f32)>> {
        let query = query.into().into_text();
        if query.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let results = match self.lexical.load(collection).await? {
            Some(handle) => handle.search(&query, k),
            None => {
                warn!(collection, "No lexical snapshot for collection");
                Vec::new()
            }
        };
        metrics::record_search(start.elapsed().as_secs_f64(), "bm25", results.len());
        Ok(results)
    }

    /// Search by method name: `vector`, `bm25` or `hybrid`
    pub async fn search_with_method(
        &self,
        query: impl Into<QueryInput>,
        collection: &str,
        method: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        let mode = method.parse::<RetrievalMode>()?;
        self.search_mode(query.into(), collection, mode, k).await
    }

    async fn search_mode(
        &self,
        query: QueryInput,
        collection: &str,
        mode: RetrievalMode,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        match mode {
            RetrievalMode::Vector => Ok(ranked(
                self.vector_search(query, collection, k).await?,
                RetrievalMode::Vector,
            )),
            RetrievalMode::BM25 => Ok(ranked(
                self.lexical_search(query, collection, k).await?,
                RetrievalMode::BM25,
            )),
            RetrievalMode::Hybrid => self.hybrid_search_scored(query, collection, k).await,
        }
    }
}

#[async_trait::async_trait]
impl Retriever for HybridRetriever {
    async fn retrieve(&self, request: &SearchRequest) -> Result<Vec<RetrievedChunk>> {
        let k = request.limit.unwrap_or(self.default_k);
        self.search_mode(request.query.clone(), &request.collection, request.mode, k)
            .await
    }
}
