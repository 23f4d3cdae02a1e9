//! Ingestion pipeline
//!
//! load -> chunk -> ensure collection -> vector upsert -> lexical snapshot ->
//! retriever re-initialization. Both indices are written from the same chunk
//! set. There is no staging step: a failure between the two writes leaves the
//! indices out of step and is reported as
//! [`AppError::InconsistentIndexState`]. Concurrent ingestion into the same
//! collection must be serialized by the caller.

use crate::chunker::Chunker;
use crate::loader::DocumentLoader;
use august_common::config::IngestionConfig;
use august_common::errors::{AppError, Result};
use august_common::metrics;
use august_common::{Chunk, Document};
use august_search::HybridRetriever;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// Counts from one ingestion run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionReport {
    /// Documents produced by the loader, one per section
    pub sections: usize,
    /// Chunks written to both indices
    pub chunks: usize,
    /// Extra chunks created by splitting oversized sections
    pub splits: usize,
}

/// Writes corpora into both indices of a collection
pub struct IngestionPipeline {
    retriever: Arc<HybridRetriever>,
}

impl IngestionPipeline {
    pub fn new(retriever: Arc<HybridRetriever>) -> Self {
        Self { retriever }
    }

    pub fn retriever(&self) -> &Arc<HybridRetriever> {
        &self.retriever
    }

    /// Ingest a corpus; `Ok(false)` when it holds no usable sections
    pub async fn store(
        &self,
        collection: &str,
        corpus: &Value,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<bool> {
        let report = self.ingest(collection, corpus, chunk_size, chunk_overlap).await?;
        Ok(report.is_some())
    }

    /// Ingest a corpus file with the configured chunking
    pub async fn store_file(
        &self,
        collection: &str,
        path: impl AsRef<Path>,
        config: &IngestionConfig,
    ) -> Result<bool> {
        let chunker = Chunker::new(config.chunk_size, config.chunk_overlap)?;
        let documents = DocumentLoader::load_file(path).await?;
        let report = self.ingest_documents(collection, documents, &chunker).await?;
        Ok(report.is_some())
    }

    /// Ingest a corpus, returning counts, or `None` when nothing was stored
    pub async fn ingest(
        &self,
        collection: &str,
        corpus: &Value,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<Option<IngestionReport>> {
        let chunker = Chunker::new(chunk_size, chunk_overlap)?;
        let documents = DocumentLoader::load(corpus)?;
        self.ingest_documents(collection, documents, &chunker).await
    }

    #[instrument(skip(self, documents, chunker), fields(sections = documents.len()))]
    pub async fn ingest_documents(
        &self,
        collection: &str,
        documents: Vec<Document>,
        chunker: &Chunker,
    ) -> Result<Option<IngestionReport>> {
        if documents.is_empty() {
            warn!("No documents found to store");
            return Ok(None);
        }

        let start = Instant::now();
        let sections = documents.len();
        let chunks: Vec<Chunk> = documents
            .into_iter()
            .flat_map(|document| chunker.split(document))
            .collect();
        let report = IngestionReport {
            sections,
            chunks: chunks.len(),
            splits: chunks.len() - sections,
        };
        info!(
            chunks = report.chunks,
            splits = report.splits,
            chunk_size = chunker.chunk_size(),
            chunk_overlap = chunker.chunk_overlap(),
            "Documents chunked"
        );

        let vector = self.retriever.vector_index();
        vector.create_collection(collection, vector.dimension()).await?;

        if let Err(e) = vector.upsert(collection, &chunks).await {
            error!(error = %e, "Vector upsert failed; earlier batches may already be stored");
            return Err(e);
        }

        let lexical = self.retriever.lexical_index();
        let index = lexical.build(&chunks);
        if let Err(e) = lexical.persist(collection, &index).await {
            error!(error = %e, "Lexical snapshot not written after vector upsert");
            return Err(AppError::InconsistentIndexState {
                collection: collection.to_string(),
                message: format!(
                    "vector index holds {} new chunks but the lexical snapshot was not written: {}",
                    chunks.len(),
                    e
                ),
            });
        }

        let availability = self.retriever.reinitialize(collection).await?;
        if !availability.vector || availability.lexical.is_none() {
            warn!(
                vector = availability.vector,
                lexical = availability.lexical.is_some(),
                "Retriever not fully available after ingestion"
            );
        }

        metrics::record_ingestion(
            start.elapsed().as_secs_f64(),
            report.sections,
            report.chunks,
            collection,
        );
        info!(
            chunks = report.chunks,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Collection stored"
        );
        Ok(Some(report))
    }
}
