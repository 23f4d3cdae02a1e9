//! Process-scoped service construction
//!
//! Clients are built once from [`AppConfig`] and shared through `Arc`s; no
//! module-level singletons.

use crate::retrieval::{
    HybridRetriever, InMemoryVectorStore, LexicalIndex, QdrantStore, VectorIndex, VectorStore,
    WeightedRrf,
};
use august_common::config::{AppConfig, VectorStoreConfig};
use august_common::embeddings::{create_embedder, RetryPolicy};
use august_common::errors::{AppError, Result};
use std::sync::Arc;
use tracing::info;

/// Vector store backend named by the configuration
pub fn vector_store_from_config(config: &VectorStoreConfig) -> Result<Arc<dyn VectorStore>> {
    match config.provider.as_str() {
        "qdrant" => Ok(Arc::new(QdrantStore::from_config(config)?)),
        "memory" => Ok(Arc::new(InMemoryVectorStore::new())),
        other => Err(AppError::Configuration {
            message: format!("Unknown vector store provider: {}", other),
        }),
    }
}

/// Wire the hybrid retriever from configuration without touching the network
pub fn build_retriever(config: &AppConfig) -> Result<HybridRetriever> {
    let embedder = create_embedder(&config.embedding)?;
    let store = vector_store_from_config(&config.vector_store)?;

    let vector = VectorIndex::new(
        store,
        embedder,
        RetryPolicy::from(&config.retry),
        config.ingestion.upsert_batch_size,
    );
    let lexical = LexicalIndex::from_config(&config.lexical);

    Ok(HybridRetriever::new(
        Arc::new(vector),
        Arc::new(lexical),
        WeightedRrf::from(&config.retrieval),
    )
    .with_default_k(config.retrieval.top_k))
}

/// Build the retriever and probe the embedding provider.
///
/// The probe retries transient failures; credentials or dimension problems
/// fail immediately.
pub async fn connect(config: &AppConfig) -> Result<Arc<HybridRetriever>> {
    config.validate()?;
    let retriever = build_retriever(config)?;
    retriever.vector_index().initialize().await?;

    info!(
        backend = retriever.vector_index().backend(),
        dimension = retriever.vector_index().dimension(),
        snapshot_dir = %retriever.lexical_index().snapshot_dir().display(),
        "Retriever ready"
    );
    Ok(Arc::new(retriever))
}
