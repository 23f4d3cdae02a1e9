//! End-to-end ingestion and retrieval against the in-memory vector store
//! and the hash embedder

use august_common::config::AppConfig;
use august_common::embeddings::{Embedder, HashEmbedder, RetryPolicy};
use august_common::errors::{AppError, Result};
use august_ingestion::IngestionPipeline;
use august_search::retrieval::{
    InMemoryVectorStore, RetrievalMode, VectorStore, WeightedRrf,
};
use august_search::{HybridRetriever, LexicalIndex, VectorIndex};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const DIM: usize = 64;

fn corpus() -> Value {
    json!([
        {
            "source": "healthline",
            "url": "https://example.org/bloating",
            "title": "Why am I bloated?",
            "extraction_status": "success",
            "sections": [
                {"heading": "Causes", "content": [
                    "Bloating is often caused by gas produced in the gut.",
                    "Food intolerance can make bloating worse."
                ]},
                {"heading": "Relief", "content": "Walking after meals eases bloating."},
                {"heading": "Empty", "content": ["   "]}
            ]
        },
        {
            "source": "medicalnews",
            "url": "https://example.org/microbiome",
            "title": "The gut microbiome",
            "sections": [
                {"heading": null, "content": ["The gut microbiome is shaped by fiber and fermented foods."]}
            ]
        }
    ])
}

struct Harness {
    _dir: TempDir,
    store: Arc<InMemoryVectorStore>,
    pipeline: IngestionPipeline,
}

fn harness_with(snapshot_dir: &Path, dir: TempDir) -> Harness {
    let store = Arc::new(InMemoryVectorStore::new());
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(DIM));
    let vector = VectorIndex::new(store.clone(), embedder, RetryPolicy::default(), 8);
    let lexical = LexicalIndex::new(snapshot_dir, Default::default());
    let retriever = HybridRetriever::new(Arc::new(vector), Arc::new(lexical), WeightedRrf::default());

    Harness {
        _dir: dir,
        store,
        pipeline: IngestionPipeline::new(Arc::new(retriever)),
    }
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let snapshots = dir.path().join("bm25_indices");
    harness_with(&snapshots, dir)
}

#[tokio::test]
async fn test_store_then_hybrid_search() {
    let h = harness();
    assert!(h.pipeline.store("health_articles", &corpus(), 2000, 100).await.unwrap());

    assert_eq!(h.store.point_count("health_articles").await, Some(3));

    let results = h
        .pipeline
        .retriever()
        .hybrid_search_scored("bloating", "health_articles", 5)
        .await
        .unwrap();

    assert!(!results.is_empty());
    assert!(results.len() <= 3);
    assert!(results.iter().all(|r| r.retrieval_mode == RetrievalMode::Hybrid));
    assert!(results[0].chunk.text.to_lowercase().contains("bloating"));
    assert_eq!(results[0].chunk.metadata.source, "healthline");
}

#[tokio::test]
async fn test_empty_corpus_creates_nothing() {
    let h = harness();
    assert!(!h.pipeline.store("health_articles", &json!([]), 2000, 100).await.unwrap());

    assert_eq!(h.store.collection_count().await, 0);
    assert!(!h.store.collection_exists("health_articles").await.unwrap());
    assert!(h
        .pipeline
        .retriever()
        .lexical_index()
        .load("health_articles")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_blank_sections_only_is_false() {
    let h = harness();
    let corpus = json!([{"sections": [{"content": ""}, {"heading": "x"}]}]);
    assert!(!h.pipeline.store("health_articles", &corpus, 2000, 100).await.unwrap());
    assert_eq!(h.store.collection_count().await, 0);
}

#[tokio::test]
async fn test_oversized_sections_are_split() {
    let h = harness();
    let long = "Fermented foods like kefir and kimchi support digestion. ".repeat(20);
    let corpus = json!([{"title": "Ferments", "sections": [{"heading": "Kefir", "content": long}]}]);

    let report = h
        .pipeline
        .ingest("ferments", &corpus, 200, 20)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.sections, 1);
    assert!(report.chunks > 1);
    assert_eq!(report.splits, report.chunks - 1);
    assert_eq!(h.store.point_count("ferments").await, Some(report.chunks));

    let lexical = h
        .pipeline
        .retriever()
        .lexical_search("kefir", "ferments", 100)
        .await
        .unwrap();
    assert!(!lexical.is_empty() && lexical.len() <= report.chunks);
    assert!(lexical
        .iter()
        .all(|(chunk, _)| chunk.metadata.heading.as_deref() == Some("Kefir")));
}

#[tokio::test]
async fn test_lexical_survives_vector_loss() {
    let h = harness();
    assert!(h.pipeline.store("health_articles", &corpus(), 2000, 100).await.unwrap());

    // Vector side disappears; the persisted lexical snapshot still serves
    h.store.delete_collection("health_articles").await.unwrap();
    h.pipeline.retriever().reinitialize("health_articles").await.unwrap();

    let results = h
        .pipeline
        .retriever()
        .hybrid_search_scored("bloating", "health_articles", 5)
        .await
        .unwrap();

    assert!(!results.is_empty() && results.len() <= 5);
    assert!(results.iter().all(|r| r.retrieval_mode == RetrievalMode::BM25));
}

#[tokio::test]
async fn test_snapshot_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let snapshots = dir.path().join("bm25_indices");

    let first = harness_with(&snapshots, tempfile::tempdir().unwrap());
    assert!(first.pipeline.store("health_articles", &corpus(), 2000, 100).await.unwrap());

    // New process: fresh caches and an empty vector store
    let second = harness_with(&snapshots, dir);
    let chunks = second
        .pipeline
        .retriever()
        .hybrid_search("bloating", "health_articles", 5)
        .await
        .unwrap();
    assert_eq!(chunks.len(), 2);
}

#[tokio::test]
async fn test_message_query() {
    let h = harness();
    h.pipeline.store("health_articles", &corpus(), 2000, 100).await.unwrap();

    let chunks = h
        .pipeline
        .retriever()
        .hybrid_search(json!({"content": "gut microbiome"}), "health_articles", 5)
        .await
        .unwrap();

    assert!(chunks.iter().any(|c| c.text.contains("microbiome")));
}

#[tokio::test]
async fn test_reingest_is_idempotent() {
    let h = harness();
    h.pipeline.store("health_articles", &corpus(), 2000, 100).await.unwrap();
    h.pipeline.store("health_articles", &corpus(), 2000, 100).await.unwrap();

    assert_eq!(h.store.collection_count().await, 1);
    assert_eq!(h.store.point_count("health_articles").await, Some(3));
}

#[tokio::test]
async fn test_lexical_persist_failure_reports_inconsistency() {
    let dir = tempfile::tempdir().unwrap();
    let blocked = dir.path().join("blocked");
    std::fs::write(&blocked, b"not a directory").unwrap();
    let h = harness_with(&blocked, dir);

    let err = h
        .pipeline
        .store("health_articles", &corpus(), 2000, 100)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InconsistentIndexState { .. }));
    // The vector write already happened and is not rolled back
    assert_eq!(h.store.point_count("health_articles").await, Some(3));
}

/// Embedder that always fails permanently
struct RejectingEmbedder;

#[async_trait]
impl Embedder for RejectingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(AppError::Configuration {
            message: "invalid API key".into(),
        })
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(AppError::Configuration {
            message: "invalid API key".into(),
        })
    }

    fn model_name(&self) -> &str {
        "rejecting"
    }

    fn dimension(&self) -> usize {
        DIM
    }
}

#[tokio::test]
async fn test_vector_failure_propagates_without_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(InMemoryVectorStore::new());
    let vector = VectorIndex::new(store, Arc::new(RejectingEmbedder), RetryPolicy::default(), 8);
    let lexical = LexicalIndex::new(dir.path(), Default::default());
    let retriever = Arc::new(HybridRetriever::new(
        Arc::new(vector),
        Arc::new(lexical),
        WeightedRrf::default(),
    ));
    let pipeline = IngestionPipeline::new(retriever.clone());

    let err = pipeline
        .store("health_articles", &corpus(), 2000, 100)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Configuration { .. }));
    assert!(retriever
        .lexical_index()
        .load("health_articles")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_store_file() {
    let h = harness();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("articles.json");
    std::fs::write(&path, corpus().to_string()).unwrap();

    let config = AppConfig::default();
    assert!(h
        .pipeline
        .store_file("health_articles", &path, &config.ingestion)
        .await
        .unwrap());

    let err = h
        .pipeline
        .store_file("health_articles", dir.path().join("missing.json"), &config.ingestion)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_invalid_chunking_rejected() {
    let h = harness();
    let err = h
        .pipeline
        .store("health_articles", &corpus(), 100, 100)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
}
