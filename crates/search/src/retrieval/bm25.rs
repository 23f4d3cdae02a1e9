//! BM25 lexical search over persisted per-collection snapshots
//!
//! [`Bm25Index`] is a plain in-memory Okapi BM25 structure over chunk texts.
//! [`LexicalIndex`] manages one index per collection: it persists snapshots as
//! JSON under the snapshot directory and keeps loaded handles cached for the
//! life of the process. Lexical operations never retry.

use august_common::config::LexicalConfig;
use august_common::errors::{AppError, Result};
use august_common::Chunk;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

const SNAPSHOT_SUFFIX: &str = "_bm25.json";
const SNAPSHOT_VERSION: u32 = 1;

/// Lowercased alphanumeric runs, in any script
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Okapi BM25 parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term frequency saturation
    pub k1: f32,
    /// Length normalization
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

impl From<&LexicalConfig> for Bm25Params {
    fn from(config: &LexicalConfig) -> Self {
        Self {
            k1: config.k1,
            b: config.b,
        }
    }
}

/// In-memory BM25 index over a fixed chunk set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bm25Index {
    version: u32,
    params: Bm25Params,
    chunks: Vec<Chunk>,
    doc_lengths: Vec<u32>,
    avg_doc_length: f32,
    /// term -> (document position, term frequency)
    postings: HashMap<String, Vec<(u32, u32)>>,
    built_at: DateTime<Utc>,
}

impl Bm25Index {
    pub fn build(chunks: &[Chunk], params: Bm25Params) -> Self {
        let mut postings: HashMap<String, Vec<(u32, u32)>> = HashMap::new();
        let mut doc_lengths = Vec::with_capacity(chunks.len());

        for (position, chunk) in chunks.iter().enumerate() {
            let tokens = tokenize(&chunk.text);
            doc_lengths.push(tokens.len() as u32);

            let mut frequencies: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *frequencies.entry(token).or_insert(0) += 1;
            }
            for (term, tf) in frequencies {
                postings.entry(term).or_default().push((position as u32, tf));
            }
        }

        let total: u64 = doc_lengths.iter().map(|&l| l as u64).sum();
        let avg_doc_length = if chunks.is_empty() {
            0.0
        } else {
            total as f32 / chunks.len() as f32
        };

        Self {
            version: SNAPSHOT_VERSION,
            params,
            chunks: chunks.to_vec(),
            doc_lengths,
            avg_doc_length,
            postings,
            built_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn params(&self) -> Bm25Params {
        self.params
    }

    fn idf(&self, document_frequency: usize) -> f32 {
        let n = self.chunks.len() as f32;
        let df = document_frequency as f32;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    /// Top-k chunks by BM25 score, best first.
    ///
    /// Chunks sharing no term with the query are never returned; equal scores
    /// keep index order.
    pub fn search(&self, query: &str, k: usize) -> Vec<(Chunk, f32)> {
        if k == 0 || self.chunks.is_empty() {
            return Vec::new();
        }

        let Bm25Params { k1, b } = self.params;
        let avg = self.avg_doc_length.max(f32::EPSILON);
        let mut scores = vec![0.0f32; self.chunks.len()];

        for term in tokenize(query) {
            let Some(postings) = self.postings.get(&term) else {
                continue;
            };
            let idf = self.idf(postings.len());

            for &(position, tf) in postings {
                let tf = tf as f32;
                let length = self.doc_lengths[position as usize] as f32;
                let norm = k1 * (1.0 - b + b * length / avg);
                scores[position as usize] += idf * (tf * (k1 + 1.0)) / (tf + norm);
            }
        }

        let mut ranked: Vec<(usize, f32)> = scores
            .into_iter()
            .enumerate()
            .filter(|&(_, score)| score > 0.0)
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(k);

        ranked
            .into_iter()
            .map(|(position, score)| (self.chunks[position].clone(), score))
            .collect()
    }
}

/// Per-collection lexical indices with durable snapshots
pub struct LexicalIndex {
    snapshot_dir: PathBuf,
    params: Bm25Params,
    cache: RwLock<HashMap<String, Arc<Bm25Index>>>,
}

impl LexicalIndex {
    pub fn new(snapshot_dir: impl Into<PathBuf>, params: Bm25Params) -> Self {
        Self {
            snapshot_dir: snapshot_dir.into(),
            params,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &LexicalConfig) -> Self {
        Self::new(config.snapshot_dir.clone(), Bm25Params::from(config))
    }

    pub fn snapshot_dir(&self) -> &Path {
        &self.snapshot_dir
    }

    /// Build an index with this instance's parameters. Nothing is cached or
    /// written.
    pub fn build(&self, chunks: &[Chunk]) -> Bm25Index {
        Bm25Index::build(chunks, self.params)
    }

    /// Location of a collection's snapshot.
    ///
    /// Collection names are used as file names, so path separators and
    /// relative components are rejected.
    pub fn snapshot_path(&self, collection: &str) -> Result<PathBuf> {
        if collection.is_empty()
            || collection == "."
            || collection == ".."
            || collection.contains(|c: char| c == '/' || c == '\\')
        {
            return Err(AppError::Validation {
                message: format!("Invalid collection name: {:?}", collection),
            });
        }
        Ok(self
            .snapshot_dir
            .join(format!("{}{}", collection, SNAPSHOT_SUFFIX)))
    }

    /// Write a snapshot, replacing any previous one atomically
    #[instrument(skip(self, index), fields(documents = index.len()))]
    pub async fn persist(&self, collection: &str, index: &Bm25Index) -> Result<()> {
        let path = self.snapshot_path(collection)?;
        let bytes = serde_json::to_vec(index)?;

        tokio::fs::create_dir_all(&self.snapshot_dir).await?;
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, &bytes).await?;
        tokio::fs::rename(&staging, &path).await?;

        info!(path = %path.display(), bytes = bytes.len(), "Lexical snapshot persisted");
        Ok(())
    }

    /// Cached handle for a collection, loading the snapshot on first use.
    ///
    /// `Ok(None)` means no snapshot exists; an unreadable or corrupt snapshot
    /// is an error.
    pub async fn load(&self, collection: &str) -> Result<Option<Arc<Bm25Index>>> {
        if let Some(index) = self.cache.read().await.get(collection) {
            return Ok(Some(index.clone()));
        }

        let path = self.snapshot_path(collection)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(collection, "No lexical snapshot on disk");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let index: Bm25Index = serde_json::from_slice(&bytes)?;
        if index.version != SNAPSHOT_VERSION {
            return Err(AppError::Parse {
                message: format!(
                    "Unsupported lexical snapshot version {} at {}",
                    index.version,
                    path.display()
                ),
            });
        }

        info!(collection, documents = index.len(), built_at = %index.built_at, "Lexical snapshot loaded");
        Ok(Some(self.install(collection, index).await))
    }

    /// Replace the cached handle for a collection
    pub async fn install(&self, collection: &str, index: Bm25Index) -> Arc<Bm25Index> {
        let index = Arc::new(index);
        self.cache
            .write()
            .await
            .insert(collection.to_string(), index.clone());
        index
    }

    /// Drop the cached handle; the next load reads the snapshot again
    pub async fn invalidate(&self, collection: &str) {
        self.cache.write().await.remove(collection);
    }

    /// Forget a collection entirely, returning whether a snapshot existed
    pub async fn remove(&self, collection: &str) -> Result<bool> {
        let path = self.snapshot_path(collection)?;
        self.invalidate(collection).await;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
