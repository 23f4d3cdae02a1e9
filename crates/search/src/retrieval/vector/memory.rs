//! In-memory vector store using cosine similarity.
//!
//! Collections live in a `HashMap` behind a `tokio::sync::RwLock`. Points keep
//! insertion order so equal scores come back in a stable order. Suitable for
//! development, tests and small corpora.

use super::{CollectionStatus, Distance, VectorPoint, VectorStore};
use august_common::errors::{AppError, Result};
use august_common::Chunk;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug)]
struct Collection {
    dimension: usize,
    distance: Distance,
    points: Vec<VectorPoint>,
    positions: HashMap<Uuid, usize>,
}

impl Collection {
    fn new(dimension: usize, distance: Distance) -> Self {
        Self {
            dimension,
            distance,
            points: Vec::new(),
            positions: HashMap::new(),
        }
    }

    fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self.distance {
            Distance::Cosine => cosine_similarity(a, b),
            Distance::Dot => a.iter().zip(b).map(|(x, y)| x * y).sum(),
            // Negated so that higher is better for every metric
            Distance::Euclid => -a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f32>().sqrt(),
        }
    }
}

/// An in-memory vector store
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn collection_count(&self) -> usize {
        self.collections.read().await.len()
    }

    /// Number of points in a collection, `None` if it does not exist
    pub async fn point_count(&self, name: &str) -> Option<usize> {
        self.collections.read().await.get(name).map(|c| c.points.len())
    }
}

/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn dimension_mismatch(expected: usize, actual: usize) -> AppError {
    AppError::Validation {
        message: format!("Vector dimension {} does not match collection dimension {}", actual, expected),
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn backend(&self) -> &str {
        "in_memory"
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.collections.read().await.contains_key(name))
    }

    async fn create_collection(
        &self,
        name: &str,
        vector_size: usize,
        distance: Distance,
    ) -> Result<CollectionStatus> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Ok(CollectionStatus::AlreadyExists);
        }
        collections.insert(name.to_string(), Collection::new(vector_size, distance));
        Ok(CollectionStatus::Created)
    }

    async fn delete_collection(&self, name: &str) -> Result<bool> {
        Ok(self.collections.write().await.remove(name).is_some())
    }

    async fn upsert(&self, name: &str, points: &[VectorPoint]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| AppError::CollectionNotFound { name: name.to_string() })?;

        if let Some(point) = points.iter().find(|p| p.vector.len() != collection.dimension) {
            return Err(dimension_mismatch(collection.dimension, point.vector.len()));
        }

        for point in points {
            match collection.positions.get(&point.id) {
                Some(&position) => collection.points[position] = point.clone(),
                None => {
                    collection.positions.insert(point.id, collection.points.len());
                    collection.points.push(point.clone());
                }
            }
        }
        Ok(())
    }

    async fn search(&self, name: &str, vector: &[f32], k: usize) -> Result<Vec<(Chunk, f32)>> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(name)
            .ok_or_else(|| AppError::CollectionNotFound { name: name.to_string() })?;

        if vector.len() != collection.dimension {
            return Err(dimension_mismatch(collection.dimension, vector.len()));
        }

        let mut scored: Vec<(Chunk, f32)> = collection
            .points
            .iter()
            .map(|point| (point.chunk.clone(), collection.score(&point.vector, vector)))
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }
}
