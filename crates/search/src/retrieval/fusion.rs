//! Weighted Reciprocal Rank Fusion (RRF) for combining search results
//!
//! Each method contributes `weight / (k + rank)` for every chunk it returned,
//! with 1-based ranks. Raw scores are ignored, so cosine similarities and BM25
//! scores never need to be put on a common scale.

use super::{RetrievalMode, RetrievedChunk};
use august_common::config::RetrievalConfig;
use std::collections::HashMap;

/// RRF fusion parameters
#[derive(Debug, Clone)]
pub struct WeightedRrf {
    /// Rank damping constant (typically 60)
    pub k: f32,

    /// Weight for vector results
    pub vector_weight: f32,

    /// Weight for lexical results
    pub lexical_weight: f32,
}

impl Default for WeightedRrf {
    fn default() -> Self {
        Self {
            k: 60.0,
            vector_weight: 0.6,
            lexical_weight: 0.4,
        }
    }
}

impl From<&RetrievalConfig> for WeightedRrf {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            k: config.rrf_k,
            vector_weight: config.vector_weight,
            lexical_weight: config.lexical_weight,
        }
    }
}

/// Result of fusion
#[derive(Debug, Clone)]
pub struct FusionResult {
    /// Chunk with its score replaced by the normalized fusion score
    pub chunk: RetrievedChunk,
    pub vector_rank: Option<usize>,
    pub lexical_rank: Option<usize>,
    /// Unnormalized fusion score
    pub rrf_score: f32,
}

impl FusionResult {
    fn best_rank(&self) -> usize {
        match (self.vector_rank, self.lexical_rank) {
            (Some(v), Some(l)) => v.min(l),
            (Some(r), None) | (None, Some(r)) => r,
            (None, None) => usize::MAX,
        }
    }
}

impl WeightedRrf {
    /// Create with custom weights
    pub fn with_weights(vector_weight: f32, lexical_weight: f32) -> Self {
        Self {
            vector_weight,
            lexical_weight,
            ..Self::default()
        }
    }

    /// Fuse vector and lexical results.
    ///
    /// Chunks are matched by identity across and within lists; a repeated
    /// chunk within one list keeps its first (best) rank. Ties on score go to
    /// the better single-method rank, then to first appearance.
    pub fn fuse(
        &self,
        vector_results: Vec<RetrievedChunk>,
        lexical_results: Vec<RetrievedChunk>,
        limit: usize,
    ) -> Vec<FusionResult> {
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut results: Vec<FusionResult> = Vec::new();

        for (rank, chunk) in vector_results.into_iter().enumerate() {
            let identity = chunk.chunk.identity();
            if positions.contains_key(&identity) {
                continue;
            }
            positions.insert(identity, results.len());
            results.push(FusionResult {
                chunk,
                vector_rank: Some(rank + 1),
                lexical_rank: None,
                rrf_score: 0.0,
            });
        }

        for (rank, chunk) in lexical_results.into_iter().enumerate() {
            let identity = chunk.chunk.identity();
            match positions.get(&identity) {
                Some(&position) => {
                    let existing = &mut results[position];
                    if existing.lexical_rank.is_none() {
                        existing.lexical_rank = Some(rank + 1);
                    }
                }
                None => {
                    positions.insert(identity, results.len());
                    results.push(FusionResult {
                        chunk,
                        vector_rank: None,
                        lexical_rank: Some(rank + 1),
                        rrf_score: 0.0,
                    });
                }
            }
        }

        for result in &mut results {
            let vector_rrf = result
                .vector_rank
                .map(|r| self.vector_weight / (self.k + r as f32))
                .unwrap_or(0.0);
            let lexical_rrf = result
                .lexical_rank
                .map(|r| self.lexical_weight / (self.k + r as f32))
                .unwrap_or(0.0);

            result.rrf_score = vector_rrf + lexical_rrf;
            result.chunk.retrieval_mode = RetrievalMode::Hybrid;
        }

        // Stable sort: equal keys keep first-seen order
        results.sort_by(|a, b| {
            b.rrf_score
                .partial_cmp(&a.rrf_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.best_rank().cmp(&b.best_rank()))
        });
        results.truncate(limit);

        // Normalize scores to 0-1 range
        if let Some(max_score) = results.first().map(|r| r.rrf_score) {
            if max_score > 0.0 {
                for result in &mut results {
                    result.chunk.score = result.rrf_score / max_score;
                }
            }
        }

        results
    }
}
