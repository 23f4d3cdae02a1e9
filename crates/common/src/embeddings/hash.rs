//! Deterministic token-hashing embedder
//!
//! Every lowercase alphanumeric token, in any script, is hashed into one of
//! `dimension` buckets with a signed weight, and the result is L2-normalized.
//! Identical texts always produce identical vectors; texts sharing tokens
//! have positive cosine similarity. No network access is needed.

use super::Embedder;
use crate::errors::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Offline embedder for tests and local development
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();

        for token in lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn model_name(&self) -> &str {
        "hash-embedding"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_deterministic_and_normalized() {
        let embedder = HashEmbedder::new(128);
        let a = embedder.embed("Gut microbiome and bloating").await.unwrap();
        let b = embedder.embed("gut MICROBIOME and bloating").await.unwrap();
        assert_eq!(a.len(), 128);
        assert_eq!(a, b);
        assert!((dot(&a, &a) - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_shared_tokens_are_closer() {
        let embedder = HashEmbedder::new(256);
        let query = embedder.embed("probiotic yogurt").await.unwrap();
        let related = embedder.embed("yogurt contains probiotic cultures").await.unwrap();
        let unrelated = embedder.embed("stretching before a run").await.unwrap();
        assert!(dot(&query, &related) > dot(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let embedder = HashEmbedder::new(16);
        let v = embedder.embed("   ").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn test_non_ascii_tokens_count() {
        let embedder = HashEmbedder::new(64);
        let upper = embedder.embed("КЕФИР").await.unwrap();
        let lower = embedder.embed("кефир").await.unwrap();
        assert_eq!(upper, lower);
        assert!((dot(&lower, &lower) - 1.0).abs() < 1e-5);

        // Accented letters stay inside their word
        let accented = embedder.embed("probiótico").await.unwrap();
        let fragments = embedder.embed("probi tico").await.unwrap();
        assert_ne!(accented, fragments);
    }

    #[tokio::test]
    async fn test_batch() {
        let embedder = HashEmbedder::new(32);
        let texts = vec!["text1".to_string(), "text2".to_string()];
        let embeddings = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0].len(), 32);
    }
}
