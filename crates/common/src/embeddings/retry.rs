//! Bounded exponential backoff for backend calls
//!
//! Only errors classified as transient by [`AppError::is_transient`] are
//! retried. The delay starts at the policy's initial delay and is multiplied
//! after every failed attempt; there is no jitter.

use super::Embedder;
use crate::config::RetryConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoffBuilder;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Retry budget for embedding and vector-store writes
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Growth factor applied after each failed attempt
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: config.initial_delay(),
            multiplier: config.multiplier,
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or the budget runs out.
///
/// The last error is returned unchanged once attempts are exhausted.
pub async fn retry_with_backoff<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(policy.initial_delay)
        .with_multiplier(policy.multiplier)
        .with_randomization_factor(0.0)
        .with_max_interval(Duration::from_secs(300))
        .with_max_elapsed_time(None)
        .build();

    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    retry(backoff, || {
        attempt += 1;
        let current = attempt;
        let fut = op();
        async move {
            fut.await.map_err(|err| {
                if err.is_transient() && current < max_attempts {
                    warn!(
                        operation,
                        attempt = current,
                        max_attempts,
                        error = %err,
                        "Transient failure, retrying"
                    );
                    metrics::record_retry(operation);
                    backoff::Error::transient(err)
                } else {
                    if err.is_transient() {
                        warn!(
                            operation,
                            attempts = current,
                            error = %err,
                            "Retry budget exhausted"
                        );
                    }
                    backoff::Error::permanent(err)
                }
            })
        }
    })
    .await
}

/// Embedder wrapper that retries transient failures.
///
/// Created once per process by the vector index for the startup check and
/// ingestion writes. Query-time embedding bypasses it.
pub struct ResilientEmbedder {
    inner: Arc<dyn Embedder>,
    policy: RetryPolicy,
}

impl ResilientEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Probe the provider with a test embedding.
    ///
    /// Retries under the policy; an empty or wrongly sized probe vector is a
    /// configuration error.
    pub async fn initialize(&self) -> Result<()> {
        let probe = retry_with_backoff(&self.policy, "embedding_init", || self.inner.embed("test")).await?;

        if probe.is_empty() {
            return Err(AppError::Configuration {
                message: format!("Embedding model {} returned an empty vector", self.inner.model_name()),
            });
        }
        if probe.len() != self.inner.dimension() {
            return Err(AppError::Configuration {
                message: format!(
                    "Embedding model {} returned {} dimensions, expected {}",
                    self.inner.model_name(),
                    probe.len(),
                    self.inner.dimension()
                ),
            });
        }

        info!(model = self.inner.model_name(), dimension = probe.len(), "Embeddings initialized");
        Ok(())
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl Embedder for ResilientEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let result = retry_with_backoff(&self.policy, "embed_query", || self.inner.embed(text)).await;
        metrics::record_embedding(start.elapsed().as_secs_f64(), self.inner.model_name(), 1, result.is_ok());
        result
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let result = retry_with_backoff(&self.policy, "embed_documents", || self.inner.embed_batch(texts)).await;
        metrics::record_embedding(
            start.elapsed().as_secs_f64(),
            self.inner.model_name(),
            texts.len(),
            result.is_ok(),
        );
        result
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashEmbedder;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_test::assert_ok;

    /// Fails with the given error for the first `failures` calls
    struct FlakyEmbedder {
        calls: AtomicU32,
        failures: u32,
        permanent: bool,
        inner: HashEmbedder,
    }

    impl FlakyEmbedder {
        fn new(failures: u32, permanent: bool) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures,
                permanent,
                inner: HashEmbedder::new(8),
            }
        }

        fn fail(&self) -> Option<AppError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call >= self.failures {
                return None;
            }
            Some(if self.permanent {
                AppError::Configuration {
                    message: "bad key".into(),
                }
            } else {
                AppError::EmbeddingError {
                    message: "503".into(),
                }
            })
        }
    }

    #[async_trait]
    impl Embedder for FlakyEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            match self.fail() {
                Some(err) => Err(err),
                None => self.inner.embed(text).await,
            }
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            match self.fail() {
                Some(err) => Err(err),
                None => self.inner.embed_batch(texts).await,
            }
        }

        fn model_name(&self) -> &str {
            "flaky"
        }

        fn dimension(&self) -> usize {
            8
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_within_budget() {
        let flaky = Arc::new(FlakyEmbedder::new(2, false));
        let embedder = ResilientEmbedder::new(flaky.clone(), RetryPolicy::default());

        let start = tokio::time::Instant::now();
        let vector = assert_ok!(embedder.embed("bloating").await);

        assert_eq!(vector.len(), 8);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
        // 1s before the second attempt, 2s before the third
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_three_attempts() {
        let flaky = Arc::new(FlakyEmbedder::new(10, false));
        let embedder = ResilientEmbedder::new(flaky.clone(), RetryPolicy::default());

        let err = embedder.embed_batch(&["a".to_string()]).await.unwrap_err();

        assert!(matches!(err, AppError::EmbeddingError { .. }));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_errors_not_retried() {
        let flaky = Arc::new(FlakyEmbedder::new(10, true));
        let embedder = ResilientEmbedder::new(flaky.clone(), RetryPolicy::default());

        let err = embedder.initialize().await.unwrap_err();

        assert!(matches!(err, AppError::Configuration { .. }));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_initialize_checks_dimension() {
        let embedder = ResilientEmbedder::new(Arc::new(HashEmbedder::new(16)), RetryPolicy::default());
        assert!(embedder.initialize().await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_batch_skips_provider() {
        let flaky = Arc::new(FlakyEmbedder::new(10, true));
        let embedder = ResilientEmbedder::new(flaky.clone(), RetryPolicy::default());
        assert!(embedder.embed_batch(&[]).await.unwrap().is_empty());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_policy_from_config() {
        let policy = RetryPolicy::from(&RetryConfig::default());
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_delay, Duration::from_secs(1));
        assert_eq!(policy.multiplier, 2.0);
    }
}
