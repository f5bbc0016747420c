/// Embedding providers: the only place where text is turned into vectors.
///
/// The ranker never talks to a provider API directly. It receives an
/// `Arc<dyn EmbeddingProvider>` at construction time and calls
/// `embed_texts`, which enforces the batch contract every backend must honor:
/// one vector per input, in input order, all of the same dimension.
use async_trait::async_trait;
use thiserror::Error;

mod http;
pub mod openai;
pub mod vertex;

/// A dense embedding as returned by the provider.
pub type EmbeddingVector = Vec<f64>;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("Provider returned {actual} embeddings for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// A backend that embeds a batch of texts.
///
/// Implementations must return vectors in the same order as `texts`.
/// Backends whose wire format carries explicit indices reorder before
/// returning; backends that don't are trusted to answer positionally.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, EmbeddingError>;

    /// Model identifier, for logging.
    fn model(&self) -> &str;
}

/// Embeds `texts` through `provider` and validates the response shape.
///
/// An empty batch short-circuits to an empty result without a provider call.
pub async fn embed_texts(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let vectors = provider.embed_batch(texts).await?;

    if vectors.len() != texts.len() {
        return Err(EmbeddingError::CountMismatch {
            expected: texts.len(),
            actual: vectors.len(),
        });
    }

    let dimension = vectors[0].len();
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
        return Err(EmbeddingError::InvalidDimension {
            expected: dimension,
            actual: bad.len(),
        });
    }

    Ok(vectors)
}

/// Deterministic in-memory provider for tests.
#[cfg(test)]
pub mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{EmbeddingError, EmbeddingProvider, EmbeddingVector};

    /// Maps known texts to fixed vectors and records every batch it receives.
    /// Unknown texts embed to `fallback`.
    pub struct StaticProvider {
        vectors: HashMap<String, EmbeddingVector>,
        fallback: EmbeddingVector,
        fail_on: Option<String>,
        pub calls: Mutex<Vec<Vec<String>>>,
    }

    impl StaticProvider {
        pub fn new(entries: &[(&str, Vec<f64>)]) -> Self {
            let vectors: HashMap<String, EmbeddingVector> = entries
                .iter()
                .map(|(text, v)| (text.to_string(), v.clone()))
                .collect();
            let dimension = entries.first().map(|(_, v)| v.len()).unwrap_or(2);
            Self {
                vectors,
                fallback: vec![0.0; dimension],
                fail_on: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Makes any batch containing `text` fail with a 503.
        pub fn failing_on(mut self, text: &str) -> Self {
            self.fail_on = Some(text.to_string());
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl EmbeddingProvider for StaticProvider {
        async fn embed_batch(
            &self,
            texts: &[String],
        ) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
            self.calls.lock().unwrap().push(texts.to_vec());

            if let Some(bad) = &self.fail_on {
                if texts.iter().any(|t| t == bad) {
                    return Err(EmbeddingError::Api {
                        status: 503,
                        message: "service unavailable".to_string(),
                    });
                }
            }

            Ok(texts
                .iter()
                .map(|t| self.vectors.get(t).unwrap_or(&self.fallback).clone())
                .collect())
        }

        fn model(&self) -> &str {
            "static-test"
        }
    }

    /// Serves `app` on an ephemeral loopback port and returns its base URL.
    pub async fn serve_local(app: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }
}

#[cfg(test)]
mod tests {
    use super::testing::StaticProvider;
    use super::*;

    /// Returns whatever it was built with, regardless of input.
    struct CannedProvider(Vec<EmbeddingVector>);

    #[async_trait]
    impl EmbeddingProvider for CannedProvider {
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
            Ok(self.0.clone())
        }

        fn model(&self) -> &str {
            "canned"
        }
    }

    #[tokio::test]
    async fn test_empty_batch_skips_provider_call() {
        let provider = StaticProvider::new(&[("a", vec![1.0, 0.0])]);
        let vectors = embed_texts(&provider, &[]).await.unwrap();
        assert!(vectors.is_empty());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_vectors_come_back_in_request_order() {
        let provider = StaticProvider::new(&[("a", vec![1.0, 0.0]), ("b", vec![0.0, 1.0])]);
        let texts = vec!["b".to_string(), "a".to_string()];
        let vectors = embed_texts(&provider, &texts).await.unwrap();
        assert_eq!(vectors, vec![vec![0.0, 1.0], vec![1.0, 0.0]]);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_short_response_is_count_mismatch() {
        let provider = CannedProvider(vec![vec![1.0]]);
        let texts = vec!["x".to_string(), "y".to_string()];
        let err = embed_texts(&provider, &texts).await.unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::CountMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[tokio::test]
    async fn test_ragged_response_is_invalid_dimension() {
        let provider = CannedProvider(vec![vec![1.0, 0.0], vec![1.0]]);
        let texts = vec!["x".to_string(), "y".to_string()];
        let err = embed_texts(&provider, &texts).await.unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::InvalidDimension {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let provider = StaticProvider::new(&[("a", vec![1.0])]).failing_on("a");
        let err = embed_texts(&provider, &["a".to_string()]).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Api { status: 503, .. }));
    }
}
