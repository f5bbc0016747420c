//! OpenAI-compatible `/embeddings` backend.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http::{build_client, send_json};
use super::{EmbeddingError, EmbeddingProvider, EmbeddingVector};

pub const DEFAULT_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f64>,
}

impl EmbeddingsResponse {
    /// Places each vector at its `index`. Every slot must be filled exactly once.
    fn into_ordered(self, expected: usize) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
        let actual = self.data.len();
        let mismatch = || EmbeddingError::CountMismatch { expected, actual };

        if actual != expected {
            return Err(mismatch());
        }

        let mut slots: Vec<Option<EmbeddingVector>> = vec![None; expected];
        for item in self.data {
            match slots.get_mut(item.index) {
                Some(slot) if slot.is_none() => *slot = Some(item.embedding),
                _ => return Err(mismatch()),
            }
        }

        slots.into_iter().map(|s| s.ok_or_else(mismatch)).collect()
    }
}

#[derive(Clone)]
pub struct OpenAiEmbeddingClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbeddingClient {
    pub fn new(base_url: &str, model: String, api_key: String) -> Result<Self, EmbeddingError> {
        Ok(Self {
            client: build_client()?,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            api_key,
            model,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingClient {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
        debug!(
            "Requesting {} OpenAI embeddings (model: {})",
            texts.len(),
            self.model
        );

        let body = EmbeddingsRequest {
            model: &self.model,
            input: texts,
        };

        let response: EmbeddingsResponse = send_json(|| {
            self.client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await?;

        response.into_ordered(texts.len())
    }

    fn model(&self) -> &str {
        &self.model
    }
}
