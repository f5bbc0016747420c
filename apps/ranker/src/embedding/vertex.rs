//! Vertex AI text-embedding backend (`publishers/google/models/*:predict`).

use std::sync::Arc;

use async_trait::async_trait;
use gcp_auth::TokenProvider;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http::{build_client, send_json};
use super::{EmbeddingError, EmbeddingProvider, EmbeddingVector};

pub const DEFAULT_MODEL: &str = "text-multilingual-embedding-002";
pub const DEFAULT_REGION: &str = "us-central1";
/// Per-request instance limit of the predict endpoint.
const MAX_INSTANCES: usize = 250;
const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    instances: Vec<Instance<'a>>,
}

#[derive(Debug, Serialize)]
struct Instance<'a> {
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    embeddings: PredictionEmbeddings,
}

#[derive(Debug, Deserialize)]
struct PredictionEmbeddings {
    values: Vec<f64>,
}

impl PredictResponse {
    fn into_vectors(self) -> Vec<EmbeddingVector> {
        self.predictions
            .into_iter()
            .map(|p| p.embeddings.values)
            .collect()
    }
}

/// Where bearer tokens for the predict endpoint come from.
#[derive(Clone)]
pub enum VertexAuth {
    /// A fixed token, e.g. from `gcloud auth print-access-token`. Not refreshed.
    Static(String),
    /// Application Default Credentials. The provider caches tokens and
    /// refreshes them before they expire.
    ApplicationDefault(Arc<dyn TokenProvider>),
}

impl VertexAuth {
    /// Resolves Application Default Credentials (`GOOGLE_APPLICATION_CREDENTIALS`,
    /// gcloud user credentials or the metadata server).
    pub async fn application_default() -> Result<Self, EmbeddingError> {
        let provider = gcp_auth::provider()
            .await
            .map_err(|e| EmbeddingError::Auth(e.to_string()))?;
        Ok(Self::ApplicationDefault(provider))
    }

    async fn bearer_token(&self) -> Result<String, EmbeddingError> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::ApplicationDefault(provider) => {
                let token = provider
                    .token(&[CLOUD_PLATFORM_SCOPE])
                    .await
                    .map_err(|e| EmbeddingError::Auth(e.to_string()))?;
                Ok(token.as_str().to_string())
            }
        }
    }
}

#[derive(Clone)]
pub struct VertexEmbeddingClient {
    client: Client,
    endpoint: String,
    auth: VertexAuth,
    model: String,
}

impl VertexEmbeddingClient {
    pub fn new(
        project: &str,
        region: &str,
        model: String,
        auth: VertexAuth,
    ) -> Result<Self, EmbeddingError> {
        Self::with_base_url(&regional_base_url(region), project, region, model, auth)
    }

    /// Like `new`, against an explicit API root instead of the regional host.
    pub fn with_base_url(
        base_url: &str,
        project: &str,
        region: &str,
        model: String,
        auth: VertexAuth,
    ) -> Result<Self, EmbeddingError> {
        if project.trim().is_empty() {
            return Err(EmbeddingError::Config(
                "Vertex project id is empty".to_string(),
            ));
        }

        Ok(Self {
            client: build_client()?,
            endpoint: predict_endpoint(base_url, project, region, &model),
            auth,
            model,
        })
    }

    async fn predict(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
        let body = PredictRequest {
            instances: texts
                .iter()
                .map(|t| Instance { content: t.as_str() })
                .collect(),
        };
        let token = self.auth.bearer_token().await?;

        let response: PredictResponse = send_json(|| {
            self.client
                .post(&self.endpoint)
                .bearer_auth(&token)
                .json(&body)
        })
        .await?;

        Ok(response.into_vectors())
    }
}

fn regional_base_url(region: &str) -> String {
    format!("https://{region}-aiplatform.googleapis.com")
}

fn predict_endpoint(base_url: &str, project: &str, region: &str, model: &str) -> String {
    format!(
        "{}/v1/projects/{project}/locations/{region}/publishers/google/models/{model}:predict",
        base_url.trim_end_matches('/')
    )
}

#[async_trait]
impl EmbeddingProvider for VertexEmbeddingClient {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(MAX_INSTANCES) {
            debug!(
                "Requesting {} Vertex embeddings (model: {})",
                chunk.len(),
                self.model
            );
            vectors.extend(self.predict(chunk).await?);
        }

        Ok(vectors)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
