use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::embedding::openai::{self, OpenAiEmbeddingClient};
use crate::embedding::vertex::{self, VertexAuth, VertexEmbeddingClient};
use crate::embedding::EmbeddingProvider;

const DEFAULT_PIPELINE_CONFIG: &str = "configs/linkedin.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    Vertex,
    OpenAi,
}

impl EmbeddingBackend {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "vertex" | "vertexai" | "google" => Ok(Self::Vertex),
            "openai" => Ok(Self::OpenAi),
            other => bail!("EMBEDDING_PROVIDER must be 'vertex' or 'openai', got '{other}'"),
        }
    }

    fn default_model(self) -> &'static str {
        match self {
            Self::Vertex => vertex::DEFAULT_MODEL,
            Self::OpenAi => openai::DEFAULT_MODEL,
        }
    }
}

/// Credentials and endpoint for the selected embedding backend.
#[derive(Debug, Clone)]
pub enum ProviderSettings {
    Vertex {
        project: String,
        region: String,
        /// Fixed bearer token; Application Default Credentials when unset.
        access_token: Option<String>,
    },
    OpenAi {
        base_url: String,
        api_key: String,
    },
}

/// Application configuration loaded from environment variables.
/// Fails at startup if the selected backend's credentials are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub embedding_model: String,
    pub provider: ProviderSettings,
    pub pipeline_config_path: PathBuf,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let backend = match std::env::var("EMBEDDING_PROVIDER") {
            Ok(v) => EmbeddingBackend::parse(&v)?,
            Err(_) => EmbeddingBackend::Vertex,
        };

        let provider = match backend {
            EmbeddingBackend::Vertex => ProviderSettings::Vertex {
                project: require_env("VERTEX_PROJECT")?,
                region: env_or("VERTEX_REGION", vertex::DEFAULT_REGION),
                access_token: std::env::var("VERTEX_ACCESS_TOKEN").ok(),
            },
            EmbeddingBackend::OpenAi => ProviderSettings::OpenAi {
                base_url: env_or("OPENAI_BASE_URL", openai::DEFAULT_BASE_URL),
                api_key: require_env("OPENAI_API_KEY")?,
            },
        };

        Ok(Config {
            embedding_model: env_or("EMBEDDING_MODEL", backend.default_model()),
            provider,
            pipeline_config_path: PathBuf::from(env_or(
                "CONFIG_JSON_PATH",
                DEFAULT_PIPELINE_CONFIG,
            )),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG")
                .or_else(|_| std::env::var("MY_LOG_LEVEL").map(|l| l.to_lowercase()))
                .unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Builds the embedding client for the configured backend.
    pub async fn build_provider(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        let model = self.embedding_model.clone();
        let provider: Arc<dyn EmbeddingProvider> = match &self.provider {
            ProviderSettings::Vertex {
                project,
                region,
                access_token,
            } => {
                let auth = match access_token {
                    Some(token) => VertexAuth::Static(token.clone()),
                    None => VertexAuth::application_default()
                        .await
                        .context("No Google Application Default Credentials found; set GOOGLE_APPLICATION_CREDENTIALS or VERTEX_ACCESS_TOKEN")?,
                };
                Arc::new(
                    VertexEmbeddingClient::new(project, region, model, auth)
                        .context("Failed to build Vertex AI embedding client")?,
                )
            }
            ProviderSettings::OpenAi { base_url, api_key } => Arc::new(
                OpenAiEmbeddingClient::new(base_url, model, api_key.clone())
                    .context("Failed to build OpenAI embedding client")?,
            ),
        };
        Ok(provider)
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// File locations from the pipeline's shared JSON config.
/// Other keys in that file belong to other pipeline steps and are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineFiles {
    /// Posting analyses written by the analysis step; fallback ranking input.
    #[serde(rename = "output_file_requirements")]
    pub requirements_file: PathBuf,
    /// Résumé as plain text.
    #[serde(rename = "input_file_cv")]
    pub resume_file: PathBuf,
    #[serde(rename = "output_file_score")]
    pub score_file: PathBuf,
}

impl PipelineFiles {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline config '{}'", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid pipeline config '{}'", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_backend_parse() {
        assert_eq!(EmbeddingBackend::parse("vertex").unwrap(), EmbeddingBackend::Vertex);
        assert_eq!(EmbeddingBackend::parse(" OpenAI ").unwrap(), EmbeddingBackend::OpenAi);
        assert!(EmbeddingBackend::parse("cohere").is_err());
    }

    #[test]
    fn test_backend_default_models() {
        assert_eq!(
            EmbeddingBackend::Vertex.default_model(),
            "text-multilingual-embedding-002"
        );
        assert_eq!(EmbeddingBackend::OpenAi.default_model(), "text-embedding-3-small");
    }

    fn vertex_config(access_token: Option<&str>) -> Config {
        Config {
            embedding_model: "text-multilingual-embedding-002".to_string(),
            provider: ProviderSettings::Vertex {
                project: "my-project".to_string(),
                region: "us-central1".to_string(),
                access_token: access_token.map(String::from),
            },
            pipeline_config_path: PathBuf::from(DEFAULT_PIPELINE_CONFIG),
            port: 8080,
            rust_log: "info".to_string(),
        }
    }

    #[tokio::test]
    async fn test_vertex_token_override_skips_credential_lookup() {
        let provider = vertex_config(Some("ya29.fixed")).build_provider().await.unwrap();
        assert_eq!(provider.model(), "text-multilingual-embedding-002");
    }

    #[test]
    fn test_pipeline_files_ignore_unrelated_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "input_file_jobs": "vagas.xlsx",
                "output_file_requirements": "out/requisitos.json",
                "input_file_cv": "cv/curriculo.txt",
                "output_file_score": "out/ranking.json",
                "output_dir": "out/cvs"
            }}"#
        )
        .unwrap();

        let files = PipelineFiles::load(file.path()).unwrap();
        assert_eq!(files.requirements_file, PathBuf::from("out/requisitos.json"));
        assert_eq!(files.resume_file, PathBuf::from("cv/curriculo.txt"));
        assert_eq!(files.score_file, PathBuf::from("out/ranking.json"));
    }

    #[test]
    fn test_pipeline_files_missing_key_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"input_file_cv": "cv.txt"}}"#).unwrap();
        assert!(PipelineFiles::load(file.path()).is_err());
    }

    #[test]
    fn test_pipeline_files_missing_file_names_path() {
        let err = PipelineFiles::load(Path::new("/nonexistent/linkedin.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/linkedin.json"));
    }
}
