//! JSON-over-HTTPS transport shared by the embedding backends.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::EmbeddingError;

const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT_SECS: u64 = 60;

pub(crate) fn build_client() -> Result<Client, EmbeddingError> {
    Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(EmbeddingError::Http)
}

/// Both Google and OpenAI wrap failures as `{"error": {"message": ...}}`.
#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Sends the request built by `make_request` and decodes the JSON body.
/// Retries on 429 (rate limit) and 5xx errors with exponential backoff.
pub(crate) async fn send_json<T, F>(make_request: F) -> Result<T, EmbeddingError>
where
    T: DeserializeOwned,
    F: Fn() -> RequestBuilder,
{
    let mut last_error: Option<EmbeddingError> = None;

    for attempt in 0..MAX_RETRIES {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s
            let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
            warn!(
                "Embedding call attempt {} failed, retrying after {}ms...",
                attempt,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }

        let response = match make_request().send().await {
            Ok(r) => r,
            Err(e) => {
                last_error = Some(EmbeddingError::Http(e));
                continue;
            }
        };

        let status = response.status();

        if status.as_u16() == 429 || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            warn!("Embedding API returned {}: {}", status, body);
            last_error = Some(EmbeddingError::Api {
                status: status.as_u16(),
                message: body,
            });
            continue;
        }

        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(EmbeddingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        debug!("Embedding call succeeded: {} response bytes", body.len());
        return serde_json::from_str(&body).map_err(EmbeddingError::Parse);
    }

    Err(last_error.unwrap_or(EmbeddingError::RateLimited {
        retries: MAX_RETRIES,
    }))
}
