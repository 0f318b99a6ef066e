//! Text embedding behind an OpenAI-compatible `/embeddings` endpoint, the
//! shape served by Ollama and most hosted embedding providers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use ticketry_core::config::EmbeddingConfig;

use crate::retry::backoff_delay;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EmbeddingError {
    #[error("embedding request timed out")]
    Timeout,
    #[error("embedding provider rejected the request for quota reasons")]
    Quota,
    #[error("embedding transport failure: {0}")]
    Transport(String),
    #[error("embedding provider rejected the request (status {status}): {detail}")]
    Rejected { status: u16, detail: String },
}

impl EmbeddingError {
    /// Timeouts, transport faults and quota pushback are worth retrying;
    /// a 4xx rejection will repeat identically and is not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Quota | Self::Transport(_))
    }
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    fn dimension(&self) -> usize;
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    config: EmbeddingConfig,
}

impl HttpEmbeddingProvider {
    pub fn new(config: EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|err| EmbeddingError::Transport(err.to_string()))?;
        Ok(Self { client, config })
    }

    async fn request_once(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let url = format!("{}/embeddings", self.config.base_url.trim_end_matches('/'));
        let body = EmbeddingRequest { model: &self.config.model, input: [text] };

        let mut request = self.client.post(&url).json(&body);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await.map_err(classify_reqwest_error)?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(EmbeddingError::Quota);
        }
        if status.is_server_error() {
            return Err(EmbeddingError::Transport(format!("server returned {status}")));
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Rejected { status: status.as_u16(), detail });
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|err| EmbeddingError::Transport(err.to_string()))?;
        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|datum| datum.embedding)
            .ok_or_else(|| EmbeddingError::Transport("response carried no embedding".into()))?;

        if vector.len() != self.config.dimension {
            return Err(EmbeddingError::Rejected {
                status: status.as_u16(),
                detail: format!(
                    "expected dimension {}, provider returned {}",
                    self.config.dimension,
                    vector.len()
                ),
            });
        }
        Ok(vector)
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> EmbeddingError {
    if err.is_timeout() {
        EmbeddingError::Timeout
    } else {
        EmbeddingError::Transport(err.to_string())
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut attempt = 1u32;
        loop {
            match self.request_once(text).await {
                Ok(vector) => return Ok(vector),
                Err(err) if err.is_transient() && attempt <= self.config.max_retries => {
                    let delay = backoff_delay(250, 4_000, attempt);
                    warn!(
                        event_name = "embedding_retry",
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying embedding request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}
