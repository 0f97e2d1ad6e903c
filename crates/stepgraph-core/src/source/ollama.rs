//! [`ModelSource`] backed by an Ollama server's HTTP API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ModelSource, SourceConfig, SourceError};
use crate::plan::error::excerpt;

const GENERATE_PATH: &str = "api/generate";
const TAGS_PATH: &str = "api/tags";

/// Longest error body kept in [`SourceError::Status`].
const MAX_ERROR_BODY: usize = 500;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Client for `POST /api/generate` with streaming disabled.
pub struct OllamaSource {
    config: SourceConfig,
    http: Client,
}

impl OllamaSource {
    pub fn new(config: SourceConfig) -> Result<Self, SourceError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SourceError::Transport(e.to_string()))?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    fn map_error(&self, err: reqwest::Error) -> SourceError {
        if err.is_timeout() {
            SourceError::Timeout(self.config.timeout)
        } else if err.is_decode() {
            SourceError::InvalidResponse(err.to_string())
        } else {
            SourceError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl ModelSource for OllamaSource {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, prompt: &str) -> Result<String, SourceError> {
        let url = self.config.endpoint(GENERATE_PATH);
        debug!(%url, model = %self.config.model, prompt_len = prompt.len(), "sending prompt");

        let body = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
        };
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let body = excerpt(&text, MAX_ERROR_BODY).to_owned();
            warn!(status = status.as_u16(), "model backend rejected request");
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout(self.config.timeout)
            } else {
                SourceError::InvalidResponse(e.to_string())
            }
        })?;
        debug!(response_len = parsed.response.len(), "received completion");
        Ok(parsed.response)
    }

    async fn is_available(&self) -> bool {
        let url = self.config.endpoint(TAGS_PATH);
        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(%url, status = response.status().as_u16(), "model backend unhealthy");
                false
            }
            Err(e) => {
                warn!(%url, error = %e, "model backend unreachable");
                false
            }
        }
    }
}
