//! Client for the remote text-generation endpoint.
//!
//! Request: `POST {"prompt": ..., "maxTokens": ...}`.
//! Response: `{"success": bool, "text"?: string}`.
//! Single attempt per call; callers decide what to fall back to.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::GenerationConfig;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("text generation is disabled")]
    Disabled,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("endpoint returned status {0}")]
    Status(u16),

    #[error("endpoint reported failure")]
    Unsuccessful,

    #[error("endpoint returned no text")]
    EmptyText,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, GenerationError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    prompt: &'a str,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    success: bool,
    #[serde(default)]
    text: Option<String>,
}

pub struct GenerationClient {
    endpoint: String,
    enabled: bool,
    client: Client,
}

impl GenerationClient {
    pub fn new(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            enabled: config.enabled,
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TextGenerator for GenerationClient {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, GenerationError> {
        if !self.enabled {
            return Err(GenerationError::Disabled);
        }

        let body = GenerateRequest { prompt, max_tokens };
        debug!("POST {} ({} prompt chars, maxTokens={max_tokens})", self.endpoint, prompt.len());

        let resp = self.client.post(&self.endpoint).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(GenerationError::Status(resp.status().as_u16()));
        }

        let data: GenerateResponse = resp.json().await?;
        if !data.success {
            return Err(GenerationError::Unsuccessful);
        }

        let text = data.text.unwrap_or_default().trim().to_string();
        if text.is_empty() {
            return Err(GenerationError::EmptyText);
        }
        Ok(text)
    }
}
