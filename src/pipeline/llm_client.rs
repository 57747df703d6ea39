// src/pipeline/llm_client.rs

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use super::request_builder::GenerationRequest;

pub const DEFAULT_API_URL: &str = "https://api.mistral.ai/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "mistral-large-latest";

const RAW_LOG_LIMIT: usize = 500;

#[derive(Debug, Error)]
pub enum GenerationError {
    /// Transport failure, timeout, or a non-2xx answer from the model endpoint.
    #[error("{}", upstream_message(.status, .message))]
    UpstreamFailure {
        status: Option<u16>,
        message: String,
    },

    /// The endpoint answered but its payload could not be used.
    #[error("Failed to parse model output: {0}")]
    MalformedOutput(String),
}

fn upstream_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(status) => format!("Model API error: {status} - {message}"),
        None => format!("Model API error: {message}"),
    }
}

/// The one network-facing seam of the pipeline.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Sends `request` and returns the model's textual content, unparsed.
    async fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

/// Chat-completions client for the Mistral API (or anything speaking the same
/// wire format).
pub struct MistralClient {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl MistralClient {
    pub fn new(
        api_url: &str,
        api_key: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            GenerationError::UpstreamFailure {
                status: None,
                message: format!("failed to build HTTP client: {e}"),
            }
        })?;

        Ok(Self {
            client,
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[async_trait]
impl LlmClient for MistralClient {
    #[tracing::instrument(skip_all, fields(model = %self.model, requested = request.requested_count.get()))]
    async fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = request.to_chat_completion(&self.model);

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::UpstreamFailure {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %text, "Model API returned an error");
            return Err(GenerationError::UpstreamFailure {
                status: Some(status.as_u16()),
                message: text,
            });
        }

        let raw_bytes = response
            .bytes()
            .await
            .map_err(|e| GenerationError::UpstreamFailure {
                status: None,
                message: format!("failed to read response body: {e}"),
            })?;

        let completion: ChatCompletion = serde_json::from_slice(&raw_bytes).map_err(|e| {
            let raw_text = String::from_utf8_lossy(&raw_bytes);
            tracing::error!(raw_response = %raw_text, "Failed to parse chat completion envelope");
            GenerationError::MalformedOutput(e.to_string())
        })?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GenerationError::MalformedOutput("response has no message content".to_string()))?;

        tracing::debug!(raw = %truncate(&content, RAW_LOG_LIMIT), "Raw model output");

        Ok(content)
    }
}

/// Cuts `text` to at most `limit` characters for logging.
pub(crate) fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
