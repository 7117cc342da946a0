//! Evaluation providers: the only place that talks to a hosted model.
//!
//! Two backends implement [`EvaluationProvider`]: the Anthropic Messages API
//! called directly, and Anthropic models hosted on AWS Bedrock. The backend is
//! chosen once at startup. Calls are made once; failures are reported, never retried.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod bedrock;

pub use bedrock::BedrockClient;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-sonnet-20240229";
pub(crate) const MAX_TOKENS: u32 = 4096;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("request rejected: {0}")]
    Validation(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("model returned empty content")]
    EmptyContent,

    #[error("could not decode model response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Transport(e.to_string())
    }
}

/// Turns a finished prompt into the model's raw text answer.
#[async_trait]
pub trait EvaluationProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;

    /// Short backend name for logs and the timing endpoint.
    fn name(&self) -> &'static str;

    fn model(&self) -> &str;
}

// ────────────────────────────────────────────────────────────────────────────
// Messages API wire types (shared with the Bedrock body)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub(crate) struct AnthropicMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl MessagesResponse {
    /// Text of the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }

    pub(crate) fn into_text(self) -> Result<String, ProviderError> {
        if let Some(usage) = &self.usage {
            debug!(
                "Model call succeeded: input_tokens={}, output_tokens={}",
                usage.input_tokens, usage.output_tokens
            );
        }
        self.text()
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string)
            .ok_or(ProviderError::EmptyContent)
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Maps a non-success status from the Messages API to a provider error.
fn classify_status(status: u16, body: String) -> ProviderError {
    let message = serde_json::from_str::<AnthropicError>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    match status {
        401 | 403 => ProviderError::Authentication(message),
        400 | 422 => ProviderError::Validation(message),
        _ => ProviderError::Api { status, message },
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Anthropic direct
// ────────────────────────────────────────────────────────────────────────────

/// Calls the Anthropic Messages API directly with an API key.
#[derive(Clone)]
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: String) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl EvaluationProvider for AnthropicClient {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let request_body = AnthropicRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        debug!("Sending evaluation prompt to Anthropic (model: {})", self.model);

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Anthropic API returned {}: {}", status, body);
            return Err(classify_status(status.as_u16(), body));
        }

        let body: MessagesResponse = response.json().await?;
        body.into_text()
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_picks_first_text_block() {
        let json = r#"{
            "content": [
                {"type": "tool_use", "text": null},
                {"type": "text", "text": "{\"categories\": []}"}
            ],
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }"#;
        let response: MessagesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.text(), Some("{\"categories\": []}"));
        assert_eq!(response.into_text().unwrap(), "{\"categories\": []}");
    }

    #[test]
    fn test_empty_content_is_an_error() {
        let response: MessagesResponse = serde_json::from_str(r#"{"content": []}"#).unwrap();
        assert!(matches!(
            response.into_text(),
            Err(ProviderError::EmptyContent)
        ));
    }

    #[test]
    fn test_classify_status_reads_error_message() {
        let body = r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#;
        match classify_status(401, body.to_string()) {
            ProviderError::Authentication(msg) => assert_eq!(msg, "invalid x-api-key"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_classify_status_validation_and_fallback() {
        assert!(matches!(
            classify_status(400, "bad".to_string()),
            ProviderError::Validation(msg) if msg == "bad"
        ));
        assert!(matches!(
            classify_status(529, "overloaded".to_string()),
            ProviderError::Api { status: 529, .. }
        ));
    }

    #[test]
    fn test_request_body_shape() {
        let body = AnthropicRequest {
            model: DEFAULT_ANTHROPIC_MODEL,
            max_tokens: MAX_TOKENS,
            messages: vec![AnthropicMessage {
                role: "user",
                content: "story",
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["max_tokens"], 4096);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "story");
    }
}
