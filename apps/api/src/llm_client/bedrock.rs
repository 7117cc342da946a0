//! Anthropic models hosted on AWS Bedrock.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_bedrockruntime::config::http::HttpResponse;
use aws_sdk_bedrockruntime::error::{DisplayErrorContext, SdkError};
use aws_sdk_bedrockruntime::operation::invoke_model::InvokeModelError;
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_bedrockruntime::Client;
use serde::Serialize;
use tracing::{debug, warn};

use super::{AnthropicMessage, EvaluationProvider, MessagesResponse, ProviderError, MAX_TOKENS};

const BEDROCK_ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";
pub const DEFAULT_BEDROCK_MODEL: &str = "anthropic.claude-3-sonnet-20240229-v1:0";

#[derive(Debug, Serialize)]
struct BedrockRequest<'a> {
    anthropic_version: &'a str,
    max_tokens: u32,
    messages: Vec<AnthropicMessage<'a>>,
}

/// Invokes an Anthropic model through the Bedrock runtime using the default
/// AWS credential chain.
#[derive(Clone)]
pub struct BedrockClient {
    client: Client,
    model_id: String,
    region: String,
}

impl BedrockClient {
    pub async fn new(region: String, model_id: String) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.clone()))
            .load()
            .await;

        Self {
            client: Client::new(&sdk_config),
            model_id,
            region,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

fn classify_sdk_error(err: SdkError<InvokeModelError, HttpResponse>) -> ProviderError {
    let message = DisplayErrorContext(&err).to_string();
    match err.into_service_error() {
        e if e.is_access_denied_exception() => ProviderError::Authentication(message),
        e if e.is_validation_exception() => ProviderError::Validation(message),
        e if e.is_throttling_exception() || e.is_internal_server_exception() => {
            ProviderError::Api {
                status: 503,
                message,
            }
        }
        _ => ProviderError::Transport(message),
    }
}

#[async_trait]
impl EvaluationProvider for BedrockClient {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = serde_json::to_vec(&BedrockRequest {
            anthropic_version: BEDROCK_ANTHROPIC_VERSION,
            max_tokens: MAX_TOKENS,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        })?;

        debug!(
            "Invoking Bedrock model {} in {}",
            self.model_id, self.region
        );

        let output = self
            .client
            .invoke_model()
            .model_id(&self.model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(body))
            .send()
            .await
            .map_err(|e| {
                let err = classify_sdk_error(e);
                warn!("Bedrock invocation failed: {err}");
                err
            })?;

        let response: MessagesResponse = serde_json::from_slice(output.body().as_ref())?;
        response.into_text()
    }

    fn name(&self) -> &'static str {
        "bedrock"
    }

    fn model(&self) -> &str {
        &self.model_id
    }
}
