//! AnthropicProvider -- concrete [`LlmProvider`] implementation for Anthropic Claude.
//!
//! Sends requests to the Anthropic Messages API (`/v1/messages`) with
//! proper authentication headers. Supports both non-streaming (`complete`)
//! and streaming (`stream`) modes.
//!
//! The API key is wrapped in [`secrecy::SecretString`] and is never logged
//! or included in `Debug` output.

use secrecy::{ExposeSecret, SecretString};

use formsmith_core::llm::provider::{EventStream, LlmProvider};
use formsmith_types::error::ProviderError;
use formsmith_types::llm::{
    CompletionRequest, CompletionResponse, ProviderCapabilities, StopReason, Usage,
};

use super::streaming::create_anthropic_stream;
use super::types::{
    AnthropicContentBlock, AnthropicMessage, AnthropicNonStreamResponse, AnthropicRequest,
};
use crate::llm::http::{build_client, check_status, map_reqwest_error};

/// Anthropic Claude LLM provider.
///
/// A provider built without a key reports `is_configured() == false` and is
/// skipped by the cascade.
pub struct AnthropicProvider {
    client: reqwest::Client,
    name: String,
    api_key: Option<SecretString>,
    base_url: String,
    model: String,
    temperature: Option<f64>,
    capabilities: ProviderCapabilities,
}

impl AnthropicProvider {
    /// The Anthropic API version header value.
    const API_VERSION: &'static str = "2023-06-01";

    pub const DEFAULT_BASE_URL: &'static str = "https://api.anthropic.com";

    pub fn new(
        name: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<SecretString>,
    ) -> Result<Self, ProviderError> {
        let model = model.into();
        let capabilities = Self::capabilities_for_model(&model);
        Ok(Self {
            client: build_client()?,
            name: name.into(),
            api_key,
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            model,
            temperature: None,
            capabilities,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Override the base URL (useful for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f64>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Output ceiling by model family.
    fn capabilities_for_model(model: &str) -> ProviderCapabilities {
        let max_output_tokens = if model.contains("opus") {
            32_000
        } else if model.contains("sonnet") || model.contains("haiku") {
            8_192
        } else {
            // Conservative default for unknown models
            4_096
        };
        ProviderCapabilities {
            streaming: true,
            max_output_tokens,
        }
    }

    /// Build the full API URL for a given path.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn key(&self) -> Result<&SecretString, ProviderError> {
        self.api_key.as_ref().ok_or(ProviderError::Unauthenticated)
    }

    /// Convert a generic [`CompletionRequest`] into an [`AnthropicRequest`].
    fn to_anthropic_request(&self, request: &CompletionRequest, stream: bool) -> AnthropicRequest {
        let messages = request
            .messages
            .iter()
            .map(|m| AnthropicMessage {
                role: m.role.to_string(),
                content: m.content.clone(),
            })
            .collect();

        AnthropicRequest {
            model: if request.model.is_empty() {
                self.model.clone()
            } else {
                request.model.clone()
            },
            max_tokens: request.max_tokens.min(self.capabilities.max_output_tokens),
            messages,
            system: request.system.clone(),
            stream,
            temperature: request.temperature.or(self.temperature),
        }
    }
}

// AnthropicProvider intentionally does NOT derive Debug; the key stays out
// of any formatted output.

impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let body = self.to_anthropic_request(request, false);
        let url = self.url("/v1/messages");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", self.key()?.expose_secret())
            .header("anthropic-version", Self::API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let response = check_status(response).await?;

        let anthropic_resp: AnthropicNonStreamResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::unknown(format!("failed to parse response: {e}")))?;

        let content = anthropic_resp
            .content
            .iter()
            .filter_map(|block| match block {
                AnthropicContentBlock::Text { text } => Some(text.as_str()),
                AnthropicContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        let stop_reason = anthropic_resp
            .stop_reason
            .as_deref()
            .and_then(|r| r.parse().ok())
            .unwrap_or(StopReason::EndTurn);

        Ok(CompletionResponse {
            content,
            model: anthropic_resp.model,
            stop_reason,
            usage: Usage {
                input_tokens: anthropic_resp.usage.input_tokens,
                output_tokens: anthropic_resp.usage.output_tokens,
            },
        })
    }

    fn stream(&self, request: CompletionRequest) -> EventStream {
        let key = match self.key() {
            Ok(key) => key.clone(),
            Err(e) => return Box::pin(futures_util::stream::once(async move { Err(e) })),
        };
        let body = self.to_anthropic_request(&request, true);
        let url = self.url("/v1/messages");

        create_anthropic_stream(self.client.clone(), url, body, key, Self::API_VERSION)
    }
}
