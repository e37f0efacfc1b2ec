//! OpenAI-compatible LLM provider implementation.
//!
//! A single [`OpenAiCompatibleProvider`] serves OpenAI, Google Gemini,
//! Mistral, and any other chat-completions endpoint via a configurable
//! base URL.
//!
//! Uses [`async_openai`] for type-safe request/response handling and
//! built-in SSE streaming.

pub mod config;
pub mod streaming;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, ChatCompletionStreamOptions,
    CreateChatCompletionRequest,
};
use async_openai::Client;
use futures_util::StreamExt;
use secrecy::ExposeSecret;

use formsmith_core::llm::provider::{EventStream, LlmProvider};
use formsmith_types::error::ProviderError;
use formsmith_types::llm::{
    CompletionRequest, CompletionResponse, MessageRole, ProviderCapabilities, StopReason, Usage,
};

use self::config::OpenAiCompatConfig;
use self::streaming::{map_openai_stream, stop_reason_for, stream_error};

/// Unified provider for any OpenAI-compatible API.
///
/// Does NOT derive Debug; the API key lives inside the `async_openai::Client`.
pub struct OpenAiCompatibleProvider {
    client: Client<OpenAIConfig>,
    provider_name: String,
    model: String,
    temperature: Option<f64>,
    configured: bool,
    capabilities: ProviderCapabilities,
}

impl OpenAiCompatibleProvider {
    /// Create a new OpenAI-compatible provider from a configuration.
    pub fn new(config: OpenAiCompatConfig) -> Self {
        let mut openai_config = OpenAIConfig::new().with_api_base(&config.base_url);
        if let Some(key) = &config.api_key {
            openai_config = openai_config.with_api_key(key.expose_secret());
        }

        Self {
            client: Client::with_config(openai_config),
            provider_name: config.provider_name,
            model: config.model,
            temperature: config.temperature,
            configured: config.api_key.is_some(),
            capabilities: config.capabilities,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build a [`CreateChatCompletionRequest`] from a generic [`CompletionRequest`].
    fn build_request(&self, request: &CompletionRequest, stream: bool) -> CreateChatCompletionRequest {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::new();

        if let Some(ref system) = request.system {
            messages.push(system_message(system));
        }

        for msg in &request.messages {
            let oai_msg = match msg.role {
                // The pipeline only sends system and user turns.
                MessageRole::System => system_message(&msg.content),
                MessageRole::User | MessageRole::Assistant => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessage {
                        content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
                        name: None,
                    },
                ),
            };
            messages.push(oai_msg);
        }

        let model = if request.model.is_empty() {
            self.model.clone()
        } else {
            request.model.clone()
        };

        let mut req = CreateChatCompletionRequest {
            model,
            messages,
            max_completion_tokens: Some(request.max_tokens.min(self.capabilities.max_output_tokens)),
            temperature: request.temperature.or(self.temperature).map(|t| t as f32),
            ..Default::default()
        };

        if stream {
            req.stream = Some(true);
            req.stream_options = Some(ChatCompletionStreamOptions {
                include_usage: Some(true),
                include_obfuscation: None,
            });
        }

        req
    }
}

fn system_message(content: &str) -> ChatCompletionRequestMessage {
    ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
        content: ChatCompletionRequestSystemMessageContent::Text(content.to_string()),
        name: None,
    })
}

impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        if !self.configured {
            return Err(ProviderError::Unauthenticated);
        }
        let oai_request = self.build_request(request, false);

        let response = self
            .client
            .chat()
            .create(oai_request)
            .await
            .map_err(map_openai_error)?;

        let choice = response.choices.first();
        let content = choice
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();
        let stop_reason = choice
            .and_then(|c| c.finish_reason.as_ref())
            .map(stop_reason_for)
            .unwrap_or(StopReason::EndTurn);
        let usage = response
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content,
            model: response.model,
            stop_reason,
            usage,
        })
    }

    fn stream(&self, request: CompletionRequest) -> EventStream {
        if !self.configured {
            return Box::pin(futures_util::stream::once(async {
                Err(ProviderError::Unauthenticated)
            }));
        }
        let oai_request = self.build_request(&request, true);

        // Clone the client for the 'static stream
        let client = self.client.clone();

        Box::pin(async_stream::try_stream! {
            let oai_stream = client
                .chat()
                .create_stream(oai_request)
                .await
                .map_err(map_openai_error)?;

            let mut inner = map_openai_stream(oai_stream);
            while let Some(event) = inner.next().await {
                yield event?;
            }
        })
    }
}

/// Map an `async_openai::error::OpenAIError` to a [`ProviderError`].
pub(crate) fn map_openai_error(err: async_openai::error::OpenAIError) -> ProviderError {
    use async_openai::error::OpenAIError;

    match &err {
        OpenAIError::ApiError(api_err) => {
            let code = api_err.code.as_deref().unwrap_or("");
            let error_type = api_err.r#type.as_deref().unwrap_or("");

            if code == "invalid_api_key"
                || error_type == "authentication_error"
                || api_err.message.contains("Incorrect API key")
                || api_err.message.contains("Invalid API key")
            {
                ProviderError::Unauthenticated
            } else if code == "rate_limit_exceeded" || error_type == "rate_limit_error" {
                ProviderError::RateLimited {
                    retry_after_ms: None,
                }
            } else if code == "server_error" || error_type == "overloaded_error" {
                ProviderError::unavailable(api_err.message.clone())
            } else {
                ProviderError::unknown(err.to_string())
            }
        }
        OpenAIError::Reqwest(reqwest_err) => {
            if reqwest_err.is_timeout() {
                ProviderError::Timeout
            } else if let Some(status) = reqwest_err.status() {
                ProviderError::from_status(status.as_u16(), &err.to_string(), None)
            } else {
                ProviderError::unavailable(err.to_string())
            }
        }
        OpenAIError::StreamError(stream_err) => stream_error(stream_err.to_string()),
        _ => ProviderError::unknown(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn provider(key: Option<&str>) -> OpenAiCompatibleProvider {
        OpenAiCompatibleProvider::new(OpenAiCompatConfig::resolve(
            "openai",
            "gpt-4o",
            None,
            key.map(|k| SecretString::from(k.to_string())),
        ))
    }

    #[test]
    fn test_provider_identity() {
        let p = provider(Some("sk-test"));
        assert_eq!(p.name(), "openai");
        assert_eq!(p.model(), "gpt-4o");
        assert!(p.is_configured());
        assert!(p.capabilities().streaming);
        assert!(!provider(None).is_configured());
    }

    #[test]
    fn test_build_request_streaming() {
        let p = provider(Some("sk-test"));
        let request = CompletionRequest::from_prompts("Return JSON.", "Make a form", 100_000);
        let req = p.build_request(&request, true);

        assert_eq!(req.model, "gpt-4o");
        assert_eq!(req.messages.len(), 2);
        assert!(matches!(req.messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(req.messages[1], ChatCompletionRequestMessage::User(_)));
        assert_eq!(req.max_completion_tokens, Some(16_384));
        assert_eq!(req.stream, Some(true));
        assert!(req.stream_options.is_some());
    }

    #[test]
    fn test_build_request_without_system() {
        let p = provider(Some("sk-test"));
        let request = CompletionRequest::from_prompts("", "Make a form", 512);
        let req = p.build_request(&request, false);
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.stream, None);
        assert_eq!(req.max_completion_tokens, Some(512));
    }

    #[tokio::test]
    async fn test_unconfigured_provider_refuses_calls() {
        let p = provider(None);
        let request = CompletionRequest::from_prompts("", "hi", 10);
        assert!(matches!(
            p.complete(&request).await,
            Err(ProviderError::Unauthenticated)
        ));
        let first = p.stream(request).next().await;
        assert!(matches!(first, Some(Err(ProviderError::Unauthenticated))));
    }
}
