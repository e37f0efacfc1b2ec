//! NDJSON progress-line provider.
//!
//! Talks to a local HTTP endpoint that streams newline-delimited JSON, one
//! progress object per line, in the shape of Ollama's `/api/chat`:
//!
//! ```text
//! {"message":{"role":"assistant","content":"{\"sec"},"done":false}
//! {"message":{"role":"assistant","content":"tions\""},"done":false}
//! {"done":true,"done_reason":"stop","prompt_eval_count":42,"eval_count":310}
//! ```
//!
//! An `{"error": "..."}` line fails the stream. Local endpoints need no key.

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use formsmith_core::llm::provider::{EventStream, LlmProvider};
use formsmith_core::pipeline::lines::ndjson_events;
use formsmith_types::error::ProviderError;
use formsmith_types::llm::{
    CompletionRequest, CompletionResponse, MessageRole, ProviderCapabilities, StopReason,
    StreamEvent, Usage,
};

use super::http::{build_client, check_status, map_reqwest_error};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatOptions {
    num_predict: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

/// One progress line (or the whole body, when not streaming).
#[derive(Debug, Clone, Deserialize)]
struct ChatLine {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    message: Option<ChatMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    error: Option<String>,
}

impl ChatLine {
    fn usage(&self) -> Option<Usage> {
        match (self.prompt_eval_count, self.eval_count) {
            (None, None) => None,
            (input, output) => Some(Usage {
                input_tokens: input.unwrap_or(0),
                output_tokens: output.unwrap_or(0),
            }),
        }
    }

    fn stop_reason(&self) -> Option<StopReason> {
        self.done_reason.as_deref().and_then(|r| r.parse().ok())
    }
}

/// Parse one NDJSON progress line into a stream event.
fn parse_chat_line(line: &str) -> Result<Option<StreamEvent>, ProviderError> {
    let parsed: ChatLine = serde_json::from_str(line)
        .map_err(|e| ProviderError::unknown(format!("malformed progress line: {e}")))?;

    if let Some(error) = parsed.error {
        return Err(ProviderError::unavailable(error));
    }
    if parsed.done {
        // The final line's message is always empty.
        return Ok(Some(StreamEvent::Done {
            stop_reason: parsed.stop_reason(),
            usage: parsed.usage(),
        }));
    }
    match parsed.message {
        Some(message) if !message.content.is_empty() => {
            Ok(Some(StreamEvent::TextDelta { text: message.content }))
        }
        _ => Ok(None),
    }
}

/// Provider for local NDJSON-streaming endpoints.
pub struct NdjsonProvider {
    client: reqwest::Client,
    name: String,
    base_url: String,
    model: String,
    temperature: Option<f64>,
    capabilities: ProviderCapabilities,
}

impl NdjsonProvider {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client()?,
            name: name.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            temperature: None,
            capabilities: ProviderCapabilities::default(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f64>) -> Self {
        self.temperature = temperature;
        self
    }

    fn url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn to_chat_request(&self, request: &CompletionRequest, stream: bool) -> ChatRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: MessageRole::System.to_string(),
                content: system.clone(),
            });
        }
        messages.extend(request.messages.iter().map(|m| ChatMessage {
            role: m.role.to_string(),
            content: m.content.clone(),
        }));

        ChatRequest {
            model: if request.model.is_empty() {
                self.model.clone()
            } else {
                request.model.clone()
            },
            messages,
            stream,
            options: ChatOptions {
                num_predict: request.max_tokens,
                temperature: request.temperature.or(self.temperature),
            },
        }
    }
}

impl LlmProvider for NdjsonProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let body = self.to_chat_request(request, false);
        let response = self
            .client
            .post(self.url())
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let response = check_status(response).await?;

        let line: ChatLine = response
            .json()
            .await
            .map_err(|e| ProviderError::unknown(format!("failed to parse response: {e}")))?;
        if let Some(error) = line.error.clone() {
            return Err(ProviderError::unavailable(error));
        }

        Ok(CompletionResponse {
            stop_reason: line.stop_reason().unwrap_or(StopReason::EndTurn),
            usage: line.usage().unwrap_or_default(),
            model: line.model.clone().unwrap_or_else(|| self.model.clone()),
            content: line.message.map(|m| m.content).unwrap_or_default(),
        })
    }

    fn stream(&self, request: CompletionRequest) -> EventStream {
        let body = self.to_chat_request(&request, true);
        let client = self.client.clone();
        let url = self.url();

        Box::pin(async_stream::try_stream! {
            let response = client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(map_reqwest_error)?;
            let response = check_status(response).await?;

            let bytes = response.bytes_stream().map(|chunk| chunk.map_err(map_reqwest_error));
            let mut events = ndjson_events(bytes, parse_chat_line);
            while let Some(event) = events.next().await {
                yield event?;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress_lines() {
        let delta = parse_chat_line(
            r#"{"model":"llama3","message":{"role":"assistant","content":"{\"a\""},"done":false}"#,
        )
        .unwrap();
        assert_eq!(
            delta,
            Some(StreamEvent::TextDelta {
                text: "{\"a\"".to_string()
            })
        );

        let empty = parse_chat_line(r#"{"message":{"role":"assistant","content":""},"done":false}"#)
            .unwrap();
        assert_eq!(empty, None);

        let done = parse_chat_line(
            r#"{"done":true,"done_reason":"length","prompt_eval_count":42,"eval_count":310}"#,
        )
        .unwrap();
        assert_eq!(
            done,
            Some(StreamEvent::Done {
                stop_reason: Some(StopReason::MaxTokens),
                usage: Some(Usage {
                    input_tokens: 42,
                    output_tokens: 310
                }),
            })
        );
    }

    #[test]
    fn test_error_line_fails() {
        let err = parse_chat_line(r#"{"error":"model 'nope' not found"}"#).unwrap_err();
        assert_eq!(err, ProviderError::unavailable("model 'nope' not found"));
        assert!(matches!(
            parse_chat_line("not json").unwrap_err(),
            ProviderError::Unknown { .. }
        ));
    }

    #[test]
    fn test_chat_request_shape() {
        let provider = NdjsonProvider::new("local", "llama3")
            .unwrap()
            .with_base_url("http://127.0.0.1:11434/")
            .with_temperature(Some(0.1));
        assert_eq!(provider.url(), "http://127.0.0.1:11434/api/chat");

        let request = CompletionRequest::from_prompts("Return JSON.", "Make a form", 2048);
        let body = serde_json::to_value(provider.to_chat_request(&request, true)).unwrap();
        assert_eq!(body["model"], "llama3");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Make a form");
        assert_eq!(body["options"]["num_predict"], 2048);
        assert_eq!(body["options"]["temperature"], 0.1);
    }

    #[test]
    fn test_local_provider_needs_no_key() {
        let provider = NdjsonProvider::new("local", "llama3").unwrap();
        assert!(provider.is_configured());
        assert_eq!(provider.name(), "local");
    }
}
