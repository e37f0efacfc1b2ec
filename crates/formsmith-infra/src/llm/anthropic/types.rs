//! Anthropic Messages API types.
//!
//! These are Anthropic-specific request/response structures used for HTTP
//! communication with the Anthropic Messages API. They are NOT the generic
//! LLM types from formsmith-types -- those are provider-agnostic.

use serde::{Deserialize, Serialize};

use formsmith_types::error::ProviderError;

/// Request body for the Anthropic Messages API.
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// A single message in an Anthropic conversation.
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicMessage {
    pub role: String,
    pub content: String,
}

// ---------------------------------------------------------------------------
// SSE event payload structs
//
// The Anthropic SSE stream uses the `event:` field to name the event type
// (e.g., "message_start", "content_block_delta") and the `data:` field
// contains JSON. Each payload is deserialized into a specific struct based
// on the event type string.
// ---------------------------------------------------------------------------

/// Payload for `event: message_start`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageStartPayload {
    pub message: AnthropicMessageObj,
}

/// The message object inside a `message_start` event.
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicMessageObj {
    pub id: String,
    pub model: String,
    pub usage: Option<AnthropicUsage>,
}

/// A content block in an Anthropic response.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum AnthropicContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    /// Tool use, thinking, and any block type added later.
    #[serde(other)]
    Other,
}

/// Payload for `event: content_block_delta`.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentBlockDeltaPayload {
    pub index: u32,
    pub delta: AnthropicDelta,
}

/// Delta types within a content block. Only text matters here.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum AnthropicDelta {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

/// Payload for `event: message_delta`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageDeltaPayload {
    pub delta: MessageDeltaObj,
    #[serde(default)]
    pub usage: Option<AnthropicUsage>,
}

/// The delta object inside a `message_delta` event.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageDeltaObj {
    pub stop_reason: Option<String>,
}

/// Token usage from Anthropic.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnthropicUsage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

/// Payload for `event: error`, also the body of non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorPayload {
    pub error: AnthropicError,
}

/// An error from the Anthropic API.
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

impl AnthropicError {
    /// Map an in-stream error to the pipeline's provider error kinds.
    pub fn to_provider_error(&self) -> ProviderError {
        match self.error_type.as_str() {
            "authentication_error" | "permission_error" => ProviderError::Unauthenticated,
            "rate_limit_error" => ProviderError::RateLimited {
                retry_after_ms: None,
            },
            "overloaded_error" | "api_error" => ProviderError::unavailable(self.message.clone()),
            "timeout_error" => ProviderError::Timeout,
            _ => ProviderError::unknown(format!("{}: {}", self.error_type, self.message)),
        }
    }
}

/// Non-streaming response from the Anthropic Messages API.
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicNonStreamResponse {
    pub id: String,
    pub content: Vec<AnthropicContentBlock>,
    pub model: String,
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: AnthropicUsage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anthropic_request_serialization() {
        let req = AnthropicRequest {
            model: "claude-sonnet-4-5".to_string(),
            max_tokens: 1024,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: "Hello".to_string(),
            }],
            system: None,
            stream: false,
            temperature: Some(0.2),
        };

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["model"], "claude-sonnet-4-5");
        assert_eq!(json["max_tokens"], 1024);
        assert_eq!(json["stream"], false);
        assert!(json.get("system").is_none());
    }

    #[test]
    fn test_unknown_content_blocks_are_tolerated() {
        let json = r#"{"type": "tool_use", "id": "t1", "name": "calc", "input": {}}"#;
        let block: AnthropicContentBlock = serde_json::from_str(json).unwrap();
        assert!(matches!(block, AnthropicContentBlock::Other));

        let json = r#"{"type": "thinking_delta", "thinking": "hmm"}"#;
        let delta: AnthropicDelta = serde_json::from_str(json).unwrap();
        assert!(matches!(delta, AnthropicDelta::Other));
    }

    #[test]
    fn test_delta_text_deserialization() {
        let json = r#"{"index": 0, "delta": {"type": "text_delta", "text": "Hi"}}"#;
        let payload: ContentBlockDeltaPayload = serde_json::from_str(json).unwrap();
        match payload.delta {
            AnthropicDelta::TextDelta { text } => assert_eq!(text, "Hi"),
            _ => panic!("expected TextDelta variant"),
        }
    }

    #[test]
    fn test_error_mapping() {
        let err: ErrorPayload = serde_json::from_str(
            r#"{"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}"#,
        )
        .unwrap();
        assert_eq!(
            err.error.to_provider_error(),
            ProviderError::unavailable("Overloaded")
        );

        let auth = AnthropicError {
            error_type: "authentication_error".to_string(),
            message: "invalid x-api-key".to_string(),
        };
        assert_eq!(auth.to_provider_error(), ProviderError::Unauthenticated);
    }

    #[test]
    fn test_non_stream_response_deserialization() {
        let json = r#"{
            "id": "msg_456",
            "content": [{"type": "text", "text": "{\"sections\": []}"}],
            "model": "claude-sonnet-4-5",
            "stop_reason": "max_tokens",
            "usage": {"input_tokens": 50, "output_tokens": 20}
        }"#;
        let resp: AnthropicNonStreamResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.id, "msg_456");
        assert_eq!(resp.content.len(), 1);
        assert_eq!(resp.stop_reason.as_deref(), Some("max_tokens"));
        assert_eq!(resp.usage.output_tokens, 20);
    }
}
