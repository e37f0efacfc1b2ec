//! SSE stream creation and state machine for Anthropic Messages API.
//!
//! Implements the streaming protocol described in the Anthropic docs:
//! 1. `message_start` -- Message object with initial usage
//! 2. Per block: `content_block_start` -> N x `content_block_delta` -> `content_block_stop`
//! 3. `message_delta` -- stop_reason and cumulative usage
//! 4. `message_stop` -- final event
//! 5. `ping` events may appear anywhere (keepalive)
//! 6. `error` events may appear mid-stream
//!
//! Only text deltas are forwarded; the stop reason and usage are folded
//! into the terminal `Done` event.

use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};

use formsmith_core::llm::provider::EventStream;
use formsmith_types::error::ProviderError;
use formsmith_types::llm::{StopReason, StreamEvent, Usage};

use super::types::{
    AnthropicRequest, ContentBlockDeltaPayload, AnthropicDelta, ErrorPayload, MessageDeltaPayload,
    MessageStartPayload,
};
use crate::llm::http::{check_status, map_reqwest_error};

/// Folds Anthropic SSE events into provider-agnostic [`StreamEvent`]s.
#[derive(Debug, Default)]
pub struct SseState {
    stop_reason: Option<StopReason>,
    usage: Usage,
    finished: bool,
}

impl SseState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Handle one SSE event. Returns the event to forward, if any.
    pub fn handle(&mut self, event: &str, data: &str) -> Result<Option<StreamEvent>, ProviderError> {
        match event {
            "message_start" => {
                let payload: MessageStartPayload = parse(event, data)?;
                if let Some(usage) = payload.message.usage {
                    self.usage.input_tokens = usage.input_tokens;
                }
                tracing::trace!(message_id = %payload.message.id, model = %payload.message.model, "stream started");
                Ok(None)
            }
            "content_block_delta" => {
                let payload: ContentBlockDeltaPayload = parse(event, data)?;
                match payload.delta {
                    AnthropicDelta::TextDelta { text } if !text.is_empty() => {
                        Ok(Some(StreamEvent::TextDelta { text }))
                    }
                    _ => Ok(None),
                }
            }
            "message_delta" => {
                let payload: MessageDeltaPayload = parse(event, data)?;
                if let Some(reason) = payload.delta.stop_reason.as_deref() {
                    self.stop_reason = reason.parse().ok();
                }
                if let Some(usage) = payload.usage {
                    self.usage.output_tokens = usage.output_tokens;
                }
                Ok(None)
            }
            "message_stop" => {
                self.finished = true;
                Ok(Some(StreamEvent::Done {
                    stop_reason: self.stop_reason.clone(),
                    usage: Some(self.usage.clone()),
                }))
            }
            "error" => {
                let payload: ErrorPayload = parse(event, data)?;
                Err(payload.error.to_provider_error())
            }
            // ping, content_block_start, content_block_stop, and future events
            _ => Ok(None),
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(event: &str, data: &str) -> Result<T, ProviderError> {
    serde_json::from_str(data)
        .map_err(|e| ProviderError::unknown(format!("malformed '{event}' event: {e}")))
}

/// Create a streaming SSE connection to the Anthropic Messages API.
///
/// The request is sent when the stream is first polled. Dropping the stream
/// drops the HTTP response and closes the connection.
pub fn create_anthropic_stream(
    client: reqwest::Client,
    url: String,
    body: AnthropicRequest,
    api_key: SecretString,
    api_version: &'static str,
) -> EventStream {
    Box::pin(async_stream::try_stream! {
        let response = client
            .post(&url)
            .header("x-api-key", api_key.expose_secret())
            .header("anthropic-version", api_version)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let response = check_status(response).await?;

        let mut events = response.bytes_stream().eventsource();
        let mut state = SseState::new();

        while let Some(event) = events.next().await {
            let event = event
                .map_err(|e| ProviderError::unavailable(format!("SSE stream error: {e}")))?;
            if let Some(stream_event) = state.handle(&event.event, &event.data)? {
                yield stream_event;
            }
            if state.is_finished() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_machine_happy_path() {
        let mut state = SseState::new();
        let events = [
            ("message_start", r#"{"type":"message_start","message":{"id":"msg_1","model":"claude","usage":{"input_tokens":12,"output_tokens":1}}}"#),
            ("content_block_start", r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#),
            ("ping", r#"{"type":"ping"}"#),
            ("content_block_delta", r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"{\"sec"}}"#),
            ("content_block_delta", r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"tions\":[]}"}}"#),
            ("content_block_stop", r#"{"type":"content_block_stop","index":0}"#),
            ("message_delta", r#"{"type":"message_delta","delta":{"stop_reason":"max_tokens"},"usage":{"output_tokens":40}}"#),
        ];

        let mut text = String::new();
        for (event, data) in events {
            if let Some(StreamEvent::TextDelta { text: t }) = state.handle(event, data).unwrap() {
                text.push_str(&t);
            }
        }
        assert_eq!(text, "{\"sections\":[]}");
        assert!(!state.is_finished());

        let done = state.handle("message_stop", r#"{"type":"message_stop"}"#).unwrap();
        assert_eq!(
            done,
            Some(StreamEvent::Done {
                stop_reason: Some(StopReason::MaxTokens),
                usage: Some(Usage {
                    input_tokens: 12,
                    output_tokens: 40
                }),
            })
        );
        assert!(state.is_finished());
    }

    #[test]
    fn test_error_event_maps_to_provider_error() {
        let mut state = SseState::new();
        let err = state
            .handle(
                "error",
                r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
            )
            .unwrap_err();
        assert_eq!(err, ProviderError::unavailable("Overloaded"));
    }

    #[test]
    fn test_malformed_payload_is_unknown_error() {
        let mut state = SseState::new();
        let err = state.handle("content_block_delta", "{not json").unwrap_err();
        assert!(matches!(err, ProviderError::Unknown { .. }));
    }
}
