//! OpenAI SSE stream to [`StreamEvent`] adapter.
//!
//! Maps `async-openai`'s [`ChatCompletionResponseStream`] chunks to the
//! provider-agnostic [`StreamEvent`] enum defined in `formsmith-types`.
//! The finish reason and usage arrive on separate chunks, so both are held
//! until the stream ends and emitted together in `Done`.

use futures_util::StreamExt;

use async_openai::types::chat::{ChatCompletionResponseStream, FinishReason};

use formsmith_core::llm::provider::EventStream;
use formsmith_types::error::ProviderError;
use formsmith_types::llm::{StopReason, StreamEvent, Usage};

use super::map_openai_error;

/// Map an OpenAI finish reason to a [`StopReason`].
pub fn stop_reason_for(reason: &FinishReason) -> StopReason {
    match reason {
        FinishReason::Stop => StopReason::EndTurn,
        FinishReason::Length => StopReason::MaxTokens,
        _ => StopReason::Other,
    }
}

/// Map an async-openai [`ChatCompletionResponseStream`] to an [`EventStream`].
pub fn map_openai_stream(stream: ChatCompletionResponseStream) -> EventStream {
    Box::pin(async_stream::try_stream! {
        let mut stream = stream;
        let mut stop_reason: Option<StopReason> = None;
        let mut usage: Option<Usage> = None;

        while let Some(result) = stream.next().await {
            let chunk = result.map_err(map_openai_error)?;

            // Present on the final chunk when stream_options.include_usage is set.
            if let Some(u) = &chunk.usage {
                usage = Some(Usage {
                    input_tokens: u.prompt_tokens,
                    output_tokens: u.completion_tokens,
                });
            }

            for choice in &chunk.choices {
                if let Some(text) = &choice.delta.content {
                    if !text.is_empty() {
                        yield StreamEvent::TextDelta { text: text.clone() };
                    }
                }
                if let Some(reason) = &choice.finish_reason {
                    stop_reason = Some(stop_reason_for(reason));
                }
            }
        }

        yield StreamEvent::Done { stop_reason, usage };
    })
}

/// Errors from the stream itself carry no status code.
pub(super) fn stream_error(message: impl Into<String>) -> ProviderError {
    ProviderError::unavailable(format!("stream error: {}", message.into()))
}
