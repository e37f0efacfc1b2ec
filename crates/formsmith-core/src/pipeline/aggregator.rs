//! Response aggregation for one provider attempt.
//!
//! Accepts either a complete payload or an event stream, accumulates the text,
//! and emits progress notifications. Cancellation stops reading immediately
//! and drops the underlying stream; no notification is sent after it fires.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use formsmith_types::error::ProviderError;
use formsmith_types::generation::ProgressUpdate;
use formsmith_types::llm::{CompletionResponse, StopReason, StreamEvent, Usage};

use super::buffer::RawResponseBuffer;
use crate::llm::provider::EventStream;

/// The two response shapes a provider can hand back.
pub enum ResponseSource {
    /// A single payload returned by a non-streaming call.
    Complete(CompletionResponse),
    /// Incremental events terminated by `Done` or end of stream.
    Events(EventStream),
}

impl std::fmt::Debug for ResponseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseSource::Complete(resp) => f
                .debug_tuple("Complete")
                .field(&resp.content.len())
                .finish(),
            ResponseSource::Events(_) => f.debug_tuple("Events").field(&"<stream>").finish(),
        }
    }
}

/// Full text of one attempt plus whatever terminal metadata arrived.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedResponse {
    pub text: String,
    pub stop_reason: Option<StopReason>,
    pub usage: Option<Usage>,
    pub chunks: usize,
}

/// Why aggregation stopped early. Every variant keeps the partial text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AggregateError {
    #[error("provider stream failed: {error}")]
    Provider { error: ProviderError, partial: String },

    #[error("aggregation cancelled")]
    Cancelled { partial: String },

    #[error("progress consumer disconnected")]
    Disconnected { partial: String },
}

impl AggregateError {
    pub fn partial(&self) -> &str {
        match self {
            AggregateError::Provider { partial, .. }
            | AggregateError::Cancelled { partial }
            | AggregateError::Disconnected { partial } => partial,
        }
    }
}

/// Reads one attempt's response under a cancellation token.
pub struct ResponseAggregator<'a> {
    cancel: &'a CancellationToken,
    progress: Option<&'a mpsc::Sender<ProgressUpdate>>,
    provider: &'a str,
    attempt: u32,
}

impl<'a> ResponseAggregator<'a> {
    pub fn new(cancel: &'a CancellationToken, provider: &'a str, attempt: u32) -> Self {
        Self {
            cancel,
            progress: None,
            provider,
            attempt,
        }
    }

    /// Send progress notifications to `sender` while streaming.
    pub fn with_progress(mut self, sender: Option<&'a mpsc::Sender<ProgressUpdate>>) -> Self {
        self.progress = sender;
        self
    }

    pub async fn aggregate(
        &self,
        source: ResponseSource,
    ) -> Result<AggregatedResponse, AggregateError> {
        let mut stream = match source {
            ResponseSource::Complete(response) => {
                if self.cancel.is_cancelled() {
                    return Err(AggregateError::Cancelled {
                        partial: String::new(),
                    });
                }
                return Ok(AggregatedResponse {
                    text: response.content,
                    stop_reason: Some(response.stop_reason),
                    usage: Some(response.usage),
                    chunks: 1,
                });
            }
            ResponseSource::Events(stream) => stream,
        };

        let mut buffer = RawResponseBuffer::new();
        let mut stop_reason = None;
        let mut usage = None;

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    drop(stream);
                    tracing::debug!(
                        provider = %self.provider,
                        attempt = self.attempt,
                        received = buffer.as_str().len(),
                        "stream cancelled, reader released"
                    );
                    return Err(AggregateError::Cancelled {
                        partial: buffer.into_text(),
                    });
                }
                item = stream.next() => item,
            };

            match next {
                None => break,
                Some(Ok(StreamEvent::TextDelta { text })) => {
                    buffer.push(&text);
                    if !self.notify(&buffer) {
                        drop(stream);
                        return Err(AggregateError::Disconnected {
                            partial: buffer.into_text(),
                        });
                    }
                }
                Some(Ok(StreamEvent::Done {
                    stop_reason: reason,
                    usage: reported,
                })) => {
                    stop_reason = reason;
                    usage = reported;
                    break;
                }
                Some(Err(error)) => {
                    return Err(AggregateError::Provider {
                        error,
                        partial: buffer.into_text(),
                    });
                }
            }
        }

        let chunks = buffer.chunks();
        Ok(AggregatedResponse {
            text: buffer.into_text(),
            stop_reason,
            usage,
            chunks,
        })
    }

    /// Fire-and-forget progress. Returns `false` if the consumer has gone away.
    fn notify(&self, buffer: &RawResponseBuffer) -> bool {
        let Some(sender) = self.progress else {
            return true;
        };
        let update = ProgressUpdate {
            provider: self.provider.to_string(),
            attempt: self.attempt,
            chars_received: buffer.char_count(),
            chunks: buffer.chunks(),
        };
        match sender.try_send(update) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::trace!(provider = %self.provider, "progress channel full, update dropped");
                true
            }
            Err(TrySendError::Closed(_)) => {
                tracing::info!(provider = %self.provider, "progress consumer disconnected");
                false
            }
        }
    }
}
