//! Scripted provider used by unit tests across the crate.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use formsmith_types::error::ProviderError;
use formsmith_types::llm::{
    CompletionRequest, CompletionResponse, ProviderCapabilities, StopReason, StreamEvent, Usage,
};

use super::provider::{EventStream, LlmProvider};

/// What the provider does on one call.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    /// The whole text in one delta (or one complete response).
    Text(String),
    /// Several deltas, then `Done`.
    Chunks(Vec<String>),
    /// Several deltas, then `Done` with `max_tokens`.
    Truncated(String),
    /// One delta, then the stream stalls forever.
    Stall(String),
    /// Fail with a provider error.
    Fail(ProviderError),
    /// Never respond.
    Hang,
}

struct ReleaseFlag(Arc<AtomicBool>);

impl Drop for ReleaseFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

pub(crate) struct ScriptedProvider {
    name: String,
    capabilities: ProviderCapabilities,
    configured: bool,
    script: Mutex<VecDeque<Reply>>,
    repeat: Option<Reply>,
    pub calls: Arc<AtomicUsize>,
    pub released: Arc<AtomicBool>,
}

impl ScriptedProvider {
    /// Replies in order; once the script is empty, repeats the last reply.
    pub fn new(name: &str, replies: Vec<Reply>) -> Self {
        let repeat = replies.last().cloned();
        Self {
            name: name.to_string(),
            capabilities: ProviderCapabilities::default(),
            configured: true,
            script: Mutex::new(replies.into()),
            repeat,
            calls: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn always(name: &str, reply: Reply) -> Self {
        Self::new(name, vec![reply])
    }

    /// Use `complete` instead of `stream`.
    pub fn non_streaming(mut self) -> Self {
        self.capabilities.streaming = false;
        self
    }

    pub fn unconfigured(mut self) -> Self {
        self.configured = false;
        self
    }

    fn next_reply(&self) -> Reply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        script
            .pop_front()
            .or_else(|| self.repeat.clone())
            .unwrap_or(Reply::Hang)
    }
}

fn response(text: String, stop_reason: StopReason) -> CompletionResponse {
    CompletionResponse {
        content: text,
        model: "scripted".to_string(),
        stop_reason,
        usage: Usage::default(),
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    fn complete(
        &self,
        _request: &CompletionRequest,
    ) -> impl Future<Output = Result<CompletionResponse, ProviderError>> + Send {
        let reply = self.next_reply();
        async move {
            match reply {
                Reply::Text(text) | Reply::Stall(text) => Ok(response(text, StopReason::EndTurn)),
                Reply::Chunks(chunks) => Ok(response(chunks.concat(), StopReason::EndTurn)),
                Reply::Truncated(text) => Ok(response(text, StopReason::MaxTokens)),
                Reply::Fail(err) => Err(err),
                Reply::Hang => std::future::pending().await,
            }
        }
    }

    fn stream(&self, _request: CompletionRequest) -> EventStream {
        let reply = self.next_reply();
        let guard = ReleaseFlag(self.released.clone());
        Box::pin(async_stream::stream! {
            let _guard = guard;
            match reply {
                Reply::Text(text) => {
                    yield Ok(StreamEvent::TextDelta { text });
                    yield Ok(StreamEvent::Done { stop_reason: Some(StopReason::EndTurn), usage: None });
                }
                Reply::Chunks(chunks) => {
                    for text in chunks {
                        yield Ok(StreamEvent::TextDelta { text });
                    }
                    yield Ok(StreamEvent::Done { stop_reason: Some(StopReason::EndTurn), usage: None });
                }
                Reply::Truncated(text) => {
                    yield Ok(StreamEvent::TextDelta { text });
                    yield Ok(StreamEvent::Done { stop_reason: Some(StopReason::MaxTokens), usage: None });
                }
                Reply::Stall(text) => {
                    yield Ok(StreamEvent::TextDelta { text });
                    std::future::pending::<()>().await;
                }
                Reply::Fail(err) => {
                    yield Err::<StreamEvent, ProviderError>(err);
                }
                Reply::Hang => {
                    std::future::pending::<()>().await;
                }
            }
        })
    }
}
