//! LlmProvider trait definition.
//!
//! This is the capability every provider collaborator implements.
//! Uses RPITIT for `complete` and `Pin<Box<dyn Stream>>` for `stream`
//! (streams need to be object-safe for the BoxLlmProvider wrapper).

use std::pin::Pin;

use futures_util::Stream;

use formsmith_types::error::ProviderError;
use formsmith_types::llm::{
    CompletionRequest, CompletionResponse, ProviderCapabilities, StreamEvent,
};

/// Boxed stream of provider events.
pub type EventStream =
    Pin<Box<dyn Stream<Item = Result<StreamEvent, ProviderError>> + Send + 'static>>;

/// Trait for LLM provider backends (Anthropic, OpenAI-compatible, NDJSON).
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition) for
/// `complete`. The `stream` method returns a boxed stream because streams
/// need to be object-safe for `BoxLlmProvider`.
///
/// Implementations live in formsmith-infra.
pub trait LlmProvider: Send + Sync {
    /// Provider name as used in cascade lists (e.g., "claude", "local").
    fn name(&self) -> &str;

    /// What this provider supports.
    fn capabilities(&self) -> &ProviderCapabilities;

    /// Whether the provider has everything it needs to make a call.
    ///
    /// Providers built without a credential return `false` and are skipped
    /// by the cascade instead of being called.
    fn is_configured(&self) -> bool {
        true
    }

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, ProviderError>> + Send;

    /// Send a streaming completion request. Returns a stream of events
    /// terminated by `StreamEvent::Done` (or by the stream simply ending).
    fn stream(&self, request: CompletionRequest) -> EventStream;
}
