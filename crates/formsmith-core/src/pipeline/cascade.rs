//! Provider cascade orchestrator.
//!
//! Tries providers in order. Each provider gets `max_retries + 1` attempts
//! with exponential backoff between them. The first attempt whose output
//! survives extraction, repair, and validation wins. Attempts run strictly
//! one at a time; all per-attempt errors stay inside the attempt log.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use formsmith_types::document::GeneratedDocument;
use formsmith_types::error::{GenerationError, ProviderError};
use formsmith_types::generation::{
    AttemptOutcome, GenerationOptions, GenerationRequest, GenerationResult, ProgressUpdate,
    ProviderAttempt,
};
use formsmith_types::llm::{CompletionRequest, StopReason};

use super::aggregator::{AggregateError, ResponseAggregator, ResponseSource};
use super::backoff::BackoffPolicy;
use super::{process_response, ProcessedDocument};
use crate::llm::box_provider::BoxLlmProvider;
use crate::llm::registry::{Lookup, ProviderRegistry};
use crate::template::{PromptTemplate, RenderedPrompt};

/// How one attempt ended, before it is written to the log.
enum AttemptStep {
    Valid {
        processed: ProcessedDocument,
        raw_text: String,
    },
    Failed {
        error: GenerationError,
        raw_text: String,
    },
    /// The attempt's token fired: caller cancellation, a provider timeout,
    /// or the overall deadline.
    Interrupted { raw_text: String },
    /// The progress consumer went away mid-stream.
    Disconnected { raw_text: String },
}

/// Why the cascade stopped between attempts.
enum Interrupt {
    Cancelled,
    Deadline,
}

/// Timing for one attempt in flight.
struct AttemptClock {
    provider: String,
    attempt: u32,
    started_at: DateTime<Utc>,
    started: Instant,
    backoff_ms: u64,
}

impl AttemptClock {
    fn start(provider: &str, attempt: u32, backoff_ms: u64) -> Self {
        Self {
            provider: provider.to_string(),
            attempt,
            started_at: Utc::now(),
            started: Instant::now(),
            backoff_ms,
        }
    }

    fn finish(self, outcome: AttemptOutcome, raw_text: String) -> ProviderAttempt {
        let attempt = ProviderAttempt {
            provider: self.provider,
            attempt: self.attempt,
            started_at: self.started_at,
            outcome,
            raw_text,
            duration_ms: self.started.elapsed().as_millis() as u64,
            backoff_ms: self.backoff_ms,
        };
        match &attempt.outcome {
            AttemptOutcome::Success => tracing::info!(
                provider = %attempt.provider,
                attempt = attempt.attempt,
                duration_ms = attempt.duration_ms,
                backoff_ms = attempt.backoff_ms,
                outcome = "success",
                "attempt finished"
            ),
            AttemptOutcome::Error { error } => tracing::warn!(
                provider = %attempt.provider,
                attempt = attempt.attempt,
                duration_ms = attempt.duration_ms,
                backoff_ms = attempt.backoff_ms,
                outcome = "error",
                error = %error,
                raw_len = attempt.raw_text.len(),
                "attempt failed"
            ),
            other => tracing::warn!(
                provider = %attempt.provider,
                attempt = attempt.attempt,
                duration_ms = attempt.duration_ms,
                backoff_ms = attempt.backoff_ms,
                outcome = other.label(),
                "attempt interrupted"
            ),
        }
        attempt
    }
}

/// Everything one attempt needs.
struct AttemptContext<'a> {
    provider: &'a BoxLlmProvider,
    name: &'a str,
    attempt: u32,
    prompt: &'a RenderedPrompt,
    options: &'a GenerationOptions,
    progress: Option<&'a mpsc::Sender<ProgressUpdate>>,
}

/// Runs one generation request across the provider cascade.
pub struct CascadeOrchestrator {
    registry: Arc<ProviderRegistry>,
    template: Arc<dyn PromptTemplate>,
    fallback: GeneratedDocument,
}

impl CascadeOrchestrator {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        template: Arc<dyn PromptTemplate>,
        fallback: GeneratedDocument,
    ) -> Self {
        Self {
            registry,
            template,
            fallback,
        }
    }

    /// Generate a document, falling back across providers.
    ///
    /// Never fails: every error ends up in the attempt log, and a `Failure`
    /// always carries the fallback document.
    #[tracing::instrument(
        name = "generate",
        skip_all,
        fields(request_id = %request.request_id, providers = request.providers.len())
    )]
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        options: &GenerationOptions,
        cancel: &CancellationToken,
        progress: Option<mpsc::Sender<ProgressUpdate>>,
    ) -> GenerationResult {
        let prompt = match self.template.render(&request.context) {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::error!(error = %e, "prompt template unavailable");
                return self.failure(
                    GenerationError::configuration_missing(e.to_string()),
                    Vec::new(),
                );
            }
        };
        if request.providers.is_empty() {
            return self.failure(
                GenerationError::configuration_missing("no providers listed"),
                Vec::new(),
            );
        }

        // Child token: a disconnected consumer cancels this request only.
        let cancel = cancel.child_token();
        let deadline = Instant::now() + options.overall_deadline();
        let policy = BackoffPolicy::from(options);
        let mut attempts: Vec<ProviderAttempt> = Vec::new();
        let mut last_error: Option<GenerationError> = None;

        for name in &request.providers {
            let lookup = self.registry.lookup(name);
            let provider = match lookup {
                Lookup::Ready(provider) => provider,
                _ => {
                    let reason = lookup.skip_reason().unwrap_or("unavailable");
                    tracing::warn!(provider = %name, outcome = "skipped", reason, "provider skipped");
                    attempts.push(ProviderAttempt::skipped(name, reason));
                    continue;
                }
            };

            let mut backoff_ms = 0u64;
            for attempt in 1..=options.attempts_per_provider() {
                if let Err(stop) = wait_backoff(backoff_ms, deadline, &cancel).await {
                    return self.interrupted(stop, options, attempts);
                }

                let ctx = AttemptContext {
                    provider,
                    name,
                    attempt,
                    prompt: &prompt,
                    options,
                    progress: progress.as_ref(),
                };
                let clock = AttemptClock::start(name, attempt, backoff_ms);
                let attempt_cancel = cancel.child_token();
                let attempt_deadline = deadline.min(Instant::now() + options.per_provider_timeout());

                let span = tracing::info_span!("provider_attempt", provider = %name, attempt);
                let run = run_attempt(&ctx, &attempt_cancel).instrument(span);
                tokio::pin!(run);
                let step = tokio::select! {
                    biased;
                    step = &mut run => step,
                    _ = tokio::time::sleep_until(attempt_deadline) => {
                        attempt_cancel.cancel();
                        run.await
                    }
                };

                match step {
                    AttemptStep::Valid {
                        processed,
                        raw_text,
                    } => {
                        attempts.push(clock.finish(AttemptOutcome::Success, raw_text));
                        return GenerationResult::Success {
                            document: processed.document,
                            provider_used: name.clone(),
                            attempts,
                            warnings: processed.warnings,
                        };
                    }
                    AttemptStep::Failed { error, raw_text } => {
                        let unauthenticated = matches!(
                            error,
                            GenerationError::Provider {
                                error: ProviderError::Unauthenticated
                            }
                        );
                        let hint = match &error {
                            GenerationError::Provider {
                                error: ProviderError::RateLimited { retry_after_ms },
                            } => *retry_after_ms,
                            _ => None,
                        };
                        attempts.push(clock.finish(
                            AttemptOutcome::Error {
                                error: error.clone(),
                            },
                            raw_text,
                        ));
                        last_error = Some(error);
                        if unauthenticated {
                            tracing::warn!(provider = %name, "credentials rejected, moving to next provider");
                            break;
                        }
                        backoff_ms = policy.delay_with_hint(attempt, hint).max(backoff_ms);
                    }
                    AttemptStep::Interrupted { raw_text } => {
                        if cancel.is_cancelled() {
                            attempts.push(clock.finish(AttemptOutcome::Cancelled, raw_text));
                            return self.failure(GenerationError::Cancelled, attempts);
                        }
                        attempts.push(clock.finish(AttemptOutcome::Timeout, raw_text));
                        if Instant::now() >= deadline {
                            return self.interrupted(Interrupt::Deadline, options, attempts);
                        }
                        last_error = Some(ProviderError::Timeout.into());
                        backoff_ms = policy.delay_after(attempt).max(backoff_ms);
                    }
                    AttemptStep::Disconnected { raw_text } => {
                        cancel.cancel();
                        attempts.push(clock.finish(AttemptOutcome::Cancelled, raw_text));
                        return self.failure(GenerationError::Cancelled, attempts);
                    }
                }
            }
        }

        if !attempts.iter().any(ProviderAttempt::was_called) {
            return self.failure(
                GenerationError::configuration_missing(format!(
                    "none of the listed providers is configured: {}",
                    request.providers.join(", ")
                )),
                attempts,
            );
        }

        let called = attempts.iter().filter(|a| a.was_called()).count();
        let last_error = last_error.map(|e| e.to_string()).unwrap_or_default();
        tracing::error!(attempts = called, last_error = %last_error, "all providers exhausted");
        self.failure(
            GenerationError::Exhausted {
                attempts: called,
                last_error,
            },
            attempts,
        )
    }

    fn interrupted(
        &self,
        stop: Interrupt,
        options: &GenerationOptions,
        attempts: Vec<ProviderAttempt>,
    ) -> GenerationResult {
        match stop {
            Interrupt::Cancelled => {
                tracing::info!("generation cancelled");
                self.failure(GenerationError::Cancelled, attempts)
            }
            Interrupt::Deadline => {
                tracing::warn!(deadline_ms = options.overall_deadline_ms, "overall deadline exceeded");
                self.failure(
                    GenerationError::DeadlineExceeded {
                        deadline_ms: options.overall_deadline_ms,
                    },
                    attempts,
                )
            }
        }
    }

    fn failure(&self, error: GenerationError, attempts: Vec<ProviderAttempt>) -> GenerationResult {
        GenerationResult::Failure {
            error,
            attempts,
            fallback_document: self.fallback.clone(),
        }
    }
}

/// Sleep out the backoff unless the request is cancelled or out of time.
async fn wait_backoff(
    delay_ms: u64,
    deadline: Instant,
    cancel: &CancellationToken,
) -> Result<(), Interrupt> {
    if cancel.is_cancelled() {
        return Err(Interrupt::Cancelled);
    }
    if Instant::now() >= deadline {
        return Err(Interrupt::Deadline);
    }
    if delay_ms == 0 {
        return Ok(());
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupt::Cancelled),
        _ = tokio::time::sleep_until(deadline) => Err(Interrupt::Deadline),
        _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => Ok(()),
    }
}

/// Call the provider, aggregate its output, and run it through the pipeline.
async fn run_attempt(ctx: &AttemptContext<'_>, cancel: &CancellationToken) -> AttemptStep {
    let request = CompletionRequest::from_prompts(
        &ctx.prompt.system,
        &ctx.prompt.user,
        ctx.options.max_tokens,
    );

    let source = if ctx.provider.capabilities().streaming {
        ResponseSource::Events(ctx.provider.stream(request))
    } else {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return AttemptStep::Interrupted { raw_text: String::new() };
            }
            result = ctx.provider.complete(&request) => match result {
                Ok(response) => ResponseSource::Complete(response),
                Err(error) => {
                    return AttemptStep::Failed { error: error.into(), raw_text: String::new() };
                }
            },
        }
    };

    let aggregated = match ResponseAggregator::new(cancel, ctx.name, ctx.attempt)
        .with_progress(ctx.progress)
        .aggregate(source)
        .await
    {
        Ok(aggregated) => aggregated,
        Err(AggregateError::Provider { error, partial }) => {
            return AttemptStep::Failed {
                error: error.into(),
                raw_text: partial,
            };
        }
        Err(AggregateError::Cancelled { partial }) => {
            return AttemptStep::Interrupted { raw_text: partial };
        }
        Err(AggregateError::Disconnected { partial }) => {
            return AttemptStep::Disconnected { raw_text: partial };
        }
    };

    let hit_token_limit = aggregated.stop_reason == Some(StopReason::MaxTokens);
    if hit_token_limit {
        tracing::warn!(
            received = aggregated.text.len(),
            "response stopped at the token limit, output is likely truncated"
        );
    }

    match process_response(&aggregated.text, &ctx.options.bounds) {
        Ok(mut processed) => {
            if hit_token_limit {
                processed
                    .warnings
                    .insert(0, "response stopped at the token limit".to_string());
            }
            AttemptStep::Valid {
                processed,
                raw_text: aggregated.text,
            }
        }
        Err(error) => {
            tracing::debug!(
                content_preview = %aggregated.text.chars().take(200).collect::<String>(),
                "response unusable"
            );
            AttemptStep::Failed {
                error,
                raw_text: aggregated.text,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use crate::llm::mock::{Reply, ScriptedProvider};
    use crate::llm::provider::LlmProvider;
    use crate::template::InlineTemplate;
    use formsmith_types::error::TemplateError;

    const VALID: &str = r#"Here is your form:
```json
{"sections":[{"id":"s1","title":"Intro","questions":[{"id":"q1","label":"Name","type":"text"}]}]}
```"#;

    struct MissingTemplate;

    impl PromptTemplate for MissingTemplate {
        fn render(
            &self,
            _context: &serde_json::Map<String, serde_json::Value>,
        ) -> Result<RenderedPrompt, TemplateError> {
            Err(TemplateError::Missing("questionnaire".to_string()))
        }
    }

    fn fast_options(max_retries: u32) -> GenerationOptions {
        GenerationOptions {
            max_retries,
            base_backoff_ms: 2,
            max_backoff_ms: 8,
            per_provider_timeout_ms: 5_000,
            overall_deadline_ms: 10_000,
            ..GenerationOptions::default()
        }
    }

    /// Registers providers and returns their call counters, in order.
    fn orchestrator(
        providers: Vec<ScriptedProvider>,
    ) -> (CascadeOrchestrator, Vec<Arc<std::sync::atomic::AtomicUsize>>) {
        let mut registry = ProviderRegistry::new();
        let mut counters = Vec::new();
        for provider in providers {
            counters.push(provider.calls.clone());
            let name = provider.name().to_string();
            registry.register(name, BoxLlmProvider::new(provider));
        }
        let orchestrator = CascadeOrchestrator::new(
            Arc::new(registry),
            Arc::new(InlineTemplate::new("system", "Make a {{topic}} form")),
            crate::fallback::builtin_fallback_document(),
        );
        (orchestrator, counters)
    }

    fn request(providers: &[&str]) -> GenerationRequest {
        let context = serde_json::json!({"topic": "onboarding"})
            .as_object()
            .unwrap()
            .clone();
        GenerationRequest::new(context, providers.iter().map(|p| p.to_string()).collect())
    }

    fn unavailable() -> Reply {
        Reply::Fail(ProviderError::unavailable("503 overloaded"))
    }

    #[tokio::test]
    async fn test_first_valid_result_short_circuits() {
        let (orch, calls) = orchestrator(vec![
            ScriptedProvider::always("primary", Reply::Text(VALID.to_string())),
            ScriptedProvider::always("secondary", Reply::Text(VALID.to_string())),
        ]);
        let result = orch
            .generate(&request(&["primary", "secondary"]), &fast_options(2), &CancellationToken::new(), None)
            .await;

        match &result {
            GenerationResult::Success {
                provider_used,
                attempts,
                document,
                ..
            } => {
                assert_eq!(provider_used, "primary");
                assert_eq!(attempts.len(), 1);
                assert_eq!(attempts[0].outcome, AttemptOutcome::Success);
                assert_eq!(document.question_count(), 1);
            }
            other => panic!("expected success, got {other:?}"),
        }
        assert_eq!(calls[0].load(Ordering::SeqCst), 1);
        assert_eq!(calls[1].load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failing_provider_attempted_retries_plus_one() {
        let (orch, calls) = orchestrator(vec![
            ScriptedProvider::always("flaky", unavailable()),
            ScriptedProvider::always("backup", Reply::Text(VALID.to_string())),
        ]);
        let result = orch
            .generate(&request(&["flaky", "backup"]), &fast_options(3), &CancellationToken::new(), None)
            .await;

        assert!(result.is_success());
        assert_eq!(calls[0].load(Ordering::SeqCst), 4);
        assert_eq!(calls[1].load(Ordering::SeqCst), 1);

        let flaky: Vec<&ProviderAttempt> = result
            .attempts()
            .iter()
            .filter(|a| a.provider == "flaky")
            .collect();
        assert_eq!(flaky.len(), 4);
        let numbers: Vec<u32> = flaky.iter().map(|a| a.attempt).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        let delays: Vec<u64> = flaky.iter().map(|a| a.backoff_ms).collect();
        assert_eq!(delays, vec![0, 2, 4, 8]);
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_all_unavailable_returns_fallback_with_full_log() {
        let (orch, _) = orchestrator(vec![
            ScriptedProvider::always("a", unavailable()),
            ScriptedProvider::always("b", unavailable()).non_streaming(),
            ScriptedProvider::always("c", unavailable()),
        ]);
        let retries = 2;
        let result = orch
            .generate(&request(&["a", "b", "c"]), &fast_options(retries), &CancellationToken::new(), None)
            .await;

        match result {
            GenerationResult::Failure {
                error,
                attempts,
                fallback_document,
            } => {
                assert_eq!(attempts.len(), 3 * (retries as usize + 1));
                assert!(matches!(error, GenerationError::Exhausted { attempts: 9, .. }));
                assert!(!fallback_document.sections.is_empty());
                assert!(attempts.iter().all(|a| matches!(
                    a.outcome,
                    AttemptOutcome::Error {
                        error: GenerationError::Provider { .. }
                    }
                )));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unauthenticated_skips_remaining_retries() {
        let (orch, calls) = orchestrator(vec![
            ScriptedProvider::always("badkey", Reply::Fail(ProviderError::Unauthenticated)),
            ScriptedProvider::always("good", Reply::Text(VALID.to_string())),
        ]);
        let result = orch
            .generate(&request(&["badkey", "good"]), &fast_options(2), &CancellationToken::new(), None)
            .await;
        assert!(result.is_success());
        assert_eq!(calls[0].load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_content_error_retries_same_provider() {
        let (orch, calls) = orchestrator(vec![ScriptedProvider::new(
            "chatty",
            vec![
                Reply::Text("I'd be happy to help! What topic?".to_string()),
                Reply::Text(r#"{"sections":[{"id":"s1","questions":[]}]}"#.to_string()),
                Reply::Chunks(vec![VALID[..40].to_string(), VALID[40..].to_string()]),
            ],
        )]);
        let result = orch
            .generate(&request(&["chatty"]), &fast_options(2), &CancellationToken::new(), None)
            .await;

        assert!(result.is_success());
        assert_eq!(calls[0].load(Ordering::SeqCst), 3);
        let attempts = result.attempts();
        assert_eq!(
            attempts[0].outcome,
            AttemptOutcome::Error {
                error: GenerationError::NoJsonFound
            }
        );
        assert_eq!(
            attempts[1].outcome,
            AttemptOutcome::Error {
                error: GenerationError::invalid("sections[0].title", "missing")
            }
        );
        assert!(attempts[1].raw_text.contains("\"s1\""));
    }

    #[tokio::test]
    async fn test_truncated_output_is_repaired() {
        let truncated = r#"{"sections":[{"id":"s1","title":"T","questions":[{"id":"q1","label":"L","type":"text"},{"id":"q2","label":"Lo"#;
        let (orch, _) = orchestrator(vec![ScriptedProvider::always(
            "long",
            Reply::Truncated(truncated.to_string()),
        )]);
        let result = orch
            .generate(&request(&["long"]), &fast_options(0), &CancellationToken::new(), None)
            .await;

        match result {
            GenerationResult::Success {
                document, warnings, ..
            } => {
                assert_eq!(document.question_count(), 1);
                assert_eq!(warnings[0], "response stopped at the token limit");
                assert!(warnings.iter().any(|w| w.contains("truncation")));
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_and_unknown_providers_are_skipped() {
        let (orch, calls) = orchestrator(vec![
            ScriptedProvider::always("nokey", Reply::Text(VALID.to_string())).unconfigured(),
            ScriptedProvider::always("ok", Reply::Text(VALID.to_string())),
        ]);
        let result = orch
            .generate(&request(&["ghost", "nokey", "ok"]), &fast_options(1), &CancellationToken::new(), None)
            .await;

        assert!(result.is_success());
        assert_eq!(calls[0].load(Ordering::SeqCst), 0);
        let attempts = result.attempts();
        assert_eq!(attempts.len(), 3);
        assert_eq!(attempts[0].outcome.label(), "skipped");
        assert_eq!(attempts[1].outcome.label(), "skipped");
        assert!(!attempts[0].was_called());
    }

    #[tokio::test]
    async fn test_nothing_configured_is_configuration_missing() {
        let (orch, _) = orchestrator(vec![
            ScriptedProvider::always("nokey", Reply::Text(VALID.to_string())).unconfigured(),
        ]);
        let result = orch
            .generate(&request(&["nokey", "ghost"]), &fast_options(1), &CancellationToken::new(), None)
            .await;
        assert!(matches!(
            result.error(),
            Some(GenerationError::ConfigurationMissing { .. })
        ));
        assert_eq!(result.attempts().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_template_fails_before_any_call() {
        let provider = ScriptedProvider::always("p", Reply::Text(VALID.to_string()));
        let calls = provider.calls.clone();
        let mut registry = ProviderRegistry::new();
        registry.register("p", BoxLlmProvider::new(provider));
        let orch = CascadeOrchestrator::new(
            Arc::new(registry),
            Arc::new(MissingTemplate),
            crate::fallback::builtin_fallback_document(),
        );
        let result = orch
            .generate(&request(&["p"]), &fast_options(2), &CancellationToken::new(), None)
            .await;
        assert!(matches!(
            result.error(),
            Some(GenerationError::ConfigurationMissing { .. })
        ));
        assert!(result.attempts().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!result.document().sections.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_records_cancelled() {
        let provider = ScriptedProvider::always("slow", Reply::Stall("{\"sections\":[".to_string()));
        let released = provider.released.clone();
        let (orch, calls) = orchestrator(vec![
            provider,
            ScriptedProvider::always("never", Reply::Text(VALID.to_string())),
        ]);
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            canceller.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(3),
            orch.generate(&request(&["slow", "never"]), &fast_options(2), &cancel, None),
        )
        .await
        .expect("cancellation must not hang");

        assert_eq!(result.error(), Some(&GenerationError::Cancelled));
        let attempts = result.attempts();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].outcome, AttemptOutcome::Cancelled);
        assert_eq!(attempts[0].raw_text, "{\"sections\":[");
        assert!(released.load(Ordering::SeqCst));
        assert_eq!(calls[0].load(Ordering::SeqCst), 1);
        assert_eq!(calls[1].load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_per_provider_timeout_moves_on() {
        let (orch, calls) = orchestrator(vec![
            ScriptedProvider::always("stuck", Reply::Hang).non_streaming(),
            ScriptedProvider::always("ok", Reply::Text(VALID.to_string())),
        ]);
        let options = GenerationOptions {
            per_provider_timeout_ms: 20,
            ..fast_options(1)
        };
        let result = orch
            .generate(&request(&["stuck", "ok"]), &options, &CancellationToken::new(), None)
            .await;

        assert!(result.is_success());
        assert_eq!(calls[0].load(Ordering::SeqCst), 2);
        let attempts = result.attempts();
        assert_eq!(attempts[0].outcome, AttemptOutcome::Timeout);
        assert_eq!(attempts[1].outcome, AttemptOutcome::Timeout);
        assert_eq!(attempts[2].outcome, AttemptOutcome::Success);
    }

    #[tokio::test]
    async fn test_overall_deadline_exceeded() {
        let (orch, _) = orchestrator(vec![ScriptedProvider::always(
            "stalls",
            Reply::Stall("{\"sec".to_string()),
        )]);
        let options = GenerationOptions {
            overall_deadline_ms: 40,
            ..fast_options(3)
        };
        let result = tokio::time::timeout(
            Duration::from_secs(3),
            orch.generate(&request(&["stalls"]), &options, &CancellationToken::new(), None),
        )
        .await
        .expect("deadline must fire");

        assert_eq!(
            result.error(),
            Some(&GenerationError::DeadlineExceeded { deadline_ms: 40 })
        );
        let attempts = result.attempts();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].outcome, AttemptOutcome::Timeout);
        assert_eq!(attempts[0].raw_text, "{\"sec");
    }

    #[tokio::test]
    async fn test_rate_limit_hint_stretches_backoff() {
        let (orch, _) = orchestrator(vec![ScriptedProvider::new(
            "limited",
            vec![
                Reply::Fail(ProviderError::RateLimited {
                    retry_after_ms: Some(6),
                }),
                unavailable(),
                Reply::Text(VALID.to_string()),
            ],
        )]);
        let result = orch
            .generate(&request(&["limited"]), &fast_options(2), &CancellationToken::new(), None)
            .await;
        assert!(result.is_success());
        let delays: Vec<u64> = result.attempts().iter().map(|a| a.backoff_ms).collect();
        // base 2: the hint lifts the first delay to 6, the second stays >= 6.
        assert_eq!(delays, vec![0, 6, 6]);
    }

    #[tokio::test]
    async fn test_progress_updates_and_disconnect() {
        let (orch, _) = orchestrator(vec![ScriptedProvider::always(
            "streamer",
            Reply::Chunks(vec![VALID[..30].to_string(), VALID[30..].to_string()]),
        )]);
        let (tx, mut rx) = mpsc::channel(8);
        let result = orch
            .generate(&request(&["streamer"]), &fast_options(0), &CancellationToken::new(), Some(tx))
            .await;
        assert!(result.is_success());
        let mut updates = Vec::new();
        while let Some(update) = rx.recv().await {
            updates.push(update);
        }
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[1].chars_received, VALID.chars().count());

        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let caller = CancellationToken::new();
        let result = orch
            .generate(&request(&["streamer"]), &fast_options(2), &caller, Some(tx))
            .await;
        assert_eq!(result.error(), Some(&GenerationError::Cancelled));
        assert_eq!(result.attempts().len(), 1);
        assert!(!caller.is_cancelled());
    }
}
