//! `fsmith generate`: run one request through the provider cascade.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use formsmith_core::pipeline::cascade::CascadeOrchestrator;
use formsmith_core::service::GenerationService;
use formsmith_core::template::PromptTemplate;
use formsmith_infra::fallback::load_fallback_document;
use formsmith_infra::store::FileDocumentStore;
use formsmith_infra::template::{default_template, FileTemplateStore};
use formsmith_observe::attrs;
use formsmith_types::document::GeneratedDocument;
use formsmith_types::generation::{
    AttemptOutcome, GenerationRequest, GenerationResult, ProgressUpdate, ProviderAttempt,
};

use crate::state::AppState;

/// Arguments of the generate command after parsing.
pub struct GenerateArgs<'a> {
    pub context: &'a Path,
    pub providers: Option<Vec<String>>,
    pub request_id: Option<Uuid>,
    pub no_save: bool,
}

/// Run the cascade and print the result. Returns whether generation succeeded.
pub async fn generate(
    state: &AppState,
    args: GenerateArgs<'_>,
    json: bool,
    quiet: bool,
) -> Result<bool> {
    let context = read_context(args.context).await?;
    let no_save = args.no_save;

    let providers = args
        .providers
        .unwrap_or_else(|| state.config.enabled_provider_names());
    let mut request = GenerationRequest::new(context, providers);
    if let Some(id) = args.request_id {
        request.request_id = id;
    }

    let template: Arc<dyn PromptTemplate> = match &state.config.templates_dir {
        Some(dir) => {
            let store = FileTemplateStore::load(dir).await;
            if !store.is_available() {
                tracing::warn!(dir = %dir.display(), "templates directory unusable");
            }
            Arc::new(store)
        }
        None => Arc::new(default_template()),
    };
    let fallback = load_fallback_document(&state.config).await;
    let orchestrator = CascadeOrchestrator::new(state.registry.clone(), template, fallback);
    let options = state.config.generation_options();

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, cancelling generation");
                cancel.cancel();
            }
        })
    };

    let show_spinner = !json && !quiet;
    let spinner = if show_spinner {
        new_spinner("Waiting for provider...")
    } else {
        ProgressBar::hidden()
    };

    let (progress, progress_task) = if show_spinner {
        let (tx, rx) = mpsc::channel(64);
        let task = tokio::spawn(follow_progress(rx, spinner.clone()));
        (Some(tx), Some(task))
    } else {
        (None, None)
    };

    let span = tracing::info_span!(
        attrs::SPAN_COMMAND,
        gen_ai.operation.name = attrs::OP_GENERATE,
        request_id = %request.request_id
    );

    let result = async {
        if no_save {
            orchestrator
                .generate(&request, &options, &cancel, progress)
                .await
        } else {
            let store = FileDocumentStore::new(&state.data_dir);
            GenerationService::new(orchestrator, store)
                .generate(&request, &options, &cancel, progress)
                .await
        }
    }
    .instrument(span)
    .await;

    if let Some(task) = progress_task {
        let _ = task.await;
    }
    spinner.finish_and_clear();
    ctrl_c.abort();

    if json {
        let output = serde_json::json!({
            "request_id": request.request_id,
            "result": result,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if !quiet {
        print_result(&request, &result);
    }

    Ok(result.is_success())
}

/// Read a context file. It must hold a JSON object.
async fn read_context(path: &Path) -> Result<serde_json::Map<String, serde_json::Value>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read context file {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("context file {} is not valid JSON", path.display()))?;
    match value {
        serde_json::Value::Object(map) => Ok(map),
        _ => bail!("context file {} must contain a JSON object", path.display()),
    }
}

fn new_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Mirror progress updates onto the spinner until the sender is dropped.
async fn follow_progress(mut rx: mpsc::Receiver<ProgressUpdate>, spinner: ProgressBar) {
    while let Some(update) = rx.recv().await {
        spinner.set_message(format!(
            "{} (attempt {}): {} chars received",
            update.provider, update.attempt, update.chars_received
        ));
    }
}

fn print_result(request: &GenerationRequest, result: &GenerationResult) {
    println!();
    match result {
        GenerationResult::Success {
            document,
            provider_used,
            warnings,
            ..
        } => {
            println!(
                "  {} Generated {} sections, {} questions via {}",
                style("✓").green().bold(),
                document.sections.len(),
                document.question_count(),
                style(provider_used).cyan()
            );
            for warning in warnings {
                println!("  {} {}", style("!").yellow().bold(), warning);
            }
        }
        GenerationResult::Failure { error, .. } => {
            println!("  {} Generation failed: {}", style("✗").red().bold(), error);
            println!("  {}", style("Showing the fallback document.").dim());
        }
    }
    println!("  {}", style(format!("request {}", request.request_id)).dim());

    if !result.attempts().is_empty() {
        println!();
        print_attempts(result.attempts());
    }

    println!();
    print_document(result.document());
    println!();
}

fn print_attempts(attempts: &[ProviderAttempt]) {
    println!("  {}", style("Attempts").bold());
    for attempt in attempts {
        let detail = match &attempt.outcome {
            AttemptOutcome::Success => style("success".to_string()).green(),
            AttemptOutcome::Error { error } => style(format!("error: {error}")).red(),
            AttemptOutcome::Timeout => style("timeout".to_string()).yellow(),
            AttemptOutcome::Cancelled => style("cancelled".to_string()).yellow(),
            AttemptOutcome::Skipped { reason } => style(format!("skipped: {reason}")).dim(),
        };
        if attempt.was_called() {
            println!(
                "    {} #{} {} ({}ms, waited {}ms)",
                attempt.provider, attempt.attempt, detail, attempt.duration_ms, attempt.backoff_ms
            );
        } else {
            println!("    {} {}", attempt.provider, detail);
        }
    }
}

/// Print a document as an indented outline.
pub(crate) fn print_document(document: &GeneratedDocument) {
    for (i, section) in document.sections.iter().enumerate() {
        println!(
            "  {}. {} {}",
            i + 1,
            style(&section.title).bold(),
            style(format!("[{}]", section.id)).dim()
        );
        if let Some(description) = &section.description {
            println!("     {}", style(description).dim());
        }
        for question in &section.questions {
            let marker = if question.required { "*" } else { " " };
            println!(
                "     {marker} {} {}",
                question.label,
                style(format!("({})", question.question_type)).dim()
            );
            if !question.options.is_empty() {
                let labels: Vec<&str> = question.options.iter().map(|o| o.label.as_str()).collect();
                println!("         {}", style(labels.join(" | ")).dim());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_context_object() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ctx.json");
        tokio::fs::write(&path, r#"{"topic": "onboarding", "audience": "new hires"}"#)
            .await
            .unwrap();

        let context = read_context(&path).await.unwrap();
        assert_eq!(context["topic"], "onboarding");
        assert_eq!(context.len(), 2);
    }

    #[tokio::test]
    async fn test_read_context_rejects_non_object() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ctx.json");
        tokio::fs::write(&path, "[1, 2, 3]").await.unwrap();

        let err = read_context(&path).await.unwrap_err();
        assert!(err.to_string().contains("must contain a JSON object"));
    }

    #[tokio::test]
    async fn test_read_context_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = read_context(&dir.path().join("absent.json"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to read context file"));
    }
}
