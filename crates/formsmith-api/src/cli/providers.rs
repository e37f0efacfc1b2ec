//! `fsmith providers`: list configured providers and check connectivity.

use anyhow::Result;
use console::style;
use serde::Serialize;
use tracing::Instrument;

use formsmith_core::llm::registry::ProviderRegistry;
use formsmith_infra::llm::test_provider_connection;
use formsmith_observe::attrs;
use formsmith_types::config::PipelineConfig;

use crate::state::AppState;

/// One row of the provider listing.
#[derive(Debug, Serialize)]
struct ProviderRow {
    name: String,
    provider_type: String,
    model: String,
    enabled: bool,
    /// Whether the provider was built and has a credential if it needs one.
    configured: bool,
    streaming: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    check: Option<CheckResult>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum CheckResult {
    Ok,
    Failed { error: String },
    Skipped,
}

/// List providers from config. With `check`, send a minimal request to each
/// configured, enabled provider.
pub async fn list_providers(state: &AppState, check: bool, json: bool) -> Result<()> {
    let span = tracing::info_span!(
        attrs::SPAN_COMMAND,
        gen_ai.operation.name = attrs::OP_PROVIDERS
    );

    let mut rows = provider_rows(&state.config, &state.registry);
    if check {
        async {
            for row in rows.iter_mut() {
                let result = check_provider(&state.registry, row).await;
                row.check = Some(result);
            }
        }
        .instrument(span)
        .await;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!();
    if rows.is_empty() {
        let location = state
            .config_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "formsmith.toml".to_string());
        println!(
            "  {} No providers configured. Add [[providers]] entries to {}.",
            style("i").blue().bold(),
            style(location).cyan()
        );
        println!();
        return Ok(());
    }

    for row in &rows {
        let mark = if row.configured && row.enabled {
            style("✓").green()
        } else {
            style("✗").red()
        };
        let mut notes = Vec::new();
        if !row.enabled {
            notes.push("disabled".to_string());
        }
        if !row.configured {
            notes.push("missing credential".to_string());
        }
        if row.streaming {
            notes.push("streaming".to_string());
        }
        println!(
            "  {} {} {} {}",
            mark,
            style(&row.name).bold(),
            style(format!("{} / {}", row.provider_type, row.model)).dim(),
            style(notes.join(", ")).dim()
        );
        match &row.check {
            Some(CheckResult::Ok) => println!("      {}", style("connection ok").green()),
            Some(CheckResult::Failed { error }) => {
                println!("      {}", style(format!("connection failed: {error}")).red())
            }
            Some(CheckResult::Skipped) | None => {}
        }
    }
    println!();
    Ok(())
}

fn provider_rows(config: &PipelineConfig, registry: &ProviderRegistry) -> Vec<ProviderRow> {
    config
        .providers
        .iter()
        .map(|provider| {
            let built = registry.get(&provider.name);
            ProviderRow {
                name: provider.name.clone(),
                provider_type: provider.provider_type.to_string(),
                model: provider.model.clone(),
                enabled: provider.enabled,
                configured: built.is_some_and(|p| p.is_configured()),
                streaming: built.is_some_and(|p| p.capabilities().streaming),
                check: None,
            }
        })
        .collect()
}

async fn check_provider(registry: &ProviderRegistry, row: &ProviderRow) -> CheckResult {
    let provider = match registry.get(&row.name) {
        Some(p) if row.enabled && p.is_configured() => p,
        _ => return CheckResult::Skipped,
    };
    match test_provider_connection(provider).await {
        Ok(()) => {
            tracing::info!(gen_ai.provider.name = %row.name, "connection check passed");
            CheckResult::Ok
        }
        Err(e) => {
            tracing::warn!(gen_ai.provider.name = %row.name, error = %e, "connection check failed");
            CheckResult::Failed {
                error: e.to_string(),
            }
        }
    }
}
