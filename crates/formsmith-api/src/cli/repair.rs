//! `fsmith repair`: run extraction, repair and validation on a saved response.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use formsmith_core::pipeline::process_response;
use formsmith_types::generation::DocumentBounds;

use crate::cli::generate::print_document;
use crate::state::AppState;

/// Repair one raw response file. Returns whether it produced a valid document.
pub async fn repair(state: &AppState, file: &Path, json: bool, quiet: bool) -> Result<bool> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;

    let bounds = state.config.generation_options().bounds;
    let output = repair_output(&raw, &bounds);
    let ok = output["ok"].as_bool().unwrap_or(false);

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(ok);
    }
    if quiet {
        return Ok(ok);
    }

    println!();
    match process_response(&raw, &bounds) {
        Ok(processed) => {
            if processed.repairs.is_empty() {
                println!("  {} Response is valid as-is", style("✓").green().bold());
            } else {
                let applied: Vec<String> = processed.repairs.iter().map(ToString::to_string).collect();
                println!(
                    "  {} Repaired: {}",
                    style("✓").green().bold(),
                    applied.join(", ")
                );
            }
            for warning in &processed.warnings {
                println!("  {} {}", style("!").yellow().bold(), warning);
            }
            println!();
            print_document(&processed.document);
        }
        Err(e) => {
            println!("  {} {}", style("✗").red().bold(), e);
        }
    }
    println!();

    Ok(ok)
}

/// JSON report for a raw response: the document and repairs, or the typed error.
fn repair_output(raw: &str, bounds: &DocumentBounds) -> serde_json::Value {
    match process_response(raw, bounds) {
        Ok(processed) => {
            let repairs: Vec<String> = processed.repairs.iter().map(ToString::to_string).collect();
            serde_json::json!({
                "ok": true,
                "repairs": repairs,
                "warnings": processed.warnings,
                "document": processed.document,
            })
        }
        Err(error) => serde_json::json!({
            "ok": false,
            "error": error,
        }),
    }
}
