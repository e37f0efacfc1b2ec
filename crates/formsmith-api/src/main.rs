//! Formsmith CLI entry point.
//!
//! Binary name: `fsmith`
//!
//! Parses CLI arguments, sets up tracing, loads configuration, then
//! dispatches to the command handler.

mod cli;
mod state;

use std::process::ExitCode;

use clap::Parser;
use clap_complete::generate;

use cli::generate::GenerateArgs;
use cli::{Cli, Commands};
use formsmith_observe::tracing_setup::{init_tracing, shutdown_tracing, TracingOptions};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Shell completions don't need tracing or config
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "fsmith", &mut std::io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    init_tracing(&TracingOptions {
        default_filter: TracingOptions::filter_for_verbosity(cli.verbose, cli.quiet).to_string(),
        json: cli.log_json,
        otel: cli.otel,
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let outcome = run(cli).await;
    shutdown_tracing();

    Ok(if outcome? {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Dispatch a command. Returns whether it succeeded.
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let state = AppState::init(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Generate {
            context,
            providers,
            request_id,
            no_save,
        } => {
            let args = GenerateArgs {
                context: &context,
                providers,
                request_id,
                no_save,
            };
            cli::generate::generate(&state, args, cli.json, cli.quiet).await
        }

        Commands::Repair { file } => cli::repair::repair(&state, &file, cli.json, cli.quiet).await,

        Commands::Providers { check } => {
            cli::providers::list_providers(&state, check, cli.json).await?;
            Ok(true)
        }

        Commands::Completions { .. } => unreachable!("handled above"),
    }
}
