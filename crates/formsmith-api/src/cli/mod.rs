//! CLI command definitions for the `fsmith` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod generate;
pub mod providers;
pub mod repair;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use uuid::Uuid;

/// Generate structured questionnaires from LLM providers, with fallback.
#[derive(Parser)]
#[command(name = "fsmith", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the TOML config (defaults to the user config directory).
    #[arg(long, global = true, env = "FORMSMITH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed logs (-v for info, -vv for debug, -vvv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Write logs to stderr as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a document from a JSON context file.
    #[command(alias = "gen")]
    Generate {
        /// JSON object whose keys fill the prompt template.
        #[arg(long, value_name = "FILE")]
        context: PathBuf,

        /// Providers to try, in order (defaults to the enabled providers in config).
        #[arg(long, value_delimiter = ',')]
        providers: Option<Vec<String>>,

        /// Idempotency key for persistence (a new one is generated otherwise).
        #[arg(long)]
        request_id: Option<Uuid>,

        /// Do not save the result to the document store.
        #[arg(long)]
        no_save: bool,
    },

    /// Extract, repair and validate a saved raw response.
    Repair {
        /// File holding the raw provider text.
        file: PathBuf,
    },

    /// List configured providers and their credential status.
    Providers {
        /// Send a minimal request to each configured provider.
        #[arg(long)]
        check: bool,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
