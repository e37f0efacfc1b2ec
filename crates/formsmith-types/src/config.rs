//! Pipeline configuration types for Formsmith.
//!
//! `PipelineConfig` represents the `formsmith.toml` that controls retry
//! budgets, document bounds, and the provider list.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::generation::{DocumentBounds, GenerationOptions};
use crate::llm::ProviderType;

/// Top-level configuration. All fields have defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub generation: GenerationSettings,

    #[serde(default)]
    pub bounds: BoundsSettings,

    /// Providers in default cascade order.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    /// Directory holding `system.txt` and `user.txt`.
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,

    /// Root directory for persisted documents.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// JSON file overriding the built-in fallback document.
    #[serde(default)]
    pub fallback_document: Option<PathBuf>,
}

impl PipelineConfig {
    /// Options for the orchestrator derived from this config.
    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            max_retries: self.generation.max_retries,
            base_backoff_ms: self.generation.base_backoff_ms,
            max_backoff_ms: self.generation.max_backoff_ms,
            per_provider_timeout_ms: self.generation.per_provider_timeout_ms,
            overall_deadline_ms: self.generation.overall_deadline_ms,
            max_tokens: self.generation.max_tokens,
            bounds: DocumentBounds {
                min_sections: self.bounds.min_sections,
                max_sections: self.bounds.max_sections,
                min_questions_per_section: self.bounds.min_questions_per_section,
                max_questions_per_section: self.bounds.max_questions_per_section,
            },
        }
    }

    /// Names of enabled providers, in config order.
    pub fn enabled_provider_names(&self) -> Vec<String> {
        self.providers
            .iter()
            .filter(|p| p.enabled)
            .map(|p| p.name.clone())
            .collect()
    }
}

/// `[generation]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_per_provider_timeout_ms")]
    pub per_provider_timeout_ms: u64,
    #[serde(default = "default_overall_deadline_ms")]
    pub overall_deadline_ms: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_max_retries() -> u32 {
    2
}

fn default_base_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8_000
}

fn default_per_provider_timeout_ms() -> u64 {
    120_000
}

fn default_overall_deadline_ms() -> u64 {
    300_000
}

fn default_max_tokens() -> u32 {
    8_192
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            per_provider_timeout_ms: default_per_provider_timeout_ms(),
            overall_deadline_ms: default_overall_deadline_ms(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// `[bounds]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundsSettings {
    #[serde(default = "default_min_sections")]
    pub min_sections: usize,
    #[serde(default = "default_max_sections")]
    pub max_sections: usize,
    #[serde(default = "default_min_questions")]
    pub min_questions_per_section: usize,
    #[serde(default = "default_max_questions")]
    pub max_questions_per_section: usize,
}

fn default_min_sections() -> usize {
    1
}

fn default_max_sections() -> usize {
    12
}

fn default_min_questions() -> usize {
    1
}

fn default_max_questions() -> usize {
    25
}

impl Default for BoundsSettings {
    fn default() -> Self {
        Self {
            min_sections: default_min_sections(),
            max_sections: default_max_sections(),
            min_questions_per_section: default_min_questions(),
            max_questions_per_section: default_max_questions(),
        }
    }
}

/// One `[[providers]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Name used in cascade lists and logs.
    pub name: String,
    pub provider_type: ProviderType,
    pub model: String,
    /// Overrides the provider's default endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Environment variable holding the API key. Unset means no credential.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}
