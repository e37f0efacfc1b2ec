//! Application state shared by the CLI commands.
//!
//! AppState holds the loaded configuration and the provider registry built
//! from it. Commands that need the document store or the prompt template
//! build them on demand.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;

use formsmith_core::llm::registry::ProviderRegistry;
use formsmith_infra::config::{
    default_config_path, load_pipeline_config, load_pipeline_config_strict, resolve_data_dir,
};
use formsmith_infra::llm::build_registry;
use formsmith_types::config::PipelineConfig;

/// Loaded configuration plus the collaborators derived from it.
pub struct AppState {
    pub config: PipelineConfig,
    pub config_path: Option<PathBuf>,
    pub registry: Arc<ProviderRegistry>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Load configuration and build the provider registry.
    ///
    /// An explicit `--config` path must exist and parse. Without one, the
    /// default location is read leniently and a missing file means defaults.
    pub async fn init(explicit_config: Option<&Path>) -> anyhow::Result<Self> {
        let (config, config_path) = match explicit_config {
            Some(path) => {
                let config = load_pipeline_config_strict(path)
                    .await
                    .with_context(|| format!("failed to load config {}", path.display()))?;
                (config, Some(path.to_path_buf()))
            }
            None => match default_config_path() {
                Some(path) => (load_pipeline_config(&path).await, Some(path)),
                None => (PipelineConfig::default(), None),
            },
        };

        let registry = Arc::new(build_registry(&config));
        let data_dir = resolve_data_dir(&config);

        tracing::debug!(
            providers = registry.len(),
            data_dir = %data_dir.display(),
            "application state initialized"
        );

        Ok(Self {
            config,
            config_path,
            registry,
            data_dir,
        })
    }
}
