//! Pipeline configuration loader for Formsmith.
//!
//! Reads `formsmith.toml` and deserializes it into [`PipelineConfig`]. The
//! lenient loader falls back to defaults when the file is missing or
//! malformed; the strict loader surfaces parse errors.

use std::path::{Path, PathBuf};

use formsmith_types::config::PipelineConfig;
use formsmith_types::error::ConfigError;

/// Config file name looked up in the platform config directory.
pub const CONFIG_FILE_NAME: &str = "formsmith.toml";

/// `{config_dir}/formsmith/formsmith.toml`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("formsmith").join(CONFIG_FILE_NAME))
}

/// Data directory used when the config does not set `data_dir`.
///
/// `FORMSMITH_DATA_DIR` wins, then the platform data dir, then `./.formsmith`.
pub fn resolve_data_dir(config: &PipelineConfig) -> PathBuf {
    if let Some(dir) = &config.data_dir {
        return dir.clone();
    }
    if let Ok(dir) = std::env::var("FORMSMITH_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .map(|dir| dir.join("formsmith"))
        .unwrap_or_else(|| PathBuf::from(".formsmith"))
}

/// Load pipeline configuration from `path`.
///
/// - If the file does not exist, returns [`PipelineConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_pipeline_config(path: &Path) -> PipelineConfig {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config found at {}, using defaults", path.display());
            return PipelineConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return PipelineConfig::default();
        }
    };

    match toml::from_str::<PipelineConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            PipelineConfig::default()
        }
    }
}

/// Load pipeline configuration from an explicitly requested file.
///
/// Unlike [`load_pipeline_config`], a missing or malformed file is an error.
pub async fn load_pipeline_config_strict(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    toml::from_str::<PipelineConfig>(&content).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use formsmith_types::llm::ProviderType;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
data_dir = "/srv/formsmith"

[generation]
max_retries = 3
per_provider_timeout_ms = 30000

[[providers]]
name = "claude"
provider_type = "anthropic"
model = "claude-sonnet-4-5"
api_key_env = "ANTHROPIC_API_KEY"

[[providers]]
name = "gpt"
provider_type = "openai_compatible"
model = "gpt-4o"
api_key_env = "OPENAI_API_KEY"
"#;

    #[tokio::test]
    async fn load_pipeline_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_pipeline_config(&tmp.path().join(CONFIG_FILE_NAME)).await;
        assert_eq!(config.generation.max_retries, 2);
        assert!(config.providers.is_empty());
    }

    #[tokio::test]
    async fn load_pipeline_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        tokio::fs::write(&path, SAMPLE).await.unwrap();

        let config = load_pipeline_config(&path).await;
        assert_eq!(config.generation.max_retries, 3);
        assert_eq!(config.generation.per_provider_timeout_ms, 30_000);
        assert_eq!(config.generation.base_backoff_ms, 500);
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[1].provider_type, ProviderType::OpenAiCompatible);
        assert_eq!(resolve_data_dir(&config), PathBuf::from("/srv/formsmith"));
    }

    #[tokio::test]
    async fn load_pipeline_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        tokio::fs::write(&path, "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_pipeline_config(&path).await;
        assert_eq!(config.generation.max_retries, 2);
        assert!(config.providers.is_empty());
    }

    #[tokio::test]
    async fn load_pipeline_config_strict_surfaces_errors() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope.toml");
        assert!(matches!(
            load_pipeline_config_strict(&missing).await,
            Err(ConfigError::Read { .. })
        ));

        let bad = tmp.path().join("bad.toml");
        tokio::fs::write(&bad, "[[providers]]\nname = 3").await.unwrap();
        assert!(matches!(
            load_pipeline_config_strict(&bad).await,
            Err(ConfigError::Parse { .. })
        ));

        let good = tmp.path().join("good.toml");
        tokio::fs::write(&good, SAMPLE).await.unwrap();
        let config = load_pipeline_config_strict(&good).await.unwrap();
        assert_eq!(config.enabled_provider_names(), vec!["claude", "gpt"]);
    }
}
