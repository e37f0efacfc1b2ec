//! Fallback document loading.

use std::path::Path;

use formsmith_core::fallback::{builtin_fallback_document, parse_fallback_document};
use formsmith_types::config::PipelineConfig;
use formsmith_types::document::GeneratedDocument;
use formsmith_types::error::ConfigError;

/// Read and validate a fallback document override.
pub async fn read_fallback_document(path: &Path) -> Result<GeneratedDocument, ConfigError> {
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
    parse_fallback_document(&json)
}

/// The configured override, or the built-in document when none is set or
/// the override is unusable.
pub async fn load_fallback_document(config: &PipelineConfig) -> GeneratedDocument {
    let Some(path) = &config.fallback_document else {
        return builtin_fallback_document();
    };
    match read_fallback_document(path).await {
        Ok(document) => document,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "using built-in fallback document");
            builtin_fallback_document()
        }
    }
}
