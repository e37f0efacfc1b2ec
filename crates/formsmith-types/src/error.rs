//! Error taxonomy for the generation pipeline.
//!
//! `ProviderError` covers a single provider call. `GenerationError` is the
//! per-attempt and final error kind recorded in the attempt log and carried by
//! `GenerationResult::Failure`. Both are `Clone + Serialize` so they can live
//! inside serialized attempt logs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Typed error raised by a provider collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderError {
    #[error("provider rejected credentials")]
    Unauthenticated,

    #[error("rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("provider call timed out")]
    Timeout,

    #[error("provider unavailable: {message}")]
    Unavailable { message: String },

    #[error("unknown provider error: {message}")]
    Unknown { message: String },
}

impl ProviderError {
    /// Shorthand for `ProviderError::Unavailable`.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Shorthand for `ProviderError::Unknown`.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
        }
    }

    /// Whether another attempt against the same provider can help.
    ///
    /// Rejected credentials will be rejected again; everything else is
    /// transient from the pipeline's point of view.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ProviderError::Unauthenticated)
    }

    /// Map an HTTP status code (and optional `retry-after` hint) to an error.
    pub fn from_status(status: u16, body: &str, retry_after_ms: Option<u64>) -> Self {
        match status {
            401 | 403 => ProviderError::Unauthenticated,
            429 => ProviderError::RateLimited { retry_after_ms },
            408 | 504 => ProviderError::Timeout,
            500..=599 => ProviderError::unavailable(format!("HTTP {status}: {body}")),
            _ => ProviderError::unknown(format!("HTTP {status}: {body}")),
        }
    }
}

/// Error kinds produced by one attempt or by a whole generation request.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenerationError {
    #[error("provider error: {error}")]
    Provider { error: ProviderError },

    #[error("no JSON object found in response")]
    NoJsonFound,

    #[error("JSON repair failed: {message} (near: {preview:?})")]
    RepairFailed { message: String, preview: String },

    #[error("invalid document structure at {path}: {reason}")]
    InvalidStructure { path: String, reason: String },

    #[error("configuration missing: {message}")]
    ConfigurationMissing { message: String },

    #[error("generation cancelled")]
    Cancelled,

    #[error("overall deadline of {deadline_ms}ms exceeded")]
    DeadlineExceeded { deadline_ms: u64 },

    #[error("all providers exhausted after {attempts} attempts; last error: {last_error}")]
    Exhausted { attempts: usize, last_error: String },
}

impl GenerationError {
    /// Build an `InvalidStructure` error for the given document path.
    pub fn invalid(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidStructure {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Build a `ConfigurationMissing` error.
    pub fn configuration_missing(message: impl Into<String>) -> Self {
        Self::ConfigurationMissing {
            message: message.into(),
        }
    }

    /// Content errors mean the provider's output was unusable.
    pub fn is_content_error(&self) -> bool {
        matches!(
            self,
            GenerationError::NoJsonFound
                | GenerationError::RepairFailed { .. }
                | GenerationError::InvalidStructure { .. }
        )
    }

    /// Terminal errors stop the cascade without further attempts.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GenerationError::ConfigurationMissing { .. }
                | GenerationError::Cancelled
                | GenerationError::DeadlineExceeded { .. }
        )
    }
}

impl From<ProviderError> for GenerationError {
    fn from(error: ProviderError) -> Self {
        GenerationError::Provider { error }
    }
}

/// Errors raised by the prompt template collaborator.
#[derive(Debug, Clone, Error)]
pub enum TemplateError {
    #[error("template '{0}' not found")]
    Missing(String),

    #[error("failed to read template '{name}': {message}")]
    Unreadable { name: String, message: String },
}

/// Errors raised by the persistence collaborator.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("storage I/O error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Errors raised while loading pipeline configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to parse config {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid fallback document: {0}")]
    InvalidFallback(String),
}
