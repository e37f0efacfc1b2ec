//! Request, attempt-log, and result types for one generation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::document::GeneratedDocument;
use crate::error::GenerationError;

/// Immutable input to a single generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub request_id: Uuid,
    /// Facts substituted into the prompt template.
    pub context: serde_json::Map<String, serde_json::Value>,
    /// Provider names, in the order they are attempted.
    pub providers: Vec<String>,
}

impl GenerationRequest {
    /// Create a request with a fresh UUID v7 identifier.
    pub fn new(context: serde_json::Map<String, serde_json::Value>, providers: Vec<String>) -> Self {
        Self {
            request_id: Uuid::now_v7(),
            context,
            providers,
        }
    }
}

/// Soft bounds on document shape. Violations produce warnings, not failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentBounds {
    pub min_sections: usize,
    pub max_sections: usize,
    pub min_questions_per_section: usize,
    pub max_questions_per_section: usize,
}

impl Default for DocumentBounds {
    fn default() -> Self {
        Self {
            min_sections: 1,
            max_sections: 12,
            min_questions_per_section: 1,
            max_questions_per_section: 25,
        }
    }
}

/// Retry, timeout, and validation knobs for one generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Retries per provider after the first attempt.
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub per_provider_timeout_ms: u64,
    pub overall_deadline_ms: u64,
    /// Token cap passed to every provider call.
    pub max_tokens: u32,
    pub bounds: DocumentBounds,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_backoff_ms: 500,
            max_backoff_ms: 8_000,
            per_provider_timeout_ms: 120_000,
            overall_deadline_ms: 300_000,
            max_tokens: 8_192,
            bounds: DocumentBounds::default(),
        }
    }
}

impl GenerationOptions {
    pub fn per_provider_timeout(&self) -> Duration {
        Duration::from_millis(self.per_provider_timeout_ms)
    }

    pub fn overall_deadline(&self) -> Duration {
        Duration::from_millis(self.overall_deadline_ms)
    }

    /// Attempts made against each provider before moving on.
    pub fn attempts_per_provider(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// How one provider attempt ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Error { error: GenerationError },
    Timeout,
    Cancelled,
    Skipped { reason: String },
}

impl AttemptOutcome {
    /// Short label used in log fields and CLI output.
    pub fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::Error { .. } => "error",
            AttemptOutcome::Timeout => "timeout",
            AttemptOutcome::Cancelled => "cancelled",
            AttemptOutcome::Skipped { .. } => "skipped",
        }
    }
}

/// One call to one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderAttempt {
    pub provider: String,
    /// 1-based attempt number within this provider.
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub outcome: AttemptOutcome,
    /// Raw text produced by the provider, possibly partial or empty.
    #[serde(default)]
    pub raw_text: String,
    pub duration_ms: u64,
    /// Delay waited before this attempt started.
    pub backoff_ms: u64,
}

impl ProviderAttempt {
    /// Record for a provider that was never called.
    pub fn skipped(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            attempt: 0,
            started_at: Utc::now(),
            outcome: AttemptOutcome::Skipped {
                reason: reason.into(),
            },
            raw_text: String::new(),
            duration_ms: 0,
            backoff_ms: 0,
        }
    }

    /// Whether the provider was actually called for this entry.
    pub fn was_called(&self) -> bool {
        !matches!(self.outcome, AttemptOutcome::Skipped { .. })
    }
}

/// Progress notification emitted while a response streams in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub provider: String,
    pub attempt: u32,
    /// Characters received so far in this attempt.
    pub chars_received: usize,
    /// Number of deltas received so far in this attempt.
    pub chunks: usize,
}

/// Discriminated outcome of a generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum GenerationResult {
    Success {
        document: GeneratedDocument,
        provider_used: String,
        attempts: Vec<ProviderAttempt>,
        warnings: Vec<String>,
    },
    Failure {
        error: GenerationError,
        attempts: Vec<ProviderAttempt>,
        fallback_document: GeneratedDocument,
    },
}

impl GenerationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, GenerationResult::Success { .. })
    }

    pub fn attempts(&self) -> &[ProviderAttempt] {
        match self {
            GenerationResult::Success { attempts, .. } => attempts,
            GenerationResult::Failure { attempts, .. } => attempts,
        }
    }

    /// The document the caller should show: the generated one or the fallback.
    pub fn document(&self) -> &GeneratedDocument {
        match self {
            GenerationResult::Success { document, .. } => document,
            GenerationResult::Failure {
                fallback_document, ..
            } => fallback_document,
        }
    }

    /// The failure kind, if any.
    pub fn error(&self) -> Option<&GenerationError> {
        match self {
            GenerationResult::Success { .. } => None,
            GenerationResult::Failure { error, .. } => Some(error),
        }
    }
}
