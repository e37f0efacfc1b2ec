//! Persistence collaborator trait.
//!
//! The pipeline saves at most once per request. Implementations live in
//! formsmith-infra (e.g., `FileDocumentStore`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use formsmith_types::document::GeneratedDocument;
use formsmith_types::error::PersistenceError;
use formsmith_types::generation::GenerationResult;

/// Whether the stored document came from a provider or the fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentOrigin {
    Generated,
    Fallback,
}

/// The record written for one completed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    pub request_id: Uuid,
    pub origin: DocumentOrigin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_used: Option<String>,
    pub document: GeneratedDocument,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub saved_at: DateTime<Utc>,
}

impl StoredDocument {
    /// Build the record for a result: the generated document on success,
    /// the fallback document on failure.
    pub fn from_result(request_id: Uuid, result: &GenerationResult) -> Self {
        match result {
            GenerationResult::Success {
                document,
                provider_used,
                warnings,
                ..
            } => Self {
                request_id,
                origin: DocumentOrigin::Generated,
                provider_used: Some(provider_used.clone()),
                document: document.clone(),
                warnings: warnings.clone(),
                saved_at: Utc::now(),
            },
            GenerationResult::Failure {
                error,
                fallback_document,
                ..
            } => Self {
                request_id,
                origin: DocumentOrigin::Fallback,
                provider_used: None,
                document: fallback_document.clone(),
                warnings: vec![error.to_string()],
                saved_at: Utc::now(),
            },
        }
    }
}

/// Durable, at-most-once storage for completed requests.
pub trait DocumentStore: Send + Sync {
    /// Whether a document was already saved for this request.
    fn has_completed(
        &self,
        request_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, PersistenceError>> + Send;

    /// Save the document for a request.
    fn save(
        &self,
        record: &StoredDocument,
    ) -> impl std::future::Future<Output = Result<(), PersistenceError>> + Send;
}
