//! Generation service (use case).
//!
//! Runs the cascade and hands completed outcomes to the document store.
//! Depends on the `DocumentStore` port, never on a concrete store.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use formsmith_types::error::GenerationError;
use formsmith_types::generation::{
    GenerationOptions, GenerationRequest, GenerationResult, ProgressUpdate,
};

use crate::persistence::{DocumentStore, StoredDocument};
use crate::pipeline::cascade::CascadeOrchestrator;

/// Orchestrator plus persistence for one deployment.
pub struct GenerationService<S: DocumentStore> {
    orchestrator: CascadeOrchestrator,
    store: S,
}

impl<S: DocumentStore> GenerationService<S> {
    pub fn new(orchestrator: CascadeOrchestrator, store: S) -> Self {
        Self {
            orchestrator,
            store,
        }
    }

    pub fn orchestrator(&self) -> &CascadeOrchestrator {
        &self.orchestrator
    }

    /// Generate a document and persist the outcome at most once.
    ///
    /// Successes and exhausted failures are saved. Cancellations and
    /// configuration failures are not. A store error is logged and never
    /// changes the returned result.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        options: &GenerationOptions,
        cancel: &CancellationToken,
        progress: Option<mpsc::Sender<ProgressUpdate>>,
    ) -> GenerationResult {
        let result = self
            .orchestrator
            .generate(request, options, cancel, progress)
            .await;

        if should_persist(&result) {
            self.persist(request, &result).await;
        }
        result
    }

    async fn persist(&self, request: &GenerationRequest, result: &GenerationResult) {
        let request_id = request.request_id;
        match self.store.has_completed(&request_id).await {
            Ok(true) => {
                tracing::info!(%request_id, "document already stored, skipping save");
                return;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(%request_id, error = %e, "could not check stored document");
                return;
            }
        }

        let record = StoredDocument::from_result(request_id, result);
        match self.store.save(&record).await {
            Ok(()) => tracing::info!(%request_id, origin = ?record.origin, "document stored"),
            Err(e) => tracing::warn!(%request_id, error = %e, "failed to store document"),
        }
    }
}

fn should_persist(result: &GenerationResult) -> bool {
    match result {
        GenerationResult::Success { .. } => true,
        GenerationResult::Failure { error, .. } => matches!(
            error,
            GenerationError::Exhausted { .. } | GenerationError::DeadlineExceeded { .. }
        ),
    }
}
