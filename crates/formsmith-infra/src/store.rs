//! JSON file document store.
//!
//! Layout: `{data_dir}/documents/{request_id}.json`. Writes go to a temp
//! file in the same directory and are renamed into place, so a reader never
//! sees a half-written document.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use formsmith_core::persistence::{DocumentStore, StoredDocument};
use formsmith_types::error::PersistenceError;

/// File-backed implementation of [`DocumentStore`].
#[derive(Debug, Clone)]
pub struct FileDocumentStore {
    dir: PathBuf,
}

impl FileDocumentStore {
    /// Store documents under `{data_dir}/documents/`.
    pub fn new(data_dir: &Path) -> Self {
        Self {
            dir: data_dir.join("documents"),
        }
    }

    pub fn document_path(&self, request_id: &Uuid) -> PathBuf {
        self.dir.join(format!("{request_id}.json"))
    }

    /// Read back a stored document.
    pub async fn load(&self, request_id: &Uuid) -> Result<Option<StoredDocument>, PersistenceError> {
        let content = match tokio::fs::read_to_string(self.document_path(request_id)).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PersistenceError::Io(e.to_string())),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| PersistenceError::Serialization(e.to_string()))
    }
}

impl DocumentStore for FileDocumentStore {
    async fn has_completed(&self, request_id: &Uuid) -> Result<bool, PersistenceError> {
        tokio::fs::try_exists(self.document_path(request_id))
            .await
            .map_err(|e| PersistenceError::Io(e.to_string()))
    }

    async fn save(&self, record: &StoredDocument) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| PersistenceError::Serialization(e.to_string()))?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| PersistenceError::Io(e.to_string()))?;

        let target = self.document_path(&record.request_id);
        let tmp = self.dir.join(format!(".{}.{}.tmp", record.request_id, Uuid::now_v7()));
        if let Err(e) = tokio::fs::write(&tmp, json).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(PersistenceError::Io(e.to_string()));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(PersistenceError::Io(e.to_string()));
        }

        tracing::debug!(path = %target.display(), "document written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formsmith_core::fallback::builtin_fallback_document;
    use formsmith_core::persistence::DocumentOrigin;
    use tempfile::TempDir;

    fn record(request_id: Uuid) -> StoredDocument {
        StoredDocument {
            request_id,
            origin: DocumentOrigin::Fallback,
            provider_used: None,
            document: builtin_fallback_document(),
            warnings: vec!["all providers exhausted".to_string()],
            saved_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_save_then_has_completed() {
        let tmp = TempDir::new().unwrap();
        let store = FileDocumentStore::new(tmp.path());
        let id = Uuid::now_v7();

        assert!(!store.has_completed(&id).await.unwrap());
        store.save(&record(id)).await.unwrap();
        assert!(store.has_completed(&id).await.unwrap());

        let loaded = store.load(&id).await.unwrap().unwrap();
        assert_eq!(loaded.request_id, id);
        assert_eq!(loaded.origin, DocumentOrigin::Fallback);
        assert_eq!(loaded.document, builtin_fallback_document());
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let tmp = TempDir::new().unwrap();
        let store = FileDocumentStore::new(tmp.path());
        store.save(&record(Uuid::now_v7())).await.unwrap();
        store.save(&record(Uuid::now_v7())).await.unwrap();

        let mut entries = tokio::fs::read_dir(tmp.path().join("documents")).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|n| n.ends_with(".json") && !n.starts_with('.')));
    }

    #[tokio::test]
    async fn test_load_missing_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = FileDocumentStore::new(tmp.path());
        assert!(store.load(&Uuid::now_v7()).await.unwrap().is_none());
    }
}
