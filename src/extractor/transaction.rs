//! Run-scoped undo log for artifacts created during one extraction.
//!
//! Every side effect the extractor performs (stored image bytes, artifact
//! records) is registered here as it happens. On success the log is
//! committed and nothing runs. On failure [`ArtifactTransaction::rollback`]
//! drains it:
//!
//! 1. every tracked record is deleted in one repository call; if that fails
//!    the rollback stops, stored bytes are left alone, and the caller sees
//!    [`IngestError::Consistency`];
//! 2. every tracked key is deleted from blob storage, logging and skipping
//!    individual failures;
//! 3. the original error is returned.

use crate::error::IngestError;
use crate::storage::{ArtifactRepository, BlobStorage};
use tracing::{info, warn};
use uuid::Uuid;

/// One compensating action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoAction {
    DeleteRecord(Uuid),
    DeleteBytes(String),
}

/// Ordered list of undo actions for one run.
#[derive(Debug, Default)]
pub struct ArtifactTransaction {
    actions: Vec<UndoAction>,
}

impl ArtifactTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track_bytes(&mut self, key: impl Into<String>) {
        self.actions.push(UndoAction::DeleteBytes(key.into()));
    }

    pub fn track_record(&mut self, id: Uuid) {
        self.actions.push(UndoAction::DeleteRecord(id));
    }

    pub fn actions(&self) -> &[UndoAction] {
        &self.actions
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Keep every side effect. Returns how many actions were discarded.
    pub fn commit(mut self) -> usize {
        let n = self.actions.len();
        self.actions.clear();
        n
    }

    /// Undo everything tracked so far and hand back the error to report.
    pub async fn rollback(
        self,
        storage: &dyn BlobStorage,
        repository: &dyn ArtifactRepository,
        original: IngestError,
    ) -> IngestError {
        if self.actions.is_empty() {
            return original;
        }

        let (records, keys): (Vec<UndoAction>, Vec<UndoAction>) = self
            .actions
            .into_iter()
            .partition(|a| matches!(a, UndoAction::DeleteRecord(_)));

        let ids: Vec<Uuid> = records
            .into_iter()
            .filter_map(|a| match a {
                UndoAction::DeleteRecord(id) => Some(id),
                UndoAction::DeleteBytes(_) => None,
            })
            .collect();

        if !ids.is_empty() {
            if let Err(cleanup) = repository.delete_all(&ids).await {
                warn!(
                    "Artifact record cleanup failed, leaving {} stored image(s) in place: {}",
                    keys.len(),
                    cleanup
                );
                return IngestError::Consistency {
                    cleanup: cleanup.to_string(),
                    original: original.to_string(),
                };
            }
            info!("Deleted {} artifact record(s)", ids.len());
        }

        let mut deleted = 0usize;
        for action in keys {
            if let UndoAction::DeleteBytes(key) = action {
                match storage.delete(&key).await {
                    Ok(()) => deleted += 1,
                    Err(e) => warn!("Failed to delete stored image {}: {}", key, e),
                }
            }
        }
        info!("Rollback finished: {} stored image(s) deleted", deleted);

        original
    }
}
