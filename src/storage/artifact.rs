//! Records describing stored table images.

use crate::error::IngestError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Database record of one persisted table image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredArtifact {
    pub id: Uuid,
    pub storage_key: String,
    pub tenant_id: String,
    pub size: u64,
    pub mime_type: String,
    pub created_by: String,
    pub used: bool,
}

/// Persistence for [`StoredArtifact`] records.
#[async_trait]
pub trait ArtifactRepository: Send + Sync {
    async fn insert(&self, artifact: &StoredArtifact) -> Result<(), IngestError>;

    /// Delete every record in `ids` as one transaction: either all are gone
    /// afterwards or none are. Ids without a record are ignored.
    async fn delete_all(&self, ids: &[Uuid]) -> Result<(), IngestError>;
}

/// Process-local repository.
#[derive(Debug, Default)]
pub struct MemoryArtifactRepository {
    rows: Mutex<HashMap<Uuid, StoredArtifact>>,
}

impl MemoryArtifactRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &Uuid) -> Option<StoredArtifact> {
        self.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, StoredArtifact>> {
        self.rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ArtifactRepository for MemoryArtifactRepository {
    async fn insert(&self, artifact: &StoredArtifact) -> Result<(), IngestError> {
        let mut rows = self.lock();
        if rows.contains_key(&artifact.id) {
            return Err(IngestError::storage(
                &artifact.storage_key,
                format!("duplicate artifact id {}", artifact.id),
            ));
        }
        rows.insert(artifact.id, artifact.clone());
        Ok(())
    }

    async fn delete_all(&self, ids: &[Uuid]) -> Result<(), IngestError> {
        let mut rows = self.lock();
        for id in ids {
            rows.remove(id);
        }
        Ok(())
    }
}
