//! Key-value byte storage.

use crate::error::IngestError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Save/load/delete bytes by key.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    async fn save(&self, key: &str, bytes: Vec<u8>) -> Result<(), IngestError>;

    /// Fails with [`IngestError::NotFound`] when `key` is absent.
    async fn load(&self, key: &str) -> Result<Vec<u8>, IngestError>;

    /// Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), IngestError>;

    async fn exists(&self, key: &str) -> Result<bool, IngestError> {
        match self.load(key).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

// ── Local filesystem ─────────────────────────────────────────────────────

/// Blobs stored as files under a root directory.
///
/// Writes go to a sibling `.tmp` file first and are renamed into place, so a
/// reader never observes a partial blob.
#[derive(Debug, Clone)]
pub struct LocalBlobStorage {
    root: PathBuf,
}

impl LocalBlobStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, IngestError> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(IngestError::storage(key, "key must be a relative path without '..'"));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStorage for LocalBlobStorage {
    async fn save(&self, key: &str, bytes: Vec<u8>) -> Result<(), IngestError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| IngestError::storage(key, e.to_string()))?;
        }
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| IngestError::storage(key, e.to_string()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| IngestError::storage(key, e.to_string()))?;
        debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Vec<u8>, IngestError> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => IngestError::not_found(format!("storage key '{}'", key)),
            _ => IngestError::storage(key, e.to_string()),
        })
    }

    async fn delete(&self, key: &str) -> Result<(), IngestError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(IngestError::storage(key, e.to_string())),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, IngestError> {
        let path = self.path_for(key)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| IngestError::storage(key, e.to_string()))
    }
}

// ── In-memory ────────────────────────────────────────────────────────────

/// Process-local blob store.
#[derive(Debug, Default)]
pub struct MemoryBlobStorage {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBlobStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored keys in lexical order.
    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl BlobStorage for MemoryBlobStorage {
    async fn save(&self, key: &str, bytes: Vec<u8>) -> Result<(), IngestError> {
        self.lock().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Vec<u8>, IngestError> {
        self.lock()
            .get(key)
            .cloned()
            .ok_or_else(|| IngestError::not_found(format!("storage key '{}'", key)))
    }

    async fn delete(&self, key: &str) -> Result<(), IngestError> {
        self.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_storage_round_trip_and_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStorage::new(dir.path());

        store.save("image_files/t1/a.png", b"png".to_vec()).await.unwrap();
        assert_eq!(store.load("image_files/t1/a.png").await.unwrap(), b"png");
        assert!(!dir.path().join("image_files/t1/a.png.tmp").exists());

        store.delete("image_files/t1/a.png").await.unwrap();
        let err = store.load("image_files/t1/a.png").await.unwrap_err();
        assert!(err.is_not_found());

        // Deleting again is not an error.
        store.delete("image_files/t1/a.png").await.unwrap();
    }

    #[tokio::test]
    async fn local_exists_checks_the_file_without_reading_it() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStorage::new(dir.path());
        assert!(!store.exists("cache/t1/doc.json").await.unwrap());

        store.save("cache/t1/doc.json", b"{}".to_vec()).await.unwrap();
        assert!(store.exists("cache/t1/doc.json").await.unwrap());

        // A directory at the key is present but unreadable as a blob.
        std::fs::create_dir_all(dir.path().join("cache/t2")).unwrap();
        assert!(store.exists("cache/t2").await.unwrap());
        assert!(store.load("cache/t2").await.is_err());
    }

    #[tokio::test]
    async fn local_storage_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStorage::new(dir.path());
        let err = store.save("../outside", vec![1]).await.unwrap_err();
        assert!(matches!(err, IngestError::Storage { .. }));
        assert!(store.load("/etc/passwd").await.is_err());
    }

    #[tokio::test]
    async fn memory_storage_semantics() {
        let store = MemoryBlobStorage::new();
        assert!(!store.exists("k").await.unwrap());
        store.save("k", vec![1, 2]).await.unwrap();
        assert!(store.exists("k").await.unwrap());
        assert_eq!(store.keys(), vec!["k".to_string()]);
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert!(store.is_empty());
    }
}
