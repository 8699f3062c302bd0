//! Reading extraction inputs, and the plain-text extractor.

use crate::document::{content_hash, Document, ExtractSetting, DOC_HASH};
use crate::error::IngestError;
use crate::extractor::DocumentExtractor;
use crate::storage::BlobStorage;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::sync::Arc;
use tracing::debug;

/// Source bytes named by `setting`: the upload reference when present,
/// otherwise the local path.
pub async fn read_source(
    storage: &dyn BlobStorage,
    setting: &ExtractSetting,
) -> Result<Vec<u8>, IngestError> {
    if let Some(upload) = &setting.upload_file {
        debug!("Loading upload {} from storage", upload.key);
        return storage.load(&upload.key).await;
    }
    let Some(path) = &setting.local_path else {
        return Err(IngestError::Validation(
            "extract setting names neither an upload file nor a local path".into(),
        ));
    };
    tokio::fs::read(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => IngestError::not_found(format!("source file '{}'", path.display())),
        _ => IngestError::Io {
            path: path.clone(),
            source: e,
        },
    })
}

/// Treats the source as UTF-8 text and returns it as one document.
pub struct TextExtractor {
    storage: Arc<dyn BlobStorage>,
}

impl TextExtractor {
    pub fn new(storage: Arc<dyn BlobStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl DocumentExtractor for TextExtractor {
    async fn extract(&self, setting: &ExtractSetting) -> Result<Vec<Document>, IngestError> {
        let bytes = read_source(self.storage.as_ref(), setting).await?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let hash = content_hash(&text);
        let mut doc = Document::new(text).with_metadata(DOC_HASH, hash);
        if let Some(name) = setting.file_name() {
            doc = doc.with_metadata("source", name);
        }
        Ok(vec![doc])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::UploadFileRef;
    use crate::storage::MemoryBlobStorage;

    #[tokio::test]
    async fn missing_local_file_is_not_found() {
        let storage = MemoryBlobStorage::new();
        let err = read_source(&storage, &ExtractSetting::for_path("/no/such/file.pdf"))
            .await
            .unwrap_err();
        assert!(err.is_not_found(), "got {err:?}");
    }

    #[tokio::test]
    async fn empty_setting_is_rejected() {
        let storage = MemoryBlobStorage::new();
        let err = read_source(&storage, &ExtractSetting::default()).await.unwrap_err();
        assert!(matches!(err, IngestError::Validation(_)));
    }

    #[tokio::test]
    async fn text_extractor_reads_upload() {
        let storage = Arc::new(MemoryBlobStorage::new());
        storage.save("upload_files/t/a.txt", b"hello".to_vec()).await.unwrap();
        let extractor = TextExtractor::new(storage);
        let docs = extractor
            .extract(&ExtractSetting::for_upload(UploadFileRef {
                key: "upload_files/t/a.txt".into(),
                name: "a.txt".into(),
                tenant_id: None,
                created_by: None,
            }))
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].page_content, "hello");
        assert_eq!(docs[0].doc_hash(), Some(content_hash("hello").as_str()));
        assert_eq!(docs[0].metadata["source"], "a.txt");
    }
}
