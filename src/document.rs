//! Normalised documents and extraction inputs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use uuid::Uuid;

/// Metadata key holding a document's stable identifier.
pub const DOC_ID: &str = "doc_id";
/// Metadata key holding a document's content fingerprint.
pub const DOC_HASH: &str = "doc_hash";
/// Metadata key set on retrieval results.
pub const SCORE: &str = "score";

/// Lowercase hex SHA-256 of `content`.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A unit of text flowing through extraction and indexing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Child chunks produced by the parent-child strategy.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Document>,
}

impl Document {
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: Map::new(),
            children: Vec::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn doc_id(&self) -> Option<&str> {
        self.metadata.get(DOC_ID).and_then(Value::as_str)
    }

    pub fn doc_hash(&self) -> Option<&str> {
        self.metadata.get(DOC_HASH).and_then(Value::as_str)
    }

    pub fn score(&self) -> Option<f64> {
        self.metadata.get(SCORE).and_then(Value::as_f64)
    }

    /// Fill in a fresh `doc_id` and the content hash when the key is absent.
    /// Values already present are kept as supplied, whatever their type.
    pub fn ensure_identity(mut self) -> Self {
        if !self.metadata.contains_key(DOC_ID) {
            self.metadata
                .insert(DOC_ID.to_string(), Value::String(Uuid::new_v4().to_string()));
        }
        if !self.metadata.contains_key(DOC_HASH) {
            let hash = content_hash(&self.page_content);
            self.metadata.insert(DOC_HASH.to_string(), Value::String(hash));
        }
        self
    }
}

/// Reference to an uploaded file in blob storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadFileRef {
    /// Storage key of the file bytes.
    pub key: String,
    /// Original file name, forwarded to remote extractors.
    pub name: String,
    pub tenant_id: Option<String>,
    pub created_by: Option<String>,
}

/// Input descriptor for `extract`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractSetting {
    pub upload_file: Option<UploadFileRef>,
    /// Local file, used when no upload reference is given.
    pub local_path: Option<PathBuf>,
    /// Storage key for cached plaintext.
    pub cache_key: Option<String>,
}

impl ExtractSetting {
    pub fn for_upload(upload: UploadFileRef) -> Self {
        Self {
            upload_file: Some(upload),
            ..Default::default()
        }
    }

    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            local_path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    /// File name for display and remote extractors.
    pub fn file_name(&self) -> Option<String> {
        if let Some(upload) = &self.upload_file {
            return Some(upload.name.clone());
        }
        self.local_path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
    }
}
