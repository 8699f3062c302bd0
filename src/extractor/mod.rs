//! Document extractors.
//!
//! [`TableAwareExtractor`] is the PDF path: table scan, image storage, OCR,
//! LLM summaries and artifact rollback. [`TextExtractor`] reads plain text.
//! Index processors only depend on the [`DocumentExtractor`] trait.

pub mod source;
pub mod table;
pub mod transaction;

pub use source::{read_source, TextExtractor};
pub use table::{extract_sync, TableAwareExtractor};
pub use transaction::{ArtifactTransaction, UndoAction};

use crate::document::{Document, ExtractSetting};
use crate::error::IngestError;
use async_trait::async_trait;

/// Turns an [`ExtractSetting`] into normalised documents.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, setting: &ExtractSetting) -> Result<Vec<Document>, IngestError>;
}
