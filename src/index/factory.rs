//! Select and validate an [`IndexProcessor`] once, up front.

use crate::error::IngestError;
use crate::extractor::DocumentExtractor;
use crate::gateway::LlmGateway;
use crate::index::coordinator::StoreCoordinator;
use crate::index::external::{ExternalIndexClient, DEFAULT_EXTERNAL_TIMEOUT_SECS};
use crate::index::processor::{
    ExternalProcessor, IndexProcessor, ParagraphProcessor, ParentChildProcessor, QaProcessor,
};
use crate::index::transform::TextSplitter;
use crate::index::types::IndexType;
use crate::storage::BlobStorage;
use std::sync::Arc;
use tracing::debug;

/// Collaborators shared by every processor variant.
#[derive(Clone)]
pub struct IndexComponents {
    pub stores: StoreCoordinator,
    pub extractor: Arc<dyn DocumentExtractor>,
    pub storage: Arc<dyn BlobStorage>,
    pub llm: Option<Arc<dyn LlmGateway>>,
    /// Splitter for paragraph and QA chunks. Default: 500 chars, 50 overlap.
    pub splitter: TextSplitter,
    /// Parent splitter. Default: 1000 chars, no overlap.
    pub parent_splitter: TextSplitter,
    /// Child splitter. Default: 200 chars, no overlap.
    pub child_splitter: TextSplitter,
    pub external_timeout_secs: u64,
}

impl IndexComponents {
    pub fn new(
        stores: StoreCoordinator,
        extractor: Arc<dyn DocumentExtractor>,
        storage: Arc<dyn BlobStorage>,
    ) -> Self {
        Self {
            stores,
            extractor,
            storage,
            llm: None,
            splitter: TextSplitter::default(),
            parent_splitter: TextSplitter::new(1000, 0),
            child_splitter: TextSplitter::new(200, 0),
            external_timeout_secs: DEFAULT_EXTERNAL_TIMEOUT_SECS,
        }
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmGateway>) -> Self {
        self.llm = Some(llm);
        self
    }
}

/// Chooses the processor for a dataset's index type.
#[derive(Debug, Clone, Default)]
pub struct IndexProcessorFactory {
    index_type: Option<String>,
    server_address: Option<String>,
    skip_validation: bool,
}

impl IndexProcessorFactory {
    pub fn new(index_type: Option<&str>) -> Self {
        Self {
            index_type: index_type.map(str::to_string),
            ..Default::default()
        }
    }

    /// Address of the external extraction service.
    pub fn server_address(mut self, address: impl Into<String>) -> Self {
        self.server_address = Some(address.into());
        self
    }

    /// Build the external variant even without an address. Its `extract`
    /// then fails; `clean` and `retrieve` work.
    pub fn skip_validation(mut self, skip: bool) -> Self {
        self.skip_validation = skip;
        self
    }

    /// # Errors
    /// [`IngestError::Validation`] when the index type is missing or
    /// unknown, when the external variant has no address (unless validation
    /// is skipped), or when the QA variant has no LLM.
    pub fn init_index_processor(
        &self,
        components: &IndexComponents,
    ) -> Result<IndexProcessor, IngestError> {
        let index_type: IndexType = self
            .index_type
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| IngestError::Validation("Index type must be specified".into()))?
            .parse()?;
        debug!("Initialising {} index processor", index_type);

        let c = components.clone();
        Ok(match index_type {
            IndexType::Paragraph => IndexProcessor::Paragraph(ParagraphProcessor {
                extractor: c.extractor,
                splitter: c.splitter,
                stores: c.stores,
            }),
            IndexType::QuestionAnswer => {
                let llm = c.llm.ok_or_else(|| {
                    IngestError::Validation("qa_model index requires an LLM".into())
                })?;
                IndexProcessor::QuestionAnswer(QaProcessor {
                    extractor: c.extractor,
                    splitter: c.splitter,
                    llm,
                    stores: c.stores,
                })
            }
            IndexType::ParentChild => IndexProcessor::ParentChild(ParentChildProcessor {
                extractor: c.extractor,
                parent_splitter: c.parent_splitter,
                child_splitter: c.child_splitter,
                stores: c.stores,
            }),
            IndexType::External => {
                let address = self
                    .server_address
                    .as_deref()
                    .map(str::trim)
                    .filter(|a| !a.is_empty());
                let client = match address {
                    Some(address) => Some(ExternalIndexClient::new(address, c.external_timeout_secs)?),
                    None if self.skip_validation => None,
                    None => {
                        return Err(IngestError::Validation(
                            "External Split Strategy API Endpoint must be not null".into(),
                        ))
                    }
                };
                IndexProcessor::External(ExternalProcessor {
                    client,
                    storage: c.storage,
                    stores: c.stores,
                })
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::TextExtractor;
    use crate::storage::MemoryBlobStorage;

    fn components() -> IndexComponents {
        let storage: Arc<dyn BlobStorage> = Arc::new(MemoryBlobStorage::new());
        IndexComponents::new(
            StoreCoordinator::in_memory(),
            Arc::new(TextExtractor::new(storage.clone())),
            storage,
        )
    }

    #[test]
    fn missing_index_type_fails_fast() {
        let err = IndexProcessorFactory::new(None)
            .init_index_processor(&components())
            .err()
            .unwrap();
        assert!(matches!(err, IngestError::Validation(_)));
    }

    #[test]
    fn external_needs_address_unless_skipped() {
        let factory = IndexProcessorFactory::new(Some("external"));
        assert!(matches!(
            factory.init_index_processor(&components()),
            Err(IngestError::Validation(_))
        ));
        let p = factory
            .clone()
            .skip_validation(true)
            .init_index_processor(&components())
            .unwrap();
        assert_eq!(p.index_type(), IndexType::External);
        let p = factory
            .server_address("http://split.internal/extract")
            .init_index_processor(&components())
            .unwrap();
        assert_eq!(p.index_type(), IndexType::External);
    }

    #[test]
    fn qa_needs_llm() {
        assert!(IndexProcessorFactory::new(Some("qa_model"))
            .init_index_processor(&components())
            .is_err());
    }

    #[test]
    fn known_types_build() {
        for (name, t) in [
            ("text_model", IndexType::Paragraph),
            ("hierarchical_model", IndexType::ParentChild),
        ] {
            let p = IndexProcessorFactory::new(Some(name))
                .init_index_processor(&components())
                .unwrap();
            assert_eq!(p.index_type(), t);
        }
    }
}
