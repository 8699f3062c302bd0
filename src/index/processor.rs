//! The index processor: one closed set of strategies behind the
//! extract → transform → load → clean → retrieve lifecycle.
//!
//! | Variant | extract | transform | load / clean / retrieve |
//! |---------|---------|-----------|-------------------------|
//! | Paragraph | local extractor | recursive split | chunks |
//! | QuestionAnswer | local extractor | split + LLM Q/A | questions |
//! | ParentChild | local extractor | parents + children | children; hits mapped to parents |
//! | External | remote service | unchanged | documents as returned |

use crate::document::{Document, ExtractSetting};
use crate::error::IngestError;
use crate::extractor::{read_source, DocumentExtractor};
use crate::gateway::LlmGateway;
use crate::index::coordinator::StoreCoordinator;
use crate::index::external::ExternalIndexClient;
use crate::index::retrieval::{RerankingModel, RetrievalMethod};
use crate::index::transform::{
    collapse_to_parents, flatten_children, parent_child_documents, qa_documents,
    split_documents, TextSplitter,
};
use crate::index::types::{Dataset, IndexType};
use crate::storage::BlobStorage;
use std::sync::Arc;
use tracing::{debug, info};

/// Paragraph chunks.
pub struct ParagraphProcessor {
    pub(crate) extractor: Arc<dyn DocumentExtractor>,
    pub(crate) splitter: TextSplitter,
    pub(crate) stores: StoreCoordinator,
}

/// LLM-generated question/answer pairs.
pub struct QaProcessor {
    pub(crate) extractor: Arc<dyn DocumentExtractor>,
    pub(crate) splitter: TextSplitter,
    pub(crate) llm: Arc<dyn LlmGateway>,
    pub(crate) stores: StoreCoordinator,
}

/// Large parent chunks retrieved through small child chunks.
pub struct ParentChildProcessor {
    pub(crate) extractor: Arc<dyn DocumentExtractor>,
    pub(crate) parent_splitter: TextSplitter,
    pub(crate) child_splitter: TextSplitter,
    pub(crate) stores: StoreCoordinator,
}

/// Extraction delegated to a remote service.
pub struct ExternalProcessor {
    /// `None` only when built without validation and without an address.
    pub(crate) client: Option<ExternalIndexClient>,
    pub(crate) storage: Arc<dyn BlobStorage>,
    pub(crate) stores: StoreCoordinator,
}

pub enum IndexProcessor {
    Paragraph(ParagraphProcessor),
    QuestionAnswer(QaProcessor),
    ParentChild(ParentChildProcessor),
    External(ExternalProcessor),
}

impl IndexProcessor {
    pub fn index_type(&self) -> IndexType {
        match self {
            IndexProcessor::Paragraph(_) => IndexType::Paragraph,
            IndexProcessor::QuestionAnswer(_) => IndexType::QuestionAnswer,
            IndexProcessor::ParentChild(_) => IndexType::ParentChild,
            IndexProcessor::External(_) => IndexType::External,
        }
    }

    fn stores(&self) -> &StoreCoordinator {
        match self {
            IndexProcessor::Paragraph(p) => &p.stores,
            IndexProcessor::QuestionAnswer(p) => &p.stores,
            IndexProcessor::ParentChild(p) => &p.stores,
            IndexProcessor::External(p) => &p.stores,
        }
    }

    /// Produce raw documents from `setting`.
    pub async fn extract(&self, setting: &ExtractSetting) -> Result<Vec<Document>, IngestError> {
        let documents = match self {
            IndexProcessor::Paragraph(p) => p.extractor.extract(setting).await?,
            IndexProcessor::QuestionAnswer(p) => p.extractor.extract(setting).await?,
            IndexProcessor::ParentChild(p) => p.extractor.extract(setting).await?,
            IndexProcessor::External(p) => {
                let client = p.client.as_ref().ok_or_else(|| {
                    IngestError::Validation(
                        "External Split Strategy API Endpoint must be not null".into(),
                    )
                })?;
                let bytes = read_source(p.storage.as_ref(), setting).await?;
                let name = setting.file_name();
                client.extract(name.as_deref(), &bytes).await?
            }
        };
        info!("{} extract: {} document(s)", self.index_type(), documents.len());
        Ok(documents)
    }

    /// Turn extracted documents into the units that get indexed.
    pub async fn transform(&self, documents: Vec<Document>) -> Result<Vec<Document>, IngestError> {
        let out = match self {
            IndexProcessor::Paragraph(p) => split_documents(&documents, &p.splitter),
            IndexProcessor::QuestionAnswer(p) => {
                qa_documents(p.llm.as_ref(), &documents, &p.splitter).await?
            }
            IndexProcessor::ParentChild(p) => {
                parent_child_documents(&documents, &p.parent_splitter, &p.child_splitter)
            }
            IndexProcessor::External(_) => documents,
        };
        debug!("{} transform: {} document(s)", self.index_type(), out.len());
        Ok(out)
    }

    /// Write documents into the dataset's stores.
    ///
    /// Parent documents are indexed through their children. `keywords_list`
    /// is only forwarded when it lines up with the documents written.
    ///
    /// # Errors
    /// [`IngestError::IndexWrite`] naming every store that failed; the other
    /// store's write is kept.
    pub async fn load(
        &self,
        dataset: &Dataset,
        documents: &[Document],
        with_keywords: bool,
        keywords_list: Option<&[Vec<String>]>,
    ) -> Result<(), IngestError> {
        if let IndexProcessor::ParentChild(_) = self {
            if documents.iter().any(|d| !d.children.is_empty()) {
                let children = flatten_children(documents);
                return self
                    .stores()
                    .load(dataset, &children, with_keywords, None)
                    .await;
            }
        }
        self.stores()
            .load(dataset, documents, with_keywords, keywords_list)
            .await
    }

    /// Delete `node_ids`, or the whole dataset when `None`.
    pub async fn clean(
        &self,
        dataset: &Dataset,
        node_ids: Option<&[String]>,
        with_keywords: bool,
    ) -> Result<(), IngestError> {
        self.stores().clean(dataset, node_ids, with_keywords).await
    }

    /// Retrieve documents scoring strictly above `score_threshold`.
    pub async fn retrieve(
        &self,
        method: RetrievalMethod,
        query: &str,
        dataset: &Dataset,
        top_k: usize,
        score_threshold: f64,
        reranking_model: Option<&RerankingModel>,
    ) -> Result<Vec<Document>, IngestError> {
        let hits = self
            .stores()
            .retrieve(method, query, dataset, top_k, score_threshold, reranking_model)
            .await?;
        Ok(match self {
            IndexProcessor::ParentChild(_) => collapse_to_parents(hits),
            _ => hits,
        })
    }
}
