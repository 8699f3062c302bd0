//! Fan-out writes and deletes across the vector and keyword stores, and
//! the thresholded fan-in read.
//!
//! The two stores are written concurrently and independently. There is no
//! atomicity between them: when one fails the other's change stays applied
//! and the failure is reported through [`IngestError::IndexWrite`]. Re-running the same `load`
//! or `clean` repairs the drift because both stores are idempotent by
//! `doc_id`.

use crate::document::{Document, SCORE};
use crate::error::{IngestError, StoreFailure, StoreKind};
use crate::index::retrieval::{
    RerankingModel, RetrievalMethod, RetrievalRequest, RetrievalService, StoreRetrievalService,
};
use crate::index::store::{KeywordStore, MemoryKeywordStore, MemoryVectorStore, VectorStore};
use crate::index::types::Dataset;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// The backing stores and retrieval service of an index.
#[derive(Clone)]
pub struct StoreCoordinator {
    vector: Arc<dyn VectorStore>,
    keyword: Arc<dyn KeywordStore>,
    retrieval: Arc<dyn RetrievalService>,
}

impl StoreCoordinator {
    pub fn new(
        vector: Arc<dyn VectorStore>,
        keyword: Arc<dyn KeywordStore>,
        retrieval: Arc<dyn RetrievalService>,
    ) -> Self {
        Self {
            vector,
            keyword,
            retrieval,
        }
    }

    /// In-memory stores with a [`StoreRetrievalService`] over them.
    pub fn in_memory() -> Self {
        let vector: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::new());
        let keyword: Arc<dyn KeywordStore> = Arc::new(MemoryKeywordStore::new());
        let retrieval = Arc::new(StoreRetrievalService::new(vector.clone(), keyword.clone()));
        Self::new(vector, keyword, retrieval)
    }

    /// Write `documents` to the vector store when the dataset is dense, and
    /// independently to the keyword store when `with_keywords` is set.
    pub async fn load(
        &self,
        dataset: &Dataset,
        documents: &[Document],
        with_keywords: bool,
        keywords_list: Option<&[Vec<String>]>,
    ) -> Result<(), IngestError> {
        let keywords = keywords_list.filter(|k| !k.is_empty());
        let vector_write = async {
            if !dataset.uses_vectors() {
                return None;
            }
            let result = self.vector.add_texts(&dataset.id, documents).await;
            result.err().map(|e| failure(StoreKind::Vector, &dataset.id, e))
        };
        let keyword_write = async {
            if !with_keywords {
                return None;
            }
            let result = self.keyword.add_texts(&dataset.id, documents, keywords).await;
            result.err().map(|e| failure(StoreKind::Keyword, &dataset.id, e))
        };
        let (vector, keyword) = futures::join!(vector_write, keyword_write);
        let failures: Vec<StoreFailure> = [vector, keyword].into_iter().flatten().collect();

        debug!("Loaded {} document(s) into dataset {}", documents.len(), dataset.id);
        into_result(failures)
    }

    /// Delete `node_ids` (or everything when `None` or empty) from each
    /// store `load` would have written.
    pub async fn clean(
        &self,
        dataset: &Dataset,
        node_ids: Option<&[String]>,
        with_keywords: bool,
    ) -> Result<(), IngestError> {
        let ids = node_ids.filter(|ids| !ids.is_empty());
        let vector_delete = async {
            if !dataset.uses_vectors() {
                return None;
            }
            let result = match ids {
                Some(ids) => self.vector.delete_by_ids(&dataset.id, ids).await,
                None => self.vector.delete_all(&dataset.id).await,
            };
            result.err().map(|e| failure(StoreKind::Vector, &dataset.id, e))
        };
        let keyword_delete = async {
            if !with_keywords {
                return None;
            }
            let result = match ids {
                Some(ids) => self.keyword.delete_by_ids(&dataset.id, ids).await,
                None => self.keyword.delete_all(&dataset.id).await,
            };
            result.err().map(|e| failure(StoreKind::Keyword, &dataset.id, e))
        };
        let (vector, keyword) = futures::join!(vector_delete, keyword_delete);
        let failures: Vec<StoreFailure> = [vector, keyword].into_iter().flatten().collect();

        into_result(failures)
    }

    /// Query the retrieval service and keep hits scoring strictly above
    /// `score_threshold`, recording each score in `metadata["score"]`.
    pub async fn retrieve(
        &self,
        method: RetrievalMethod,
        query: &str,
        dataset: &Dataset,
        top_k: usize,
        score_threshold: f64,
        reranking_model: Option<&RerankingModel>,
    ) -> Result<Vec<Document>, IngestError> {
        let request = RetrievalRequest {
            method,
            dataset_id: &dataset.id,
            query,
            top_k,
            score_threshold,
            reranking_model,
        };
        let hits = self.retrieval.retrieve(&request).await?;
        let total = hits.len();
        let docs: Vec<Document> = hits
            .into_iter()
            .filter(|hit| hit.score > score_threshold)
            .map(|hit| {
                let mut doc = hit.document;
                doc.metadata.insert(SCORE.to_string(), Value::from(hit.score));
                doc
            })
            .collect();
        debug!(
            "{} on dataset {}: {} of {} hit(s) above {}",
            method,
            dataset.id,
            docs.len(),
            total,
            score_threshold
        );
        Ok(docs)
    }
}

fn failure(store: StoreKind, dataset_id: &str, error: IngestError) -> StoreFailure {
    warn!("{} store failed for dataset {}: {}", store, dataset_id, error);
    StoreFailure {
        store,
        message: error.to_string(),
    }
}

fn into_result(failures: Vec<StoreFailure>) -> Result<(), IngestError> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(IngestError::IndexWrite { failures })
    }
}
