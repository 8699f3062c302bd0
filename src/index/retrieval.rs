//! Retrieval methods and the store-backed retrieval service.

use crate::error::IngestError;
use crate::index::store::{KeywordStore, VectorStore};
use crate::index::types::ScoredDocument;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Default dense weight of a hybrid search.
pub const DEFAULT_VECTOR_WEIGHT: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetrievalMethod {
    Dense,
    Keyword,
    Hybrid,
}

impl RetrievalMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMethod::Dense => "semantic_search",
            RetrievalMethod::Keyword => "keyword_search",
            RetrievalMethod::Hybrid => "hybrid_search",
        }
    }
}

impl fmt::Display for RetrievalMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetrievalMethod {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "semantic_search" | "dense" => Ok(RetrievalMethod::Dense),
            "keyword_search" | "keyword" | "full_text_search" => Ok(RetrievalMethod::Keyword),
            "hybrid_search" | "hybrid" => Ok(RetrievalMethod::Hybrid),
            other => Err(IngestError::Validation(format!(
                "unknown retrieval method '{}'",
                other
            ))),
        }
    }
}

/// Reranking model forwarded to the retrieval service untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RerankingModel {
    pub provider: String,
    pub model: String,
}

/// One retrieval query.
#[derive(Debug, Clone)]
pub struct RetrievalRequest<'a> {
    pub method: RetrievalMethod,
    pub dataset_id: &'a str,
    pub query: &'a str,
    pub top_k: usize,
    pub score_threshold: f64,
    pub reranking_model: Option<&'a RerankingModel>,
}

/// Scores documents for a query. Callers apply the score threshold.
#[async_trait]
pub trait RetrievalService: Send + Sync {
    async fn retrieve(
        &self,
        request: &RetrievalRequest<'_>,
    ) -> Result<Vec<ScoredDocument>, IngestError>;
}

/// Retrieval straight from a vector store and a keyword store.
pub struct StoreRetrievalService {
    vector: Arc<dyn VectorStore>,
    keyword: Arc<dyn KeywordStore>,
    vector_weight: f64,
}

impl StoreRetrievalService {
    pub fn new(vector: Arc<dyn VectorStore>, keyword: Arc<dyn KeywordStore>) -> Self {
        Self {
            vector,
            keyword,
            vector_weight: DEFAULT_VECTOR_WEIGHT,
        }
    }

    /// Weight of the dense score in a hybrid search, clamped to `[0, 1]`.
    pub fn with_vector_weight(mut self, weight: f64) -> Self {
        self.vector_weight = weight.clamp(0.0, 1.0);
        self
    }
}

#[async_trait]
impl RetrievalService for StoreRetrievalService {
    async fn retrieve(
        &self,
        request: &RetrievalRequest<'_>,
    ) -> Result<Vec<ScoredDocument>, IngestError> {
        if let Some(model) = request.reranking_model {
            debug!("Reranking model {}/{} ignored by store retrieval", model.provider, model.model);
        }
        let (dataset, query, top_k) = (request.dataset_id, request.query, request.top_k);
        match request.method {
            RetrievalMethod::Dense => self.vector.search(dataset, query, top_k).await,
            RetrievalMethod::Keyword => self.keyword.search(dataset, query, top_k).await,
            RetrievalMethod::Hybrid => {
                let dense = self.vector.search(dataset, query, top_k).await?;
                let sparse = self.keyword.search(dataset, query, top_k).await?;
                Ok(weighted_merge(dense, sparse, self.vector_weight, top_k))
            }
        }
    }
}

/// Merge two hit lists by `doc_id`: `w·dense + (1-w)·keyword`, a missing
/// side counting as zero.
fn weighted_merge(
    dense: Vec<ScoredDocument>,
    sparse: Vec<ScoredDocument>,
    weight: f64,
    top_k: usize,
) -> Vec<ScoredDocument> {
    let mut order: Vec<String> = Vec::new();
    let mut merged: HashMap<String, ScoredDocument> = HashMap::new();

    let mut add = |hit: ScoredDocument, w: f64| {
        let id = hit.document.doc_id().unwrap_or_default().to_string();
        match merged.get_mut(&id) {
            Some(existing) => existing.score += w * hit.score,
            None => {
                order.push(id.clone());
                merged.insert(
                    id,
                    ScoredDocument {
                        score: w * hit.score,
                        document: hit.document,
                    },
                );
            }
        }
    };
    for hit in dense {
        add(hit, weight);
    }
    for hit in sparse {
        add(hit, 1.0 - weight);
    }

    let mut out: Vec<ScoredDocument> = order
        .into_iter()
        .filter_map(|id| merged.remove(&id))
        .collect();
    out.sort_by(|a, b| b.score.total_cmp(&a.score));
    out.truncate(top_k);
    out
}
