//! Vector and keyword store interfaces with in-memory reference backends.
//!
//! Both stores key entries by the document's `doc_id`. Writes are
//! idempotent: adding an id that already exists replaces the entry, and
//! deleting an absent id is a no-op.

use crate::document::Document;
use crate::error::IngestError;
use crate::index::text::{cosine, extract_keywords, term_frequencies, tokenize, MAX_KEYWORDS};
use crate::index::types::ScoredDocument;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// Dense-retrieval backend.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn add_texts(&self, dataset_id: &str, documents: &[Document]) -> Result<(), IngestError>;
    async fn delete_by_ids(&self, dataset_id: &str, ids: &[String]) -> Result<(), IngestError>;
    async fn delete_all(&self, dataset_id: &str) -> Result<(), IngestError>;
    async fn search(
        &self,
        dataset_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredDocument>, IngestError>;
}

/// Keyword-table backend.
#[async_trait]
pub trait KeywordStore: Send + Sync {
    /// `keywords_list`, when given, holds one keyword list per document and
    /// replaces the store's own keyword extraction.
    async fn add_texts(
        &self,
        dataset_id: &str,
        documents: &[Document],
        keywords_list: Option<&[Vec<String>]>,
    ) -> Result<(), IngestError>;
    async fn delete_by_ids(&self, dataset_id: &str, ids: &[String]) -> Result<(), IngestError>;
    async fn delete_all(&self, dataset_id: &str) -> Result<(), IngestError>;
    async fn search(
        &self,
        dataset_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredDocument>, IngestError>;
}

fn require_id(doc: &Document) -> Result<String, IngestError> {
    doc.doc_id()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| IngestError::Validation("document has no doc_id".into()))
}

fn ranked(mut hits: Vec<ScoredDocument>, top_k: usize) -> Vec<ScoredDocument> {
    hits.retain(|h| h.score > 0.0);
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(top_k);
    hits
}

type Datasets<T> = Mutex<HashMap<String, BTreeMap<String, T>>>;

fn lock<T>(m: &Datasets<T>) -> MutexGuard<'_, HashMap<String, BTreeMap<String, T>>> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ── In-memory vector store ───────────────────────────────────────────────

#[derive(Debug)]
struct VectorEntry {
    document: Document,
    terms: HashMap<String, f64>,
}

/// Term-frequency cosine similarity standing in for embeddings.
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    datasets: Datasets<VectorEntry>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries held for `dataset_id`.
    pub fn len(&self, dataset_id: &str) -> usize {
        lock(&self.datasets).get(dataset_id).map_or(0, BTreeMap::len)
    }

    pub fn ids(&self, dataset_id: &str) -> Vec<String> {
        lock(&self.datasets)
            .get(dataset_id)
            .map(|d| d.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn add_texts(&self, dataset_id: &str, documents: &[Document]) -> Result<(), IngestError> {
        let entries = documents
            .iter()
            .map(|doc| {
                Ok((
                    require_id(doc)?,
                    VectorEntry {
                        document: doc.clone(),
                        terms: term_frequencies(&doc.page_content),
                    },
                ))
            })
            .collect::<Result<Vec<_>, IngestError>>()?;
        lock(&self.datasets)
            .entry(dataset_id.to_string())
            .or_default()
            .extend(entries);
        Ok(())
    }

    async fn delete_by_ids(&self, dataset_id: &str, ids: &[String]) -> Result<(), IngestError> {
        if let Some(entries) = lock(&self.datasets).get_mut(dataset_id) {
            for id in ids {
                entries.remove(id);
            }
        }
        Ok(())
    }

    async fn delete_all(&self, dataset_id: &str) -> Result<(), IngestError> {
        lock(&self.datasets).remove(dataset_id);
        Ok(())
    }

    async fn search(
        &self,
        dataset_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredDocument>, IngestError> {
        let query_terms = term_frequencies(query);
        let datasets = lock(&self.datasets);
        let hits = datasets
            .get(dataset_id)
            .map(|entries| {
                entries
                    .values()
                    .map(|e| ScoredDocument {
                        document: e.document.clone(),
                        score: cosine(&query_terms, &e.terms),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(ranked(hits, top_k))
    }
}

// ── In-memory keyword store ──────────────────────────────────────────────

#[derive(Debug)]
struct KeywordEntry {
    document: Document,
    keywords: HashSet<String>,
}

/// Keyword table: each document keeps its top keywords; a query scores by
/// the fraction of its tokens found among them.
#[derive(Debug, Default)]
pub struct MemoryKeywordStore {
    datasets: Datasets<KeywordEntry>,
}

impl MemoryKeywordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, dataset_id: &str) -> usize {
        lock(&self.datasets).get(dataset_id).map_or(0, BTreeMap::len)
    }

    /// Keywords stored for one document, sorted.
    pub fn keywords(&self, dataset_id: &str, doc_id: &str) -> Option<Vec<String>> {
        let datasets = lock(&self.datasets);
        let entry = datasets.get(dataset_id)?.get(doc_id)?;
        let mut kw: Vec<String> = entry.keywords.iter().cloned().collect();
        kw.sort();
        Some(kw)
    }
}

#[async_trait]
impl KeywordStore for MemoryKeywordStore {
    async fn add_texts(
        &self,
        dataset_id: &str,
        documents: &[Document],
        keywords_list: Option<&[Vec<String>]>,
    ) -> Result<(), IngestError> {
        if let Some(list) = keywords_list {
            if list.len() != documents.len() {
                return Err(IngestError::Validation(format!(
                    "{} keyword lists for {} documents",
                    list.len(),
                    documents.len()
                )));
            }
        }
        let entries = documents
            .iter()
            .enumerate()
            .map(|(i, doc)| {
                let keywords = match keywords_list {
                    Some(list) => list[i].iter().map(|k| k.to_lowercase()).collect(),
                    None => extract_keywords(&doc.page_content, MAX_KEYWORDS)
                        .into_iter()
                        .collect(),
                };
                Ok((
                    require_id(doc)?,
                    KeywordEntry {
                        document: doc.clone(),
                        keywords,
                    },
                ))
            })
            .collect::<Result<Vec<_>, IngestError>>()?;
        lock(&self.datasets)
            .entry(dataset_id.to_string())
            .or_default()
            .extend(entries);
        Ok(())
    }

    async fn delete_by_ids(&self, dataset_id: &str, ids: &[String]) -> Result<(), IngestError> {
        if let Some(entries) = lock(&self.datasets).get_mut(dataset_id) {
            for id in ids {
                entries.remove(id);
            }
        }
        Ok(())
    }

    async fn delete_all(&self, dataset_id: &str) -> Result<(), IngestError> {
        lock(&self.datasets).remove(dataset_id);
        Ok(())
    }

    async fn search(
        &self,
        dataset_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredDocument>, IngestError> {
        let tokens: HashSet<String> = tokenize(query).into_iter().collect();
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let datasets = lock(&self.datasets);
        let hits = datasets
            .get(dataset_id)
            .map(|entries| {
                entries
                    .values()
                    .map(|e| ScoredDocument {
                        document: e.document.clone(),
                        score: tokens.intersection(&e.keywords).count() as f64
                            / tokens.len() as f64,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(ranked(hits, top_k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DOC_ID;

    fn doc(id: &str, text: &str) -> Document {
        Document::new(text).with_metadata(DOC_ID, id)
    }

    #[tokio::test]
    async fn vector_store_is_idempotent_by_id() {
        let store = MemoryVectorStore::new();
        store.add_texts("d", &[doc("1", "hotel fee")]).await.unwrap();
        store.add_texts("d", &[doc("1", "hotel fee")]).await.unwrap();
        assert_eq!(store.len("d"), 1);

        store.delete_by_ids("d", &["missing".into()]).await.unwrap();
        store.delete_by_ids("d", &["1".into()]).await.unwrap();
        store.delete_by_ids("d", &["1".into()]).await.unwrap();
        assert_eq!(store.len("d"), 0);
    }

    #[tokio::test]
    async fn vector_search_ranks_by_similarity() {
        let store = MemoryVectorStore::new();
        store
            .add_texts(
                "d",
                &[doc("1", "hotel fee 750"), doc("2", "meals fee"), doc("3", "weather")],
            )
            .await
            .unwrap();
        let hits = store.search("d", "hotel fee", 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document.doc_id(), Some("1"));
        assert!(hits[0].score > hits[1].score);
        assert!(store.search("other", "hotel", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn documents_need_ids() {
        let store = MemoryVectorStore::new();
        let err = store.add_texts("d", &[Document::new("x")]).await.unwrap_err();
        assert!(matches!(err, IngestError::Validation(_)));
    }

    #[tokio::test]
    async fn keyword_store_prefers_supplied_keywords() {
        let store = MemoryKeywordStore::new();
        store
            .add_texts(
                "d",
                &[doc("1", "text that never mentions it")],
                Some(&[vec!["Budget".to_string()]]),
            )
            .await
            .unwrap();
        assert_eq!(store.keywords("d", "1"), Some(vec!["budget".to_string()]));
        let hits = store.search("d", "budget", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score, 1.0);
    }

    #[tokio::test]
    async fn keyword_list_length_must_match() {
        let store = MemoryKeywordStore::new();
        let err = store
            .add_texts("d", &[doc("1", "a"), doc("2", "b")], Some(&[vec![]]))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Validation(_)));
    }

    #[tokio::test]
    async fn keyword_delete_all_drops_dataset() {
        let store = MemoryKeywordStore::new();
        store.add_texts("d", &[doc("1", "hotel")], None).await.unwrap();
        store.delete_all("d").await.unwrap();
        assert_eq!(store.len("d"), 0);
        store.delete_all("d").await.unwrap();
    }
}
