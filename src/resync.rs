//! Periodic re-sync of documents whose source lives outside the system.
//!
//! Tracked documents are processed in batches. For each batch the current
//! content is fetched, hashed and compared with the stored `doc_hash`; only
//! documents whose hash changed are handed to the [`ReindexSink`]. Hash
//! equality is the only signal used to skip re-extraction.

use crate::document::content_hash;
use crate::error::IngestError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

/// Default number of documents per fetch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// A previously indexed document and where its content comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedDocument {
    pub document_id: String,
    /// Identifier understood by the [`ContentFetcher`] (e.g. a wiki page id).
    pub source_id: String,
    pub doc_hash: Option<String>,
}

/// Fresh content of one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedContent {
    pub source_id: String,
    pub content: String,
}

/// Fetches current content for a batch of sources. Sources that no longer
/// exist are simply absent from the result.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, source_ids: &[String]) -> Result<Vec<FetchedContent>, IngestError>;
}

/// Receives documents whose content changed.
#[async_trait]
pub trait ReindexSink: Send + Sync {
    async fn reindex(&self, document: &TrackedDocument, content: &FetchedContent) -> Result<(), IngestError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResyncOutcome {
    Unchanged,
    Changed,
    /// The source no longer returned content.
    Missing,
    /// Content changed but the sink rejected it.
    Failed(String),
}

/// Outcome per tracked document, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResyncReport {
    pub outcomes: Vec<(String, ResyncOutcome)>,
}

impl ResyncReport {
    pub fn count(&self, outcome: &ResyncOutcome) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| std::mem::discriminant(o) == std::mem::discriminant(outcome))
            .count()
    }
}

/// Whether `content` differs from what `document` was indexed from.
pub fn has_changed(document: &TrackedDocument, content: &str) -> bool {
    document.doc_hash.as_deref() != Some(content_hash(content).as_str())
}

/// Batches tracked documents through a fetcher and a sink.
#[derive(Debug, Clone)]
pub struct ResyncPlanner {
    batch_size: usize,
}

impl Default for ResyncPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl ResyncPlanner {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    /// Check every document. A fetch failure aborts the run; a sink failure
    /// is recorded and the run continues.
    pub async fn run(
        &self,
        documents: &[TrackedDocument],
        fetcher: &dyn ContentFetcher,
        sink: &dyn ReindexSink,
    ) -> Result<ResyncReport, IngestError> {
        info!("Re-sync of {} tracked document(s)", documents.len());
        let mut report = ResyncReport::default();

        for (batch_no, batch) in documents.chunks(self.batch_size).enumerate() {
            let ids: Vec<String> = batch.iter().map(|d| d.source_id.clone()).collect();
            let fetched: HashMap<String, FetchedContent> = fetcher
                .fetch(&ids)
                .await?
                .into_iter()
                .map(|c| (c.source_id.clone(), c))
                .collect();
            if fetched.len() != ids.len() {
                warn!(
                    "Batch {}: {} of {} source(s) missing",
                    batch_no + 1,
                    ids.len() - fetched.len().min(ids.len()),
                    ids.len()
                );
            }

            for document in batch {
                let outcome = match fetched.get(&document.source_id) {
                    None => ResyncOutcome::Missing,
                    Some(content) if !has_changed(document, &content.content) => {
                        ResyncOutcome::Unchanged
                    }
                    Some(content) => match sink.reindex(document, content).await {
                        Ok(()) => {
                            info!("Source {} changed, re-indexing", document.source_id);
                            ResyncOutcome::Changed
                        }
                        Err(e) => {
                            warn!("Re-index of {} failed: {}", document.document_id, e);
                            ResyncOutcome::Failed(e.to_string())
                        }
                    },
                };
                report.outcomes.push((document.document_id.clone(), outcome));
            }
            info!("Batch {} processed", batch_no + 1);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Pages(HashMap<String, String>, Mutex<Vec<usize>>);

    #[async_trait]
    impl ContentFetcher for Pages {
        async fn fetch(&self, source_ids: &[String]) -> Result<Vec<FetchedContent>, IngestError> {
            self.1.lock().unwrap().push(source_ids.len());
            Ok(source_ids
                .iter()
                .filter_map(|id| {
                    self.0.get(id).map(|c| FetchedContent {
                        source_id: id.clone(),
                        content: c.clone(),
                    })
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    #[async_trait]
    impl ReindexSink for Recorder {
        async fn reindex(&self, document: &TrackedDocument, _c: &FetchedContent) -> Result<(), IngestError> {
            if document.document_id == "bad" {
                return Err(IngestError::Internal("upload failed".into()));
            }
            self.0.lock().unwrap().push(document.document_id.clone());
            Ok(())
        }
    }

    fn tracked(id: &str, source: &str, content: &str) -> TrackedDocument {
        TrackedDocument {
            document_id: id.into(),
            source_id: source.into(),
            doc_hash: Some(content_hash(content)),
        }
    }

    #[tokio::test]
    async fn only_changed_documents_are_reindexed() {
        let pages = Pages(
            [("p1", "same"), ("p2", "edited"), ("p4", "new")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            Mutex::new(Vec::new()),
        );
        let docs = vec![
            tracked("d1", "p1", "same"),
            tracked("d2", "p2", "original"),
            tracked("d3", "p3", "gone"),
            tracked("bad", "p4", "old"),
        ];
        let sink = Recorder::default();
        let report = ResyncPlanner::new(3).run(&docs, &pages, &sink).await.unwrap();

        assert_eq!(*pages.1.lock().unwrap(), vec![3, 1]);
        assert_eq!(*sink.0.lock().unwrap(), vec!["d2".to_string()]);
        assert_eq!(report.outcomes[0].1, ResyncOutcome::Unchanged);
        assert_eq!(report.outcomes[1].1, ResyncOutcome::Changed);
        assert_eq!(report.outcomes[2].1, ResyncOutcome::Missing);
        assert!(matches!(report.outcomes[3].1, ResyncOutcome::Failed(_)));
        assert_eq!(report.count(&ResyncOutcome::Failed(String::new())), 1);
    }

    #[test]
    fn missing_hash_counts_as_changed() {
        let doc = TrackedDocument {
            document_id: "d".into(),
            source_id: "s".into(),
            doc_hash: None,
        };
        assert!(has_changed(&doc, "anything"));
    }
}
