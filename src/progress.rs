//! Progress-callback trait for extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the extractor moves through its stages.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docindex::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     stored: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for CountingCallback {
//!     fn on_table_stored(&self, index: usize, path: &str) {
//!         self.stored.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("table {} → {}", index + 1, path);
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .ocr_base_url("http://ocr.internal/")
//!     .progress_callback(Arc::new(CountingCallback { stored: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// Stages of one extraction run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStage {
    /// Looking for previously saved plaintext.
    CacheLookup,
    /// Reading the source bytes.
    Load,
    /// Detecting, grouping and rasterising tables.
    TableScan,
    /// OCR over the whole document.
    DocumentOcr,
    /// OCR and LLM summary for each table image.
    TableSummaries,
    /// Assembling the final text and saving the cache.
    Assembly,
}

impl fmt::Display for ExtractionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExtractionStage::CacheLookup => "cache lookup",
            ExtractionStage::Load => "load",
            ExtractionStage::TableScan => "table scan",
            ExtractionStage::DocumentOcr => "document OCR",
            ExtractionStage::TableSummaries => "table summaries",
            ExtractionStage::Assembly => "assembly",
        };
        f.write_str(name)
    }
}

/// Called by the extractor as a run progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called when a stage begins.
    fn on_stage(&self, stage: ExtractionStage) {
        let _ = stage;
    }

    /// Called when the cache already held the result; no other stage runs.
    fn on_cache_hit(&self, cache_key: &str) {
        let _ = cache_key;
    }

    /// Called once the table scan has produced its images.
    fn on_tables_detected(&self, count: usize) {
        let _ = count;
    }

    /// Called after a table image has been persisted.
    ///
    /// # Arguments
    /// * `index`: 0-based position in detection order
    /// * `path`: public path of the stored image
    fn on_table_stored(&self, index: usize, path: &str) {
        let _ = (index, path);
    }

    /// Called after a table has been described by the LLM.
    fn on_table_summarised(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// Called once with the length of the assembled text.
    fn on_extraction_complete(&self, content_len: usize) {
        let _ = content_len;
    }

    /// Called when the run fails, after rollback has finished.
    fn on_extraction_failed(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation; the default when no callback is configured.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        stages: Mutex<Vec<ExtractionStage>>,
        stored: AtomicUsize,
        failures: AtomicUsize,
    }

    impl ExtractionProgressCallback for TrackingCallback {
        fn on_stage(&self, stage: ExtractionStage) {
            self.stages.lock().unwrap().push(stage);
        }

        fn on_table_stored(&self, _index: usize, _path: &str) {
            self.stored.fetch_add(1, Ordering::SeqCst);
        }

        fn on_extraction_failed(&self, _error: &str) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage(ExtractionStage::Load);
        cb.on_cache_hit("k");
        cb.on_tables_detected(2);
        cb.on_table_stored(0, "/t/a.png");
        cb.on_table_summarised(0, 2);
        cb.on_extraction_complete(10);
        cb.on_extraction_failed("boom");
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_stage(ExtractionStage::Load);
        tracker.on_stage(ExtractionStage::TableScan);
        tracker.on_table_stored(0, "/t/a.png");
        tracker.on_table_stored(1, "/t/b.png");
        tracker.on_extraction_failed("ocr down");

        assert_eq!(
            *tracker.stages.lock().unwrap(),
            vec![ExtractionStage::Load, ExtractionStage::TableScan]
        );
        assert_eq!(tracker.stored.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.failures.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stage_names_are_human_readable() {
        assert_eq!(ExtractionStage::DocumentOcr.to_string(), "document OCR");
    }
}
