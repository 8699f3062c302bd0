//! Error types for the edgequake-docindex library.
//!
//! A single fatal error type, [`IngestError`], covers both subsystems:
//!
//! * **Extraction**: a missing source, a PDF that cannot be opened, or an
//!   OCR/LLM gateway failure aborts the run. Any table images stored before
//!   the failure are rolled back first, then the original error surfaces.
//!
//! * **Indexing**: configuration problems surface as
//!   [`IngestError::Validation`] when a processor is selected; writes that
//!   fail in one backing store are reported per store through
//!   [`IngestError::IndexWrite`].
//!
//! Table-title detection never produces an error: it degrades to "no title".

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-docindex library.
#[derive(Debug, Error)]
pub enum IngestError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// A source file, storage key or referenced artifact does not exist.
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// Reading a local source failed for a reason other than absence.
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// The document could not be opened or a page could not be inspected.
    #[error("PDF could not be processed: {detail}")]
    Pdf { detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set DOCINDEX_PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    /// A table region could not be rendered or encoded.
    #[error("Rasterisation failed for page {page}: {detail}")]
    Rasterisation { page: usize, detail: String },

    // ── Gateway errors ────────────────────────────────────────────────────
    /// Any OCR / LLM / external-service failure: connection, timeout,
    /// non-2xx status or a body that does not decode.
    #[error("{service} gateway error: {message}")]
    Gateway { service: String, message: String },

    // ── Storage errors ────────────────────────────────────────────────────
    /// The blob store or the artifact repository rejected an operation.
    #[error("Storage error on '{key}': {detail}")]
    Storage { key: String, detail: String },

    /// The record phase of an artifact rollback failed. Stored bytes were
    /// left untouched so every surviving record still points at its blob.
    #[error("Artifact cleanup failed ({cleanup}) while handling: {original}")]
    Consistency { cleanup: String, original: String },

    // ── Index errors ──────────────────────────────────────────────────────
    /// One or more backing stores failed during a dual-store write/delete.
    /// Stores not listed here applied the change.
    #[error("Index write failed in {} store(s): {}", .failures.len(), format_failures(.failures))]
    IndexWrite { failures: Vec<StoreFailure> },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Required configuration is missing or invalid.
    #[error("Invalid configuration: {0}")]
    Validation(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IngestError {
    pub(crate) fn gateway(service: &str, message: impl Into<String>) -> Self {
        IngestError::Gateway {
            service: service.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        IngestError::NotFound { what: what.into() }
    }

    pub(crate) fn storage(key: &str, detail: impl Into<String>) -> Self {
        IngestError::Storage {
            key: key.to_string(),
            detail: detail.into(),
        }
    }

    /// True for [`IngestError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, IngestError::NotFound { .. })
    }
}

/// Which backing store failed during a fan-out write or delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum StoreKind {
    Vector,
    Keyword,
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreKind::Vector => f.write_str("vector"),
            StoreKind::Keyword => f.write_str("keyword"),
        }
    }
}

/// A single store's failure inside [`IngestError::IndexWrite`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreFailure {
    pub store: StoreKind,
    pub message: String,
}

fn format_failures(failures: &[StoreFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.store, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_display_carries_upstream_message() {
        let e = IngestError::gateway("ocr", "HTTP 502 Bad Gateway");
        let msg = e.to_string();
        assert!(msg.contains("ocr"), "got: {msg}");
        assert!(msg.contains("502"), "got: {msg}");
    }

    #[test]
    fn consistency_display_mentions_original() {
        let e = IngestError::Consistency {
            cleanup: "db down".into(),
            original: "ocr timeout".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("db down"));
        assert!(msg.contains("ocr timeout"));
    }

    #[test]
    fn index_write_lists_every_store() {
        let e = IngestError::IndexWrite {
            failures: vec![
                StoreFailure {
                    store: StoreKind::Vector,
                    message: "timeout".into(),
                },
                StoreFailure {
                    store: StoreKind::Keyword,
                    message: "locked".into(),
                },
            ],
        };
        let msg = e.to_string();
        assert!(msg.contains("2 store(s)"), "got: {msg}");
        assert!(msg.contains("vector: timeout"));
        assert!(msg.contains("keyword: locked"));
    }

    #[test]
    fn not_found_predicate() {
        assert!(IngestError::not_found("x").is_not_found());
        assert!(!IngestError::Validation("x".into()).is_not_found());
    }
}
