//! # edgequake-docindex
//!
//! Table-aware document extraction and pluggable index processors for
//! retrieval-augmented generation.
//!
//! ## Why this crate?
//!
//! Whole-document OCR flattens tables that run across page breaks into two
//! unrelated fragments and loses what a table is *about*. This crate finds
//! tables geometrically, stitches page-split tables back into one image,
//! asks an LLM to describe each one, and appends those descriptions to the
//! OCR text with a link to the stored image. The result then flows into an
//! index processor that writes vector and keyword stores and answers
//! thresholded retrieval queries.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Cache    return saved plaintext if the cache key exists
//!  ├─ 2. Tables   lattice detection, titles, cross-page grouping (spawn_blocking)
//!  ├─ 3. Raster   crop, stitch, PNG → blob storage + artifact records
//!  ├─ 4. OCR      whole document, then one call per table image
//!  ├─ 5. LLM      one table description per image
//!  └─ 6. Output   text + "Table details" section; rollback on any failure
//!       │
//!       ▼
//! IndexProcessor (paragraph | qa | parent-child | external)
//!  └─ extract → transform → load → clean → retrieve
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docindex::{
//!     ExtractSetting, ExtractionConfig, MemoryArtifactRepository, LocalBlobStorage,
//!     TableAwareExtractor,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // OCR / LLM endpoints from DOCINDEX_* environment variables
//!     let config = ExtractionConfig::from_env().build()?;
//!     let extractor = TableAwareExtractor::new(
//!         config,
//!         Arc::new(LocalBlobStorage::new("./storage")),
//!         Arc::new(MemoryArtifactRepository::new()),
//!     )?;
//!     let docs = extractor
//!         .extract(&ExtractSetting::for_path("report.pdf").with_cache_key("cache/report.md"))
//!         .await?;
//!     println!("{}", docs[0].page_content);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docindex` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-docindex = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod extractor;
pub mod gateway;
pub mod geometry;
pub mod index;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod resync;
pub mod storage;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ExtractionConfig, ExtractionConfigBuilder, GatewaySettings, LlmSettings, OcrSettings,
    SummaryFailurePolicy, TableScanOptions,
};
pub use document::{content_hash, Document, ExtractSetting, UploadFileRef};
pub use error::{IngestError, StoreFailure, StoreKind};
pub use extractor::{extract_sync, DocumentExtractor, TableAwareExtractor, TextExtractor};
pub use index::{
    Dataset, IndexComponents, IndexProcessor, IndexProcessorFactory, IndexType,
    IndexingTechnique, RetrievalMethod, StoreCoordinator,
};
pub use pipeline::{PdfEngine, PdfiumEngine, RenderedTable};
pub use progress::{ExtractionProgressCallback, ExtractionStage, ProgressCallback};
pub use resync::{ResyncOutcome, ResyncPlanner, ResyncReport};
pub use storage::{
    ArtifactRepository, BlobStorage, LocalBlobStorage, MemoryArtifactRepository,
    MemoryBlobStorage, StoredArtifact,
};
