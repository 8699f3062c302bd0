//! Pipeline stages for table-aware extraction.
//!
//! Each submodule implements exactly one transformation step, so every stage
//! is testable on its own and the PDF backend can be swapped without
//! touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! layout ──▶ scan ──▶ raster ──▶ (gateways) ──▶ markup
//! (pdfium)   (tables)  (merge/PNG)  (OCR, LLM)   (normalise, assemble)
//! ```
//!
//! 1. [`layout`] exposes words and ruling lines per page and renders page
//!    regions; runs under `spawn_blocking` because pdfium is not async-safe
//! 2. [`scan`]   detects tables, infers titles, groups page continuations
//! 3. [`raster`] stitches multi-page crops and PNG-encodes them
//! 4. [`markup`] deterministic text rules applied to OCR and LLM output

pub mod layout;
pub mod markup;
pub mod raster;
pub mod scan;

pub use layout::{PagedDocument, PdfEngine, PdfiumDocument, PdfiumEngine};
pub use scan::{scan_document, RenderedTable};
