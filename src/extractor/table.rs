//! Table-aware PDF extraction.
//!
//! ```text
//! cache hit? ──yes──▶ Document(cached text)
//!     │ no
//! load bytes ─▶ table scan (blocking) ─▶ store PNGs + records  ┐
//!            ─▶ whole-document OCR ─▶ strip HTML                │ tracked by
//!            ─▶ per table: OCR ─▶ markdown table ─▶ LLM summary │ ArtifactTransaction
//!            ─▶ assemble ─▶ save cache                          ┘
//!     │ Ok ─▶ commit       │ Err ─▶ rollback, re-raise
//! ```

use crate::config::{ExtractionConfig, SummaryFailurePolicy};
use crate::document::{content_hash, Document, ExtractSetting, DOC_HASH};
use crate::error::IngestError;
use crate::extractor::source::read_source;
use crate::extractor::transaction::ArtifactTransaction;
use crate::extractor::DocumentExtractor;
use crate::gateway::{build_llm_gateway, describe_table, HttpOcrGateway, LlmGateway, OcrGateway, OcrInput};
use crate::pipeline::markup::{append_table_label, assemble, html_tables_to_markdown, strip_html};
use crate::pipeline::{PdfEngine, PdfiumEngine, RenderedTable};
use crate::progress::{ExtractionProgressCallback, ExtractionStage, NoopProgressCallback};
use crate::storage::{ArtifactRepository, BlobStorage, StoredArtifact};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Path segment used when the upload carries no tenant.
const SHARED_TENANT: &str = "shared";
const TABLE_IMAGE_MIME: &str = "image/png";

static NOOP_PROGRESS: NoopProgressCallback = NoopProgressCallback;

/// A table image that has been persisted for this run.
#[derive(Debug)]
struct StoredTable {
    png: Vec<u8>,
    public_path: String,
}

/// Who owns the artifacts of a run.
#[derive(Debug, Default)]
struct Owner<'a> {
    tenant: Option<&'a str>,
    user: Option<&'a str>,
}

/// Extracts a PDF into one [`Document`]: OCR text followed by a section
/// describing every detected table.
pub struct TableAwareExtractor {
    config: ExtractionConfig,
    engine: Arc<dyn PdfEngine>,
    ocr: Arc<dyn OcrGateway>,
    llm: Option<Arc<dyn LlmGateway>>,
    storage: Arc<dyn BlobStorage>,
    artifacts: Arc<dyn ArtifactRepository>,
}

impl TableAwareExtractor {
    /// Build an extractor talking to the gateways named in `config`.
    ///
    /// # Errors
    /// [`IngestError::Validation`] when the OCR endpoint is missing or an
    /// LLM model is configured without a way to reach it.
    pub fn new(
        config: ExtractionConfig,
        storage: Arc<dyn BlobStorage>,
        artifacts: Arc<dyn ArtifactRepository>,
    ) -> Result<Self, IngestError> {
        let ocr: Arc<dyn OcrGateway> = Arc::new(HttpOcrGateway::new(&config.gateways.ocr)?);
        let llm = build_llm_gateway(&config.gateways.llm)?;
        let engine: Arc<dyn PdfEngine> =
            Arc::new(PdfiumEngine::new(config.gateways.pdfium_lib_path.clone()));
        Ok(Self::with_gateways(config, engine, ocr, llm, storage, artifacts))
    }

    /// Build an extractor from explicit collaborators.
    pub fn with_gateways(
        config: ExtractionConfig,
        engine: Arc<dyn PdfEngine>,
        ocr: Arc<dyn OcrGateway>,
        llm: Option<Arc<dyn LlmGateway>>,
        storage: Arc<dyn BlobStorage>,
        artifacts: Arc<dyn ArtifactRepository>,
    ) -> Self {
        Self {
            config,
            engine,
            ocr,
            llm,
            storage,
            artifacts,
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    fn progress(&self) -> &dyn ExtractionProgressCallback {
        match &self.config.progress_callback {
            Some(cb) => cb.as_ref(),
            None => &NOOP_PROGRESS,
        }
    }

    /// Run one extraction.
    ///
    /// Returns a single document. With a cache key whose plaintext already
    /// exists, that text is returned without touching any gateway.
    ///
    /// # Errors
    /// The first error of the run, after every image stored by the run has
    /// been removed again. If removing the artifact records fails, the
    /// result is [`IngestError::Consistency`] instead.
    pub async fn extract(&self, setting: &ExtractSetting) -> Result<Vec<Document>, IngestError> {
        let start = Instant::now();
        let progress = self.progress();

        // ── Step 1: Cache ────────────────────────────────────────────────
        progress.on_stage(ExtractionStage::CacheLookup);
        if let Some(key) = setting.cache_key.as_deref() {
            match self.storage.load(key).await {
                Ok(bytes) => {
                    info!("Cache hit for {}", key);
                    progress.on_cache_hit(key);
                    let text = String::from_utf8_lossy(&bytes).into_owned();
                    return Ok(vec![self.finish_document(text, setting)]);
                }
                Err(e) if e.is_not_found() => debug!("Cache miss for {}", key),
                Err(e) => return Err(e),
            }
        }

        // ── Step 2: Load ─────────────────────────────────────────────────
        progress.on_stage(ExtractionStage::Load);
        let bytes = read_source(self.storage.as_ref(), setting).await?;
        info!(
            "Extracting {} ({} bytes)",
            setting.file_name().unwrap_or_else(|| "<unnamed>".into()),
            bytes.len()
        );

        // ── Steps 3-7 under the undo log ─────────────────────────────────
        let mut tx = ArtifactTransaction::new();
        match self.run(setting, bytes, &mut tx).await {
            Ok(text) => {
                let discarded = tx.commit();
                debug!("Committed run with {} tracked action(s)", discarded);
                progress.on_extraction_complete(text.len());
                info!(
                    "Extraction finished: {} chars in {}ms",
                    text.len(),
                    start.elapsed().as_millis()
                );
                Ok(vec![self.finish_document(text, setting)])
            }
            Err(e) => {
                warn!("Extraction failed, rolling back: {}", e);
                let err = tx
                    .rollback(self.storage.as_ref(), self.artifacts.as_ref(), e)
                    .await;
                progress.on_extraction_failed(&err.to_string());
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        setting: &ExtractSetting,
        bytes: Vec<u8>,
        tx: &mut ArtifactTransaction,
    ) -> Result<String, IngestError> {
        let progress = self.progress();

        // ── Step 3: Table pass ───────────────────────────────────────────
        progress.on_stage(ExtractionStage::TableScan);
        let engine = Arc::clone(&self.engine);
        let scan = self.config.scan;
        let pdf_bytes = bytes.clone();
        let tables = tokio::task::spawn_blocking(move || engine.scan_tables(pdf_bytes, &scan))
            .await
            .map_err(|e| IngestError::Internal(format!("table scan task failed: {}", e)))??;
        progress.on_tables_detected(tables.len());
        info!("Detected {} logical table(s)", tables.len());

        let owner = setting
            .upload_file
            .as_ref()
            .map(|u| Owner {
                tenant: u.tenant_id.as_deref(),
                user: u.created_by.as_deref(),
            })
            .unwrap_or_default();

        let mut stored = Vec::with_capacity(tables.len());
        for (index, table) in tables.into_iter().enumerate() {
            stored.push(self.store_table(index, table, &owner, tx).await?);
        }

        // ── Step 4: Whole-document OCR ───────────────────────────────────
        progress.on_stage(ExtractionStage::DocumentOcr);
        let document_text = strip_html(&self.ocr.parse(bytes, OcrInput::Pdf).await?);
        debug!("Document OCR: {} chars", document_text.len());

        // ── Steps 5-6: Per-table OCR and summaries ───────────────────────
        progress.on_stage(ExtractionStage::TableSummaries);
        let total = stored.len();
        let mut descriptions = Vec::with_capacity(total);
        for (index, table) in stored.into_iter().enumerate() {
            descriptions.push(self.describe(index, table).await?);
            progress.on_table_summarised(index, total);
        }

        // ── Step 7: Assembly ─────────────────────────────────────────────
        progress.on_stage(ExtractionStage::Assembly);
        let text = assemble(
            &document_text,
            &self.config.table_section_heading,
            &descriptions,
        );
        if let Some(key) = setting.cache_key.as_deref() {
            self.storage.save(key, text.as_bytes().to_vec()).await?;
            debug!("Cached extraction under {}", key);
        }
        Ok(text)
    }

    async fn store_table(
        &self,
        index: usize,
        table: RenderedTable,
        owner: &Owner<'_>,
        tx: &mut ArtifactTransaction,
    ) -> Result<StoredTable, IngestError> {
        let file_id = Uuid::new_v4();
        let tenant = owner.tenant.unwrap_or(SHARED_TENANT);
        let key = format!("image_files/{}/{}.png", tenant, file_id);
        let public_path = format!("/{}/{}.png", tenant, file_id);
        let size = table.png.len() as u64;

        tx.track_bytes(key.clone());
        self.storage.save(&key, table.png.clone()).await?;

        if let (Some(tenant_id), Some(user)) = (owner.tenant, owner.user) {
            let record = StoredArtifact {
                id: file_id,
                storage_key: key.clone(),
                tenant_id: tenant_id.to_string(),
                size,
                mime_type: TABLE_IMAGE_MIME.to_string(),
                created_by: user.to_string(),
                used: true,
            };
            self.artifacts.insert(&record).await?;
            tx.track_record(file_id);
        }

        debug!(
            "Stored table {} (pages {}-{}, {}x{}, title {:?}) at {}",
            index + 1,
            table.start_page + 1,
            table.end_page + 1,
            table.width,
            table.height,
            table.title,
            key
        );
        self.progress().on_table_stored(index, &public_path);
        Ok(StoredTable {
            png: table.png,
            public_path,
        })
    }

    async fn describe(&self, index: usize, table: StoredTable) -> Result<String, IngestError> {
        let raw = self.ocr.parse(table.png, OcrInput::Png).await?;
        let ocr_text = html_tables_to_markdown(&raw);

        let summary = match &self.llm {
            None => ocr_text,
            Some(llm) => {
                match describe_table(llm.as_ref(), self.config.summary_prompt(), &ocr_text).await {
                    Ok(summary) => summary,
                    Err(e) if self.config.summary_failure == SummaryFailurePolicy::UseOcrText => {
                        warn!("Summary of table {} failed, using OCR text: {}", index + 1, e);
                        ocr_text
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        let image_url = format!("{}{}", self.config.image_url_prefix, table.public_path);
        Ok(append_table_label(&image_url, &strip_html(&summary)))
    }

    fn finish_document(&self, text: String, setting: &ExtractSetting) -> Document {
        let hash = content_hash(&text);
        let mut doc = Document::new(text).with_metadata(DOC_HASH, hash);
        if let Some(name) = setting.file_name() {
            doc = doc.with_metadata("source", name);
        }
        doc
    }
}

#[async_trait]
impl DocumentExtractor for TableAwareExtractor {
    async fn extract(&self, setting: &ExtractSetting) -> Result<Vec<Document>, IngestError> {
        TableAwareExtractor::extract(self, setting).await
    }
}

/// Synchronous wrapper around [`TableAwareExtractor::extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    extractor: &TableAwareExtractor,
    setting: &ExtractSetting,
) -> Result<Vec<Document>, IngestError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| IngestError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extractor.extract(setting))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableScanOptions;
    use crate::document::UploadFileRef;
    use crate::storage::{MemoryArtifactRepository, MemoryBlobStorage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedTables(usize);

    impl PdfEngine for FixedTables {
        fn scan_tables(
            &self,
            _bytes: Vec<u8>,
            _options: &TableScanOptions,
        ) -> Result<Vec<RenderedTable>, IngestError> {
            Ok((0..self.0)
                .map(|i| RenderedTable {
                    png: vec![i as u8; 4],
                    width: 10,
                    height: 10,
                    title: None,
                    start_page: i,
                    end_page: i,
                    part_count: 1,
                })
                .collect())
        }
    }

    /// Answers PDFs with `doc_text` and PNGs with a one-row HTML table.
    /// Fails the `fail_on`-th call (1-based) when set.
    struct ScriptedOcr {
        calls: AtomicUsize,
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl OcrGateway for ScriptedOcr {
        async fn parse(&self, _bytes: Vec<u8>, input: OcrInput) -> Result<String, IngestError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on == Some(n) {
                return Err(IngestError::gateway("ocr", "HTTP 503"));
            }
            Ok(match input {
                OcrInput::Pdf => "# Report\n<span>body</span>".to_string(),
                OcrInput::Png => "<table><tr><td>a</td><td>b</td></tr></table>".to_string(),
            })
        }
    }

    fn upload() -> ExtractSetting {
        ExtractSetting::for_upload(UploadFileRef {
            key: "upload_files/t1/report.pdf".into(),
            name: "report.pdf".into(),
            tenant_id: Some("t1".into()),
            created_by: Some("u1".into()),
        })
    }

    fn config() -> ExtractionConfig {
        ExtractionConfig::builder()
            .ocr_base_url("http://ocr.test/")
            .build()
            .unwrap()
    }

    async fn extractor(
        tables: usize,
        fail_on: Option<usize>,
    ) -> (TableAwareExtractor, Arc<MemoryBlobStorage>, Arc<MemoryArtifactRepository>) {
        let storage = Arc::new(MemoryBlobStorage::new());
        storage
            .save("upload_files/t1/report.pdf", b"%PDF-1.7".to_vec())
            .await
            .unwrap();
        let repo = Arc::new(MemoryArtifactRepository::new());
        let ex = TableAwareExtractor::with_gateways(
            config(),
            Arc::new(FixedTables(tables)),
            Arc::new(ScriptedOcr {
                calls: AtomicUsize::new(0),
                fail_on,
            }),
            None,
            storage.clone(),
            repo.clone(),
        );
        (ex, storage, repo)
    }

    #[tokio::test]
    async fn tables_are_stored_and_described_without_llm() {
        let (ex, storage, repo) = extractor(2, None).await;
        let docs = ex.extract(&upload()).await.unwrap();
        assert_eq!(docs.len(), 1);
        let text = &docs[0].page_content;
        assert!(text.starts_with("# Report\n"), "got: {text}");
        assert!(!text.contains("<span>"));
        assert!(text.contains("## Table details"));
        assert_eq!(text.matches("| a | b |").count(), 2);

        // upload + two images
        assert_eq!(storage.len(), 3);
        assert_eq!(repo.len(), 2);
        assert!(storage
            .keys()
            .iter()
            .filter(|k| k.starts_with("image_files/t1/"))
            .all(|k| k.ends_with(".png")));
    }

    #[tokio::test]
    async fn ocr_failure_rolls_back_every_image() {
        // call 1 = document OCR
        let (ex, storage, repo) = extractor(2, Some(1)).await;
        let err = ex.extract(&upload()).await.unwrap_err();
        assert!(matches!(err, IngestError::Gateway { .. }), "got {err:?}");
        assert_eq!(storage.keys(), vec!["upload_files/t1/report.pdf".to_string()]);
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn records_need_tenant_and_user() {
        let (ex, storage, repo) = extractor(1, None).await;
        let mut setting = upload();
        if let Some(u) = setting.upload_file.as_mut() {
            u.created_by = None;
        }
        ex.extract(&setting).await.unwrap();
        assert!(repo.is_empty());
        assert_eq!(storage.len(), 2);
    }
}
