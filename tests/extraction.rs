//! End-to-end extraction over synthetic documents and in-memory services.
//!
//! No pdfium library or network is needed: pages are built from ruling
//! lines and the OCR / LLM gateways are scripted.

use async_trait::async_trait;
use edgequake_docindex::config::TableScanOptions;
use edgequake_docindex::gateway::{LlmGateway, OcrGateway, OcrInput};
use edgequake_docindex::geometry::{BBox, Edge, PageLayout, Word};
use edgequake_docindex::pipeline::{scan_document, PagedDocument};
use edgequake_docindex::{
    content_hash, ArtifactRepository, BlobStorage, ExtractSetting, ExtractionConfig,
    ExtractionProgressCallback, IngestError, LocalBlobStorage, MemoryArtifactRepository,
    MemoryBlobStorage, PdfEngine, RenderedTable, StoredArtifact, TableAwareExtractor,
    UploadFileRef,
};
use image::{DynamicImage, Rgba, RgbaImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

// ── Synthetic document ───────────────────────────────────────────────────

struct GridPages(Vec<PageLayout>);

impl PagedDocument for GridPages {
    fn page_count(&self) -> usize {
        self.0.len()
    }

    fn layout(&self, index: usize) -> Result<PageLayout, IngestError> {
        Ok(self.0[index].clone())
    }

    fn render_region(
        &self,
        _index: usize,
        region: &BBox,
        dpi: u32,
    ) -> Result<DynamicImage, IngestError> {
        let scale = dpi as f64 / 72.0;
        let w = (region.width() * scale).round() as u32;
        let h = (region.height() * scale).round() as u32;
        Ok(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            w,
            h,
            Rgba([255, 255, 255, 255]),
        )))
    }
}

/// Two-row grid of `cols` 100pt columns with its top-left at `(x0, top)`.
fn grid_page(x0: f64, top: f64, cols: usize) -> PageLayout {
    let mut page = PageLayout::new(600.0, 800.0);
    let x1 = x0 + 100.0 * cols as f64;
    for r in 0..=2 {
        page.edges.push(Edge::horizontal(x0, x1, top + 20.0 * r as f64));
    }
    for c in 0..=cols {
        page.edges
            .push(Edge::vertical(x0 + 100.0 * c as f64, top, top + 40.0));
    }
    page
}

/// Page 1 ends with a titled table that continues at the top of page 2;
/// page 3 holds an unrelated, narrower table.
fn three_pages() -> GridPages {
    let mut first = grid_page(50.0, 700.0, 4);
    first
        .words
        .push(Word::new("Rates", BBox::new(60.0, 680.0, 90.0, 690.0)));
    GridPages(vec![first, grid_page(50.0, 50.0, 4), grid_page(200.0, 100.0, 2)])
}

fn scan_options() -> TableScanOptions {
    TableScanOptions {
        resolution: 72,
        ..TableScanOptions::default()
    }
}

/// Engine that ignores the bytes and scans the synthetic pages.
struct SyntheticEngine {
    scans: AtomicUsize,
}

impl PdfEngine for SyntheticEngine {
    fn scan_tables(
        &self,
        _bytes: Vec<u8>,
        options: &TableScanOptions,
    ) -> Result<Vec<RenderedTable>, IngestError> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        scan_document(&three_pages(), options)
    }
}

// ── Scripted services ────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingOcr {
    pngs: Mutex<Vec<Vec<u8>>>,
    calls: AtomicUsize,
    fail_documents: bool,
}

#[async_trait]
impl OcrGateway for RecordingOcr {
    async fn parse(&self, bytes: Vec<u8>, input: OcrInput) -> Result<String, IngestError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match input {
            OcrInput::Pdf if self.fail_documents => {
                Err(IngestError::Gateway {
                    service: "ocr".into(),
                    message: "HTTP 502".into(),
                })
            }
            OcrInput::Pdf => Ok("# Annual report\n\nRevenue grew.".to_string()),
            OcrInput::Png => {
                self.pngs.lock().unwrap().push(bytes);
                Ok("<table><tr><td>Room</td><td>Fee</td></tr>\
                    <tr><td>Single</td><td>120</td></tr></table>"
                    .to_string())
            }
        }
    }
}

#[derive(Default)]
struct QuotingLlm {
    calls: AtomicUsize,
}

#[async_trait]
impl LlmGateway for QuotingLlm {
    async fn complete(&self, _system: &str, user: &str) -> Result<String, IngestError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(user.contains("| Room | Fee |"), "table text not forwarded: {user}");
        Ok("> Hotel fees per room type.\n\n- Single rooms cost 120.".to_string())
    }
}

/// Accepts inserts but cannot delete.
#[derive(Default)]
struct StuckRepository {
    inserted: Mutex<Vec<Uuid>>,
}

#[async_trait]
impl ArtifactRepository for StuckRepository {
    async fn insert(&self, artifact: &StoredArtifact) -> Result<(), IngestError> {
        self.inserted.lock().unwrap().push(artifact.id);
        Ok(())
    }

    async fn delete_all(&self, _ids: &[Uuid]) -> Result<(), IngestError> {
        Err(IngestError::Storage {
            key: "upload_files".into(),
            detail: "connection reset".into(),
        })
    }
}

#[derive(Default)]
struct StoredPaths(Mutex<Vec<String>>);

impl ExtractionProgressCallback for StoredPaths {
    fn on_table_stored(&self, _index: usize, path: &str) {
        self.0.lock().unwrap().push(path.to_string());
    }
}

fn config(progress: Option<Arc<StoredPaths>>) -> ExtractionConfig {
    let mut builder = ExtractionConfig::builder()
        .ocr_base_url("http://ocr.test/")
        .scan_options(scan_options())
        .image_url_prefix("https://files.example.com");
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().unwrap()
}

fn upload(key: &str) -> ExtractSetting {
    ExtractSetting::for_upload(UploadFileRef {
        key: key.to_string(),
        name: "report.pdf".into(),
        tenant_id: Some("acme".into()),
        created_by: Some("alice".into()),
    })
}

fn image_keys(storage: &MemoryBlobStorage) -> Vec<String> {
    storage
        .keys()
        .into_iter()
        .filter(|k| k.starts_with("image_files/"))
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────────

#[test]
fn page_split_table_is_merged_and_unrelated_table_stands_alone() {
    let tables = scan_document(&three_pages(), &scan_options()).unwrap();
    assert_eq!(tables.len(), 2);

    let merged = &tables[0];
    assert_eq!((merged.start_page, merged.end_page), (0, 1));
    assert_eq!(merged.part_count, 2);
    assert_eq!(merged.title.as_deref(), Some("Rates"));

    let single = &tables[1];
    assert_eq!((single.start_page, single.end_page), (2, 2));
    assert_eq!(single.part_count, 1);

    let a = image::load_from_memory(&merged.png).unwrap();
    let b = image::load_from_memory(&single.png).unwrap();
    assert_eq!((a.width(), a.height()), (merged.width, merged.height));
    assert!(a.height() > b.height());
    assert!(a.width() > b.width());
}

#[tokio::test]
async fn three_page_report_yields_two_described_tables() {
    let storage = Arc::new(MemoryBlobStorage::new());
    storage
        .save("upload_files/acme/report.pdf", b"%PDF-1.7".to_vec())
        .await
        .unwrap();
    let repo = Arc::new(MemoryArtifactRepository::new());
    let ocr = Arc::new(RecordingOcr::default());
    let llm = Arc::new(QuotingLlm::default());
    let paths = Arc::new(StoredPaths::default());

    let extractor = TableAwareExtractor::with_gateways(
        config(Some(paths.clone())),
        Arc::new(SyntheticEngine {
            scans: AtomicUsize::new(0),
        }),
        ocr.clone(),
        Some(llm.clone()),
        storage.clone(),
        repo.clone(),
    );
    let docs = extractor
        .extract(&upload("upload_files/acme/report.pdf"))
        .await
        .unwrap();

    assert_eq!(docs.len(), 1);
    let text = &docs[0].page_content;
    assert!(text.starts_with("# Annual report\n\nRevenue grew.\n\n## Table details\n\n"));
    assert_eq!(text.matches("> Hotel fees per room type.").count(), 2);
    assert_eq!(docs[0].doc_hash(), Some(content_hash(text).as_str()));

    // Every stored table is linked from its description.
    let paths = paths.0.lock().unwrap().clone();
    assert_eq!(paths.len(), 2);
    for path in &paths {
        assert!(path.starts_with("/acme/") && path.ends_with(".png"));
        assert!(text.contains(&format!("![](https://files.example.com{})", path)));
    }

    assert_eq!(image_keys(&storage).len(), 2);
    assert_eq!(repo.len(), 2);
    assert_eq!(llm.calls.load(Ordering::SeqCst), 2);

    // OCR saw the merged image first, then the page 3 table.
    let pngs = ocr.pngs.lock().unwrap();
    assert_eq!(pngs.len(), 2);
    let first = image::load_from_memory(&pngs[0]).unwrap();
    let second = image::load_from_memory(&pngs[1]).unwrap();
    assert!(first.height() > second.height());
}

#[tokio::test]
async fn cached_plaintext_skips_every_service() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("report.pdf");
    std::fs::write(&pdf, b"%PDF-1.7").unwrap();
    let storage = Arc::new(LocalBlobStorage::new(dir.path().join("storage")));
    let engine = Arc::new(SyntheticEngine {
        scans: AtomicUsize::new(0),
    });
    let ocr = Arc::new(RecordingOcr::default());

    let extractor = TableAwareExtractor::with_gateways(
        config(None),
        engine.clone(),
        ocr.clone(),
        None,
        storage.clone(),
        Arc::new(MemoryArtifactRepository::new()),
    );
    let setting = ExtractSetting::for_path(&pdf).with_cache_key("cache/report.txt");

    let first = extractor.extract(&setting).await.unwrap();
    let ocr_calls = ocr.calls.load(Ordering::SeqCst);
    assert_eq!(ocr_calls, 3);
    assert_eq!(engine.scans.load(Ordering::SeqCst), 1);

    let cached = std::fs::read(dir.path().join("storage/cache/report.txt")).unwrap();
    assert_eq!(cached, first[0].page_content.as_bytes());

    let second = extractor.extract(&setting).await.unwrap();
    assert_eq!(second[0].page_content, first[0].page_content);
    assert_eq!(second[0].doc_hash(), first[0].doc_hash());
    assert_eq!(ocr.calls.load(Ordering::SeqCst), ocr_calls);
    assert_eq!(engine.scans.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_run_removes_images_and_records() {
    let storage = Arc::new(MemoryBlobStorage::new());
    storage
        .save("upload_files/acme/report.pdf", b"%PDF-1.7".to_vec())
        .await
        .unwrap();
    let repo = Arc::new(MemoryArtifactRepository::new());
    let extractor = TableAwareExtractor::with_gateways(
        config(None),
        Arc::new(SyntheticEngine {
            scans: AtomicUsize::new(0),
        }),
        Arc::new(RecordingOcr {
            fail_documents: true,
            ..RecordingOcr::default()
        }),
        None,
        storage.clone(),
        repo.clone(),
    );

    let err = extractor
        .extract(&upload("upload_files/acme/report.pdf").with_cache_key("cache/r.txt"))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Gateway { .. }), "got {err:?}");
    assert!(image_keys(&storage).is_empty());
    assert!(repo.is_empty());
    assert!(!storage.exists("cache/r.txt").await.unwrap());
}

#[tokio::test]
async fn record_cleanup_failure_keeps_bytes_and_reports_both_errors() {
    let storage = Arc::new(MemoryBlobStorage::new());
    storage
        .save("upload_files/acme/report.pdf", b"%PDF-1.7".to_vec())
        .await
        .unwrap();
    let repo = Arc::new(StuckRepository::default());
    let extractor = TableAwareExtractor::with_gateways(
        config(None),
        Arc::new(SyntheticEngine {
            scans: AtomicUsize::new(0),
        }),
        Arc::new(RecordingOcr {
            fail_documents: true,
            ..RecordingOcr::default()
        }),
        None,
        storage.clone(),
        repo.clone(),
    );

    let err = extractor
        .extract(&upload("upload_files/acme/report.pdf"))
        .await
        .unwrap_err();
    match err {
        IngestError::Consistency { cleanup, original } => {
            assert!(cleanup.contains("connection reset"), "cleanup: {cleanup}");
            assert!(original.contains("HTTP 502"), "original: {original}");
        }
        other => panic!("expected Consistency, got {other:?}"),
    }
    assert_eq!(repo.inserted.lock().unwrap().len(), 2);
    assert_eq!(image_keys(&storage).len(), 2);
}
