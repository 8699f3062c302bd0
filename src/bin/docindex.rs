//! CLI binary for edgequake-docindex.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig` / `IndexProcessorFactory` and prints results.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_docindex::{
    BlobStorage, ExtractSetting, ExtractionConfig, ExtractionProgressCallback, ExtractionStage,
    IndexComponents, IndexProcessorFactory, LocalBlobStorage, MemoryArtifactRepository,
    PdfEngine, PdfiumEngine, StoreCoordinator, SummaryFailurePolicy, TableAwareExtractor,
    TableScanOptions, TextExtractor, UploadFileRef,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner showing the current extraction stage, with one log line per
/// stored table.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_stage(&self, stage: ExtractionStage) {
        self.bar.set_message(stage.to_string());
    }

    fn on_cache_hit(&self, cache_key: &str) {
        self.bar
            .println(format!("  {} cache hit {}", green("✓"), dim(cache_key)));
    }

    fn on_tables_detected(&self, count: usize) {
        self.bar
            .println(format!("  {} {} table(s) detected", green("✓"), bold(&count.to_string())));
    }

    fn on_table_stored(&self, index: usize, path: &str) {
        self.bar
            .println(format!("  {} table {:>2} → {}", green("✓"), index + 1, dim(path)));
    }

    fn on_table_summarised(&self, index: usize, total: usize) {
        self.bar.set_message(format!("table summaries {}/{}", index + 1, total));
    }

    fn on_extraction_complete(&self, content_len: usize) {
        self.bar.finish_and_clear();
        eprintln!("{} {} chars extracted", green("✔"), bold(&content_len.to_string()));
    }

    fn on_extraction_failed(&self, error: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", red("✘"), error);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract a PDF with table descriptions (stdout)
  docindex extract report.pdf --ocr-url http://ocr.internal/gateway/

  # Reuse cached plaintext on the next run
  docindex extract report.pdf --cache-key cache/report.md -o report.md

  # Detect and stitch tables only, no network
  docindex tables report.pdf -o tables/

  # Delegate extraction to an external service
  docindex external report.pdf --server-address http://split.internal/extract

ENVIRONMENT VARIABLES:
  DOCINDEX_OCR_URL            OCR service endpoint (required for extract)
  DOCINDEX_OCR_TIMEOUT_SECS   OCR request timeout (default 600)
  DOCINDEX_OCR_BACKEND        OCR backend (default pipeline)
  DOCINDEX_OCR_LANG           OCR language list (default ch)
  DOCINDEX_LLM_URL            OpenAI-compatible chat completions base URL
  DOCINDEX_LLM_API_KEY        Bearer token for DOCINDEX_LLM_URL
  DOCINDEX_LLM_PROVIDER       edgequake-llm provider when no URL is set
  DOCINDEX_LLM_MODEL          Model for table descriptions; unset = OCR text
  DOCINDEX_PDFIUM_LIB_PATH    Path to libpdfium
  RUST_LOG                    Overrides the log filter
"#;

/// Table-aware PDF extraction and index tooling.
#[derive(Parser, Debug)]
#[command(
    name = "docindex",
    version,
    about = "Table-aware PDF extraction with OCR and LLM table descriptions",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCINDEX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCINDEX_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract a PDF into text plus table descriptions.
    Extract(ExtractArgs),
    /// Detect, stitch and save table images without calling any service.
    Tables(TablesArgs),
    /// Send a file to an external extraction service and print its documents.
    External(ExternalArgs),
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// Table render resolution in DPI (72–600).
    #[arg(long, env = "DOCINDEX_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Continuation tolerance as a fraction of width.
    #[arg(long, env = "DOCINDEX_CONTINUATION_THRESHOLD", default_value_t = 0.1)]
    continuation_threshold: f64,

    /// Pixel rows trimmed at each seam of a stitched table.
    #[arg(long, env = "DOCINDEX_MERGE_OVERLAP", default_value_t = 0)]
    merge_overlap: u32,

    /// Path to libpdfium.
    #[arg(long, env = "DOCINDEX_PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Local PDF file.
    input: PathBuf,

    /// Write the text to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Root directory for table images and cached text.
    #[arg(long, env = "DOCINDEX_STORAGE_DIR", default_value = "./docindex-storage")]
    storage_dir: PathBuf,

    /// Storage key for cached plaintext.
    #[arg(long)]
    cache_key: Option<String>,

    /// Tenant owning the stored table images.
    #[arg(long, env = "DOCINDEX_TENANT")]
    tenant: Option<String>,

    /// User recorded as creator of the table images.
    #[arg(long, env = "DOCINDEX_USER")]
    user: Option<String>,

    /// OCR service endpoint.
    #[arg(long, env = "DOCINDEX_OCR_URL")]
    ocr_url: Option<String>,

    /// OpenAI-compatible chat completions base URL.
    #[arg(long, env = "DOCINDEX_LLM_URL")]
    llm_url: Option<String>,

    /// Model used for table descriptions.
    #[arg(long, env = "DOCINDEX_LLM_MODEL")]
    model: Option<String>,

    /// edgequake-llm provider (openai, anthropic, ollama, ...).
    #[arg(long, env = "DOCINDEX_LLM_PROVIDER")]
    provider: Option<String>,

    /// Path to a text file containing a custom table-summary prompt.
    #[arg(long, env = "DOCINDEX_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Prefix for inline image links.
    #[arg(long, env = "DOCINDEX_IMAGE_URL_PREFIX", default_value = "")]
    image_url_prefix: String,

    /// Use OCR text when a table description fails instead of aborting.
    #[arg(long)]
    lenient_summaries: bool,

    /// Print the document as JSON.
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    scan: ScanArgs,
}

#[derive(Args, Debug)]
struct TablesArgs {
    /// Local PDF file.
    input: PathBuf,

    /// Directory receiving table_NN.png files.
    #[arg(short, long, default_value = "tables")]
    output: PathBuf,

    #[command(flatten)]
    scan: ScanArgs,
}

#[derive(Args, Debug)]
struct ExternalArgs {
    /// Local file sent to the service.
    input: PathBuf,

    /// External extraction service address.
    #[arg(long, env = "DOCINDEX_EXTERNAL_URL")]
    server_address: String,
}

impl ScanArgs {
    fn options(&self) -> TableScanOptions {
        TableScanOptions {
            resolution: self.dpi,
            continuation_threshold: self.continuation_threshold,
            merge_overlap: self.merge_overlap,
            ..TableScanOptions::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Extract(args) => run_extract(args, cli.quiet).await,
        Command::Tables(args) => run_tables(args, cli.quiet).await,
        Command::External(args) => run_external(args).await,
    }
}

async fn run_extract(args: ExtractArgs, quiet: bool) -> Result<()> {
    if !args.input.exists() {
        bail!("Input file not found: {}", args.input.display());
    }

    let mut builder = ExtractionConfig::from_env()
        .scan_options(args.scan.options())
        .image_url_prefix(args.image_url_prefix.clone());
    if let Some(url) = &args.ocr_url {
        builder = builder.ocr_base_url(url.clone());
    }
    if let Some(url) = &args.llm_url {
        builder = builder.llm_base_url(url.clone());
    }
    if let Some(model) = &args.model {
        builder = builder.llm_model(model.clone());
    }
    if let Some(provider) = &args.provider {
        builder = builder.llm_provider(provider.clone());
    }
    if let Some(path) = &args.scan.pdfium_lib {
        builder = builder.pdfium_lib_path(path.clone());
    }
    if let Some(path) = &args.system_prompt {
        let prompt = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read system prompt {}", path.display()))?;
        builder = builder.system_prompt(prompt);
    }
    if args.lenient_summaries {
        builder = builder.summary_failure(SummaryFailurePolicy::UseOcrText);
    }
    if !quiet && !args.json {
        builder = builder.progress_callback(CliProgressCallback::new());
    }
    let config = builder.build().context("Invalid configuration")?;

    let storage = Arc::new(LocalBlobStorage::new(&args.storage_dir));
    let extractor = TableAwareExtractor::new(
        config,
        storage.clone(),
        Arc::new(MemoryArtifactRepository::new()),
    )
    .context("Failed to set up extractor")?;

    let mut setting = if args.tenant.is_some() || args.user.is_some() {
        // Ownership travels on an upload reference, so stage the file in
        // storage and extract it by key.
        let name = file_name(&args.input);
        let key = format!(
            "upload_files/{}/{}",
            args.tenant.as_deref().unwrap_or("shared"),
            name
        );
        let bytes = tokio::fs::read(&args.input)
            .await
            .with_context(|| format!("Failed to read {}", args.input.display()))?;
        storage
            .save(&key, bytes)
            .await
            .context("Failed to stage upload")?;
        ExtractSetting::for_upload(UploadFileRef {
            key,
            name,
            tenant_id: args.tenant.clone(),
            created_by: args.user.clone(),
        })
    } else {
        ExtractSetting::for_path(&args.input)
    };
    if let Some(key) = &args.cache_key {
        setting = setting.with_cache_key(key.clone());
    }

    let start = Instant::now();
    let docs = extractor
        .extract(&setting)
        .await
        .with_context(|| format!("Extraction of {} failed", args.input.display()))?;
    let doc = docs.into_iter().next().context("Extractor returned no document")?;

    let rendered = if args.json {
        serde_json::to_string_pretty(&doc).context("Failed to serialise document")?
    } else {
        doc.page_content
    };
    match &args.output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !quiet {
                eprintln!(
                    "{} {} {}",
                    green("✔"),
                    bold(&path.display().to_string()),
                    dim(&format!("{:.1}s", start.elapsed().as_secs_f64()))
                );
            }
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(rendered.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}

async fn run_tables(args: TablesArgs, quiet: bool) -> Result<()> {
    let bytes = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let options = args.scan.options();
    let engine = PdfiumEngine::new(args.scan.pdfium_lib.clone());

    let tables = tokio::task::spawn_blocking(move || engine.scan_tables(bytes, &options))
        .await
        .context("Table scan task failed")?
        .context("Table scan failed")?;

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    for (i, table) in tables.iter().enumerate() {
        let path = args.output.join(format!("table_{:02}.png", i + 1));
        std::fs::write(&path, &table.png)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !quiet {
            let pages = if table.start_page == table.end_page {
                format!("page {}", table.start_page + 1)
            } else {
                format!("pages {}-{}", table.start_page + 1, table.end_page + 1)
            };
            eprintln!(
                "  {} {}  {:<12} {}  {}",
                green("✓"),
                path.display(),
                pages,
                dim(&format!("{}x{}", table.width, table.height)),
                table.title.as_deref().unwrap_or("")
            );
        }
    }
    if !quiet {
        eprintln!("{} {} table(s) written", green("✔"), bold(&tables.len().to_string()));
    }
    Ok(())
}

async fn run_external(args: ExternalArgs) -> Result<()> {
    let storage = Arc::new(LocalBlobStorage::new("."));
    let components = IndexComponents::new(
        StoreCoordinator::in_memory(),
        Arc::new(TextExtractor::new(storage.clone())),
        storage,
    );
    let processor = IndexProcessorFactory::new(Some("external"))
        .server_address(args.server_address.clone())
        .init_index_processor(&components)
        .context("Invalid external index configuration")?;

    let docs = processor
        .extract(&ExtractSetting::for_path(&args.input))
        .await
        .with_context(|| format!("External extraction from {} failed", args.server_address))?;
    println!(
        "{}",
        serde_json::to_string_pretty(&docs).context("Failed to serialise documents")?
    );
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string())
}
