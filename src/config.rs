//! Configuration types for table-aware extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Gateway endpoints live in
//! [`GatewaySettings`], which can be read from `DOCINDEX_*` environment
//! variables so deployments configure the library and the CLI the same way.
//!
//! # Example
//! ```rust
//! use edgequake_docindex::ExtractionConfig;
//!
//! let config = ExtractionConfig::builder()
//!     .ocr_base_url("http://ocr.internal/gateway/")
//!     .llm_model("qwen2.5-72b-instruct")
//!     .resolution(200)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.scan.resolution, 200);
//! ```

use crate::error::IngestError;
use crate::geometry::continuation::DEFAULT_CONTINUATION_THRESHOLD;
use crate::geometry::title::{DEFAULT_TABLE_PADDING, DEFAULT_TITLE_DISTANCE};
use crate::geometry::LatticeSettings;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ── Gateway settings ─────────────────────────────────────────────────────

/// OCR service endpoint and request parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrSettings {
    /// Endpoint receiving the multipart parse request. Required.
    pub base_url: Option<String>,
    /// Request timeout in seconds. Default: 600.
    ///
    /// Whole-document OCR of a long PDF routinely takes minutes.
    pub timeout_secs: u64,
    /// Parsing backend, e.g. "pipeline" or "vlm-transformers". Default: "pipeline".
    pub backend: String,
    /// Comma-separated OCR language list. Default: "ch".
    pub lang_list: String,
    /// First page sent to the parser (0-based). Default: 0.
    pub start_page: u32,
    /// Last page sent to the parser. Default: 99999 (all pages).
    pub end_page: u32,
    /// Value of the `X-TC-Action` header, if any.
    pub action: Option<String>,
    /// Value of the `X-TC-Service` header, if any.
    pub service: Option<String>,
    /// Value of the `X-TC-Version` header, if any.
    pub version: Option<String>,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 600,
            backend: "pipeline".to_string(),
            lang_list: "ch".to_string(),
            start_page: 0,
            end_page: 99_999,
            action: None,
            service: None,
            version: None,
        }
    }
}

/// LLM endpoint used for table summaries and QA generation.
///
/// Two ways to reach a model:
/// * `base_url` set: an OpenAI-compatible chat-completions endpoint,
/// * otherwise `provider_name` set: an `edgequake-llm` provider
///   ("openai", "anthropic", "ollama", ...).
///
/// With no `model` configured the extractor uses the OCR text as the table
/// description.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmSettings {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub provider_name: Option<String>,
    pub model: Option<String>,
    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,
    /// Maximum completion tokens per table. Default: 2000.
    pub max_tokens: usize,
    /// Request timeout in seconds. Default: 120.
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            provider_name: None,
            model: None,
            temperature: 0.1,
            max_tokens: 2000,
            timeout_secs: 120,
        }
    }
}

impl fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// All remote endpoints, plus the pdfium library location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewaySettings {
    pub ocr: OcrSettings,
    pub llm: LlmSettings,
    /// Explicit pdfium library path. Falls back to the system library.
    pub pdfium_lib_path: Option<PathBuf>,
}

impl GatewaySettings {
    /// Read settings from `DOCINDEX_*` environment variables, keeping
    /// defaults for anything unset or unparsable.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `DOCINDEX_OCR_URL` | `ocr.base_url` |
    /// | `DOCINDEX_OCR_TIMEOUT_SECS` | `ocr.timeout_secs` |
    /// | `DOCINDEX_OCR_BACKEND` | `ocr.backend` |
    /// | `DOCINDEX_OCR_LANG` | `ocr.lang_list` |
    /// | `DOCINDEX_OCR_ACTION` / `_SERVICE` / `_VERSION` | routing headers |
    /// | `DOCINDEX_LLM_URL` | `llm.base_url` |
    /// | `DOCINDEX_LLM_API_KEY` | `llm.api_key` |
    /// | `DOCINDEX_LLM_PROVIDER` | `llm.provider_name` |
    /// | `DOCINDEX_LLM_MODEL` | `llm.model` |
    /// | `DOCINDEX_LLM_TIMEOUT_SECS` | `llm.timeout_secs` |
    /// | `DOCINDEX_PDFIUM_LIB_PATH` | `pdfium_lib_path` |
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut s = Self::default();

        s.ocr.base_url = get("DOCINDEX_OCR_URL");
        if let Some(t) = get("DOCINDEX_OCR_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            s.ocr.timeout_secs = t;
        }
        if let Some(b) = get("DOCINDEX_OCR_BACKEND") {
            s.ocr.backend = b;
        }
        if let Some(l) = get("DOCINDEX_OCR_LANG") {
            s.ocr.lang_list = l;
        }
        s.ocr.action = get("DOCINDEX_OCR_ACTION");
        s.ocr.service = get("DOCINDEX_OCR_SERVICE");
        s.ocr.version = get("DOCINDEX_OCR_VERSION");

        s.llm.base_url = get("DOCINDEX_LLM_URL");
        s.llm.api_key = get("DOCINDEX_LLM_API_KEY");
        s.llm.provider_name = get("DOCINDEX_LLM_PROVIDER");
        s.llm.model = get("DOCINDEX_LLM_MODEL");
        if let Some(t) = get("DOCINDEX_LLM_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            s.llm.timeout_secs = t;
        }

        s.pdfium_lib_path = get("DOCINDEX_PDFIUM_LIB_PATH").map(PathBuf::from);
        s
    }
}

// ── Table scan options ───────────────────────────────────────────────────

/// Geometry and rasterisation knobs for the table pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableScanOptions {
    /// Render resolution for table crops, in DPI. Default: 300.
    pub resolution: u32,
    /// How far above a table to look for its title, in points. Default: 50.
    pub title_distance: f64,
    /// Padding around the title-expanded table box, in points. Default: 25.
    pub padding: f64,
    /// Continuation tolerance as a fraction of width. Default: 0.1.
    pub continuation_threshold: f64,
    /// Pixel rows trimmed at each seam when stitching parts. Default: 0.
    pub merge_overlap: u32,
    pub lattice: LatticeSettings,
}

impl Default for TableScanOptions {
    fn default() -> Self {
        Self {
            resolution: 300,
            title_distance: DEFAULT_TITLE_DISTANCE,
            padding: DEFAULT_TABLE_PADDING,
            continuation_threshold: DEFAULT_CONTINUATION_THRESHOLD,
            merge_overlap: 0,
            lattice: LatticeSettings::default(),
        }
    }
}

// ── Extraction config ────────────────────────────────────────────────────

/// What to do when the LLM gateway fails for one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SummaryFailurePolicy {
    /// Abort the run and roll back stored images. (default)
    #[default]
    Abort,
    /// Log the failure and use the table's OCR text as its description.
    UseOcrText,
}

/// Configuration for a table-aware extraction run.
#[derive(Clone)]
pub struct ExtractionConfig {
    pub gateways: GatewaySettings,
    pub scan: TableScanOptions,
    /// Custom table-summary system prompt. If None, uses the built-in one.
    pub system_prompt: Option<String>,
    /// Prepended to an artifact path to form the inline image link. Default: "".
    pub image_url_prefix: String,
    /// Heading of the section holding table descriptions. Default: "Table details".
    pub table_section_heading: String,
    pub summary_failure: SummaryFailurePolicy,
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            gateways: GatewaySettings::default(),
            scan: TableScanOptions::default(),
            system_prompt: None,
            image_url_prefix: String::new(),
            table_section_heading: "Table details".to_string(),
            summary_failure: SummaryFailurePolicy::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("gateways", &self.gateways)
            .field("scan", &self.scan)
            .field("system_prompt", &self.system_prompt.as_ref().map(|p| p.len()))
            .field("image_url_prefix", &self.image_url_prefix)
            .field("table_section_heading", &self.table_section_heading)
            .field("summary_failure", &self.summary_failure)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Builder seeded from [`GatewaySettings::from_env`].
    pub fn from_env() -> ExtractionConfigBuilder {
        Self::builder().gateways(GatewaySettings::from_env())
    }

    /// The table-summary prompt in effect.
    pub fn summary_prompt(&self) -> &str {
        self.system_prompt
            .as_deref()
            .unwrap_or(crate::prompts::TABLE_SUMMARY_SYSTEM_PROMPT)
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn gateways(mut self, gateways: GatewaySettings) -> Self {
        self.config.gateways = gateways;
        self
    }

    pub fn ocr_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.gateways.ocr.base_url = Some(url.into());
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.gateways.ocr.timeout_secs = secs;
        self
    }

    pub fn ocr_backend(mut self, backend: impl Into<String>) -> Self {
        self.config.gateways.ocr.backend = backend.into();
        self
    }

    pub fn llm_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.gateways.llm.base_url = Some(url.into());
        self
    }

    pub fn llm_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.gateways.llm.api_key = Some(key.into());
        self
    }

    pub fn llm_provider(mut self, name: impl Into<String>) -> Self {
        self.config.gateways.llm.provider_name = Some(name.into());
        self
    }

    pub fn llm_model(mut self, model: impl Into<String>) -> Self {
        self.config.gateways.llm.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.gateways.llm.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.gateways.llm.max_tokens = n;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.gateways.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn scan_options(mut self, scan: TableScanOptions) -> Self {
        self.config.scan = scan;
        self
    }

    pub fn resolution(mut self, dpi: u32) -> Self {
        self.config.scan.resolution = dpi;
        self
    }

    pub fn title_distance(mut self, points: f64) -> Self {
        self.config.scan.title_distance = points;
        self
    }

    pub fn padding(mut self, points: f64) -> Self {
        self.config.scan.padding = points;
        self
    }

    pub fn continuation_threshold(mut self, threshold: f64) -> Self {
        self.config.scan.continuation_threshold = threshold;
        self
    }

    pub fn merge_overlap(mut self, px: u32) -> Self {
        self.config.scan.merge_overlap = px;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn image_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.image_url_prefix = prefix.into();
        self
    }

    pub fn table_section_heading(mut self, heading: impl Into<String>) -> Self {
        self.config.table_section_heading = heading.into();
        self
    }

    pub fn summary_failure(mut self, policy: SummaryFailurePolicy) -> Self {
        self.config.summary_failure = policy;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, IngestError> {
        let c = &self.config;
        if c.gateways.ocr.base_url.as_deref().map_or(true, |u| u.trim().is_empty()) {
            return Err(IngestError::Validation(
                "OCR base URL is not configured (DOCINDEX_OCR_URL)".into(),
            ));
        }
        if !(72..=600).contains(&c.scan.resolution) {
            return Err(IngestError::Validation(format!(
                "Resolution must be 72–600 DPI, got {}",
                c.scan.resolution
            )));
        }
        if !(c.scan.continuation_threshold > 0.0 && c.scan.continuation_threshold < 1.0) {
            return Err(IngestError::Validation(format!(
                "Continuation threshold must be in (0, 1), got {}",
                c.scan.continuation_threshold
            )));
        }
        if c.scan.title_distance < 0.0 || c.scan.padding < 0.0 {
            return Err(IngestError::Validation(
                "Title distance and padding must be non-negative".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_documented_values() {
        let c = ExtractionConfig::default();
        assert_eq!(c.scan.resolution, 300);
        assert_eq!(c.scan.title_distance, 50.0);
        assert_eq!(c.scan.padding, 25.0);
        assert_eq!(c.scan.continuation_threshold, 0.1);
        assert_eq!(c.scan.merge_overlap, 0);
        assert_eq!(c.gateways.llm.temperature, 0.1);
        assert_eq!(c.gateways.llm.max_tokens, 2000);
        assert_eq!(c.gateways.ocr.backend, "pipeline");
        assert_eq!(c.summary_failure, SummaryFailurePolicy::Abort);
    }

    #[test]
    fn build_requires_ocr_url() {
        let err = ExtractionConfig::builder().build().unwrap_err();
        assert!(matches!(err, IngestError::Validation(_)));
    }

    #[test]
    fn build_rejects_bad_threshold() {
        let err = ExtractionConfig::builder()
            .ocr_base_url("http://ocr")
            .continuation_threshold(1.5)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("threshold"));
    }

    #[test]
    fn summary_prompt_override() {
        let c = ExtractionConfig::builder()
            .ocr_base_url("http://ocr")
            .system_prompt("describe")
            .build()
            .unwrap();
        assert_eq!(c.summary_prompt(), "describe");
        assert!(ExtractionConfig::default()
            .summary_prompt()
            .starts_with("You are a table analysis assistant"));
    }

    #[test]
    fn env_lookup_fills_gateways() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("DOCINDEX_OCR_URL", "http://ocr/parse"),
            ("DOCINDEX_OCR_TIMEOUT_SECS", "30"),
            ("DOCINDEX_OCR_SERVICE", "mineru"),
            ("DOCINDEX_LLM_MODEL", "qwen"),
            ("DOCINDEX_LLM_TIMEOUT_SECS", "not-a-number"),
            ("DOCINDEX_LLM_API_KEY", "  "),
        ]);
        let s = GatewaySettings::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(s.ocr.base_url.as_deref(), Some("http://ocr/parse"));
        assert_eq!(s.ocr.timeout_secs, 30);
        assert_eq!(s.ocr.service.as_deref(), Some("mineru"));
        assert_eq!(s.llm.model.as_deref(), Some("qwen"));
        assert_eq!(s.llm.timeout_secs, 120);
        assert!(s.llm.api_key.is_none());
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut s = LlmSettings::default();
        s.api_key = Some("sk-secret".into());
        assert!(!format!("{:?}", s).contains("sk-secret"));
    }
}
