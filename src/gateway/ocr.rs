//! OCR gateway: document or image in, Markdown out.

use crate::config::OcrSettings;
use crate::error::IngestError;
use crate::gateway::http::GatewayClient;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::{debug, warn};

/// Payload kinds accepted by the OCR service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrInput {
    Pdf,
    Png,
}

impl OcrInput {
    pub fn mime_type(&self) -> &'static str {
        match self {
            OcrInput::Pdf => "application/pdf",
            OcrInput::Png => "image/png",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            OcrInput::Pdf => "document.pdf",
            OcrInput::Png => "document.png",
        }
    }
}

/// Structured document-to-Markdown OCR.
#[async_trait]
pub trait OcrGateway: Send + Sync {
    /// Parse `bytes` and return the concatenated Markdown of every result
    /// page. An empty string means the service found no content.
    async fn parse(&self, bytes: Vec<u8>, input: OcrInput) -> Result<String, IngestError>;
}

/// Multipart OCR client.
#[derive(Debug, Clone)]
pub struct HttpOcrGateway {
    client: GatewayClient,
    settings: OcrSettings,
}

impl HttpOcrGateway {
    pub fn new(settings: &OcrSettings) -> Result<Self, IngestError> {
        let base_url = settings
            .base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| IngestError::Validation("OCR base URL is not configured".into()))?;
        Ok(Self {
            client: GatewayClient::new("ocr", base_url, settings.timeout_secs)?,
            settings: settings.clone(),
        })
    }
}

#[async_trait]
impl OcrGateway for HttpOcrGateway {
    async fn parse(&self, bytes: Vec<u8>, input: OcrInput) -> Result<String, IngestError> {
        debug!("OCR request: {} bytes as {}", bytes.len(), input.mime_type());
        let part = Part::bytes(bytes)
            .file_name(input.file_name())
            .mime_str(input.mime_type())
            .map_err(|e| IngestError::gateway("ocr", e.to_string()))?;

        let mut form = Form::new();
        for (name, value) in form_fields(&self.settings) {
            form = form.text(name, value);
        }
        form = form.part("files", part);

        let mut request = self.client.post("").multipart(form);
        for (name, value) in routing_headers(&self.settings) {
            request = request.header(name, value);
        }

        let response: Value = self.client.send_json(request).await?;
        let markdown = collect_md_content(&response);
        if markdown.is_empty() {
            warn!("OCR response contained no md_content");
        }
        Ok(markdown)
    }
}

/// Form fields sent with every parse request.
pub(crate) fn form_fields(settings: &OcrSettings) -> Vec<(&'static str, String)> {
    vec![
        ("is_json_md_dump", "false".to_string()),
        ("return_middle_json", "false".to_string()),
        ("return_model_output", "false".to_string()),
        ("return_md", "true".to_string()),
        ("return_images", "false".to_string()),
        ("return_content_list", "false".to_string()),
        ("start_page_id", settings.start_page.to_string()),
        ("end_page_id", settings.end_page.to_string()),
        ("parse_method", "auto".to_string()),
        ("lang_list", settings.lang_list.clone()),
        ("backend", settings.backend.clone()),
        ("table_enable", "true".to_string()),
        ("formula_enable", "true".to_string()),
    ]
}

fn routing_headers(settings: &OcrSettings) -> Vec<(&'static str, String)> {
    [
        ("X-TC-Action", &settings.action),
        ("X-TC-Service", &settings.service),
        ("X-TC-Version", &settings.version),
    ]
    .into_iter()
    .filter_map(|(name, value)| {
        value
            .as_ref()
            .filter(|v| !v.is_empty())
            .map(|v| (name, v.clone()))
    })
    .collect()
}

/// Join every non-empty `results.*.md_content` in response order with a
/// blank line.
pub(crate) fn collect_md_content(response: &Value) -> String {
    let pages: Vec<&Value> = match response.get("results") {
        Some(Value::Object(map)) => map.values().collect(),
        Some(Value::Array(items)) => items.iter().collect(),
        _ => Vec::new(),
    };
    pages
        .into_iter()
        .filter_map(|page| page.get("md_content").and_then(Value::as_str))
        .filter(|md| !md.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
