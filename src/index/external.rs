//! Client for a remote extraction service used by the external index type.
//!
//! Request: `{"transfer_method": "base64", "file_name": ..., "file_data": ...}`
//! posted as JSON to the configured address.
//! Response: `{"data": {"documents": [{"page_content", "metadata"}]}, "error": ...}`.

use crate::document::Document;
use crate::error::IngestError;
use crate::gateway::GatewayClient;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

/// Default request timeout for the external service, in seconds.
pub const DEFAULT_EXTERNAL_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Serialize)]
struct ExternalRequest<'a> {
    transfer_method: &'a str,
    file_name: Option<&'a str>,
    file_data: String,
}

#[derive(Debug, Default, Deserialize)]
struct ExternalResponse {
    #[serde(default)]
    data: ExternalData,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ExternalData {
    #[serde(default)]
    documents: Vec<ExternalDocument>,
}

#[derive(Debug, Deserialize)]
struct ExternalDocument {
    #[serde(default)]
    page_content: String,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

/// Turn a decoded response body into documents, backfilling identity.
///
/// # Errors
/// [`IngestError::Gateway`] when the body does not have the expected shape
/// or carries a non-empty `error`.
pub fn parse_external_response(body: Value) -> Result<Vec<Document>, IngestError> {
    let response: ExternalResponse = serde_json::from_value(body)
        .map_err(|e| IngestError::gateway("external-index", format!("unexpected response: {}", e)))?;
    if let Some(error) = response.error.filter(|e| !e.trim().is_empty()) {
        return Err(IngestError::gateway("external-index", error));
    }
    Ok(response
        .data
        .documents
        .into_iter()
        .map(|d| {
            Document {
                page_content: d.page_content,
                metadata: d.metadata.unwrap_or_default(),
                children: Vec::new(),
            }
            .ensure_identity()
        })
        .collect())
}

/// Handle on one external extraction endpoint.
#[derive(Debug, Clone)]
pub struct ExternalIndexClient {
    client: GatewayClient,
}

impl ExternalIndexClient {
    pub fn new(server_address: &str, timeout_secs: u64) -> Result<Self, IngestError> {
        Ok(Self {
            client: GatewayClient::new("external-index", server_address, timeout_secs)?,
        })
    }

    /// Send `bytes` for extraction.
    pub async fn extract(
        &self,
        file_name: Option<&str>,
        bytes: &[u8],
    ) -> Result<Vec<Document>, IngestError> {
        let request = ExternalRequest {
            transfer_method: "base64",
            file_name,
            file_data: STANDARD.encode(bytes),
        };
        debug!(
            "Posting {} bytes ({:?}) to {}",
            bytes.len(),
            file_name,
            self.client.url("")
        );
        let body: Value = self.client.post_json("", &request).await?;
        let documents = parse_external_response(body)?;
        info!("External service returned {} document(s)", documents.len());
        Ok(documents)
    }
}
