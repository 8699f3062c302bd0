//! Explicit HTTP client handle shared by the gateways.
//!
//! Each gateway owns a [`GatewayClient`] configured with its own base URL and
//! timeout; there is no process-wide client. Every failure (connect,
//! timeout, non-2xx status, undecodable body) is normalised into
//! [`IngestError::Gateway`] carrying the service name and upstream message.
//! Nothing here retries.

use crate::error::IngestError;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Longest slice of an error body quoted in a gateway error.
const ERROR_BODY_LIMIT: usize = 512;

/// A base URL, a timeout and a name for error messages.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    service: String,
    base_url: String,
    timeout_secs: u64,
    client: Client,
}

impl GatewayClient {
    pub fn new(
        service: impl Into<String>,
        base_url: &str,
        timeout_secs: u64,
    ) -> Result<Self, IngestError> {
        let service = service.into();
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| IngestError::gateway(&service, e.to_string()))?;
        Ok(Self {
            service,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs,
            client,
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Join `endpoint` onto the base URL. An empty endpoint is the base URL.
    pub fn url(&self, endpoint: &str) -> String {
        let endpoint = endpoint.trim_start_matches('/');
        if endpoint.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }

    pub fn post(&self, endpoint: &str) -> RequestBuilder {
        self.client.post(self.url(endpoint))
    }

    /// POST `body` as JSON and decode the JSON response.
    pub async fn post_json<B, R>(&self, endpoint: &str, body: &B) -> Result<R, IngestError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.send_json(self.post(endpoint).json(body)).await
    }

    /// Send a prepared request and decode its JSON response.
    pub async fn send_json<R: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<R, IngestError> {
        let response = self.send(request).await?;
        let body = response
            .text()
            .await
            .map_err(|e| self.error(format!("failed to read response body: {}", e)))?;
        serde_json::from_str(&body).map_err(|e| self.error(format!("malformed JSON response: {}", e)))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, IngestError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                self.error(format!("timed out after {}s", self.timeout_secs))
            } else {
                self.error(e.to_string())
            }
        })?;

        let status = response.status();
        debug!("{} gateway → HTTP {}", self.service, status);
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(self.error(format!("HTTP {}: {}", status, truncate(&body, ERROR_BODY_LIMIT))))
    }

    fn error(&self, message: String) -> IngestError {
        IngestError::gateway(&self.service, message)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slashes() {
        let c = GatewayClient::new("ocr", "http://lab/gateway/", 5).unwrap();
        assert_eq!(c.url(""), "http://lab/gateway");
        assert_eq!(c.url("/chat/completions"), "http://lab/gateway/chat/completions");
        assert_eq!(c.url("index/extract"), "http://lab/gateway/index/extract");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("abc", 10), "abc");
        assert_eq!(truncate("héllo", 2), "h");
    }

    #[tokio::test]
    async fn unreachable_host_is_a_gateway_error() {
        let c = GatewayClient::new("external", "http://127.0.0.1:9", 2).unwrap();
        let err = c
            .post_json::<_, serde_json::Value>("", &serde_json::json!({}))
            .await
            .unwrap_err();
        match err {
            IngestError::Gateway { service, .. } => assert_eq!(service, "external"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
