//! LLM gateway: system prompt + user text in, completion text out.
//!
//! Two implementations:
//! * [`HttpLlmGateway`] talks to any OpenAI-compatible chat-completions
//!   endpoint with an explicit base URL and timeout,
//! * [`ProviderLlmGateway`] wraps an `edgequake-llm` provider.
//!
//! [`describe_table`] adds the summarisation contract on top: an empty
//! completion never propagates; the original table text is returned instead.

use crate::config::LlmSettings;
use crate::error::IngestError;
use crate::gateway::http::GatewayClient;
use crate::prompts::table_summary_user_message;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Chat-style completion.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Run one completion. May return an empty string.
    async fn complete(&self, system: &str, user: &str) -> Result<String, IngestError>;
}

/// Summarise one table's OCR text, falling back to that text when the
/// model answers with nothing.
pub async fn describe_table(
    gateway: &dyn LlmGateway,
    system_prompt: &str,
    table_text: &str,
) -> Result<String, IngestError> {
    let answer = gateway
        .complete(system_prompt, &table_summary_user_message(table_text))
        .await?;
    if answer.trim().is_empty() {
        warn!("LLM returned empty content, using the OCR text");
        return Ok(table_text.to_string());
    }
    Ok(answer)
}

// ── OpenAI-compatible HTTP ───────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl ChatResponse {
    fn first_content(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default()
    }
}

/// Chat completions over plain HTTP.
#[derive(Debug, Clone)]
pub struct HttpLlmGateway {
    client: GatewayClient,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: usize,
}

impl HttpLlmGateway {
    pub fn new(base_url: &str, model: &str, settings: &LlmSettings) -> Result<Self, IngestError> {
        Ok(Self {
            client: GatewayClient::new("llm", base_url, settings.timeout_secs)?,
            api_key: settings.api_key.clone(),
            model: model.to_string(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }
}

#[async_trait]
impl LlmGateway for HttpLlmGateway {
    async fn complete(&self, system: &str, user: &str) -> Result<String, IngestError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                WireMessage {
                    role: "system",
                    content: system,
                },
                WireMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let mut request = self.client.post("chat/completions").json(&body);
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.bearer_auth(key);
        }
        let response: ChatResponse = self.client.send_json(request).await?;
        let content = response.first_content();
        debug!("LLM completion: {} chars", content.len());
        Ok(content)
    }
}

// ── edgequake-llm provider ───────────────────────────────────────────────

/// Completion through an `edgequake-llm` provider.
pub struct ProviderLlmGateway {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl ProviderLlmGateway {
    pub fn new(provider: Arc<dyn LLMProvider>, settings: &LlmSettings) -> Self {
        Self {
            provider,
            options: CompletionOptions {
                temperature: Some(settings.temperature),
                max_tokens: Some(settings.max_tokens),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl LlmGateway for ProviderLlmGateway {
    async fn complete(&self, system: &str, user: &str) -> Result<String, IngestError> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(user)];
        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| IngestError::gateway("llm", e.to_string()))?;
        debug!(
            "LLM completion: {} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Build the gateway described by `settings`.
///
/// Returns `Ok(None)` when no model is configured; callers then use OCR
/// text as table descriptions. A base URL selects the HTTP client; otherwise
/// `provider_name` selects an `edgequake-llm` provider.
pub fn build_llm_gateway(settings: &LlmSettings) -> Result<Option<Arc<dyn LlmGateway>>, IngestError> {
    let Some(model) = settings.model.as_deref().filter(|m| !m.is_empty()) else {
        warn!("No LLM model configured, table descriptions will use OCR text");
        return Ok(None);
    };

    if let Some(base_url) = settings.base_url.as_deref().filter(|u| !u.is_empty()) {
        let gateway = HttpLlmGateway::new(base_url, model, settings)?;
        return Ok(Some(Arc::new(gateway)));
    }

    if let Some(name) = settings.provider_name.as_deref().filter(|n| !n.is_empty()) {
        let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
            IngestError::Validation(format!("LLM provider '{}' unavailable: {}", name, e))
        })?;
        return Ok(Some(Arc::new(ProviderLlmGateway::new(provider, settings))));
    }

    Err(IngestError::Validation(format!(
        "LLM model '{}' configured without a base URL or provider",
        model
    )))
}
