//! The [`EngineClient`] seam and the HTTP plumbing the three providers share.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use geobench_core::{EngineKind, EngineSettings};
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde_json::Value;

use crate::claude::ClaudeClient;
use crate::error::EngineError;
use crate::grok::GrokClient;
use crate::openai::OpenAiClient;
use crate::types::RawAnswer;

const USER_AGENT: &str = "geobench/0.1 (answer-engine-benchmark)";

/// System prompt for engines that search the web.
pub const SEARCH_SYSTEM_PROMPT: &str = "You are a knowledgeable B2B marketing technology analyst. \
    When answering questions about webinar platforms and virtual event solutions, \
    provide comprehensive, balanced comparisons. Always cite your sources with URLs. \
    Focus on enterprise B2B use cases. When discussing Zoom, focus ONLY on \
    Zoom Webinars and Zoom Events (not Zoom Meetings or video conferencing).";

/// System prompt for engines answering from model knowledge only.
pub const PARAMETRIC_SYSTEM_PROMPT: &str = "You are a knowledgeable B2B marketing technology analyst. \
    When answering questions about webinar platforms and virtual event solutions, \
    provide comprehensive, balanced comparisons based on your knowledge. \
    Focus on enterprise B2B use cases. When discussing Zoom, focus ONLY on \
    Zoom Webinars and Zoom Events (not Zoom Meetings or video conferencing).";

/// One answer engine. Implementations hold no shared mutable state.
#[async_trait]
pub trait EngineClient: Send + Sync {
    fn kind(&self) -> EngineKind;

    /// Model requested from the provider.
    fn model(&self) -> &str;

    /// Sends one query and returns the answer.
    ///
    /// # Errors
    ///
    /// Returns a classified [`EngineError`]; the caller decides whether to retry.
    async fn call(&self, query_text: &str) -> Result<RawAnswer, EngineError>;
}

/// Builds the client for `settings.kind`.
///
/// # Errors
///
/// Returns [`EngineError::Config`] if the settings carry no API key or the
/// HTTP client cannot be constructed.
pub fn build_client(
    settings: &EngineSettings,
    timeout_secs: u64,
) -> Result<Arc<dyn EngineClient>, EngineError> {
    let api_key = settings
        .api_key
        .as_deref()
        .ok_or_else(|| EngineError::Config(format!("{} has no API key", settings.kind)))?;

    let client: Arc<dyn EngineClient> = match settings.kind {
        EngineKind::GrokWebSearch => Arc::new(GrokClient::with_base_url(
            api_key,
            &settings.model,
            timeout_secs,
            &settings.base_url,
        )?),
        EngineKind::ChatgptWebSearch => Arc::new(OpenAiClient::with_base_url(
            api_key,
            &settings.model,
            timeout_secs,
            &settings.base_url,
        )?),
        EngineKind::ClaudeParametric => Arc::new(ClaudeClient::with_base_url(
            api_key,
            &settings.model,
            timeout_secs,
            &settings.base_url,
        )?),
    };
    Ok(client)
}

/// `reqwest` client plus base URL, shared by the provider clients.
#[derive(Debug, Clone)]
pub(crate) struct HttpCore {
    client: Client,
    base_url: String,
}

impl HttpCore {
    pub(crate) fn new(
        timeout_secs: u64,
        base_url: &str,
        headers: HeaderMap,
    ) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| EngineError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// POSTs `body` to `{base_url}{path}` and returns the decoded JSON with
    /// the elapsed wall time.
    pub(crate) async fn post_json(&self, path: &str, body: &Value) -> Result<(Value, u64), EngineError> {
        let url = format!("{}{path}", self.base_url);
        let started = Instant::now();

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| EngineError::from_transport(&e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| EngineError::from_transport(&e))?;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        if !status.is_success() {
            return Err(EngineError::from_status(status, &text));
        }

        let json = serde_json::from_str(&text)
            .map_err(|e| EngineError::Malformed(format!("invalid JSON from {url}: {e}")))?;
        Ok((json, latency_ms))
    }
}

/// Reads a string field, treating absence and non-strings alike.
pub(crate) fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}
