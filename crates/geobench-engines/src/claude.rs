//! Claude answering from model knowledge, via the Anthropic Messages API.

use async_trait::async_trait;
use geobench_core::EngineKind;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{json, Value};

use crate::client::{str_field, EngineClient, HttpCore, PARAMETRIC_SYSTEM_PROMPT};
use crate::error::EngineError;
use crate::types::RawAnswer;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 2048;

pub struct ClaudeClient {
    http: HttpCore,
    model: String,
}

impl ClaudeClient {
    /// Creates a client pointed at the production Anthropic API.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the HTTP client cannot be built.
    pub fn new(api_key: &str, model: &str, timeout_secs: u64) -> Result<Self, EngineError> {
        Self::with_base_url(api_key, model, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the key is not a valid header value
    /// or the HTTP client cannot be built.
    pub fn with_base_url(
        api_key: &str,
        model: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, EngineError> {
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|e| EngineError::Config(format!("invalid API key: {e}")))?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static("x-api-key"), key);
        headers.insert(
            HeaderName::from_static("anthropic-version"),
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        Ok(Self {
            http: HttpCore::new(timeout_secs, base_url, headers)?,
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl EngineClient for ClaudeClient {
    fn kind(&self) -> EngineKind {
        EngineKind::ClaudeParametric
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn call(&self, query_text: &str) -> Result<RawAnswer, EngineError> {
        let body = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "system": PARAMETRIC_SYSTEM_PROMPT,
            "messages": [{"role": "user", "content": query_text}],
        });
        let (data, latency_ms) = self.http.post_json("/v1/messages", &body).await?;

        let text: String = data
            .get("content")
            .and_then(Value::as_array)
            .map_or(&[][..], Vec::as_slice)
            .iter()
            .filter(|block| str_field(block, "type") == Some("text"))
            .filter_map(|block| str_field(block, "text"))
            .collect();

        if text.trim().is_empty() {
            return Err(EngineError::Malformed(
                "message carried no text content".to_string(),
            ));
        }

        Ok(RawAnswer {
            text,
            model: str_field(&data, "model").unwrap_or(&self.model).to_string(),
            citations: Vec::new(),
            usage: data.get("usage").cloned().unwrap_or_else(|| json!({})),
            latency_ms,
        })
    }
}
