//! ChatGPT with web search, via the OpenAI Responses API.
//!
//! When the Responses endpoint rejects the request (tool unavailable for the
//! model, unexpected payload) the client falls back to plain chat completions,
//! which answer without search and without citations.

use async_trait::async_trait;
use geobench_core::EngineKind;
use reqwest::header::{HeaderMap, AUTHORIZATION};
use serde_json::{json, Value};

use crate::client::{str_field, EngineClient, HttpCore, SEARCH_SYSTEM_PROMPT};
use crate::error::EngineError;
use crate::grok::{bearer, parse_responses_output};
use crate::types::RawAnswer;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const FALLBACK_MAX_TOKENS: u32 = 2048;

pub struct OpenAiClient {
    http: HttpCore,
    model: String,
}

impl OpenAiClient {
    /// Creates a client pointed at the production OpenAI API.
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
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer(api_key)?);
        Ok(Self {
            http: HttpCore::new(timeout_secs, base_url, headers)?,
            model: model.to_string(),
        })
    }

    async fn call_with_web_search(&self, query_text: &str) -> Result<RawAnswer, EngineError> {
        let body = json!({
            "model": self.model,
            "input": format!("{SEARCH_SYSTEM_PROMPT}\n\n{query_text}"),
            "tools": [{"type": "web_search_preview"}],
        });
        let (data, latency_ms) = self.http.post_json("/responses", &body).await?;
        let (text, citations) = parse_responses_output(&data);

        if text.trim().is_empty() {
            return Err(EngineError::Malformed(
                "response carried no output_text".to_string(),
            ));
        }

        Ok(RawAnswer {
            text,
            model: str_field(&data, "model").unwrap_or(&self.model).to_string(),
            citations,
            usage: data.get("usage").cloned().unwrap_or_else(|| json!({})),
            latency_ms,
        })
    }

    async fn call_chat_completions(&self, query_text: &str) -> Result<RawAnswer, EngineError> {
        let body = json!({
            "model": self.model,
            "max_tokens": FALLBACK_MAX_TOKENS,
            "messages": [
                {"role": "system", "content": SEARCH_SYSTEM_PROMPT},
                {"role": "user", "content": query_text},
            ],
        });
        let (data, latency_ms) = self.http.post_json("/chat/completions", &body).await?;

        let text = data
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                EngineError::Malformed("chat completion carried no message content".to_string())
            })?
            .to_string();

        let usage = data.get("usage").map_or_else(
            || json!({}),
            |u| {
                json!({
                    "input_tokens": u.get("prompt_tokens"),
                    "output_tokens": u.get("completion_tokens"),
                })
            },
        );

        Ok(RawAnswer {
            text,
            model: str_field(&data, "model").unwrap_or(&self.model).to_string(),
            citations: Vec::new(),
            usage,
            latency_ms,
        })
    }
}

#[async_trait]
impl EngineClient for OpenAiClient {
    fn kind(&self) -> EngineKind {
        EngineKind::ChatgptWebSearch
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn call(&self, query_text: &str) -> Result<RawAnswer, EngineError> {
        match self.call_with_web_search(query_text).await {
            Err(EngineError::Malformed(reason)) => {
                tracing::warn!(
                    engine = %EngineKind::ChatgptWebSearch,
                    reason = %reason,
                    "web search request rejected; falling back to chat completions"
                );
                self.call_chat_completions(query_text).await
            }
            other => other,
        }
    }
}
