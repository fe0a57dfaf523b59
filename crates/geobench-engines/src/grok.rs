//! Grok with live web search, via the xAI Responses API.

use async_trait::async_trait;
use geobench_core::EngineKind;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

use crate::client::{str_field, EngineClient, HttpCore, SEARCH_SYSTEM_PROMPT};
use crate::error::EngineError;
use crate::types::{dedupe_citations, EngineCitation, RawAnswer};

pub const DEFAULT_BASE_URL: &str = "https://api.x.ai/v1";

pub struct GrokClient {
    http: HttpCore,
    model: String,
}

impl GrokClient {
    /// Creates a client pointed at the production xAI API.
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
}

#[async_trait]
impl EngineClient for GrokClient {
    fn kind(&self) -> EngineKind {
        EngineKind::GrokWebSearch
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn call(&self, query_text: &str) -> Result<RawAnswer, EngineError> {
        let body = json!({
            "model": self.model,
            "input": format!("{SEARCH_SYSTEM_PROMPT}\n\n{query_text}"),
            "tools": [{"type": "web_search"}],
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
}

pub(crate) fn bearer(api_key: &str) -> Result<HeaderValue, EngineError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {api_key}"))
        .map_err(|e| EngineError::Config(format!("invalid API key: {e}")))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Collects answer text and URL annotations from a Responses API `output` array.
///
/// Both xAI and OpenAI return `output[].content[]` blocks of type
/// `output_text`, each with optional `annotations[]` carrying a `url`.
pub(crate) fn parse_responses_output(data: &Value) -> (String, Vec<EngineCitation>) {
    let mut text = String::new();
    let mut citations = Vec::new();

    let items = data
        .get("output")
        .and_then(Value::as_array)
        .map_or(&[][..], Vec::as_slice);

    for item in items {
        let blocks = item
            .get("content")
            .and_then(Value::as_array)
            .map_or(&[][..], Vec::as_slice);
        for block in blocks {
            if str_field(block, "type") != Some("output_text") {
                continue;
            }
            if let Some(t) = str_field(block, "text") {
                text.push_str(t);
            }
            let annotations = block
                .get("annotations")
                .and_then(Value::as_array)
                .map_or(&[][..], Vec::as_slice);
            for ann in annotations {
                if let Some(url) = str_field(ann, "url").filter(|u| !u.is_empty()) {
                    citations.push(EngineCitation {
                        url: url.to_string(),
                        title: str_field(ann, "title")
                            .filter(|t| !t.is_empty())
                            .map(str::to_string),
                    });
                }
            }
        }
    }

    (text, dedupe_citations(citations))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_collects_text_and_deduped_citations() {
        let data = json!({
            "output": [
                {"type": "web_search_call", "status": "completed"},
                {"type": "message", "content": [
                    {"type": "output_text", "text": "ON24 leads. ", "annotations": [
                        {"type": "url_citation", "url": "https://on24.com", "title": "ON24"},
                        {"type": "url_citation", "url": "https://on24.com", "title": "dup"}
                    ]},
                    {"type": "output_text", "text": "Goldcast follows.", "annotations": [
                        {"type": "url_citation", "url": "https://goldcast.io", "title": ""}
                    ]},
                    {"type": "refusal", "text": "ignored"}
                ]}
            ]
        });
        let (text, citations) = parse_responses_output(&data);
        assert_eq!(text, "ON24 leads. Goldcast follows.");
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].title.as_deref(), Some("ON24"));
        assert!(citations[1].title.is_none());
    }

    #[test]
    fn parse_tolerates_missing_output() {
        let (text, citations) = parse_responses_output(&json!({"id": "resp_1"}));
        assert!(text.is_empty());
        assert!(citations.is_empty());
    }
}
