use serde::{Deserialize, Serialize};

/// A citation reported by the engine alongside its answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineCitation {
    pub url: String,
    pub title: Option<String>,
}

/// One engine answer, before parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAnswer {
    pub text: String,
    /// Model name as reported by the provider, falling back to the requested model.
    pub model: String,
    /// De-duplicated by URL, in first-seen order.
    pub citations: Vec<EngineCitation>,
    /// Provider usage block, passed through untouched.
    pub usage: serde_json::Value,
    pub latency_ms: u64,
}

impl RawAnswer {
    /// Metadata JSON persisted next to the raw text.
    #[must_use]
    pub fn metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "usage": self.usage,
            "citations": self.citations,
        })
    }
}

/// Keeps the first occurrence of each URL, dropping empty ones.
pub(crate) fn dedupe_citations(citations: Vec<EngineCitation>) -> Vec<EngineCitation> {
    let mut seen = std::collections::HashSet::new();
    citations
        .into_iter()
        .filter(|c| !c.url.is_empty() && seen.insert(c.url.clone()))
        .collect()
}
