//! Structured records extracted from a single engine response.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{CoreError, EngineKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Sentiment {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }

    /// Label implied by a numeric score in `[-1.0, 1.0]`.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 0.2 {
            Sentiment::Positive
        } else if score <= -0.2 {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "neutral" | "mixed" => Ok(Sentiment::Neutral),
            "negative" => Ok(Sentiment::Negative),
            other => Err(CoreError::UnknownSentiment(other.to_string())),
        }
    }
}

/// One brand's appearance in a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    /// Brand key from `config/brands.yaml` (e.g. `on24`).
    pub brand: String,
    /// 1-based rank among all mentions in the response.
    pub position: i32,
    pub context: String,
    pub sentiment: Sentiment,
    /// Clamped to `[-1.0, 1.0]`. `None` only for rows written by older parsers.
    pub sentiment_score: Option<f64>,
    pub is_primary_recommendation: bool,
}

/// One URL referenced by a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub url: String,
    pub domain: String,
    pub title: Option<String>,
    /// Brand key the citation counts toward, if any.
    pub brand: Option<String>,
    /// Host is one of the attributed brand's root domains.
    pub is_root: bool,
    /// Host is one of the attributed brand's excluded domains.
    pub is_excluded: bool,
}

/// Output of the response parser for one raw response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedResponse {
    pub mentions: Vec<Mention>,
    pub citations: Vec<Citation>,
}

/// A stored response reloaded for aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedResponse {
    pub query_id: i64,
    pub query_category: String,
    pub engine: EngineKind,
    pub parsed: ParsedResponse,
}

/// Rolled-up signals for one brand within one (query, engine) group of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMetric {
    pub query_id: i64,
    pub query_category: String,
    pub engine: EngineKind,
    pub brand: String,
    pub is_mentioned: bool,
    pub mention_count: i32,
    pub first_position: Option<i32>,
    pub is_primary_recommendation: bool,
    pub avg_sentiment_score: Option<f64>,
    pub dominant_sentiment: Sentiment,
    pub citation_count: i32,
    pub root_citation_count: i32,
    pub excluded_citation_count: i32,
    pub is_winner: bool,
}
