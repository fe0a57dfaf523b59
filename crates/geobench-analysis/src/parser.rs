//! Response parser: raw answer text to mentions and citations.
//!
//! Two paths share one output shape. A JSON payload (bare or fenced) is
//! normalised field by field; anything else goes through the prose heuristics
//! (alias matching, sentence context, lexicon sentiment, recommendation cues).

use std::collections::HashSet;
use std::sync::LazyLock;

use geobench_core::{BrandsFile, Citation, Mention, ParsedResponse, Sentiment};
use regex::Regex;
use serde_json::Value;

use crate::citations::{extract_urls, push_unique, CitationClassifier};
use crate::error::{AnalysisError, ParseError};
use crate::lexicon::lexicon_score;
use crate::matcher::{BrandMatcher, Occurrence};
use crate::payload::{locate, mentions_array, Payload};
use crate::text::{is_first_list_item, sentence_spans};

static RECOMMENDATION_CUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:recommend(?:ed|s|ation)?|top (?:pick|choice)|best (?:choice|option|overall|fit)|go-to|our pick|first choice|stands? out)\b",
    )
    .expect("valid recommendation cue regex")
});

const MAX_CONTEXT_CHARS: usize = 500;

/// Key in structured payloads that gates context-scoped brands.
const SCOPE_FLAG: &str = "zoom_context_is_webinar";

/// Parses engine answers against a fixed brand configuration.
///
/// Build once per run and share; parsing is pure and deterministic.
#[derive(Debug)]
pub struct ResponseParser {
    matcher: BrandMatcher,
    classifier: CitationClassifier,
}

impl ResponseParser {
    /// Compiles the alias, context and exclusion patterns for `brands`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError`] if a brand has no usable alias or a pattern
    /// fails to compile.
    pub fn new(brands: &BrandsFile) -> Result<Self, AnalysisError> {
        Ok(Self {
            matcher: BrandMatcher::build(brands)?,
            classifier: CitationClassifier::new(brands),
        })
    }

    /// Parses `text` with no engine-reported citations.
    ///
    /// # Errors
    ///
    /// See [`ResponseParser::parse_with_citations`].
    pub fn parse(&self, text: &str) -> Result<ParsedResponse, ParseError> {
        self.parse_with_citations(text, std::iter::empty::<(&str, Option<&str>)>())
    }

    /// Parses `text` and merges the `(url, title)` pairs the engine reported
    /// alongside it.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::EmptyResponse`] for blank text, or
    /// [`ParseError::MalformedPayload`] when the text is nothing but a JSON
    /// payload that cannot be decoded.
    pub fn parse_with_citations<'a, I>(
        &self,
        text: &str,
        reported: I,
    ) -> Result<ParsedResponse, ParseError>
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        let text = text.trim();
        if text.is_empty() {
            return Err(ParseError::EmptyResponse);
        }

        let mut seen = HashSet::new();
        let mut citations = Vec::new();

        let mentions = match locate(text) {
            Payload::Structured(value) => {
                for (url, title) in payload_citations(&value) {
                    self.add_citation(&mut citations, &mut seen, &url, title.as_deref());
                }
                self.mentions_from_payload(&value)
            }
            Payload::Invalid(reason) => return Err(ParseError::MalformedPayload(reason)),
            Payload::Prose => {
                for url in extract_urls(text) {
                    self.add_citation(&mut citations, &mut seen, &url, None);
                }
                self.mentions_from_prose(text)
            }
        };

        for (url, title) in reported {
            self.add_citation(&mut citations, &mut seen, url, title);
        }

        Ok(ParsedResponse {
            mentions,
            citations,
        })
    }

    fn add_citation(
        &self,
        citations: &mut Vec<Citation>,
        seen: &mut HashSet<String>,
        url: &str,
        title: Option<&str>,
    ) {
        if let Some(citation) = self.classifier.classify(url, title) {
            push_unique(citations, seen, citation);
        }
    }

    fn mentions_from_payload(&self, value: &Value) -> Vec<Mention> {
        let scope_flag = value.get(SCOPE_FLAG).and_then(Value::as_bool);
        let entries = mentions_array(value).map(Vec::as_slice).unwrap_or_default();

        let mut mentions = Vec::new();
        for entry in entries {
            let Some(name) = str_field(entry, &["brand", "brand_id", "name"]) else {
                continue;
            };
            let Some(brand) = self.matcher.resolve(name) else {
                continue;
            };
            let context = str_field(entry, &["context", "snippet"]).unwrap_or("");
            if self.matcher.is_context_scoped(brand)
                && !self.scoped_entry_in_scope(brand, scope_flag, &format!("{name} {context}"))
            {
                continue;
            }

            let ordinal = i32::try_from(mentions.len() + 1).unwrap_or(i32::MAX);
            let position = int_field(entry, &["position", "mention_order", "rank"])
                .filter(|p| *p >= 1)
                .unwrap_or(ordinal);

            let score =
                float_field(entry, &["sentiment_score", "score"]).map(|s| s.clamp(-1.0, 1.0));
            let label = str_field(entry, &["sentiment"])
                .and_then(|s| s.parse::<Sentiment>().ok());
            let (sentiment, score) = match (label, score) {
                (Some(label), score) => (label, score.unwrap_or(0.0)),
                (None, Some(score)) => (Sentiment::from_score(score), score),
                (None, None) => (Sentiment::Neutral, 0.0),
            };

            mentions.push(Mention {
                brand: self.matcher.key(brand).to_string(),
                position,
                context: truncate_chars(context, MAX_CONTEXT_CHARS),
                sentiment,
                sentiment_score: Some(score),
                is_primary_recommendation: bool_field(
                    entry,
                    &["is_primary_recommendation", "primary_recommendation", "is_primary"],
                ),
            });
        }

        mentions.sort_by_key(|m| m.position);
        mentions
    }

    /// A context-scoped entry counts when the payload does not rule the
    /// scope out, its name and context name no excluded product, and either
    /// the payload vouches for the scope or the entry carries a context keyword.
    fn scoped_entry_in_scope(&self, brand: usize, scope_flag: Option<bool>, evidence: &str) -> bool {
        if scope_flag == Some(false) || self.matcher.is_excluded(brand, evidence) {
            return false;
        }
        scope_flag == Some(true) || self.matcher.has_context(brand, evidence)
    }

    fn mentions_from_prose(&self, text: &str) -> Vec<Mention> {
        let spans = sentence_spans(text);
        let occurrences = self.matcher.occurrences(text, &spans);

        let mut firsts: Vec<&Occurrence> = Vec::new();
        for occ in &occurrences {
            if !firsts.iter().any(|f| f.brand == occ.brand) {
                firsts.push(occ);
            }
        }

        let primary = spans
            .iter()
            .enumerate()
            .filter(|(_, span)| {
                let sentence = &text[span.start..span.end];
                RECOMMENDATION_CUE_RE.is_match(sentence) || is_first_list_item(sentence)
            })
            .find_map(|(idx, _)| occurrences.iter().find(|o| o.sentence == idx))
            .map(|o| o.brand);

        firsts
            .iter()
            .enumerate()
            .map(|(rank, first)| {
                let mut sentence_ids: Vec<usize> = occurrences
                    .iter()
                    .filter(|o| o.brand == first.brand)
                    .map(|o| o.sentence)
                    .collect();
                sentence_ids.dedup();
                let scored = sentence_ids
                    .iter()
                    .map(|&i| &text[spans[i].clone()])
                    .collect::<Vec<_>>()
                    .join(" ");
                let score = lexicon_score(&scored);

                Mention {
                    brand: self.matcher.key(first.brand).to_string(),
                    position: i32::try_from(rank + 1).unwrap_or(i32::MAX),
                    context: truncate_chars(
                        text[spans[first.sentence].clone()].trim(),
                        MAX_CONTEXT_CHARS,
                    ),
                    sentiment: Sentiment::from_score(score),
                    sentiment_score: Some(score),
                    is_primary_recommendation: primary == Some(first.brand),
                }
            })
            .collect()
    }
}

fn payload_citations(value: &Value) -> Vec<(String, Option<String>)> {
    let Some(items) = value.get("citations").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(url) => Some((url.clone(), None)),
            Value::Object(_) => {
                let url = str_field(item, &["url", "link"])?;
                Some((url.to_string(), str_field(item, &["title"]).map(str::to_string)))
            }
            _ => None,
        })
        .collect()
}

fn str_field<'v>(entry: &'v Value, keys: &[&str]) -> Option<&'v str> {
    keys.iter()
        .find_map(|k| entry.get(*k).and_then(Value::as_str))
        .filter(|s| !s.trim().is_empty())
}

fn int_field(entry: &Value, keys: &[&str]) -> Option<i32> {
    keys.iter().find_map(|k| match entry.get(*k)? {
        Value::Number(n) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn float_field(entry: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|k| match entry.get(*k)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .filter(|v: &f64| v.is_finite())
}

fn bool_field(entry: &Value, keys: &[&str]) -> bool {
    keys.iter().any(|k| match entry.get(*k) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    })
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
#[path = "parser_test.rs"]
mod tests;
