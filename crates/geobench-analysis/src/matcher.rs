//! Alias matching with product-line scoping.

use std::ops::Range;

use geobench_core::{BrandConfig, BrandsFile};
use regex::Regex;

use crate::error::AnalysisError;
use crate::text::span_index;

/// One accepted brand occurrence in answer text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Occurrence {
    /// Index into the brand list the matcher was built from.
    pub brand: usize,
    pub start: usize,
    pub sentence: usize,
}

#[derive(Debug)]
struct BrandPattern {
    key: String,
    display_name: String,
    aliases: Vec<String>,
    alias: Regex,
    context: Option<Regex>,
    exclude: Option<Regex>,
}

/// Compiled recognisers for every configured brand.
#[derive(Debug)]
pub(crate) struct BrandMatcher {
    patterns: Vec<BrandPattern>,
}

impl BrandMatcher {
    pub(crate) fn build(brands: &BrandsFile) -> Result<Self, AnalysisError> {
        let patterns = brands
            .brands
            .iter()
            .map(compile_brand)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub(crate) fn key(&self, brand: usize) -> &str {
        &self.patterns[brand].key
    }

    pub(crate) fn is_context_scoped(&self, brand: usize) -> bool {
        self.patterns[brand].context.is_some()
    }

    /// `true` when `text` carries one of the brand's context keywords, or the
    /// brand is not context-scoped.
    pub(crate) fn has_context(&self, brand: usize, text: &str) -> bool {
        self.patterns[brand]
            .context
            .as_ref()
            .is_none_or(|c| c.is_match(text))
    }

    /// `true` when `text` names one of the brand's excluded products.
    pub(crate) fn is_excluded(&self, brand: usize, text: &str) -> bool {
        self.patterns[brand]
            .exclude
            .as_ref()
            .is_some_and(|e| e.is_match(text))
    }

    /// Every accepted occurrence in `text`, ordered by offset.
    ///
    /// Occurrences of a context-scoped brand count only when their sentence
    /// contains a context keyword. An occurrence inside an excluded product
    /// phrase never counts.
    pub(crate) fn occurrences(&self, text: &str, spans: &[Range<usize>]) -> Vec<Occurrence> {
        let mut found = Vec::new();

        for (brand, pattern) in self.patterns.iter().enumerate() {
            for m in pattern.alias.find_iter(text) {
                let Some(sentence) = span_index(spans, m.start()) else {
                    continue;
                };
                let span = spans[sentence].clone();
                let sentence_text = &text[span.clone()];

                if let Some(context) = &pattern.context {
                    if !context.is_match(sentence_text) {
                        continue;
                    }
                }
                if let Some(exclude) = &pattern.exclude {
                    let inside_excluded = exclude.find_iter(sentence_text).any(|e| {
                        let (s, t) = (span.start + e.start(), span.start + e.end());
                        m.start() < t && s < m.end()
                    });
                    if inside_excluded {
                        continue;
                    }
                }

                found.push(Occurrence {
                    brand,
                    start: m.start(),
                    sentence,
                });
            }
        }

        found.sort_by_key(|o| (o.start, o.brand));
        found
    }

    /// Resolves a brand name from a structured payload to a configured brand.
    ///
    /// Exact key, display name or alias wins. Otherwise the first brand whose
    /// alias appears in the name, unless the name is an excluded product
    /// phrase of that brand.
    pub(crate) fn resolve(&self, name: &str) -> Option<usize> {
        let wanted = name.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }

        let exact = self.patterns.iter().position(|p| {
            p.key == wanted || p.display_name.to_lowercase() == wanted || p.aliases.contains(&wanted)
        });
        if exact.is_some() {
            return exact;
        }

        self.patterns.iter().position(|p| {
            p.alias.is_match(&wanted) && !p.exclude.as_ref().is_some_and(|e| e.is_match(&wanted))
        })
    }
}

fn compile_brand(brand: &BrandConfig) -> Result<BrandPattern, AnalysisError> {
    let compile = |words: &[String], whole_word: bool| -> Result<Option<Regex>, AnalysisError> {
        word_alternation(words, whole_word)
            .map(|pattern| Regex::new(&pattern))
            .transpose()
            .map_err(|source| AnalysisError::Pattern {
                brand: brand.key.clone(),
                source,
            })
    };

    let alias = compile(&brand.aliases, true)?.ok_or_else(|| AnalysisError::NoAliases {
        brand: brand.key.clone(),
    })?;

    Ok(BrandPattern {
        key: brand.key.clone(),
        display_name: brand.display_name.clone(),
        aliases: brand
            .aliases
            .iter()
            .map(|a| a.trim().to_lowercase())
            .filter(|a| !a.is_empty())
            .collect(),
        alias,
        context: compile(&brand.context_keywords, false)?,
        exclude: compile(&brand.exclude_phrases, true)?,
    })
}

/// Case-insensitive alternation over `words` anchored at a word start, longest
/// first so `zoom webinars` wins over `zoom`. Inner spaces match any
/// whitespace run. Without `whole_word` the end is open, so `webinar` also
/// matches `webinars`.
fn word_alternation(words: &[String], whole_word: bool) -> Option<String> {
    let mut words: Vec<String> = words
        .iter()
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        return None;
    }
    words.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    words.dedup();

    let body = words
        .iter()
        .map(|w| {
            w.split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+")
        })
        .collect::<Vec<_>>()
        .join("|");
    let tail = if whole_word { r"\b" } else { "" };
    Some(format!(r"(?i)\b(?:{body}){tail}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::brands;
    use crate::text::sentence_spans;

    fn keys(matcher: &BrandMatcher, text: &str) -> Vec<String> {
        let spans = sentence_spans(text);
        matcher
            .occurrences(text, &spans)
            .into_iter()
            .map(|o| matcher.key(o.brand).to_string())
            .collect()
    }

    #[test]
    fn aliases_match_case_insensitively_on_word_boundaries() {
        let matcher = BrandMatcher::build(&brands()).unwrap();
        assert_eq!(keys(&matcher, "I like On24 and GOLDCAST."), vec!["on24", "goldcast"]);
        assert!(keys(&matcher, "Myon24app is unrelated.").is_empty());
    }

    #[test]
    fn multi_word_alias_tolerates_extra_whitespace() {
        let matcher = BrandMatcher::build(&brands()).unwrap();
        assert_eq!(keys(&matcher, "Try On  24 today."), vec!["on24"]);
    }

    #[test]
    fn scoped_brand_requires_context_keyword_in_sentence() {
        let matcher = BrandMatcher::build(&brands()).unwrap();
        assert!(keys(&matcher, "Zoom is everywhere.").is_empty());
        assert_eq!(keys(&matcher, "Zoom works for a quick webinar."), vec!["zoom"]);
    }

    #[test]
    fn excluded_product_phrase_never_counts() {
        let matcher = BrandMatcher::build(&brands()).unwrap();
        assert!(keys(&matcher, "Zoom Meetings pricing").is_empty());
        assert!(keys(&matcher, "Zoom Meetings is not a webinar tool.").is_empty());
    }

    #[test]
    fn longest_alias_wins() {
        let matcher = BrandMatcher::build(&brands()).unwrap();
        let text = "Zoom Webinars handles large audiences.";
        let spans = sentence_spans(text);
        let found = matcher.occurrences(text, &spans);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].start, 0);
    }

    #[test]
    fn resolve_accepts_keys_names_and_aliases() {
        let matcher = BrandMatcher::build(&brands()).unwrap();
        let key_of = |name: &str| matcher.resolve(name).map(|i| matcher.key(i).to_string());

        assert_eq!(key_of("on24").as_deref(), Some("on24"));
        assert_eq!(key_of("ON24").as_deref(), Some("on24"));
        assert_eq!(key_of("Gold Cast").as_deref(), Some("goldcast"));
        assert_eq!(key_of("Zoom Webinars").as_deref(), Some("zoom"));
        assert_eq!(key_of("ON24 Webcast Elite").as_deref(), Some("on24"));
        assert_eq!(key_of("Zoom Meetings"), None);
        assert_eq!(key_of("other"), None);
        assert_eq!(key_of("  "), None);
    }
}
