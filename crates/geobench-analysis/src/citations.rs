//! URL extraction and brand attribution for citations.

use std::collections::HashSet;
use std::sync::LazyLock;

use geobench_core::{BrandsFile, Citation};
use regex::Regex;
use url::Url;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bhttps?://[^\s<>()\[\]{}"'`|]+"#).expect("valid url regex")
});

static BARE_DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\b(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+(?:com|io|us|net|org|co|ai|tv|app|events)\b(?:/[^\s<>()\[\]{}"'`|]*)?"#,
    )
    .expect("valid bare domain regex")
});

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '*', '_', '\'', '"'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DomainKind {
    Root,
    Excluded,
}

#[derive(Debug, Clone)]
struct DomainRule {
    brand: String,
    domain: String,
    kind: DomainKind,
    context_keywords: Vec<String>,
}

/// Attributes citation hosts to brands.
///
/// An exact host match on a root domain sets `is_root`, on an excluded domain
/// `is_excluded`. A subdomain of an owned domain is attributed to the brand
/// with neither flag. Context-scoped brands also need one of their context
/// keywords in the URL path or the title.
#[derive(Debug, Clone)]
pub(crate) struct CitationClassifier {
    rules: Vec<DomainRule>,
}

impl CitationClassifier {
    pub(crate) fn new(brands: &BrandsFile) -> Self {
        let mut rules = Vec::new();
        for brand in &brands.brands {
            let keywords: Vec<String> = brand
                .context_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect();
            let owned = brand
                .root_domains
                .iter()
                .map(|d| (d, DomainKind::Root))
                .chain(brand.excluded_domains.iter().map(|d| (d, DomainKind::Excluded)));
            for (domain, kind) in owned {
                rules.push(DomainRule {
                    brand: brand.key.clone(),
                    domain: normalize_host(domain),
                    kind,
                    context_keywords: keywords.clone(),
                });
            }
        }
        Self { rules }
    }

    /// Builds a citation for `url`, or `None` when no host can be read from it.
    pub(crate) fn classify(&self, url: &str, title: Option<&str>) -> Option<Citation> {
        let parsed = parse_url(url)?;
        let host = normalize_host(parsed.host_str()?);

        let exact = self.rules.iter().find(|r| r.domain == host);
        let rule = exact.or_else(|| {
            self.rules
                .iter()
                .filter(|r| host.ends_with(&format!(".{}", r.domain)))
                .max_by_key(|r| r.domain.len())
        });

        let rule = rule.filter(|r| {
            r.context_keywords.is_empty() || in_context(&r.context_keywords, &parsed, title)
        });
        let exact_kind = rule.filter(|r| r.domain == host).map(|r| r.kind);

        Some(Citation {
            url: url.to_string(),
            domain: host,
            title: title.map(str::to_string),
            brand: rule.map(|r| r.brand.clone()),
            is_root: exact_kind == Some(DomainKind::Root),
            is_excluded: exact_kind == Some(DomainKind::Excluded),
        })
    }
}

/// URLs and bare domains referenced in `text`, in order of appearance.
pub(crate) fn extract_urls(text: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = Vec::new();
    let mut covered = Vec::new();

    for m in URL_RE.find_iter(text) {
        covered.push(m.range());
        let url = trim_trailing(m.as_str());
        if !url.is_empty() {
            found.push((m.start(), url.to_string()));
        }
    }

    for m in BARE_DOMAIN_RE.find_iter(text) {
        if covered.iter().any(|r| r.start <= m.start() && m.start() < r.end) {
            continue;
        }
        let preceded_by = text[..m.start()].chars().next_back();
        if matches!(preceded_by, Some('@' | '/' | '.' | '-')) {
            continue;
        }
        found.push((m.start(), trim_trailing(m.as_str()).to_string()));
    }

    found.sort_by_key(|(start, _)| *start);
    found.into_iter().map(|(_, url)| url).collect()
}

/// Appends `citation` unless an equivalent URL is already present; a title
/// on the newcomer fills a missing one.
pub(crate) fn push_unique(citations: &mut Vec<Citation>, seen: &mut HashSet<String>, citation: Citation) {
    let key = dedupe_key(&citation.url);
    if seen.insert(key.clone()) {
        citations.push(citation);
        return;
    }
    if let Some(existing) = citations.iter_mut().find(|c| dedupe_key(&c.url) == key) {
        if existing.title.is_none() {
            existing.title = citation.title;
        }
    }
}

fn dedupe_key(url: &str) -> String {
    let lower = url.trim().to_lowercase();
    let without_scheme = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .unwrap_or(&lower);
    without_scheme.trim_end_matches('/').to_string()
}

fn parse_url(raw: &str) -> Option<Url> {
    let raw = raw.trim();
    let lower = raw.to_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Url::parse(raw).ok()
    } else {
        Url::parse(&format!("https://{raw}")).ok()
    }
}

fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('.').to_lowercase()
}

fn trim_trailing(raw: &str) -> &str {
    raw.trim_end_matches(TRAILING_PUNCTUATION)
}

fn in_context(keywords: &[String], url: &Url, title: Option<&str>) -> bool {
    let path = url
        .path()
        .to_lowercase()
        .replace(['-', '_', '/', '+'], " ");
    let title = title.map(str::to_lowercase).unwrap_or_default();
    keywords
        .iter()
        .any(|k| path.contains(k.as_str()) || title.contains(k.as_str()))
}
