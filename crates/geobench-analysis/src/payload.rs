//! Locating a structured JSON payload inside answer text.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```([a-zA-Z]*)[ \t]*\r?\n?(.*?)```").expect("valid fence regex")
});

/// What the text carries.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Payload {
    /// A JSON object with a mentions array.
    Structured(Value),
    /// The text is only a payload and it could not be used.
    Invalid(String),
    /// Plain prose.
    Prose,
}

/// Finds a JSON payload in a fenced block or between the outermost braces.
///
/// A candidate that fails to decode is only an error when nothing but the
/// candidate is in the text; otherwise the text is treated as prose.
pub(crate) fn locate(text: &str) -> Payload {
    let Some((body, outside)) = candidate(text) else {
        return Payload::Prose;
    };
    let only_payload = outside.trim().is_empty();

    match serde_json::from_str::<Value>(body.trim()) {
        Ok(value) if mentions_array(&value).is_some() => Payload::Structured(value),
        Ok(_) if only_payload => {
            Payload::Invalid("payload has no `mentions` array".to_string())
        }
        Err(err) if only_payload => Payload::Invalid(err.to_string()),
        _ => Payload::Prose,
    }
}

/// The mention entries of a structured payload.
pub(crate) fn mentions_array(value: &Value) -> Option<&Vec<Value>> {
    value
        .get("mentions")
        .or_else(|| value.get("brands_mentioned"))
        .and_then(Value::as_array)
}

/// Only fences tagged `json` or opening with `{` are payload candidates;
/// other fenced blocks stay part of the prose.
fn candidate(text: &str) -> Option<(&str, String)> {
    let fenced = FENCE_RE.captures_iter(text).find(|caps| {
        let tag = caps.get(1).map_or("", |m| m.as_str());
        let body = caps.get(2).map_or("", |m| m.as_str());
        tag.eq_ignore_ascii_case("json") || body.trim_start().starts_with('{')
    });
    if let Some(caps) = fenced {
        let whole = caps.get(0)?;
        let body = caps.get(2)?.as_str();
        let outside = format!("{}{}", &text[..whole.start()], &text[whole.end()..]);
        return Some((body, outside));
    }

    let open = text.find('{')?;
    match text.rfind('}').filter(|&close| close > open) {
        Some(close) => {
            let outside = format!("{}{}", &text[..open], &text[close + 1..]);
            Some((&text[open..=close], outside))
        }
        // Truncated payload: only a candidate when nothing precedes it.
        None if text[..open].trim().is_empty() => Some((&text[open..], String::new())),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_object_is_structured() {
        let text = r#"{"mentions": [{"brand": "on24"}]}"#;
        assert!(matches!(locate(text), Payload::Structured(_)));
    }

    #[test]
    fn fenced_block_is_structured() {
        let text = "Here you go:\n```json\n{\"brands_mentioned\": []}\n```\n";
        assert!(matches!(locate(text), Payload::Structured(_)));
    }

    #[test]
    fn broken_payload_alone_is_invalid() {
        assert!(matches!(locate("{\"mentions\": [}"), Payload::Invalid(_)));
        assert!(matches!(locate("```json\n{oops\n```"), Payload::Invalid(_)));
        assert!(matches!(locate("{\"mentions\": ["), Payload::Invalid(_)));
    }

    #[test]
    fn object_without_mentions_alone_is_invalid() {
        assert!(matches!(locate(r#"{"answer": "ON24"}"#), Payload::Invalid(_)));
    }

    #[test]
    fn broken_braces_inside_prose_fall_back_to_prose() {
        let text = "ON24 uses {curly} templates and Goldcast does not.";
        assert_eq!(locate(text), Payload::Prose);
    }

    #[test]
    fn untagged_fence_of_prose_is_prose() {
        let text = "```\nON24 is the best webinar platform.\n```";
        assert_eq!(locate(text), Payload::Prose);
    }

    #[test]
    fn untagged_fence_opening_with_brace_is_structured() {
        let text = "```\n{\"mentions\": []}\n```";
        assert!(matches!(locate(text), Payload::Structured(_)));
    }

    #[test]
    fn plain_prose() {
        assert_eq!(locate("ON24 is a webinar platform."), Payload::Prose);
    }
}
