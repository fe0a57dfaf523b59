//! Sentence segmentation over raw answer text.
//!
//! Spans are byte ranges into the original string so regex match offsets can
//! be mapped back to the sentence they fall in.

use std::ops::Range;

const ABBREVIATIONS: &[&str] = &["vs", "e.g", "i.e", "etc", "inc", "approx", "mr", "ms", "dr"];

/// Splits `text` into sentence spans.
///
/// Boundaries are line breaks and `.`/`!`/`?` followed by whitespace. A full
/// stop does not end a sentence when it closes a list marker (`1.`) or a
/// common abbreviation (`vs.`), and dots inside tokens such as `on24.com`
/// never do. Blank spans are dropped.
#[must_use]
pub fn sentence_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0usize;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        let end = idx + ch.len_utf8();
        let boundary = match ch {
            '\n' => true,
            '.' | '!' | '?' => {
                let next_is_space = chars.peek().is_none_or(|&(_, next)| next.is_whitespace());
                next_is_space && !(ch == '.' && protects_full_stop(&text[start..idx]))
            }
            _ => false,
        };
        if boundary {
            push_span(text, &mut spans, start..end);
            start = end;
        }
    }
    push_span(text, &mut spans, start..text.len());
    spans
}

/// Index of the span containing byte `offset`.
#[must_use]
pub fn span_index(spans: &[Range<usize>], offset: usize) -> Option<usize> {
    spans.iter().position(|s| s.contains(&offset))
}

/// True when the sentence is a first list item (`1.`, `1)`, `**1.**`, `#1`).
#[must_use]
pub fn is_first_list_item(sentence: &str) -> bool {
    let stripped = sentence.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '*' | '#' | '_'));
    let Some(rest) = stripped.strip_prefix('1') else {
        return false;
    };
    rest.starts_with(['.', ')', ':']) || (sentence.trim_start().starts_with('#') && rest.starts_with(' '))
}

fn protects_full_stop(before: &str) -> bool {
    let token = before
        .trim()
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or("")
        .trim_start_matches(['*', '#', '(', '_']);
    if token.is_empty() {
        return false;
    }
    // A lone number is a list marker ("1." at the start of a line).
    let whole = before.trim().trim_start_matches(['*', '#', '-', '_', ' ']);
    if !whole.is_empty() && whole.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    let lower = token.to_lowercase();
    ABBREVIATIONS.contains(&lower.as_str())
}

fn push_span(text: &str, spans: &mut Vec<Range<usize>>, range: Range<usize>) {
    if !text[range.clone()].trim().is_empty() {
        spans.push(range);
    }
}
