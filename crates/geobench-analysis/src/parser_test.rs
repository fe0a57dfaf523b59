use super::*;
use crate::test_support::brands;

fn parser() -> ResponseParser {
    ResponseParser::new(&brands()).expect("parser builds")
}

fn brand_keys(parsed: &ParsedResponse) -> Vec<&str> {
    parsed.mentions.iter().map(|m| m.brand.as_str()).collect()
}

// ---------------------------------------------------------------------------
// Prose path
// ---------------------------------------------------------------------------

#[test]
fn target_with_root_and_excluded_citation() {
    let parsed = parser()
        .parse("On24 is a great platform, see on24.com and event.on24.com")
        .unwrap();

    assert_eq!(brand_keys(&parsed), vec!["on24"]);
    let mention = &parsed.mentions[0];
    assert_eq!(mention.position, 1);
    assert_eq!(mention.sentiment, Sentiment::Positive);
    assert!(!mention.is_primary_recommendation);

    assert_eq!(parsed.citations.len(), 2);
    let root: Vec<_> = parsed.citations.iter().filter(|c| c.is_root).collect();
    let excluded: Vec<_> = parsed.citations.iter().filter(|c| c.is_excluded).collect();
    assert_eq!(root.len(), 1);
    assert_eq!(root[0].domain, "on24.com");
    assert_eq!(excluded.len(), 1);
    assert_eq!(excluded[0].domain, "event.on24.com");
    assert!(parsed.citations.iter().all(|c| c.brand.as_deref() == Some("on24")));
}

#[test]
fn zoom_meetings_is_not_a_zoom_mention() {
    let parsed = parser().parse("Zoom Meetings pricing").unwrap();
    assert!(parsed.mentions.is_empty());
}

#[test]
fn zoom_counts_only_in_event_context() {
    let parsed = parser()
        .parse("Zoom is great for webinars but Zoom Meetings is for calls.")
        .unwrap();
    assert_eq!(brand_keys(&parsed), vec!["zoom"]);

    let parsed = parser().parse("Most teams already pay for Zoom.").unwrap();
    assert!(parsed.mentions.is_empty());
}

#[test]
fn positions_follow_first_appearance() {
    let parsed = parser()
        .parse("Goldcast is newer. ON24 has been around longer. Goldcast again.")
        .unwrap();
    assert_eq!(brand_keys(&parsed), vec!["goldcast", "on24"]);
    assert_eq!(parsed.mentions[0].position, 1);
    assert_eq!(parsed.mentions[1].position, 2);
    assert_eq!(parsed.mentions[0].context, "Goldcast is newer.");
}

#[test]
fn recommendation_cue_marks_primary() {
    let parsed = parser()
        .parse(
            "For enterprise webinars, ON24 is a solid option. Goldcast is newer. \
             I recommend Goldcast for marketing teams.",
        )
        .unwrap();

    let primary: Vec<_> = parsed
        .mentions
        .iter()
        .filter(|m| m.is_primary_recommendation)
        .map(|m| m.brand.as_str())
        .collect();
    assert_eq!(primary, vec!["goldcast"]);
}

#[test]
fn first_list_item_marks_primary() {
    let parsed = parser()
        .parse("Options:\n1. **Goldcast** for event marketing\n2. **ON24** for scale")
        .unwrap();
    assert_eq!(brand_keys(&parsed), vec!["goldcast", "on24"]);
    assert!(parsed.mentions[0].is_primary_recommendation);
    assert!(!parsed.mentions[1].is_primary_recommendation);
}

#[test]
fn negative_commentary_is_negative() {
    let parsed = parser().parse("Goldcast is clunky and expensive.").unwrap();
    let mention = &parsed.mentions[0];
    assert_eq!(mention.sentiment, Sentiment::Negative);
    assert!(mention.sentiment_score.unwrap() < 0.0);
}

#[test]
fn one_mention_per_brand_in_prose() {
    let parsed = parser()
        .parse("ON24 is reliable. ON24 is scalable. ON24 is everywhere.")
        .unwrap();
    assert_eq!(parsed.mentions.len(), 1);
}

#[test]
fn reported_citations_are_merged_and_deduplicated() {
    let parsed = parser()
        .parse_with_citations(
            "ON24 is reliable, see https://www.on24.com/",
            [
                ("https://www.on24.com", Some("ON24 Platform")),
                ("https://www.g2.com/compare", None),
            ],
        )
        .unwrap();

    assert_eq!(parsed.citations.len(), 2);
    assert_eq!(parsed.citations[0].title.as_deref(), Some("ON24 Platform"));
    assert!(parsed.citations[0].is_root);
    assert_eq!(parsed.citations[1].brand, None);
}

#[test]
fn parsing_is_deterministic() {
    let text = "1. ON24 is the best choice for webinars.\n2. Zoom Webinars is simpler. See zoom.us";
    let p = parser();
    assert_eq!(p.parse(text).unwrap(), p.parse(text).unwrap());
}

// ---------------------------------------------------------------------------
// Structured path
// ---------------------------------------------------------------------------

#[test]
fn json_payload_is_normalised() {
    let text = r#"{
        "mentions": [
            {"brand": "ON24", "position": 2, "sentiment": "positive",
             "sentiment_score": 1.7, "is_primary_recommendation": true,
             "context": "ON24 leads for enterprise."},
            {"brand_id": "goldcast", "mention_order": 1},
            {"brand": "Other Vendor", "position": 3},
            {"brand": "zoom", "position": 4}
        ],
        "zoom_context_is_webinar": false,
        "citations": ["https://on24.com", {"url": "https://event.on24.com/x", "title": "Event"}]
    }"#;

    let parsed = parser().parse(text).unwrap();

    assert_eq!(brand_keys(&parsed), vec!["goldcast", "on24"]);

    let goldcast = &parsed.mentions[0];
    assert_eq!(goldcast.position, 1);
    assert_eq!(goldcast.sentiment, Sentiment::Neutral);
    assert_eq!(goldcast.sentiment_score, Some(0.0));
    assert!(!goldcast.is_primary_recommendation);

    let on24 = &parsed.mentions[1];
    assert_eq!(on24.position, 2);
    assert_eq!(on24.sentiment, Sentiment::Positive);
    assert_eq!(on24.sentiment_score, Some(1.0));
    assert!(on24.is_primary_recommendation);
    assert_eq!(on24.context, "ON24 leads for enterprise.");

    assert_eq!(parsed.citations.len(), 2);
    assert!(parsed.citations[0].is_root);
    assert!(parsed.citations[1].is_excluded);
    assert_eq!(parsed.citations[1].title.as_deref(), Some("Event"));
}

#[test]
fn json_zoom_kept_when_in_scope() {
    let text = r#"{"brands_mentioned": [{"brand": "Zoom Webinars"}]}"#;
    let parsed = parser().parse(text).unwrap();
    assert_eq!(brand_keys(&parsed), vec!["zoom"]);
}

#[test]
fn json_zoom_meetings_context_is_dropped() {
    let text = r#"{"mentions": [{"brand": "Zoom", "context": "Zoom Meetings pricing"}]}"#;
    assert!(parser().parse(text).unwrap().mentions.is_empty());
}

#[test]
fn json_zoom_needs_event_context_without_scope_flag() {
    let bare = r#"{"mentions": [{"brand": "Zoom", "context": "Zoom is popular."}]}"#;
    assert!(parser().parse(bare).unwrap().mentions.is_empty());

    let events = r#"{"mentions": [{"brand": "Zoom", "context": "Zoom hosts large webinars."}]}"#;
    assert_eq!(brand_keys(&parser().parse(events).unwrap()), vec!["zoom"]);
}

#[test]
fn json_scope_flag_vouches_but_exclusions_still_apply() {
    let vouched = r#"{"zoom_context_is_webinar": true, "mentions": [{"brand": "Zoom"}]}"#;
    assert_eq!(brand_keys(&parser().parse(vouched).unwrap()), vec!["zoom"]);

    let excluded = r#"{"zoom_context_is_webinar": true,
        "mentions": [{"brand": "Zoom", "context": "Zoom Phone bundles"}]}"#;
    assert!(parser().parse(excluded).unwrap().mentions.is_empty());
}

#[test]
fn json_positions_default_to_ordinal() {
    let text = r#"{"mentions": [{"brand": "goldcast"}, {"brand": "nobody"}, {"brand": "on24"}]}"#;
    let parsed = parser().parse(text).unwrap();
    let positions: Vec<_> = parsed.mentions.iter().map(|m| m.position).collect();
    assert_eq!(positions, vec![1, 2]);
}

#[test]
fn json_score_without_label_implies_label() {
    let text = r#"{"mentions": [{"brand": "on24", "sentiment_score": "-0.5"}]}"#;
    let parsed = parser().parse(text).unwrap();
    assert_eq!(parsed.mentions[0].sentiment, Sentiment::Negative);
    assert_eq!(parsed.mentions[0].sentiment_score, Some(-0.5));
}

#[test]
fn fenced_prose_goes_through_prose_path() {
    let parsed = parser()
        .parse("```\nON24 is the best webinar platform.\n```")
        .unwrap();
    assert_eq!(brand_keys(&parsed), vec!["on24"]);
}

#[test]
fn fenced_json_after_preamble() {
    let text = "Here is the analysis:\n```json\n{\"mentions\": [{\"brand\": \"on24\"}]}\n```";
    let parsed = parser().parse(text).unwrap();
    assert_eq!(brand_keys(&parsed), vec!["on24"]);
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn blank_text_is_empty_response() {
    assert_eq!(parser().parse("  \n "), Err(ParseError::EmptyResponse));
}

#[test]
fn undecodable_payload_is_malformed() {
    let err = parser().parse("{\"mentions\": [").unwrap_err();
    assert!(matches!(err, ParseError::MalformedPayload(_)), "got: {err:?}");
}
