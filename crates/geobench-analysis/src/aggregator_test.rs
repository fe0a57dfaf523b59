use super::*;
use crate::test_support::brands;
use crate::ResponseParser;
use geobench_core::{Citation, EngineKind, Mention, ParsedResponse};

fn mention(brand: &str, position: i32, sentiment: Sentiment, score: f64, primary: bool) -> Mention {
    Mention {
        brand: brand.to_string(),
        position,
        context: String::new(),
        sentiment,
        sentiment_score: Some(score),
        is_primary_recommendation: primary,
    }
}

fn citation(domain: &str, brand: Option<&str>, is_root: bool, is_excluded: bool) -> Citation {
    Citation {
        url: format!("https://{domain}"),
        domain: domain.to_string(),
        title: None,
        brand: brand.map(str::to_string),
        is_root,
        is_excluded,
    }
}

fn recorded(query_id: i64, engine: EngineKind, parsed: ParsedResponse) -> RecordedResponse {
    RecordedResponse {
        query_id,
        query_category: "platform".to_string(),
        engine,
        parsed,
    }
}

fn find<'a>(rows: &'a [DailyMetric], query_id: i64, engine: EngineKind, brand: &str) -> &'a DailyMetric {
    rows.iter()
        .find(|r| r.query_id == query_id && r.engine == engine && r.brand == brand)
        .unwrap_or_else(|| panic!("missing row {query_id}/{engine}/{brand}"))
}

#[test]
fn one_row_per_configured_brand_per_group() {
    let responses = vec![
        recorded(1, EngineKind::GrokWebSearch, ParsedResponse::default()),
        recorded(1, EngineKind::ClaudeParametric, ParsedResponse::default()),
    ];
    let rows = aggregate(&brands(), &responses);

    assert_eq!(rows.len(), 6);
    let first_group: Vec<_> = rows[..3].iter().map(|r| r.brand.as_str()).collect();
    assert_eq!(first_group, vec!["on24", "goldcast", "zoom"]);
    assert!(rows.iter().all(|r| !r.is_mentioned && !r.is_winner));
    assert!(rows.iter().all(|r| r.dominant_sentiment == Sentiment::Neutral));
    assert!(rows.iter().all(|r| r.avg_sentiment_score.is_none()));
}

#[test]
fn brand_rollup_values() {
    let parsed = ParsedResponse {
        mentions: vec![
            mention("on24", 3, Sentiment::Positive, 0.6, false),
            mention("on24", 1, Sentiment::Positive, 0.2, false),
            mention("on24", 5, Sentiment::Negative, -0.5, true),
            mention("goldcast", 2, Sentiment::Neutral, 0.0, false),
        ],
        citations: vec![
            citation("on24.com", Some("on24"), true, false),
            citation("event.on24.com", Some("on24"), false, true),
            citation("support.on24.com", Some("on24"), false, false),
            citation("www.g2.com", None, false, false),
        ],
    };
    let rows = aggregate(&brands(), &[recorded(7, EngineKind::ChatgptWebSearch, parsed)]);
    let on24 = find(&rows, 7, EngineKind::ChatgptWebSearch, "on24");

    assert!(on24.is_mentioned);
    assert_eq!(on24.mention_count, 3);
    assert_eq!(on24.first_position, Some(1));
    assert!(on24.is_primary_recommendation);
    assert!((on24.avg_sentiment_score.unwrap() - 0.1).abs() < 1e-9);
    assert_eq!(on24.dominant_sentiment, Sentiment::Positive);
    assert_eq!(on24.citation_count, 3);
    assert_eq!(on24.root_citation_count, 1);
    assert_eq!(on24.excluded_citation_count, 1);
    assert_eq!(on24.query_category, "platform");

    let goldcast = find(&rows, 7, EngineKind::ChatgptWebSearch, "goldcast");
    assert_eq!(goldcast.citation_count, 0);
    assert_eq!(goldcast.first_position, Some(2));
}

#[test]
fn primary_recommendation_beats_earlier_position() {
    let parsed = ParsedResponse {
        mentions: vec![
            mention("on24", 1, Sentiment::Positive, 0.8, false),
            mention("goldcast", 2, Sentiment::Neutral, 0.0, true),
        ],
        citations: Vec::new(),
    };
    let rows = aggregate(&brands(), &[recorded(1, EngineKind::GrokWebSearch, parsed)]);

    assert!(find(&rows, 1, EngineKind::GrokWebSearch, "goldcast").is_winner);
    assert!(!find(&rows, 1, EngineKind::GrokWebSearch, "on24").is_winner);
}

#[test]
fn at_most_one_winner_per_group() {
    let tie = ParsedResponse {
        mentions: vec![
            mention("on24", 1, Sentiment::Positive, 0.5, true),
            mention("goldcast", 1, Sentiment::Positive, 0.5, true),
        ],
        citations: Vec::new(),
    };
    let clear = ParsedResponse {
        mentions: vec![mention("zoom", 1, Sentiment::Neutral, 0.0, false)],
        citations: Vec::new(),
    };
    let rows = aggregate(
        &brands(),
        &[
            recorded(1, EngineKind::GrokWebSearch, tie),
            recorded(2, EngineKind::GrokWebSearch, clear),
        ],
    );

    let winners = |query_id: i64| rows.iter().filter(|r| r.query_id == query_id && r.is_winner).count();
    assert_eq!(winners(1), 0);
    assert_eq!(winners(2), 1);
    assert!(find(&rows, 2, EngineKind::GrokWebSearch, "zoom").is_winner);
}

#[test]
fn unconfigured_brand_gets_its_own_row() {
    let parsed = ParsedResponse {
        mentions: vec![mention("legacy", 1, Sentiment::Neutral, 0.0, false)],
        citations: Vec::new(),
    };
    let rows = aggregate(&brands(), &[recorded(1, EngineKind::GrokWebSearch, parsed)]);
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[3].brand, "legacy");
    assert!(rows[3].is_winner);
}

#[test]
fn dominant_sentiment_tie_is_neutral() {
    assert_eq!(
        dominant([Sentiment::Positive, Sentiment::Negative].into_iter()),
        Sentiment::Neutral
    );
    assert_eq!(
        dominant([Sentiment::Negative, Sentiment::Negative, Sentiment::Positive].into_iter()),
        Sentiment::Negative
    );
    assert_eq!(dominant(std::iter::empty()), Sentiment::Neutral);
}

#[test]
fn aggregation_is_idempotent() {
    let parser = ResponseParser::new(&brands()).unwrap();
    let parsed = parser
        .parse("1. ON24 is the best choice for webinars, see on24.com. Goldcast is clunky.")
        .unwrap();
    let responses = vec![recorded(3, EngineKind::ClaudeParametric, parsed)];

    let first = aggregate(&brands(), &responses);
    let second = aggregate(&brands(), &responses);
    assert_eq!(first, second);

    let on24 = find(&first, 3, EngineKind::ClaudeParametric, "on24");
    assert!(on24.is_winner);
    assert_eq!(on24.root_citation_count, 1);
}
