//! Parses representative answers against the brand file shipped in
//! `config/brands.yaml`, so a config edit that breaks attribution fails here.

use geobench_analysis::{aggregate, ResponseParser};
use geobench_core::{parse_brands, EngineKind, RecordedResponse};

const SHIPPED_BRANDS: &str = include_str!("../../../config/brands.yaml");

fn parser() -> ResponseParser {
    let brands = parse_brands(SHIPPED_BRANDS).expect("shipped brands.yaml is valid");
    ResponseParser::new(&brands).expect("parser builds from shipped config")
}

#[test]
fn shipped_config_attributes_target_and_competitors() {
    let text = "For large virtual events, ON24 is our top pick (https://www.on24.com/platform). \
                Goldcast is a strong alternative. Zoom Webinars is fine for a simple webinar, \
                but Zoom Meetings is a video conferencing tool.";
    let parsed = parser().parse(text).unwrap();

    let keys: Vec<_> = parsed.mentions.iter().map(|m| m.brand.as_str()).collect();
    assert_eq!(keys, vec!["on24", "goldcast", "zoom"]);
    assert!(parsed.mentions[0].is_primary_recommendation);
    assert_eq!(parsed.citations.len(), 1);
    assert!(parsed.citations[0].is_root);
}

#[test]
fn shipped_config_aggregates_one_winner() {
    let brands = parse_brands(SHIPPED_BRANDS).unwrap();
    let parsed = parser()
        .parse("Goldcast is the best option for webinars. ON24 is also solid.")
        .unwrap();
    let rows = aggregate(
        &brands,
        &[RecordedResponse {
            query_id: 1,
            query_category: "comparison".to_string(),
            engine: EngineKind::GrokWebSearch,
            parsed,
        }],
    );

    assert_eq!(rows.len(), brands.brands.len());
    let winners: Vec<_> = rows.iter().filter(|r| r.is_winner).map(|r| r.brand.as_str()).collect();
    assert_eq!(winners, vec!["goldcast"]);
}
