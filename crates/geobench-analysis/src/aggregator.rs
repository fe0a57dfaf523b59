//! Roll-up of parsed responses into per-brand metric rows.

use std::collections::HashMap;

use geobench_core::{BrandsFile, DailyMetric, RecordedResponse, Sentiment};

use crate::winner::resolve_winner;

/// Builds one row per brand for every recorded (query, engine) response and
/// marks at most one winner per group.
///
/// Rows cover every configured brand (in configuration order) plus any
/// other brand key found in the response. Output order is stable: groups in
/// input order, brands as above. Aggregating the same input twice yields the
/// same rows.
#[must_use]
pub fn aggregate(brands: &BrandsFile, responses: &[RecordedResponse]) -> Vec<DailyMetric> {
    let mut rows = Vec::new();

    for response in responses {
        let mut group: Vec<DailyMetric> = brand_keys(brands, response)
            .into_iter()
            .map(|brand| metric_for(response, &brand))
            .collect();

        if let Some(winner) = resolve_winner(&group) {
            group[winner].is_winner = true;
        }
        rows.extend(group);
    }

    rows
}

fn brand_keys(brands: &BrandsFile, response: &RecordedResponse) -> Vec<String> {
    let mut keys: Vec<String> = brands.brands.iter().map(|b| b.key.clone()).collect();

    let mut extra: Vec<String> = response
        .parsed
        .mentions
        .iter()
        .map(|m| m.brand.clone())
        .chain(response.parsed.citations.iter().filter_map(|c| c.brand.clone()))
        .filter(|k| !keys.contains(k))
        .collect();
    extra.sort();
    extra.dedup();

    keys.extend(extra);
    keys
}

fn metric_for(response: &RecordedResponse, brand: &str) -> DailyMetric {
    let mentions: Vec<_> = response
        .parsed
        .mentions
        .iter()
        .filter(|m| m.brand == brand)
        .collect();
    let citations: Vec<_> = response
        .parsed
        .citations
        .iter()
        .filter(|c| c.brand.as_deref() == Some(brand))
        .collect();

    let scores: Vec<f64> = mentions.iter().filter_map(|m| m.sentiment_score).collect();
    #[allow(clippy::cast_precision_loss)]
    let avg_sentiment_score =
        (!scores.is_empty()).then(|| scores.iter().sum::<f64>() / scores.len() as f64);

    DailyMetric {
        query_id: response.query_id,
        query_category: response.query_category.clone(),
        engine: response.engine,
        brand: brand.to_string(),
        is_mentioned: !mentions.is_empty(),
        mention_count: count(mentions.len()),
        first_position: mentions.iter().map(|m| m.position).min(),
        is_primary_recommendation: mentions.iter().any(|m| m.is_primary_recommendation),
        avg_sentiment_score,
        dominant_sentiment: dominant(mentions.iter().map(|m| m.sentiment)),
        citation_count: count(citations.len()),
        root_citation_count: count(citations.iter().filter(|c| c.is_root).count()),
        excluded_citation_count: count(citations.iter().filter(|c| c.is_excluded).count()),
        is_winner: false,
    }
}

/// Most frequent label; ties and empty input resolve to neutral.
fn dominant(labels: impl Iterator<Item = Sentiment>) -> Sentiment {
    let mut counts: HashMap<Sentiment, usize> = HashMap::new();
    for label in labels {
        *counts.entry(label).or_default() += 1;
    }

    let Some(&top) = counts.values().max() else {
        return Sentiment::Neutral;
    };
    let mut leaders = counts.iter().filter(|(_, &n)| n == top).map(|(&s, _)| s);
    match (leaders.next(), leaders.next()) {
        (Some(only), None) => only,
        _ => Sentiment::Neutral,
    }
}

fn count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

#[cfg(test)]
#[path = "aggregator_test.rs"]
mod tests;
