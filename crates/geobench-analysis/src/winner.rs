//! Single-winner resolution for one (query, engine) group.

use std::cmp::Ordering;

use geobench_core::DailyMetric;

/// Index of the winning row, or `None` when nothing is mentioned or the
/// tie-breaks leave more than one candidate.
///
/// Order of precedence among mentioned brands: a sole primary recommendation
/// wins outright; several primaries narrow the pool to them; then the lowest
/// first position; then the highest average sentiment. A row with no score
/// ranks below any scored row.
#[must_use]
pub fn resolve_winner(group: &[DailyMetric]) -> Option<usize> {
    let mentioned: Vec<usize> = (0..group.len()).filter(|&i| group[i].is_mentioned).collect();
    if mentioned.is_empty() {
        return None;
    }

    let primaries: Vec<usize> = mentioned
        .iter()
        .copied()
        .filter(|&i| group[i].is_primary_recommendation)
        .collect();
    let pool = if primaries.is_empty() { mentioned } else { primaries };
    if let [only] = pool[..] {
        return Some(only);
    }

    let best_position = pool
        .iter()
        .map(|&i| group[i].first_position.unwrap_or(i32::MAX))
        .min()?;
    let pool: Vec<usize> = pool
        .into_iter()
        .filter(|&i| group[i].first_position.unwrap_or(i32::MAX) == best_position)
        .collect();
    if let [only] = pool[..] {
        return Some(only);
    }

    let best = pool
        .iter()
        .copied()
        .max_by(|&a, &b| compare_sentiment(group[a].avg_sentiment_score, group[b].avg_sentiment_score))?;
    let tied = pool
        .iter()
        .filter(|&&i| {
            compare_sentiment(group[i].avg_sentiment_score, group[best].avg_sentiment_score)
                == Ordering::Equal
        })
        .count();
    (tied == 1).then_some(best)
}

fn compare_sentiment(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}
