//! Reads over `raw_responses`, `mentions` and `citations`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use geobench_core::{Citation, EngineKind, Mention, ParsedResponse, RecordedResponse};
use serde_json::Value;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `raw_responses` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RawResponseRow {
    pub id: i64,
    pub work_item_id: i64,
    pub run_id: i64,
    pub query_id: i64,
    pub engine: String,
    pub model_name: String,
    pub raw_text: String,
    pub metadata: Value,
    pub latency_ms: i64,
    pub parse_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ResponseHeader {
    id: i64,
    query_id: i64,
    query_category: String,
    engine: String,
}

#[derive(sqlx::FromRow)]
struct MentionRow {
    raw_response_id: i64,
    brand: String,
    position: i32,
    context: String,
    sentiment: String,
    sentiment_score: Option<f64>,
    is_primary_recommendation: bool,
}

#[derive(sqlx::FromRow)]
struct CitationRow {
    raw_response_id: i64,
    url: String,
    domain: String,
    title: Option<String>,
    brand: Option<String>,
    is_root: bool,
    is_excluded: bool,
}

/// Fetches the raw response for one (run, query, engine), if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_raw_response(
    pool: &PgPool,
    run_id: i64,
    query_id: i64,
    engine: EngineKind,
) -> Result<Option<RawResponseRow>, DbError> {
    let row = sqlx::query_as::<_, RawResponseRow>(
        "SELECT id, work_item_id, run_id, query_id, engine, model_name, raw_text, metadata, \
                latency_ms, parse_error, created_at \
         FROM raw_responses \
         WHERE run_id = $1 AND query_id = $2 AND engine = $3",
    )
    .bind(run_id)
    .bind(query_id)
    .bind(engine.as_str())
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Reloads every stored response of a run with its mentions and citations,
/// ready for aggregation.
///
/// # Errors
///
/// Returns [`DbError::Decode`] if a stored enum value is unknown, or
/// [`DbError::Sqlx`] if a query fails.
pub async fn load_recorded_responses(
    pool: &PgPool,
    run_id: i64,
) -> Result<Vec<RecordedResponse>, DbError> {
    let headers = sqlx::query_as::<_, ResponseHeader>(
        "SELECT r.id, r.query_id, q.category AS query_category, r.engine \
         FROM raw_responses r \
         JOIN queries q ON q.id = r.query_id \
         WHERE r.run_id = $1 \
         ORDER BY r.query_id, r.engine",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    let mentions = sqlx::query_as::<_, MentionRow>(
        "SELECT m.raw_response_id, m.brand, m.position, m.context, m.sentiment, \
                m.sentiment_score, m.is_primary_recommendation \
         FROM mentions m \
         JOIN raw_responses r ON r.id = m.raw_response_id \
         WHERE r.run_id = $1 \
         ORDER BY m.raw_response_id, m.position, m.id",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    let citations = sqlx::query_as::<_, CitationRow>(
        "SELECT c.raw_response_id, c.url, c.domain, c.title, c.brand, c.is_root, c.is_excluded \
         FROM citations c \
         JOIN raw_responses r ON r.id = c.raw_response_id \
         WHERE r.run_id = $1 \
         ORDER BY c.raw_response_id, c.id",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    let mut parsed: HashMap<i64, ParsedResponse> = HashMap::new();
    for row in mentions {
        parsed
            .entry(row.raw_response_id)
            .or_default()
            .mentions
            .push(Mention {
                brand: row.brand,
                position: row.position,
                context: row.context,
                sentiment: row.sentiment.parse()?,
                sentiment_score: row.sentiment_score,
                is_primary_recommendation: row.is_primary_recommendation,
            });
    }
    for row in citations {
        parsed
            .entry(row.raw_response_id)
            .or_default()
            .citations
            .push(Citation {
                url: row.url,
                domain: row.domain,
                title: row.title,
                brand: row.brand,
                is_root: row.is_root,
                is_excluded: row.is_excluded,
            });
    }

    headers
        .into_iter()
        .map(|header| -> Result<RecordedResponse, DbError> {
            Ok(RecordedResponse {
                query_id: header.query_id,
                query_category: header.query_category,
                engine: header.engine.parse()?,
                parsed: parsed.remove(&header.id).unwrap_or_default(),
            })
        })
        .collect()
}
