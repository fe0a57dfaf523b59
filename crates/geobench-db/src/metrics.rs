//! Database operations for `daily_metrics`.

use chrono::{DateTime, NaiveDate, Utc};
use geobench_core::DailyMetric;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `daily_metrics` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct DailyMetricRow {
    pub id: i64,
    pub run_id: i64,
    pub run_date: NaiveDate,
    pub query_id: i64,
    pub query_category: String,
    pub engine: String,
    pub brand: String,
    pub is_mentioned: bool,
    pub mention_count: i32,
    pub first_position: Option<i32>,
    pub is_primary_recommendation: bool,
    pub avg_sentiment_score: Option<f64>,
    pub dominant_sentiment: String,
    pub citation_count: i32,
    pub root_citation_count: i32,
    pub excluded_citation_count: i32,
    pub is_winner: bool,
    pub created_at: DateTime<Utc>,
}

/// Replaces all metric rows of a run in one transaction.
///
/// Re-running with the same input leaves the table in the same state.
/// Returns the number of rows written.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the run does not exist, or
/// [`DbError::Sqlx`] if any statement fails (nothing is committed then).
pub async fn replace_daily_metrics(
    pool: &PgPool,
    run_id: i64,
    metrics: &[DailyMetric],
) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;

    let run_date: NaiveDate =
        sqlx::query_scalar("SELECT run_date FROM benchmark_runs WHERE id = $1")
            .bind(run_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DbError::NotFound)?;

    sqlx::query("DELETE FROM daily_metrics WHERE run_id = $1")
        .bind(run_id)
        .execute(&mut *tx)
        .await?;

    for metric in metrics {
        sqlx::query(
            "INSERT INTO daily_metrics \
                 (run_id, run_date, query_id, query_category, engine, brand, is_mentioned, \
                  mention_count, first_position, is_primary_recommendation, \
                  avg_sentiment_score, dominant_sentiment, citation_count, \
                  root_citation_count, excluded_citation_count, is_winner) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(run_id)
        .bind(run_date)
        .bind(metric.query_id)
        .bind(&metric.query_category)
        .bind(metric.engine.as_str())
        .bind(&metric.brand)
        .bind(metric.is_mentioned)
        .bind(metric.mention_count)
        .bind(metric.first_position)
        .bind(metric.is_primary_recommendation)
        .bind(metric.avg_sentiment_score)
        .bind(metric.dominant_sentiment.as_str())
        .bind(metric.citation_count)
        .bind(metric.root_citation_count)
        .bind(metric.excluded_citation_count)
        .bind(metric.is_winner)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(metrics.len())
}

/// Metric rows of a run ordered by query, engine, brand.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_daily_metrics(
    pool: &PgPool,
    run_id: i64,
) -> Result<Vec<DailyMetricRow>, DbError> {
    let rows = sqlx::query_as::<_, DailyMetricRow>(
        "SELECT id, run_id, run_date, query_id, query_category, engine, brand, is_mentioned, \
                mention_count, first_position, is_primary_recommendation, \
                avg_sentiment_score, dominant_sentiment, citation_count, \
                root_citation_count, excluded_citation_count, is_winner, created_at \
         FROM daily_metrics \
         WHERE run_id = $1 \
         ORDER BY query_id, engine, brand",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
