//! Database operations for `work_items`, the per-(query, engine) ledger of a run.
//!
//! Every state change that ends an item also bumps the owning run's counter in
//! the same transaction, so concurrent workers never lose an increment.

use chrono::{DateTime, Utc};
use geobench_core::{Citation, EngineKind, FailureClass, Mention};
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};

use crate::DbError;

/// A row from the `work_items` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WorkItemRow {
    pub id: i64,
    pub run_id: i64,
    pub query_id: i64,
    pub engine: String,
    pub status: String,
    pub attempts: i32,
    pub error_class: Option<String>,
    pub error_message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// A `pending` work item joined with the query it asks.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PendingWorkItem {
    pub id: i64,
    pub run_id: i64,
    pub query_id: i64,
    pub engine: String,
    pub query_text: String,
}

impl PendingWorkItem {
    /// Parsed `engine` column.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Decode`] if the stored value is not a known engine.
    pub fn engine_kind(&self) -> Result<EngineKind, DbError> {
        Ok(self.engine.parse()?)
    }
}

/// Work item counts for one run, keyed by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemStatusCounts {
    pub pending: i64,
    pub in_progress: i64,
    pub done: i64,
    pub failed: i64,
}

impl ItemStatusCounts {
    #[must_use]
    pub fn total(&self) -> i64 {
        self.pending + self.in_progress + self.done + self.failed
    }

    #[must_use]
    pub fn non_terminal(&self) -> i64 {
        self.pending + self.in_progress
    }
}

/// A failed item as shown in the run summary.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct FailedItemRow {
    pub work_item_id: i64,
    pub query_id: i64,
    pub query_text: String,
    pub engine: String,
    pub attempts: i32,
    pub error_class: Option<String>,
    pub error_message: Option<String>,
}

/// A response whose text the parser could not use.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ParseErrorRow {
    pub work_item_id: i64,
    pub query_id: i64,
    pub engine: String,
    pub parse_error: String,
}

/// Everything persisted when an item finishes with a response.
#[derive(Debug, Clone)]
pub struct CompletedItem {
    pub work_item_id: i64,
    pub run_id: i64,
    pub query_id: i64,
    pub engine: EngineKind,
    pub attempts: i32,
    pub model_name: String,
    pub raw_text: String,
    /// Provider metadata (usage, engine-reported citations).
    pub metadata: Value,
    pub latency_ms: i64,
    pub parse_error: Option<String>,
    pub mentions: Vec<Mention>,
    pub citations: Vec<Citation>,
}

/// Terminal failure of an item after the retry policy gave up.
#[derive(Debug, Clone)]
pub struct FailedItem {
    pub work_item_id: i64,
    pub run_id: i64,
    pub attempts: i32,
    pub error_class: FailureClass,
    pub error_message: String,
}

/// Returns the run's `pending` items in dispatch order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_pending_items(
    pool: &PgPool,
    run_id: i64,
) -> Result<Vec<PendingWorkItem>, DbError> {
    let rows = sqlx::query_as::<_, PendingWorkItem>(
        "SELECT w.id, w.run_id, w.query_id, w.engine, q.query_text \
         FROM work_items w \
         JOIN queries q ON q.id = w.query_id \
         WHERE w.run_id = $1 AND w.status = 'pending' \
         ORDER BY w.query_id, w.engine",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns every item of a run, ordered by `id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_work_items(pool: &PgPool, run_id: i64) -> Result<Vec<WorkItemRow>, DbError> {
    let rows = sqlx::query_as::<_, WorkItemRow>(
        "SELECT id, run_id, query_id, engine, status, attempts, error_class, error_message, \
                updated_at \
         FROM work_items WHERE run_id = $1 ORDER BY id",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Claims an item for dispatch (`pending → in_progress`).
///
/// Returns `false` when another dispatcher got there first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn claim_work_item(pool: &PgPool, id: i64) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE work_items SET status = 'in_progress', updated_at = NOW() \
         WHERE id = $1 AND status = 'pending'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Returns a claimed item to `pending` (stop requested before it finished).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn release_work_item(pool: &PgPool, id: i64) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE work_items SET status = 'pending', updated_at = NOW() \
         WHERE id = $1 AND status = 'in_progress'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Persists a finished item in one transaction: raw response, mentions,
/// citations, `done` status and the run's `completed_queries` increment.
///
/// # Errors
///
/// Returns [`DbError::InvalidWorkItemTransition`] if the item is not
/// `in_progress` (nothing is written), or [`DbError::Sqlx`] on failure.
pub async fn complete_work_item(pool: &PgPool, item: &CompletedItem) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    mark_item(
        &mut tx,
        item.work_item_id,
        "done",
        item.attempts,
        None,
        None,
    )
    .await?;

    let raw_response_id: i64 = sqlx::query_scalar(
        "INSERT INTO raw_responses \
             (work_item_id, run_id, query_id, engine, model_name, raw_text, metadata, \
              latency_ms, parse_error) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING id",
    )
    .bind(item.work_item_id)
    .bind(item.run_id)
    .bind(item.query_id)
    .bind(item.engine.as_str())
    .bind(&item.model_name)
    .bind(&item.raw_text)
    .bind(&item.metadata)
    .bind(item.latency_ms)
    .bind(&item.parse_error)
    .fetch_one(&mut *tx)
    .await?;

    for mention in &item.mentions {
        sqlx::query(
            "INSERT INTO mentions \
                 (raw_response_id, brand, position, context, sentiment, sentiment_score, \
                  is_primary_recommendation) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(raw_response_id)
        .bind(&mention.brand)
        .bind(mention.position)
        .bind(&mention.context)
        .bind(mention.sentiment.as_str())
        .bind(mention.sentiment_score)
        .bind(mention.is_primary_recommendation)
        .execute(&mut *tx)
        .await?;
    }

    for citation in &item.citations {
        sqlx::query(
            "INSERT INTO citations \
                 (raw_response_id, url, domain, title, brand, is_root, is_excluded) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(raw_response_id)
        .bind(&citation.url)
        .bind(&citation.domain)
        .bind(&citation.title)
        .bind(&citation.brand)
        .bind(citation.is_root)
        .bind(citation.is_excluded)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query(
        "UPDATE benchmark_runs SET completed_queries = completed_queries + 1 WHERE id = $1",
    )
    .bind(item.run_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Marks an item `failed` and bumps the run's `failed_queries` in one transaction.
///
/// # Errors
///
/// Returns [`DbError::InvalidWorkItemTransition`] if the item is not
/// `in_progress`, or [`DbError::Sqlx`] on failure.
pub async fn fail_work_item(pool: &PgPool, item: &FailedItem) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    mark_item(
        &mut tx,
        item.work_item_id,
        "failed",
        item.attempts,
        Some(item.error_class.as_str()),
        Some(&item.error_message),
    )
    .await?;

    sqlx::query("UPDATE benchmark_runs SET failed_queries = failed_queries + 1 WHERE id = $1")
        .bind(item.run_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

async fn mark_item(
    tx: &mut Transaction<'_, Postgres>,
    id: i64,
    status: &str,
    attempts: i32,
    error_class: Option<&str>,
    error_message: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE work_items \
         SET status = $1, attempts = $2, error_class = $3, error_message = $4, \
             updated_at = NOW() \
         WHERE id = $5 AND status = 'in_progress'",
    )
    .bind(status)
    .bind(attempts)
    .bind(error_class)
    .bind(error_message)
    .bind(id)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidWorkItemTransition {
            id,
            expected_status: "in_progress",
        });
    }

    Ok(())
}

/// Counts a run's items by status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_items_by_status(
    pool: &PgPool,
    run_id: i64,
) -> Result<ItemStatusCounts, DbError> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT status, COUNT(*) FROM work_items WHERE run_id = $1 GROUP BY status",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    let mut counts = ItemStatusCounts::default();
    for (status, count) in rows {
        match status.as_str() {
            "pending" => counts.pending = count,
            "in_progress" => counts.in_progress = count,
            "done" => counts.done = count,
            "failed" => counts.failed = count,
            _ => {}
        }
    }
    Ok(counts)
}

/// Failed items of a run with their error class, message and attempts.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_failed_items(pool: &PgPool, run_id: i64) -> Result<Vec<FailedItemRow>, DbError> {
    let rows = sqlx::query_as::<_, FailedItemRow>(
        "SELECT w.id AS work_item_id, w.query_id, q.query_text, w.engine, w.attempts, \
                w.error_class, w.error_message \
         FROM work_items w \
         JOIN queries q ON q.id = w.query_id \
         WHERE w.run_id = $1 AND w.status = 'failed' \
         ORDER BY w.query_id, w.engine",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Responses of a run whose parse failed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_parse_errors(pool: &PgPool, run_id: i64) -> Result<Vec<ParseErrorRow>, DbError> {
    let rows = sqlx::query_as::<_, ParseErrorRow>(
        "SELECT work_item_id, query_id, engine, parse_error \
         FROM raw_responses \
         WHERE run_id = $1 AND parse_error IS NOT NULL \
         ORDER BY query_id, engine",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
