//! Database operations for `benchmark_runs`.

use chrono::{DateTime, NaiveDate, Utc};
use geobench_core::{EngineKind, RunStatus, TriggerType};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const RUN_COLUMNS: &str = "id, public_id, run_date, status, trigger_type, total_queries, \
     completed_queries, failed_queries, error_message, started_at, completed_at, created_at";

/// A row from the `benchmark_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BenchmarkRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub run_date: NaiveDate,
    pub status: String,
    pub trigger_type: String,
    pub total_queries: i32,
    /// Work items that reached `done`.
    pub completed_queries: i32,
    /// Work items that reached `failed`.
    pub failed_queries: i32,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl BenchmarkRunRow {
    /// Parsed `status` column.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Decode`] if the stored value is not a known status.
    pub fn run_status(&self) -> Result<RunStatus, DbError> {
        Ok(self.status.parse()?)
    }
}

/// Creates a `running` run and its full query × engine cross-product of
/// `pending` work items in one transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any insert fails; nothing is committed in that case.
pub async fn create_run_with_items(
    pool: &PgPool,
    trigger: TriggerType,
    query_ids: &[i64],
    engines: &[EngineKind],
) -> Result<BenchmarkRunRow, DbError> {
    let mut item_queries = Vec::with_capacity(query_ids.len() * engines.len());
    let mut item_engines = Vec::with_capacity(query_ids.len() * engines.len());
    for &query_id in query_ids {
        for engine in engines {
            item_queries.push(query_id);
            item_engines.push(engine.as_str().to_string());
        }
    }
    let total = i32::try_from(item_queries.len()).unwrap_or(i32::MAX);

    let mut tx = pool.begin().await?;

    let run = sqlx::query_as::<_, BenchmarkRunRow>(&format!(
        "INSERT INTO benchmark_runs (public_id, status, trigger_type, total_queries, started_at) \
         VALUES ($1, 'running', $2, $3, NOW()) \
         RETURNING {RUN_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(trigger.as_str())
    .bind(total)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO work_items (run_id, query_id, engine) \
         SELECT $1, q, e FROM UNNEST($2::BIGINT[], $3::TEXT[]) AS t(q, e)",
    )
    .bind(run.id)
    .bind(&item_queries)
    .bind(&item_engines)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(run)
}

/// Re-opens a non-completed, non-running run for dispatch.
///
/// In one transaction: every `in_progress` or `failed` item goes back to
/// `pending`, the counters are recomputed from the ledger, and the run returns
/// to `running` with its summary cleared.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the run does not exist,
/// [`DbError::InvalidRunTransition`] if it is `completed` or still `running`,
/// or [`DbError::Sqlx`] on query failure.
pub async fn prepare_resume(pool: &PgPool, id: i64) -> Result<BenchmarkRunRow, DbError> {
    let mut tx = pool.begin().await?;

    let status: String =
        sqlx::query_scalar("SELECT status FROM benchmark_runs WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DbError::NotFound)?;

    if status != "failed" && status != "interrupted" {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "failed or interrupted",
        });
    }

    sqlx::query(
        "UPDATE work_items \
         SET status = 'pending', attempts = 0, error_class = NULL, error_message = NULL, \
             updated_at = NOW() \
         WHERE run_id = $1 AND status IN ('in_progress', 'failed')",
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let run = sqlx::query_as::<_, BenchmarkRunRow>(&format!(
        "UPDATE benchmark_runs SET \
             status = 'running', \
             completed_at = NULL, \
             error_message = NULL, \
             completed_queries = \
                 (SELECT COUNT(*) FROM work_items WHERE run_id = $1 AND status = 'done'), \
             failed_queries = \
                 (SELECT COUNT(*) FROM work_items WHERE run_id = $1 AND status = 'failed') \
         WHERE id = $1 \
         RETURNING {RUN_COLUMNS}"
    ))
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(run)
}

/// Moves a `running` run to a terminal status and stamps `completed_at`.
///
/// `error_message` replaces any summary written earlier in the run.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `running`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn finish_run(
    pool: &PgPool,
    id: i64,
    status: RunStatus,
    error_message: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE benchmark_runs \
         SET status = $1, completed_at = NOW(), error_message = $2 \
         WHERE id = $3 AND status = 'running'",
    )
    .bind(status.as_str())
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Appends `message` to a run's `error_message` without changing its status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn record_run_error(pool: &PgPool, id: i64, message: &str) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE benchmark_runs \
         SET error_message = CASE \
             WHEN error_message IS NULL THEN $1 \
             ELSE error_message || '; ' || $1 END \
         WHERE id = $2",
    )
    .bind(message)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Marks `running` runs with no recent activity as `interrupted`.
///
/// Called at process start. A run's last activity is the newest
/// `updated_at` among its work items, falling back to when it started. Runs
/// active within `idle_for` are left alone, since another process (a CLI run
/// next to the server) may still be driving them. Returns the number of runs
/// updated.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_stale_runs_interrupted(
    pool: &PgPool,
    idle_for: std::time::Duration,
) -> Result<u64, DbError> {
    let idle_for = chrono::Duration::from_std(idle_for).unwrap_or(chrono::Duration::MAX);
    let cutoff = Utc::now()
        .checked_sub_signed(idle_for)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    let result = sqlx::query(
        "UPDATE benchmark_runs r \
         SET status = 'interrupted', completed_at = NOW() \
         WHERE r.status = 'running' \
           AND COALESCE( \
                 (SELECT MAX(w.updated_at) FROM work_items w WHERE w.run_id = r.id), \
                 r.started_at, \
                 r.created_at \
               ) <= $1",
    )
    .bind(cutoff)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Fetches a single run by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_run(pool: &PgPool, id: i64) -> Result<BenchmarkRunRow, DbError> {
    sqlx::query_as::<_, BenchmarkRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM benchmark_runs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Fetches a single run by its `public_id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row matches, or [`DbError::Sqlx`] if
/// the query fails.
pub async fn get_run_by_public_id(
    pool: &PgPool,
    public_id: Uuid,
) -> Result<BenchmarkRunRow, DbError> {
    sqlx::query_as::<_, BenchmarkRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM benchmark_runs WHERE public_id = $1"
    ))
    .bind(public_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Returns the most recent `limit` runs, ordered by `created_at DESC`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_runs(pool: &PgPool, limit: i64) -> Result<Vec<BenchmarkRunRow>, DbError> {
    let rows = sqlx::query_as::<_, BenchmarkRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM benchmark_runs \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
