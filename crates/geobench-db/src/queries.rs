//! Database operations for the `queries` table.

use chrono::{DateTime, Utc};
use geobench_core::QueryConfig;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `queries` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QueryRow {
    pub id: i64,
    pub query_text: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Upsert the query library into the database.
///
/// Every query in `queries` ends up active; rows whose text is no longer in the
/// library are deactivated rather than deleted so historical runs keep their
/// references. Runs inside a single transaction.
///
/// Returns the number of queries processed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_queries(pool: &PgPool, queries: &[QueryConfig]) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;
    let mut texts = Vec::with_capacity(queries.len());

    for query in queries {
        let text = query.query_text.trim().to_string();
        sqlx::query(
            "INSERT INTO queries (query_text, category, subcategory, is_active) \
             VALUES ($1, $2, $3, true) \
             ON CONFLICT (query_text) DO UPDATE SET \
                 category = EXCLUDED.category, \
                 subcategory = EXCLUDED.subcategory, \
                 is_active = true, \
                 updated_at = NOW()",
        )
        .bind(&text)
        .bind(&query.category)
        .bind(&query.subcategory)
        .execute(&mut *tx)
        .await?;
        texts.push(text);
    }

    sqlx::query(
        "UPDATE queries SET is_active = false, updated_at = NOW() \
         WHERE is_active AND NOT (query_text = ANY($1))",
    )
    .bind(&texts)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(texts.len())
}

/// Returns active queries ordered by `id`, optionally truncated to `limit`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_queries(
    pool: &PgPool,
    limit: Option<i64>,
) -> Result<Vec<QueryRow>, DbError> {
    let rows = sqlx::query_as::<_, QueryRow>(
        "SELECT id, query_text, category, subcategory, is_active, created_at \
         FROM queries \
         WHERE is_active \
         ORDER BY id \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
