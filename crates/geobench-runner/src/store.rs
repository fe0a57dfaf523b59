//! Storage seam between the coordinator and the run ledger.

use async_trait::async_trait;
use geobench_core::{DailyMetric, EngineKind, RecordedResponse, RunStatus, TriggerType};
use geobench_db::{
    BenchmarkRunRow, CompletedItem, DbError, FailedItem, FailedItemRow, ItemStatusCounts,
    ParseErrorRow, PendingWorkItem, QueryRow,
};
use sqlx::PgPool;

/// Ledger operations the coordinator needs.
///
/// Every method that ends a work item must persist the item state, its data
/// and the run counter atomically.
#[async_trait]
pub trait BenchmarkStore: Send + Sync {
    async fn active_queries(&self, limit: Option<i64>) -> Result<Vec<QueryRow>, DbError>;

    async fn create_run(
        &self,
        trigger: TriggerType,
        query_ids: &[i64],
        engines: &[EngineKind],
    ) -> Result<BenchmarkRunRow, DbError>;

    async fn prepare_resume(&self, run_id: i64) -> Result<BenchmarkRunRow, DbError>;

    async fn get_run(&self, run_id: i64) -> Result<BenchmarkRunRow, DbError>;

    async fn pending_items(&self, run_id: i64) -> Result<Vec<PendingWorkItem>, DbError>;

    /// `pending → in_progress`; `false` when the item was not pending.
    async fn claim_item(&self, item_id: i64) -> Result<bool, DbError>;

    /// `in_progress → pending`.
    async fn release_item(&self, item_id: i64) -> Result<(), DbError>;

    async fn complete_item(&self, item: &CompletedItem) -> Result<(), DbError>;

    async fn fail_item(&self, item: &FailedItem) -> Result<(), DbError>;

    async fn record_run_error(&self, run_id: i64, message: &str) -> Result<(), DbError>;

    async fn item_counts(&self, run_id: i64) -> Result<ItemStatusCounts, DbError>;

    async fn finish_run(
        &self,
        run_id: i64,
        status: RunStatus,
        error_message: Option<&str>,
    ) -> Result<(), DbError>;

    async fn failed_items(&self, run_id: i64) -> Result<Vec<FailedItemRow>, DbError>;

    async fn parse_errors(&self, run_id: i64) -> Result<Vec<ParseErrorRow>, DbError>;

    async fn recorded_responses(&self, run_id: i64) -> Result<Vec<RecordedResponse>, DbError>;

    async fn replace_metrics(&self, run_id: i64, metrics: &[DailyMetric])
        -> Result<usize, DbError>;
}

/// [`BenchmarkStore`] backed by Postgres through `geobench-db`.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl BenchmarkStore for PgStore {
    async fn active_queries(&self, limit: Option<i64>) -> Result<Vec<QueryRow>, DbError> {
        geobench_db::list_active_queries(&self.pool, limit).await
    }

    async fn create_run(
        &self,
        trigger: TriggerType,
        query_ids: &[i64],
        engines: &[EngineKind],
    ) -> Result<BenchmarkRunRow, DbError> {
        geobench_db::create_run_with_items(&self.pool, trigger, query_ids, engines).await
    }

    async fn prepare_resume(&self, run_id: i64) -> Result<BenchmarkRunRow, DbError> {
        geobench_db::prepare_resume(&self.pool, run_id).await
    }

    async fn get_run(&self, run_id: i64) -> Result<BenchmarkRunRow, DbError> {
        geobench_db::get_run(&self.pool, run_id).await
    }

    async fn pending_items(&self, run_id: i64) -> Result<Vec<PendingWorkItem>, DbError> {
        geobench_db::list_pending_items(&self.pool, run_id).await
    }

    async fn claim_item(&self, item_id: i64) -> Result<bool, DbError> {
        geobench_db::claim_work_item(&self.pool, item_id).await
    }

    async fn release_item(&self, item_id: i64) -> Result<(), DbError> {
        geobench_db::release_work_item(&self.pool, item_id).await
    }

    async fn complete_item(&self, item: &CompletedItem) -> Result<(), DbError> {
        geobench_db::complete_work_item(&self.pool, item).await
    }

    async fn fail_item(&self, item: &FailedItem) -> Result<(), DbError> {
        geobench_db::fail_work_item(&self.pool, item).await
    }

    async fn record_run_error(&self, run_id: i64, message: &str) -> Result<(), DbError> {
        geobench_db::record_run_error(&self.pool, run_id, message).await
    }

    async fn item_counts(&self, run_id: i64) -> Result<ItemStatusCounts, DbError> {
        geobench_db::count_items_by_status(&self.pool, run_id).await
    }

    async fn finish_run(
        &self,
        run_id: i64,
        status: RunStatus,
        error_message: Option<&str>,
    ) -> Result<(), DbError> {
        geobench_db::finish_run(&self.pool, run_id, status, error_message).await
    }

    async fn failed_items(&self, run_id: i64) -> Result<Vec<FailedItemRow>, DbError> {
        geobench_db::list_failed_items(&self.pool, run_id).await
    }

    async fn parse_errors(&self, run_id: i64) -> Result<Vec<ParseErrorRow>, DbError> {
        geobench_db::list_parse_errors(&self.pool, run_id).await
    }

    async fn recorded_responses(&self, run_id: i64) -> Result<Vec<RecordedResponse>, DbError> {
        geobench_db::load_recorded_responses(&self.pool, run_id).await
    }

    async fn replace_metrics(
        &self,
        run_id: i64,
        metrics: &[DailyMetric],
    ) -> Result<usize, DbError> {
        geobench_db::replace_daily_metrics(&self.pool, run_id, metrics).await
    }
}
