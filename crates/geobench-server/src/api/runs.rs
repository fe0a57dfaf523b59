use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use geobench_core::{EngineKind, TriggerType};
use geobench_db::{BenchmarkRunRow, DailyMetricRow};
use geobench_runner::{run_summary, BenchmarkStore, Coordinator, RunSelection};
use serde::{Deserialize, Serialize};
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{
    map_db_error, map_runner_error, normalize_limit, ApiError, ApiResponse, AppState,
    ResponseMeta,
};

#[derive(Debug, Deserialize)]
pub(super) struct RunsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct StartRunRequest {
    pub engines: Option<Vec<EngineKind>>,
    pub query_limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct RunItem {
    id: i64,
    public_id: Uuid,
    run_date: NaiveDate,
    status: String,
    trigger_type: String,
    total_queries: i32,
    completed_queries: i32,
    failed_queries: i32,
    error_message: Option<String>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<BenchmarkRunRow> for RunItem {
    fn from(row: BenchmarkRunRow) -> Self {
        Self {
            id: row.id,
            public_id: row.public_id,
            run_date: row.run_date,
            status: row.status,
            trigger_type: row.trigger_type,
            total_queries: row.total_queries,
            completed_queries: row.completed_queries,
            failed_queries: row.failed_queries,
            error_message: row.error_message,
            started_at: row.started_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct ItemCounts {
    pending: i64,
    in_progress: i64,
    done: i64,
    failed: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct FailedItem {
    work_item_id: i64,
    query_id: i64,
    query_text: String,
    engine: String,
    attempts: i32,
    error_class: Option<String>,
    error_message: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct ParseErrorItem {
    work_item_id: i64,
    query_id: i64,
    engine: String,
    parse_error: String,
}

#[derive(Debug, Serialize)]
pub(super) struct RunDetail {
    run: RunItem,
    items: ItemCounts,
    failed_items: Vec<FailedItem>,
    parse_errors: Vec<ParseErrorItem>,
}

#[derive(Debug, Serialize)]
pub(super) struct MetricItem {
    query_id: i64,
    query_category: String,
    engine: String,
    brand: String,
    is_mentioned: bool,
    mention_count: i32,
    first_position: Option<i32>,
    is_primary_recommendation: bool,
    avg_sentiment_score: Option<f64>,
    dominant_sentiment: String,
    citation_count: i32,
    root_citation_count: i32,
    excluded_citation_count: i32,
    is_winner: bool,
}

impl From<DailyMetricRow> for MetricItem {
    fn from(row: DailyMetricRow) -> Self {
        Self {
            query_id: row.query_id,
            query_category: row.query_category,
            engine: row.engine,
            brand: row.brand,
            is_mentioned: row.is_mentioned,
            mention_count: row.mention_count,
            first_position: row.first_position,
            is_primary_recommendation: row.is_primary_recommendation,
            avg_sentiment_score: row.avg_sentiment_score,
            dominant_sentiment: row.dominant_sentiment,
            citation_count: row.citation_count,
            root_citation_count: row.root_citation_count,
            excluded_citation_count: row.excluded_citation_count,
            is_winner: row.is_winner,
        }
    }
}

/// Drives `run_id` on a task tracked by `tasks`; the request returns
/// immediately.
pub(crate) fn drive_in_background(tasks: &TaskTracker, coordinator: Arc<Coordinator>, run_id: i64) {
    tasks.spawn(async move {
        match coordinator.drive(run_id).await {
            Ok(outcome) => {
                tracing::info!(run_id, status = %outcome.status, "background run finished");
            }
            Err(e) => tracing::error!(run_id, error = %e, "background run failed"),
        }
    });
}

pub(super) async fn list_runs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<RunsQuery>,
) -> Result<Json<ApiResponse<Vec<RunItem>>>, ApiError> {
    let rows = geobench_db::list_runs(&state.pool, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(RunItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(run_id): Path<i64>,
) -> Result<Json<ApiResponse<RunDetail>>, ApiError> {
    let summary = run_summary(state.coordinator.store().as_ref(), run_id)
        .await
        .map_err(|e| map_runner_error(req_id.0.clone(), &e))?;

    let data = RunDetail {
        run: summary.run.into(),
        items: ItemCounts {
            pending: summary.counts.pending,
            in_progress: summary.counts.in_progress,
            done: summary.counts.done,
            failed: summary.counts.failed,
        },
        failed_items: summary
            .failed_items
            .into_iter()
            .map(|row| FailedItem {
                work_item_id: row.work_item_id,
                query_id: row.query_id,
                query_text: row.query_text,
                engine: row.engine,
                attempts: row.attempts,
                error_class: row.error_class,
                error_message: row.error_message,
            })
            .collect(),
        parse_errors: summary
            .parse_errors
            .into_iter()
            .map(|row| ParseErrorItem {
                work_item_id: row.work_item_id,
                query_id: row.query_id,
                engine: row.engine,
                parse_error: row.parse_error,
            })
            .collect(),
    };

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_run_metrics(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(run_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<MetricItem>>>, ApiError> {
    geobench_db::get_run(&state.pool, run_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let rows = geobench_db::list_daily_metrics(&state.pool, run_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(MetricItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// `POST /api/v1/runs`: creates a `ui` run and drives it in the background.
pub(super) async fn start_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<StartRunRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RunItem>>), ApiError> {
    let selection = RunSelection {
        query_limit: body.query_limit,
        engines: body.engines,
    };
    let run = state
        .coordinator
        .create_run(TriggerType::Ui, &selection)
        .await
        .map_err(|e| map_runner_error(req_id.0.clone(), &e))?;

    drive_in_background(&state.tasks, Arc::clone(&state.coordinator), run.id);

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse {
            data: run.into(),
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

/// `POST /api/v1/runs/{id}/resume`: re-opens a failed or interrupted run and
/// drives its unfinished items in the background.
pub(super) async fn resume_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(run_id): Path<i64>,
) -> Result<(StatusCode, Json<ApiResponse<RunItem>>), ApiError> {
    if state.coordinator.engines().is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "unavailable",
            "no engines are configured",
        ));
    }
    let run = state
        .coordinator
        .store()
        .prepare_resume(run_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    drive_in_background(&state.tasks, Arc::clone(&state.coordinator), run.id);

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse {
            data: run.into(),
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_run_request_fields_are_optional() {
        let body: StartRunRequest = serde_json::from_str("{}").unwrap();
        assert!(body.engines.is_none());
        assert!(body.query_limit.is_none());

        let body: StartRunRequest =
            serde_json::from_str(r#"{"engines": ["claude_parametric"], "query_limit": 4}"#)
                .unwrap();
        assert_eq!(body.engines, Some(vec![EngineKind::ClaudeParametric]));
        assert_eq!(body.query_limit, Some(4));
    }

    #[tokio::test]
    async fn tracked_background_run_settles_before_drain_completes() {
        use geobench_core::RunStatus;
        use geobench_runner::{CoordinatorSettings, MemoryStore};

        let memory = Arc::new(MemoryStore::with_queries([("Best webinar platform?", "platform")]));
        let store: Arc<dyn BenchmarkStore> = memory.clone();
        let brands = geobench_core::parse_brands(include_str!("../../../../config/brands.yaml"))
            .expect("shipped brands parse");
        let coordinator = Arc::new(
            Coordinator::new(Arc::clone(&store), brands, CoordinatorSettings::default())
                .expect("coordinator"),
        );
        let query_ids: Vec<i64> = store
            .active_queries(None)
            .await
            .unwrap()
            .iter()
            .map(|q| q.id)
            .collect();
        let run = store
            .create_run(TriggerType::Ui, &query_ids, &[EngineKind::GrokWebSearch])
            .await
            .unwrap();

        // Shutdown order: cancel runs, then drain the tracker.
        let tasks = TaskTracker::new();
        coordinator.stop();
        drive_in_background(&tasks, Arc::clone(&coordinator), run.id);
        tasks.close();
        tasks.wait().await;

        let settled = store.get_run(run.id).await.unwrap();
        assert_eq!(settled.run_status().unwrap(), RunStatus::Interrupted);
    }

    #[test]
    fn metric_item_is_serializable() {
        let item = MetricItem {
            query_id: 3,
            query_category: "platform".to_string(),
            engine: "grok_web_search".to_string(),
            brand: "on24".to_string(),
            is_mentioned: true,
            mention_count: 2,
            first_position: Some(1),
            is_primary_recommendation: true,
            avg_sentiment_score: Some(0.5),
            dominant_sentiment: "positive".to_string(),
            citation_count: 1,
            root_citation_count: 1,
            excluded_citation_count: 0,
            is_winner: true,
        };
        let json = serde_json::to_string(&item).expect("serialize metric");
        assert!(json.contains("\"brand\":\"on24\""));
        assert!(json.contains("\"is_winner\":true"));
    }
}
