//! In-memory [`BenchmarkStore`] with the same transition rules as Postgres.
//!
//! Used by the coordinator tests and by anything that wants to exercise a run
//! without a database.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use geobench_core::{
    DailyMetric, EngineKind, FailureClass, ParsedResponse, RecordedResponse, RunStatus,
    TriggerType, WorkItemStatus,
};
use geobench_db::{
    BenchmarkRunRow, CompletedItem, DbError, FailedItem, FailedItemRow, ItemStatusCounts,
    ParseErrorRow, PendingWorkItem, QueryRow,
};
use uuid::Uuid;

use crate::store::BenchmarkStore;

/// Snapshot of one work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryWorkItem {
    pub id: i64,
    pub run_id: i64,
    pub query_id: i64,
    pub engine: EngineKind,
    pub status: WorkItemStatus,
    pub attempts: i32,
    pub error_class: Option<FailureClass>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone)]
struct StoredResponse {
    run_id: i64,
    work_item_id: i64,
    query_id: i64,
    engine: EngineKind,
    parse_error: Option<String>,
    parsed: ParsedResponse,
}

#[derive(Debug, Default)]
struct State {
    queries: Vec<QueryRow>,
    runs: Vec<BenchmarkRunRow>,
    items: Vec<MemoryWorkItem>,
    responses: Vec<StoredResponse>,
    metrics: HashMap<i64, Vec<DailyMetric>>,
}

impl State {
    fn run_mut(&mut self, run_id: i64) -> Result<&mut BenchmarkRunRow, DbError> {
        self.runs
            .iter_mut()
            .find(|r| r.id == run_id)
            .ok_or(DbError::NotFound)
    }

    fn query(&self, query_id: i64) -> Option<&QueryRow> {
        self.queries.iter().find(|q| q.id == query_id)
    }

    fn in_progress_item(&mut self, item_id: i64) -> Result<&mut MemoryWorkItem, DbError> {
        self.items
            .iter_mut()
            .find(|i| i.id == item_id && i.status == WorkItemStatus::InProgress)
            .ok_or(DbError::InvalidWorkItemTransition {
                id: item_id,
                expected_status: "in_progress",
            })
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// A store whose query library holds `(query_text, category)` pairs with
    /// ids starting at 1.
    #[must_use]
    pub fn with_queries<'a>(queries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let queries = queries
            .into_iter()
            .zip(1_i64..)
            .map(|((text, category), id)| QueryRow {
                id,
                query_text: text.to_string(),
                category: category.to_string(),
                subcategory: None,
                is_active: true,
                created_at: Utc::now(),
            })
            .collect();
        Self {
            state: Mutex::new(State {
                queries,
                ..State::default()
            }),
        }
    }

    #[must_use]
    pub fn work_items(&self, run_id: i64) -> Vec<MemoryWorkItem> {
        self.lock()
            .items
            .iter()
            .filter(|i| i.run_id == run_id)
            .cloned()
            .collect()
    }

    /// Number of stored raw responses for a run.
    #[must_use]
    pub fn response_count(&self, run_id: i64) -> usize {
        self.lock()
            .responses
            .iter()
            .filter(|r| r.run_id == run_id)
            .count()
    }

    #[must_use]
    pub fn metrics(&self, run_id: i64) -> Vec<DailyMetric> {
        self.lock().metrics.get(&run_id).cloned().unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl BenchmarkStore for MemoryStore {
    async fn active_queries(&self, limit: Option<i64>) -> Result<Vec<QueryRow>, DbError> {
        let state = self.lock();
        let take = limit.and_then(|l| usize::try_from(l).ok()).unwrap_or(usize::MAX);
        Ok(state
            .queries
            .iter()
            .filter(|q| q.is_active)
            .take(take)
            .cloned()
            .collect())
    }

    async fn create_run(
        &self,
        trigger: TriggerType,
        query_ids: &[i64],
        engines: &[EngineKind],
    ) -> Result<BenchmarkRunRow, DbError> {
        let mut state = self.lock();
        let run_id = i64::try_from(state.runs.len() + 1).unwrap_or(i64::MAX);
        let now = Utc::now();
        let total = query_ids.len() * engines.len();

        let run = BenchmarkRunRow {
            id: run_id,
            public_id: Uuid::new_v4(),
            run_date: now.date_naive(),
            status: RunStatus::Running.as_str().to_string(),
            trigger_type: trigger.as_str().to_string(),
            total_queries: i32::try_from(total).unwrap_or(i32::MAX),
            completed_queries: 0,
            failed_queries: 0,
            error_message: None,
            started_at: Some(now),
            completed_at: None,
            created_at: now,
        };
        state.runs.push(run.clone());

        for &query_id in query_ids {
            for &engine in engines {
                let id = i64::try_from(state.items.len() + 1).unwrap_or(i64::MAX);
                state.items.push(MemoryWorkItem {
                    id,
                    run_id,
                    query_id,
                    engine,
                    status: WorkItemStatus::Pending,
                    attempts: 0,
                    error_class: None,
                    error_message: None,
                });
            }
        }

        Ok(run)
    }

    async fn prepare_resume(&self, run_id: i64) -> Result<BenchmarkRunRow, DbError> {
        let mut state = self.lock();
        let status = state.run_mut(run_id)?.run_status()?;
        if !status.is_resumable() {
            return Err(DbError::InvalidRunTransition {
                id: run_id,
                expected_status: "failed or interrupted",
            });
        }

        let mut done = 0;
        for item in state.items.iter_mut().filter(|i| i.run_id == run_id) {
            match item.status {
                WorkItemStatus::InProgress | WorkItemStatus::Failed => {
                    item.status = WorkItemStatus::Pending;
                    item.attempts = 0;
                    item.error_class = None;
                    item.error_message = None;
                }
                WorkItemStatus::Done => done += 1,
                WorkItemStatus::Pending => {}
            }
        }

        let run = state.run_mut(run_id)?;
        run.status = RunStatus::Running.as_str().to_string();
        run.completed_at = None;
        run.error_message = None;
        run.completed_queries = done;
        run.failed_queries = 0;
        Ok(run.clone())
    }

    async fn get_run(&self, run_id: i64) -> Result<BenchmarkRunRow, DbError> {
        Ok(self.lock().run_mut(run_id)?.clone())
    }

    async fn pending_items(&self, run_id: i64) -> Result<Vec<PendingWorkItem>, DbError> {
        let state = self.lock();
        let mut items: Vec<PendingWorkItem> = state
            .items
            .iter()
            .filter(|i| i.run_id == run_id && i.status == WorkItemStatus::Pending)
            .map(|i| PendingWorkItem {
                id: i.id,
                run_id: i.run_id,
                query_id: i.query_id,
                engine: i.engine.as_str().to_string(),
                query_text: state
                    .query(i.query_id)
                    .map(|q| q.query_text.clone())
                    .unwrap_or_default(),
            })
            .collect();
        items.sort_by(|a, b| (a.query_id, &a.engine).cmp(&(b.query_id, &b.engine)));
        Ok(items)
    }

    async fn claim_item(&self, item_id: i64) -> Result<bool, DbError> {
        let mut state = self.lock();
        match state
            .items
            .iter_mut()
            .find(|i| i.id == item_id && i.status == WorkItemStatus::Pending)
        {
            Some(item) => {
                item.status = WorkItemStatus::InProgress;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn release_item(&self, item_id: i64) -> Result<(), DbError> {
        let mut state = self.lock();
        if let Ok(item) = state.in_progress_item(item_id) {
            item.status = WorkItemStatus::Pending;
        }
        Ok(())
    }

    async fn complete_item(&self, completed: &CompletedItem) -> Result<(), DbError> {
        let mut state = self.lock();
        let item = state.in_progress_item(completed.work_item_id)?;
        item.status = WorkItemStatus::Done;
        item.attempts = completed.attempts;
        item.error_class = None;
        item.error_message = None;

        state.responses.push(StoredResponse {
            run_id: completed.run_id,
            work_item_id: completed.work_item_id,
            query_id: completed.query_id,
            engine: completed.engine,
            parse_error: completed.parse_error.clone(),
            parsed: ParsedResponse {
                mentions: completed.mentions.clone(),
                citations: completed.citations.clone(),
            },
        });
        state.run_mut(completed.run_id)?.completed_queries += 1;
        Ok(())
    }

    async fn fail_item(&self, failed: &FailedItem) -> Result<(), DbError> {
        let mut state = self.lock();
        let item = state.in_progress_item(failed.work_item_id)?;
        item.status = WorkItemStatus::Failed;
        item.attempts = failed.attempts;
        item.error_class = Some(failed.error_class);
        item.error_message = Some(failed.error_message.clone());
        state.run_mut(failed.run_id)?.failed_queries += 1;
        Ok(())
    }

    async fn record_run_error(&self, run_id: i64, message: &str) -> Result<(), DbError> {
        let mut state = self.lock();
        let run = state.run_mut(run_id)?;
        run.error_message = Some(match run.error_message.take() {
            Some(existing) => format!("{existing}; {message}"),
            None => message.to_string(),
        });
        Ok(())
    }

    async fn item_counts(&self, run_id: i64) -> Result<ItemStatusCounts, DbError> {
        let state = self.lock();
        let mut counts = ItemStatusCounts::default();
        for item in state.items.iter().filter(|i| i.run_id == run_id) {
            match item.status {
                WorkItemStatus::Pending => counts.pending += 1,
                WorkItemStatus::InProgress => counts.in_progress += 1,
                WorkItemStatus::Done => counts.done += 1,
                WorkItemStatus::Failed => counts.failed += 1,
            }
        }
        Ok(counts)
    }

    async fn finish_run(
        &self,
        run_id: i64,
        status: RunStatus,
        error_message: Option<&str>,
    ) -> Result<(), DbError> {
        let mut state = self.lock();
        let run = state.run_mut(run_id)?;
        if run.status != RunStatus::Running.as_str() {
            return Err(DbError::InvalidRunTransition {
                id: run_id,
                expected_status: "running",
            });
        }
        run.status = status.as_str().to_string();
        run.error_message = error_message.map(str::to_string);
        run.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn failed_items(&self, run_id: i64) -> Result<Vec<FailedItemRow>, DbError> {
        let state = self.lock();
        Ok(state
            .items
            .iter()
            .filter(|i| i.run_id == run_id && i.status == WorkItemStatus::Failed)
            .map(|i| FailedItemRow {
                work_item_id: i.id,
                query_id: i.query_id,
                query_text: state
                    .query(i.query_id)
                    .map(|q| q.query_text.clone())
                    .unwrap_or_default(),
                engine: i.engine.as_str().to_string(),
                attempts: i.attempts,
                error_class: i.error_class.map(|c| c.as_str().to_string()),
                error_message: i.error_message.clone(),
            })
            .collect())
    }

    async fn parse_errors(&self, run_id: i64) -> Result<Vec<ParseErrorRow>, DbError> {
        let state = self.lock();
        Ok(state
            .responses
            .iter()
            .filter(|r| r.run_id == run_id)
            .filter_map(|r| {
                Some(ParseErrorRow {
                    work_item_id: r.work_item_id,
                    query_id: r.query_id,
                    engine: r.engine.as_str().to_string(),
                    parse_error: r.parse_error.clone()?,
                })
            })
            .collect())
    }

    async fn recorded_responses(&self, run_id: i64) -> Result<Vec<RecordedResponse>, DbError> {
        let state = self.lock();
        let mut responses: Vec<RecordedResponse> = state
            .responses
            .iter()
            .filter(|r| r.run_id == run_id)
            .map(|r| RecordedResponse {
                query_id: r.query_id,
                query_category: state
                    .query(r.query_id)
                    .map(|q| q.category.clone())
                    .unwrap_or_default(),
                engine: r.engine,
                parsed: r.parsed.clone(),
            })
            .collect();
        responses.sort_by(|a, b| {
            (a.query_id, a.engine.as_str()).cmp(&(b.query_id, b.engine.as_str()))
        });
        Ok(responses)
    }

    async fn replace_metrics(
        &self,
        run_id: i64,
        metrics: &[DailyMetric],
    ) -> Result<usize, DbError> {
        let mut state = self.lock();
        state.run_mut(run_id)?;
        state.metrics.insert(run_id, metrics.to_vec());
        Ok(metrics.len())
    }
}
