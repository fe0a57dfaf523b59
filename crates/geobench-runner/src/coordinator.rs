//! Run orchestration.
//!
//! A [`Coordinator`] creates or resumes a run, fans its `pending` work items
//! out to a bounded pool of workers, then settles the run status and
//! rebuilds the run's metrics. It owns one rate limiter per engine, so runs
//! driven concurrently on the same coordinator share each engine's pace.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use geobench_analysis::{aggregate, ResponseParser};
use geobench_core::{AppConfig, BrandsFile, EngineKind, RunStatus, TriggerType};
use geobench_db::{BenchmarkRunRow, FailedItemRow, ItemStatusCounts};
use geobench_engines::{build_client, EngineClient, RateLimiter, RetryPolicy};
use tokio_util::sync::CancellationToken;

use crate::error::RunnerError;
use crate::store::BenchmarkStore;
use crate::worker::{process_item, DisabledEngines, ItemOutcome, WorkerContext};

const DEFAULT_PER_ENGINE_CONCURRENCY: usize = 3;
const DEFAULT_MAX_CONCURRENCY: usize = 9;
const DEFAULT_CALL_TIMEOUT_SECS: u64 = 180;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorSettings {
    pub per_engine_concurrency: usize,
    pub max_concurrency: usize,
    /// Upper bound on one engine call, limiter wait excluded.
    pub call_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            per_engine_concurrency: DEFAULT_PER_ENGINE_CONCURRENCY,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

impl CoordinatorSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            per_engine_concurrency: config.per_engine_concurrency,
            max_concurrency: config.max_concurrency,
            call_timeout: Duration::from_secs(config.engine_timeout_secs),
            retry: RetryPolicy::from_app_config(config),
        }
    }
}

/// Which slice of the query library and engine set a new run covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSelection {
    /// Only the first `n` active queries.
    pub query_limit: Option<i64>,
    /// Subset of the configured engines; `None` means all of them.
    pub engines: Option<Vec<EngineKind>>,
}

/// How a driven run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub run_id: i64,
    pub status: RunStatus,
    pub counts: ItemStatusCounts,
    /// Metric rows written; `None` when the run was interrupted.
    pub metrics_written: Option<usize>,
}

pub(crate) struct EngineSlot {
    pub client: Arc<dyn EngineClient>,
    pub limiter: RateLimiter,
}

pub struct Coordinator {
    store: Arc<dyn BenchmarkStore>,
    brands: BrandsFile,
    parser: ResponseParser,
    engines: BTreeMap<EngineKind, EngineSlot>,
    settings: CoordinatorSettings,
    cancel: CancellationToken,
}

impl Coordinator {
    /// A coordinator with no engines; add them with [`Coordinator::with_engine`].
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Analysis`] if the brand rules do not compile.
    pub fn new(
        store: Arc<dyn BenchmarkStore>,
        brands: BrandsFile,
        settings: CoordinatorSettings,
    ) -> Result<Self, RunnerError> {
        let parser = ResponseParser::new(&brands)?;
        Ok(Self {
            store,
            brands,
            parser,
            engines: BTreeMap::new(),
            settings,
            cancel: CancellationToken::new(),
        })
    }

    /// Registers `client`, paced to one request per `min_interval`.
    #[must_use]
    pub fn with_engine(mut self, client: Arc<dyn EngineClient>, min_interval: Duration) -> Self {
        let kind = client.kind();
        self.engines.insert(
            kind,
            EngineSlot {
                client,
                limiter: RateLimiter::new(min_interval),
            },
        );
        self
    }

    /// Builds a coordinator with an HTTP client for every engine that has a
    /// credential. Engines without one are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Analysis`] for bad brand rules, or
    /// [`RunnerError::Engine`] if an HTTP client cannot be built.
    pub fn from_app_config(
        store: Arc<dyn BenchmarkStore>,
        brands: BrandsFile,
        config: &AppConfig,
    ) -> Result<Self, RunnerError> {
        let mut coordinator =
            Self::new(store, brands, CoordinatorSettings::from_app_config(config))?;

        for engine in &config.engines {
            if engine.api_key.is_none() {
                tracing::warn!(engine = %engine.kind, "no credential configured, skipping engine");
                continue;
            }
            let client = build_client(engine, config.engine_timeout_secs)?;
            coordinator =
                coordinator.with_engine(client, Duration::from_millis(engine.min_interval_ms));
        }

        Ok(coordinator)
    }

    /// Configured engines in canonical order.
    #[must_use]
    pub fn engines(&self) -> Vec<EngineKind> {
        self.engines.keys().copied().collect()
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn BenchmarkStore> {
        &self.store
    }

    #[must_use]
    pub fn brands(&self) -> &BrandsFile {
        &self.brands
    }

    /// Token that stops every run driven by this coordinator when cancelled.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Requests a cooperative stop: no new items are claimed, items waiting
    /// to retry are released, and runs end `interrupted`.
    pub fn stop(&self) {
        tracing::info!("stop requested");
        self.cancel.cancel();
    }

    /// Creates a `running` run over the selected queries × engines without
    /// driving it.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::NoEngines`], [`RunnerError::EngineUnavailable`],
    /// [`RunnerError::NoQueries`], or a storage error.
    pub async fn create_run(
        &self,
        trigger: TriggerType,
        selection: &RunSelection,
    ) -> Result<BenchmarkRunRow, RunnerError> {
        let engines = self.select_engines(selection.engines.as_deref())?;
        let queries = self.store.active_queries(selection.query_limit).await?;
        if queries.is_empty() {
            return Err(RunnerError::NoQueries);
        }
        let query_ids: Vec<i64> = queries.iter().map(|q| q.id).collect();

        let run = self.store.create_run(trigger, &query_ids, &engines).await?;
        tracing::info!(
            run_id = run.id,
            public_id = %run.public_id,
            trigger = %trigger,
            queries = query_ids.len(),
            engines = engines.len(),
            "benchmark run created"
        );
        Ok(run)
    }

    /// Creates a run and drives it to a terminal status.
    ///
    /// # Errors
    ///
    /// See [`Coordinator::create_run`] and [`Coordinator::drive`].
    pub async fn start_run(
        &self,
        trigger: TriggerType,
        selection: &RunSelection,
    ) -> Result<RunOutcome, RunnerError> {
        let run = self.create_run(trigger, selection).await?;
        self.drive(run.id).await
    }

    /// Re-enters a `failed` or `interrupted` run and drives its unfinished
    /// items. Items already `done` are never dispatched again.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Db`] with `NotFound` or `InvalidRunTransition`
    /// if the run cannot be resumed, or any error from [`Coordinator::drive`].
    pub async fn resume_run(&self, run_id: i64) -> Result<RunOutcome, RunnerError> {
        let run = self.store.prepare_resume(run_id).await?;
        tracing::info!(
            run_id,
            completed = run.completed_queries,
            total = run.total_queries,
            "resuming benchmark run"
        );
        self.drive(run_id).await
    }

    /// Dispatches every `pending` item of a `running` run, then settles it.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the ledger cannot be read or the run cannot
    /// be settled. Per-item failures are recorded on the items instead.
    pub async fn drive(&self, run_id: i64) -> Result<RunOutcome, RunnerError> {
        let items = self.store.pending_items(run_id).await?;
        let engine_count = items
            .iter()
            .map(|i| i.engine.as_str())
            .collect::<BTreeSet<_>>()
            .len();
        let width = pool_width(
            engine_count,
            self.settings.per_engine_concurrency,
            self.settings.max_concurrency,
            items.len(),
        );
        tracing::info!(run_id, items = items.len(), width, "dispatching work items");

        let disabled = DisabledEngines::default();
        let ctx = WorkerContext {
            store: self.store.as_ref(),
            parser: &self.parser,
            policy: self.settings.retry,
            call_timeout: self.settings.call_timeout,
            cancel: &self.cancel,
            disabled: &disabled,
        };

        let outcomes: Vec<ItemOutcome> = stream::iter(items)
            .map(|item| {
                let slot = item
                    .engine_kind()
                    .ok()
                    .and_then(|kind| self.engines.get(&kind));
                process_item(&ctx, slot, item)
            })
            .buffer_unordered(width)
            .collect()
            .await;

        let tally = |wanted: ItemOutcome| outcomes.iter().filter(|&&o| o == wanted).count();
        tracing::info!(
            run_id,
            done = tally(ItemOutcome::Done),
            failed = tally(ItemOutcome::Failed),
            released = tally(ItemOutcome::Released),
            skipped = tally(ItemOutcome::Skipped),
            errored = tally(ItemOutcome::Errored),
            "dispatch finished"
        );

        self.settle(run_id).await
    }

    /// Recomputes and replaces a settled run's metric rows.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::RunNotSettled`] while any item is `pending` or
    /// `in_progress`, or a storage error.
    pub async fn aggregate_run(&self, run_id: i64) -> Result<usize, RunnerError> {
        let counts = self.store.item_counts(run_id).await?;
        if counts.non_terminal() > 0 {
            return Err(RunnerError::RunNotSettled {
                run_id,
                outstanding: counts.non_terminal(),
            });
        }
        self.write_metrics(run_id).await
    }

    fn select_engines(
        &self,
        wanted: Option<&[EngineKind]>,
    ) -> Result<Vec<EngineKind>, RunnerError> {
        if self.engines.is_empty() {
            return Err(RunnerError::NoEngines);
        }
        match wanted {
            None => Ok(self.engines()),
            Some(wanted) => {
                if let Some(missing) = wanted.iter().find(|&k| !self.engines.contains_key(k)) {
                    return Err(RunnerError::EngineUnavailable(*missing));
                }
                let wanted: BTreeSet<EngineKind> = wanted.iter().copied().collect();
                if wanted.is_empty() {
                    return Err(RunnerError::NoEngines);
                }
                Ok(wanted.into_iter().collect())
            }
        }
    }

    async fn settle(&self, run_id: i64) -> Result<RunOutcome, RunnerError> {
        let counts = self.store.item_counts(run_id).await?;

        let (status, summary) = if counts.non_terminal() > 0 {
            (
                RunStatus::Interrupted,
                Some(format!(
                    "stopped with {} of {} work items unfinished",
                    counts.non_terminal(),
                    counts.total()
                )),
            )
        } else if counts.failed > 0 {
            let failed = self.store.failed_items(run_id).await?;
            (RunStatus::Failed, Some(failure_summary(&counts, &failed)))
        } else {
            (RunStatus::Completed, None)
        };

        // Keep notices recorded during the run (credential failures) in front.
        let earlier = self.store.get_run(run_id).await?.error_message;
        let message = match (earlier, summary) {
            (Some(earlier), Some(summary)) => Some(format!("{earlier}; {summary}")),
            (earlier, summary) => earlier.or(summary),
        };
        self.store
            .finish_run(run_id, status, message.as_deref())
            .await?;

        let metrics_written = if status == RunStatus::Interrupted {
            None
        } else {
            Some(self.write_metrics(run_id).await?)
        };

        tracing::info!(
            run_id,
            status = %status,
            done = counts.done,
            failed = counts.failed,
            unfinished = counts.non_terminal(),
            "benchmark run settled"
        );

        Ok(RunOutcome {
            run_id,
            status,
            counts,
            metrics_written,
        })
    }

    async fn write_metrics(&self, run_id: i64) -> Result<usize, RunnerError> {
        let responses = self.store.recorded_responses(run_id).await?;
        let metrics = aggregate(&self.brands, &responses);
        let written = self.store.replace_metrics(run_id, &metrics).await?;
        tracing::info!(run_id, responses = responses.len(), rows = written, "metrics aggregated");
        Ok(written)
    }
}

/// Worker pool width: engines × per-engine factor, capped by the global
/// ceiling and the number of items, never below one.
#[must_use]
pub fn pool_width(engines: usize, per_engine: usize, max: usize, items: usize) -> usize {
    engines
        .saturating_mul(per_engine)
        .min(max)
        .min(items)
        .max(1)
}

/// `"2 of 6 work items failed (auth: 1, server_error: 1)"`.
fn failure_summary(counts: &ItemStatusCounts, failed: &[FailedItemRow]) -> String {
    let mut by_class: BTreeMap<&str, usize> = BTreeMap::new();
    for item in failed {
        *by_class
            .entry(item.error_class.as_deref().unwrap_or("unknown"))
            .or_default() += 1;
    }
    let classes = by_class
        .iter()
        .map(|(class, n)| format!("{class}: {n}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{} of {} work items failed ({classes})",
        counts.failed,
        counts.total()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_width_defaults_to_engines_times_factor() {
        assert_eq!(pool_width(3, 3, 9, 96), 9);
        assert_eq!(pool_width(1, 3, 9, 96), 3);
    }

    #[test]
    fn pool_width_is_capped_by_ceiling_and_items() {
        assert_eq!(pool_width(3, 3, 4, 96), 4);
        assert_eq!(pool_width(3, 3, 9, 5), 5);
        assert_eq!(pool_width(3, 3, 9, 0), 1);
    }

    #[test]
    fn failure_summary_groups_by_class() {
        let counts = ItemStatusCounts {
            pending: 0,
            in_progress: 0,
            done: 4,
            failed: 2,
        };
        let row = |class: &str| FailedItemRow {
            work_item_id: 1,
            query_id: 1,
            query_text: "q".to_string(),
            engine: "grok_web_search".to_string(),
            attempts: 1,
            error_class: Some(class.to_string()),
            error_message: None,
        };
        assert_eq!(
            failure_summary(&counts, &[row("server_error"), row("auth")]),
            "2 of 6 work items failed (auth: 1, server_error: 1)"
        );
    }
}
