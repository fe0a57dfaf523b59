//! One work item from claim to persisted outcome.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use geobench_analysis::ResponseParser;
use geobench_core::{EngineKind, FailureClass};
use geobench_db::{CompletedItem, DbError, FailedItem, PendingWorkItem};
use geobench_engines::{retry_with_backoff, EngineError, RawAnswer, RetryError, RetryPolicy};
use tokio_util::sync::CancellationToken;

use crate::coordinator::EngineSlot;
use crate::store::BenchmarkStore;

/// Final state of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ItemOutcome {
    Done,
    Failed,
    /// Stop requested; the item is back to `pending`.
    Released,
    /// Not claimed: stop was already requested or another worker holds it.
    Skipped,
    /// A storage error left the item where it was.
    Errored,
}

/// Engines whose credentials were rejected during one run, with the error
/// that disabled them.
#[derive(Debug, Default)]
pub(crate) struct DisabledEngines(Mutex<HashMap<EngineKind, EngineError>>);

impl DisabledEngines {
    fn reason(&self, kind: EngineKind) -> Option<EngineError> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
    }

    /// `true` the first time `kind` is disabled.
    fn disable(&self, kind: EngineKind, error: &EngineError) -> bool {
        let mut disabled = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if disabled.contains_key(&kind) {
            return false;
        }
        disabled.insert(kind, error.clone());
        true
    }
}

/// Shared, per-run inputs of every worker.
pub(crate) struct WorkerContext<'a> {
    pub store: &'a dyn BenchmarkStore,
    pub parser: &'a ResponseParser,
    pub policy: RetryPolicy,
    pub call_timeout: Duration,
    pub cancel: &'a CancellationToken,
    pub disabled: &'a DisabledEngines,
}

pub(crate) async fn process_item(
    ctx: &WorkerContext<'_>,
    slot: Option<&EngineSlot>,
    item: PendingWorkItem,
) -> ItemOutcome {
    let run_id = item.run_id;
    let query_id = item.query_id;
    let engine = item.engine.clone();

    match dispatch(ctx, slot, &item).await {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::error!(
                run_id,
                query_id,
                engine = %engine,
                error = %err,
                "work item could not be persisted"
            );
            ItemOutcome::Errored
        }
    }
}

async fn dispatch(
    ctx: &WorkerContext<'_>,
    slot: Option<&EngineSlot>,
    item: &PendingWorkItem,
) -> Result<ItemOutcome, DbError> {
    if ctx.cancel.is_cancelled() {
        return Ok(ItemOutcome::Skipped);
    }
    let kind = item.engine_kind()?;

    if !ctx.store.claim_item(item.id).await? {
        tracing::debug!(work_item_id = item.id, "work item already claimed, skipping");
        return Ok(ItemOutcome::Skipped);
    }

    let Some(slot) = slot else {
        let err = EngineError::Config(format!("no client configured for {kind}"));
        fail(ctx, item, 0, err.class(), &err.to_string()).await?;
        return Ok(ItemOutcome::Failed);
    };

    if let Some(err) = ctx.disabled.reason(kind) {
        fail(ctx, item, 0, err.class(), &err.to_string()).await?;
        return Ok(ItemOutcome::Failed);
    }

    let result =
        retry_with_backoff(ctx.policy, ctx.cancel, || call_engine(ctx, slot, item)).await;

    match result {
        Ok((Some(answer), attempts)) => match complete(ctx, item, kind, answer, attempts).await {
            Ok(()) => Ok(ItemOutcome::Done),
            Err(err @ DbError::InvalidWorkItemTransition { .. }) => Err(err),
            Err(err) => {
                fail(ctx, item, attempts, FailureClass::Persistence, &err.to_string()).await?;
                Ok(ItemOutcome::Failed)
            }
        },
        Ok((None, attempts)) | Err(RetryError::Cancelled { attempts }) => {
            tracing::info!(
                run_id = item.run_id,
                query_id = item.query_id,
                engine = %kind,
                attempts,
                "stop requested before the engine call, releasing work item"
            );
            ctx.store.release_item(item.id).await?;
            Ok(ItemOutcome::Released)
        }
        Err(RetryError::Failed { error, attempts }) => {
            if error.is_auth() && ctx.disabled.disable(kind, &error) {
                tracing::error!(
                    run_id = item.run_id,
                    engine = %kind,
                    error = %error,
                    "engine credentials rejected, disabling engine for this run"
                );
                ctx.store
                    .record_run_error(item.run_id, &format!("{kind}: {error}"))
                    .await?;
            }
            fail(ctx, item, attempts, error.class(), &error.to_string()).await?;
            Ok(ItemOutcome::Failed)
        }
    }
}

/// One attempt. `Ok(None)` when stop was requested while waiting for the
/// limiter; no request is sent then.
async fn call_engine(
    ctx: &WorkerContext<'_>,
    slot: &EngineSlot,
    item: &PendingWorkItem,
) -> Result<Option<RawAnswer>, EngineError> {
    tokio::select! {
        biased;
        () = ctx.cancel.cancelled() => return Ok(None),
        () = slot.limiter.acquire() => {}
    }
    match tokio::time::timeout(ctx.call_timeout, slot.client.call(&item.query_text)).await {
        Ok(result) => result.map(Some),
        Err(_) => Err(EngineError::Connection(format!(
            "no answer within {}s",
            ctx.call_timeout.as_secs()
        ))),
    }
}

async fn complete(
    ctx: &WorkerContext<'_>,
    item: &PendingWorkItem,
    kind: EngineKind,
    answer: RawAnswer,
    attempts: u32,
) -> Result<(), DbError> {
    let reported = answer
        .citations
        .iter()
        .map(|c| (c.url.as_str(), c.title.as_deref()));
    let (parsed, parse_error) = match ctx.parser.parse_with_citations(&answer.text, reported) {
        Ok(parsed) => (parsed, None),
        Err(err) => {
            tracing::warn!(
                run_id = item.run_id,
                query_id = item.query_id,
                engine = %kind,
                error = %err,
                "response could not be parsed, storing raw text only"
            );
            (geobench_core::ParsedResponse::default(), Some(err.to_string()))
        }
    };

    let completed = CompletedItem {
        work_item_id: item.id,
        run_id: item.run_id,
        query_id: item.query_id,
        engine: kind,
        attempts: to_i32(attempts),
        model_name: answer.model.clone(),
        metadata: answer.metadata(),
        latency_ms: i64::try_from(answer.latency_ms).unwrap_or(i64::MAX),
        raw_text: answer.text,
        parse_error,
        mentions: parsed.mentions,
        citations: parsed.citations,
    };
    ctx.store.complete_item(&completed).await?;

    tracing::info!(
        run_id = item.run_id,
        query_id = item.query_id,
        engine = %kind,
        attempts,
        mentions = completed.mentions.len(),
        citations = completed.citations.len(),
        "work item done"
    );
    Ok(())
}

async fn fail(
    ctx: &WorkerContext<'_>,
    item: &PendingWorkItem,
    attempts: u32,
    error_class: FailureClass,
    message: &str,
) -> Result<(), DbError> {
    tracing::warn!(
        run_id = item.run_id,
        query_id = item.query_id,
        engine = %item.engine,
        attempts,
        error_class = error_class.as_str(),
        error = message,
        "work item failed"
    );
    ctx.store
        .fail_item(&FailedItem {
            work_item_id: item.id,
            run_id: item.run_id,
            attempts: to_i32(attempts),
            error_class,
            error_message: message.to_string(),
        })
        .await
}

fn to_i32(n: u32) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}
