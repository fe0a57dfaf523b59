//! `run`, `resume` and `aggregate`: the commands that drive the coordinator.
//!
//! Ctrl-C requests a cooperative stop. In-flight calls finish, items waiting
//! to retry go back to `pending`, and the run ends `interrupted` so a later
//! `resume` picks it up.

use std::sync::Arc;

use anyhow::Context;
use geobench_core::{AppConfig, RunStatus, TriggerType};
use geobench_runner::{
    BenchmarkStore, Coordinator, PgStore, RunOutcome, RunSelection, RunnerError,
};
use sqlx::PgPool;

fn build_coordinator(pool: PgPool, config: &AppConfig) -> anyhow::Result<Coordinator> {
    let brands = geobench_core::load_brands(&config.brands_path)
        .with_context(|| format!("loading {}", config.brands_path.display()))?;
    let store: Arc<dyn BenchmarkStore> = Arc::new(PgStore::new(pool));
    Ok(Coordinator::from_app_config(store, brands, config)?)
}

fn stop_on_ctrl_c(coordinator: &Coordinator) {
    let cancel = coordinator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("stop requested, finishing in-flight calls");
            cancel.cancel();
        }
    });
}

fn print_outcome(outcome: &RunOutcome) {
    let counts = &outcome.counts;
    println!(
        "run {}: {} ({} done, {} failed, {} unfinished of {})",
        outcome.run_id,
        outcome.status,
        counts.done,
        counts.failed,
        counts.non_terminal(),
        counts.total()
    );
    match (outcome.status, outcome.metrics_written) {
        (_, Some(rows)) => println!("wrote {rows} metric rows"),
        (RunStatus::Interrupted, None) => {
            println!("resume with: geobench-cli resume {}", outcome.run_id);
        }
        _ => {}
    }
}

/// Starts a run over the selected queries and engines.
///
/// # Errors
///
/// Returns an error if no engine is configured, the query library is empty,
/// or the ledger cannot be written.
pub(crate) async fn run_benchmark(
    pool: PgPool,
    config: &AppConfig,
    trigger: TriggerType,
    selection: &RunSelection,
) -> anyhow::Result<()> {
    let coordinator = build_coordinator(pool, config)?;
    stop_on_ctrl_c(&coordinator);

    let outcome = coordinator.start_run(trigger, selection).await?;
    print_outcome(&outcome);
    Ok(())
}

/// Resumes `run_id`. With `force`, a run still recorded as `running` is
/// marked `interrupted` first; use it only when no other process drives it.
///
/// # Errors
///
/// Returns an error if the run does not exist, cannot be resumed, or the
/// ledger cannot be written.
pub(crate) async fn run_resume(
    pool: PgPool,
    config: &AppConfig,
    run_id: i64,
    force: bool,
) -> anyhow::Result<()> {
    let coordinator = build_coordinator(pool, config)?;

    if force {
        let run = coordinator.store().get_run(run_id).await?;
        if run.run_status()? == RunStatus::Running {
            tracing::warn!(run_id, "forcing running run to interrupted before resume");
            coordinator
                .store()
                .finish_run(run_id, RunStatus::Interrupted, Some("forced resume"))
                .await?;
        }
    }

    stop_on_ctrl_c(&coordinator);
    let outcome = coordinator
        .resume_run(run_id)
        .await
        .with_context(|| format!("resuming run {run_id}"))?;
    print_outcome(&outcome);
    Ok(())
}

/// Recomputes the metric rows of a settled run.
///
/// # Errors
///
/// Returns an error if items are still outstanding or the store fails.
pub(crate) async fn run_aggregate(
    pool: PgPool,
    config: &AppConfig,
    run_id: i64,
) -> anyhow::Result<()> {
    let coordinator = build_coordinator(pool, config)?;
    match coordinator.aggregate_run(run_id).await {
        Ok(rows) => {
            println!("run {run_id}: wrote {rows} metric rows");
            Ok(())
        }
        Err(RunnerError::RunNotSettled { outstanding, .. }) => anyhow::bail!(
            "run {run_id} has {outstanding} unfinished work items; resume it before aggregating"
        ),
        Err(e) => Err(e.into()),
    }
}
