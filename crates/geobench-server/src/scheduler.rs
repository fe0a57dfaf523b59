//! Background job scheduler.
//!
//! Registers the daily benchmark job: re-seed the query library from disk,
//! then start and drive a `scheduled` run. Job runs are tracked on the
//! server's [`TaskTracker`] so shutdown waits for them to settle.

use std::sync::Arc;

use geobench_core::{AppConfig, TriggerType};
use geobench_runner::{Coordinator, RunSelection};
use sqlx::PgPool;
use tokio_util::task::TaskTracker;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process. Dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// the cron expression is invalid, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    config: Arc<AppConfig>,
    coordinator: Arc<Coordinator>,
    tasks: TaskTracker,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    register_benchmark_job(&scheduler, pool, config, coordinator, tasks).await?;
    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_benchmark_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    config: Arc<AppConfig>,
    coordinator: Arc<Coordinator>,
    tasks: TaskTracker,
) -> Result<(), JobSchedulerError> {
    let schedule = config.schedule_cron.clone();

    let job = Job::new_async(schedule.as_str(), move |_uuid, _lock| {
        let pool = pool.clone();
        let config = Arc::clone(&config);
        let coordinator = Arc::clone(&coordinator);
        let tracked = tasks.track_future(async move {
            tracing::info!("scheduler: starting daily benchmark run");
            run_benchmark_job(&pool, &config, &coordinator).await;
        });

        Box::pin(tracked)
    })?;

    scheduler.add(job).await?;
    tracing::info!(schedule = %schedule, "scheduler: daily benchmark job registered");
    Ok(())
}

async fn run_benchmark_job(pool: &PgPool, config: &AppConfig, coordinator: &Coordinator) {
    match geobench_core::load_queries(&config.queries_path) {
        Ok(library) => match geobench_db::seed_queries(pool, &library.queries).await {
            Ok(seeded) => tracing::info!(seeded, "scheduler: query library seeded"),
            Err(e) => tracing::error!(error = %e, "scheduler: query seeding failed"),
        },
        Err(e) => {
            tracing::warn!(error = %e, "scheduler: query library unreadable, using stored queries");
        }
    }

    match coordinator
        .start_run(TriggerType::Scheduled, &RunSelection::default())
        .await
    {
        Ok(outcome) => tracing::info!(
            run_id = outcome.run_id,
            status = %outcome.status,
            done = outcome.counts.done,
            failed = outcome.counts.failed,
            "scheduler: daily benchmark run finished"
        ),
        Err(e) => tracing::error!(error = %e, "scheduler: daily benchmark run failed"),
    }
}
