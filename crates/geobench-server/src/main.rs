mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use anyhow::Context;
use geobench_runner::{BenchmarkStore, Coordinator, PgStore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(geobench_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = geobench_db::PoolConfig::from_app_config(&config);
    let pool = geobench_db::connect_pool(&config.database_url, pool_config).await?;
    geobench_db::run_migrations(&pool).await?;

    let stale = geobench_db::mark_stale_runs_interrupted(&pool, config.run_idle_window()).await?;
    if stale > 0 {
        tracing::warn!(runs = stale, "marked runs left running by a previous process as interrupted");
    }

    let brands = geobench_core::load_brands(&config.brands_path)
        .with_context(|| format!("loading {}", config.brands_path.display()))?;
    let store: Arc<dyn BenchmarkStore> = Arc::new(PgStore::new(pool.clone()));
    let coordinator = Arc::new(Coordinator::from_app_config(store, brands, &config)?);
    if coordinator.engines().is_empty() {
        tracing::warn!("no engine credentials configured; runs cannot be started");
    }

    let tasks = TaskTracker::new();
    let mut scheduler = scheduler::build_scheduler(
        pool.clone(),
        Arc::clone(&config),
        Arc::clone(&coordinator),
        tasks.clone(),
    )
    .await?;

    let auth = AuthState::from_env(matches!(config.env, geobench_core::Environment::Development))?;
    let app = build_app(
        AppState {
            pool,
            coordinator: Arc::clone(&coordinator),
            tasks: tasks.clone(),
        },
        auth,
        default_rate_limit_state(),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(coordinator.cancellation_token()))
        .await?;

    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!(error = %e, "scheduler did not shut down cleanly");
    }
    tasks.close();
    tracing::info!(runs = tasks.len(), "waiting for background runs to settle");
    tasks.wait().await;
    Ok(())
}

/// Resolves on ctrl-c or SIGTERM and stops in-flight runs, which end
/// `interrupted` and can be resumed later.
async fn shutdown_signal(runs: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
    runs.cancel();
}
