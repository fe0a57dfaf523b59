mod db;
mod run;
mod runs;

use clap::{Parser, Subcommand};
use geobench_core::{EngineKind, TriggerType};
use tracing_subscriber::EnvFilter;

use crate::db::DbCommands;
use crate::runs::RunsCommands;

#[derive(Debug, Parser)]
#[command(name = "geobench-cli")]
#[command(about = "Generative engine visibility benchmark")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Start a benchmark run and drive it to completion
    Run {
        /// Recorded trigger of the run (manual, scheduled, ui)
        #[arg(long, default_value = "manual", value_parser = parse_trigger)]
        trigger: TriggerType,
        /// Restrict the run to these engines (repeatable)
        #[arg(long = "engine", value_parser = parse_engine)]
        engines: Vec<EngineKind>,
        /// Only the first N active queries
        #[arg(long)]
        query_limit: Option<i64>,
    },
    /// Resume a failed or interrupted run
    Resume {
        run_id: i64,
        /// Mark a run still recorded as running as interrupted first
        #[arg(long)]
        force: bool,
    },
    /// Inspect past runs
    Runs {
        #[command(subcommand)]
        command: RunsCommands,
    },
    /// Recompute daily metrics for a settled run
    Aggregate { run_id: i64 },
}

fn parse_engine(value: &str) -> Result<EngineKind, String> {
    value.parse().map_err(|e| format!("{e}"))
}

fn parse_trigger(value: &str) -> Result<TriggerType, String> {
    value.parse().map_err(|e| format!("{e}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("geobench-cli: no command given, see --help");
        return Ok(());
    };

    let config = geobench_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = geobench_db::PoolConfig::from_app_config(&config);
    let pool = geobench_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db { command } => db::run_db_command(&pool, &config, command).await,
        Commands::Run {
            trigger,
            engines,
            query_limit,
        } => {
            let selection = geobench_runner::RunSelection {
                query_limit,
                engines: (!engines.is_empty()).then_some(engines),
            };
            run::run_benchmark(pool, &config, trigger, &selection).await
        }
        Commands::Resume { run_id, force } => run::run_resume(pool, &config, run_id, force).await,
        Commands::Runs { command } => runs::run_runs_command(pool, command).await,
        Commands::Aggregate { run_id } => run::run_aggregate(pool, &config, run_id).await,
    }
}

#[cfg(test)]
mod tests;
