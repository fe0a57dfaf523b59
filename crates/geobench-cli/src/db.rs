//! `db` sub-commands: connectivity, migrations and the query library.

use clap::Subcommand;
use geobench_core::AppConfig;
use sqlx::PgPool;

#[derive(Debug, Subcommand)]
pub enum DbCommands {
    /// Check that the database answers
    Ping,
    /// Apply pending migrations
    Migrate,
    /// Upsert the query library from the configured YAML file
    Seed,
}

/// Dispatches one `db` sub-command.
///
/// # Errors
///
/// Returns an error if the database is unreachable, a migration fails, or
/// the query library cannot be loaded.
pub(crate) async fn run_db_command(
    pool: &PgPool,
    config: &AppConfig,
    command: DbCommands,
) -> anyhow::Result<()> {
    match command {
        DbCommands::Ping => {
            geobench_db::ping(pool).await?;
            println!("database ok");
        }
        DbCommands::Migrate => {
            let applied = geobench_db::run_migrations(pool).await?;
            println!("applied {applied} migration(s)");
        }
        DbCommands::Seed => {
            let seeded = seed_query_library(pool, config).await?;
            println!(
                "seeded {seeded} queries from {}",
                config.queries_path.display()
            );
        }
    }
    Ok(())
}

/// Loads the query library from disk and upserts it.
pub(crate) async fn seed_query_library(
    pool: &PgPool,
    config: &AppConfig,
) -> anyhow::Result<usize> {
    let library = geobench_core::load_queries(&config.queries_path)?;
    let seeded = geobench_db::seed_queries(pool, &library.queries).await?;
    tracing::info!(seeded, "query library seeded");
    Ok(seeded)
}
