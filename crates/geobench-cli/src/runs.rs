//! `runs` sub-commands: read-only views over the run ledger.

use clap::Subcommand;
use geobench_runner::{run_summary, PgStore};
use sqlx::PgPool;

#[derive(Debug, Subcommand)]
pub enum RunsCommands {
    /// List recent runs
    List {
        /// Maximum number of runs to show
        #[arg(long, default_value = "20")]
        limit: i64,
    },
    /// Show counters, failed items and parse errors of one run
    Show { run_id: i64 },
}

pub(crate) async fn run_runs_command(pool: PgPool, command: RunsCommands) -> anyhow::Result<()> {
    match command {
        RunsCommands::List { limit } => list_runs(&pool, limit).await,
        RunsCommands::Show { run_id } => show_run(pool, run_id).await,
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}

async fn list_runs(pool: &PgPool, limit: i64) -> anyhow::Result<()> {
    let runs = geobench_db::list_runs(pool, limit.clamp(1, 500)).await?;
    if runs.is_empty() {
        println!("no runs recorded; start one with `geobench-cli run`");
        return Ok(());
    }

    println!(
        "{:<7}{:<12}{:<13}{:<11}{:<10}ERROR",
        "ID", "DATE", "STATUS", "TRIGGER", "DONE"
    );
    for run in &runs {
        println!(
            "{:<7}{:<12}{:<13}{:<11}{:<10}{}",
            run.id,
            run.run_date.format("%Y-%m-%d"),
            run.status,
            run.trigger_type,
            format!("{}/{}", run.completed_queries, run.total_queries),
            truncate(run.error_message.as_deref().unwrap_or(""), 60)
        );
    }
    Ok(())
}

async fn show_run(pool: PgPool, run_id: i64) -> anyhow::Result<()> {
    let store = PgStore::new(pool);
    let summary = run_summary(&store, run_id).await?;
    let run = &summary.run;

    println!("run {} ({})", run.id, run.public_id);
    println!("  status:    {}", run.status);
    println!("  trigger:   {}", run.trigger_type);
    println!("  run date:  {}", run.run_date);
    println!(
        "  items:     {} total, {} done, {} failed, {} pending, {} in progress",
        summary.counts.total(),
        summary.counts.done,
        summary.counts.failed,
        summary.counts.pending,
        summary.counts.in_progress
    );
    if let Some(message) = &run.error_message {
        println!("  error:     {message}");
    }

    if !summary.failed_items.is_empty() {
        println!();
        println!(
            "{:<8}{:<20}{:<9}{:<14}QUERY / ERROR",
            "ITEM", "ENGINE", "TRIES", "CLASS"
        );
        for item in &summary.failed_items {
            println!(
                "{:<8}{:<20}{:<9}{:<14}{}",
                item.work_item_id,
                item.engine,
                item.attempts,
                item.error_class.as_deref().unwrap_or("-"),
                truncate(&item.query_text, 50)
            );
            if let Some(message) = &item.error_message {
                println!("{:<51}{}", "", truncate(message, 80));
            }
        }
    }

    if !summary.parse_errors.is_empty() {
        println!();
        println!("parse errors:");
        for err in &summary.parse_errors {
            println!(
                "  item {} ({}, query {}): {}",
                err.work_item_id, err.engine, err.query_id, err.parse_error
            );
        }
    }
    Ok(())
}
