//! Post-run report: counters, failed items and parse errors.

use geobench_db::{BenchmarkRunRow, FailedItemRow, ItemStatusCounts, ParseErrorRow};

use crate::error::RunnerError;
use crate::store::BenchmarkStore;

/// Everything a human needs to decide whether to resume a run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run: BenchmarkRunRow,
    pub counts: ItemStatusCounts,
    pub failed_items: Vec<FailedItemRow>,
    pub parse_errors: Vec<ParseErrorRow>,
}

/// Loads the summary of one run.
///
/// # Errors
///
/// Returns [`RunnerError::Db`] (`NotFound` for an unknown run).
pub async fn run_summary(
    store: &dyn BenchmarkStore,
    run_id: i64,
) -> Result<RunSummary, RunnerError> {
    let run = store.get_run(run_id).await?;
    let counts = store.item_counts(run_id).await?;
    let failed_items = store.failed_items(run_id).await?;
    let parse_errors = store.parse_errors(run_id).await?;

    Ok(RunSummary {
        run,
        counts,
        failed_items,
        parse_errors,
    })
}
