//! Benchmark orchestration.
//!
//! The [`Coordinator`] turns the active query library and the configured
//! engines into a run of `(query, engine)` work items, dispatches them through
//! per-engine rate limiters and the retry policy, persists every outcome
//! through a [`BenchmarkStore`], and rebuilds the run's metrics once no item is
//! left unfinished. Runs stopped part-way are resumable.

pub mod coordinator;
pub mod error;
pub mod memory;
pub mod store;
pub mod summary;
mod worker;

pub use coordinator::{pool_width, Coordinator, CoordinatorSettings, RunOutcome, RunSelection};
pub use error::RunnerError;
pub use memory::{MemoryStore, MemoryWorkItem};
pub use store::{BenchmarkStore, PgStore};
pub use summary::{run_summary, RunSummary};
