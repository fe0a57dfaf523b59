use geobench_analysis::AnalysisError;
use geobench_core::EngineKind;
use geobench_db::DbError;
use geobench_engines::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("no engine has a credential configured")]
    NoEngines,

    #[error("no active queries to benchmark")]
    NoQueries,

    #[error("engine {0} is not configured on this coordinator")]
    EngineUnavailable(EngineKind),

    #[error("run {run_id} still has {outstanding} unfinished work items")]
    RunNotSettled { run_id: i64, outstanding: i64 },

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}
