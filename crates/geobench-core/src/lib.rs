pub mod app_config;
pub mod brands;
pub mod config;
pub mod engine;
pub mod queries;
pub mod records;
pub mod run;

pub use app_config::{AppConfig, EngineSettings, Environment};
pub use brands::{load_brands, parse_brands, BrandConfig, BrandRole, BrandsFile};
pub use config::{load_app_config, load_app_config_from_env};
pub use engine::EngineKind;
pub use queries::{load_queries, QueriesFile, QueryConfig};
pub use records::{
    Citation, DailyMetric, Mention, ParsedResponse, RecordedResponse, Sentiment,
};
pub use run::{FailureClass, RunStatus, TriggerType, WorkItemStatus};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read {path}: {source}")]
    FileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("unknown engine: {0}")]
    UnknownEngine(String),

    #[error("unknown run status: {0}")]
    UnknownRunStatus(String),

    #[error("unknown work item status: {0}")]
    UnknownWorkItemStatus(String),

    #[error("unknown trigger type: {0}")]
    UnknownTriggerType(String),

    #[error("unknown sentiment label: {0}")]
    UnknownSentiment(String),
}
