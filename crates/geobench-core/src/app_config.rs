use std::net::SocketAddr;
use std::path::PathBuf;

use crate::EngineKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Connection and pacing settings for one answer engine.
#[derive(Clone)]
pub struct EngineSettings {
    pub kind: EngineKind,
    /// `None` means the engine is skipped for this deployment.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// Minimum spacing between two requests to this engine.
    pub min_interval_ms: u64,
}

impl std::fmt::Debug for EngineSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineSettings")
            .field("kind", &self.kind)
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("min_interval_ms", &self.min_interval_ms)
            .finish()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub brands_path: PathBuf,
    pub queries_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub engines: Vec<EngineSettings>,
    pub engine_timeout_secs: u64,
    pub per_engine_concurrency: usize,
    pub max_concurrency: usize,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub schedule_cron: String,
}

impl AppConfig {
    #[must_use]
    pub fn engine(&self, kind: EngineKind) -> Option<&EngineSettings> {
        self.engines.iter().find(|e| e.kind == kind)
    }

    /// Engines that have a credential configured, in canonical order.
    #[must_use]
    pub fn enabled_engines(&self) -> Vec<EngineKind> {
        self.engines
            .iter()
            .filter(|e| e.api_key.is_some())
            .map(|e| e.kind)
            .collect()
    }

    /// Longest a live run can go without touching any of its work items.
    ///
    /// Covers every attempt of one engine call at full timeout and backoff,
    /// plus a full limiter queue on the slowest engine. A `running` run idle
    /// for longer than this has no process driving it.
    #[must_use]
    pub fn run_idle_window(&self) -> std::time::Duration {
        use std::time::Duration;

        let per_attempt = Duration::from_secs(self.engine_timeout_secs)
            .saturating_add(Duration::from_millis(self.retry_max_delay_ms));
        let slowest_interval = self
            .engines
            .iter()
            .map(|e| e.min_interval_ms)
            .max()
            .unwrap_or(0);
        let queue = u32::try_from(self.per_engine_concurrency).unwrap_or(u32::MAX);
        per_attempt
            .saturating_mul(self.retry_max_attempts.max(1))
            .saturating_add(Duration::from_millis(slowest_interval).saturating_mul(queue))
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("brands_path", &self.brands_path)
            .field("queries_path", &self.queries_path)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("engines", &self.engines)
            .field("engine_timeout_secs", &self.engine_timeout_secs)
            .field("per_engine_concurrency", &self.per_engine_concurrency)
            .field("max_concurrency", &self.max_concurrency)
            .field("retry_max_attempts", &self.retry_max_attempts)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .field("retry_max_delay_ms", &self.retry_max_delay_ms)
            .field("schedule_cron", &self.schedule_cron)
            .finish()
    }
}
