use crate::app_config::{AppConfig, EngineSettings, Environment};
use crate::{ConfigError, EngineKind};

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Per-engine env var names and defaults.
struct EngineVars {
    kind: EngineKind,
    api_key: &'static str,
    model: &'static str,
    default_model: &'static str,
    base_url: &'static str,
    default_base_url: &'static str,
    min_interval: &'static str,
    default_min_interval_ms: &'static str,
}

const ENGINE_VARS: [EngineVars; 3] = [
    EngineVars {
        kind: EngineKind::GrokWebSearch,
        api_key: "XAI_API_KEY",
        model: "GEOBENCH_GROK_MODEL",
        default_model: "grok-4-0709",
        base_url: "GEOBENCH_GROK_BASE_URL",
        default_base_url: "https://api.x.ai/v1",
        min_interval: "GEOBENCH_GROK_MIN_INTERVAL_MS",
        default_min_interval_ms: "2500",
    },
    EngineVars {
        kind: EngineKind::ChatgptWebSearch,
        api_key: "OPENAI_API_KEY",
        model: "GEOBENCH_OPENAI_MODEL",
        default_model: "gpt-4o",
        base_url: "GEOBENCH_OPENAI_BASE_URL",
        default_base_url: "https://api.openai.com/v1",
        min_interval: "GEOBENCH_OPENAI_MIN_INTERVAL_MS",
        default_min_interval_ms: "1500",
    },
    EngineVars {
        kind: EngineKind::ClaudeParametric,
        api_key: "ANTHROPIC_API_KEY",
        model: "GEOBENCH_CLAUDE_MODEL",
        default_model: "claude-sonnet-4-5-20250929",
        base_url: "GEOBENCH_CLAUDE_BASE_URL",
        default_base_url: "https://api.anthropic.com",
        min_interval: "GEOBENCH_CLAUDE_MIN_INTERVAL_MS",
        default_min_interval_ms: "1500",
    },
];

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let at_least_one = |var: &str, value: u64| -> Result<(), ConfigError> {
        if value == 0 {
            return Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    };

    let database_url = require("DATABASE_URL")?;

    let env = parse_environment(&or_default("GEOBENCH_ENV", "development"))?;

    let bind_addr = parse_addr("GEOBENCH_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("GEOBENCH_LOG_LEVEL", "info");
    let brands_path = PathBuf::from(or_default("GEOBENCH_BRANDS_PATH", "./config/brands.yaml"));
    let queries_path = PathBuf::from(or_default(
        "GEOBENCH_QUERIES_PATH",
        "./config/queries.yaml",
    ));

    let db_max_connections = parse_u32("GEOBENCH_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("GEOBENCH_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("GEOBENCH_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let mut engines = Vec::with_capacity(ENGINE_VARS.len());
    for vars in &ENGINE_VARS {
        engines.push(EngineSettings {
            kind: vars.kind,
            api_key: optional(vars.api_key),
            model: or_default(vars.model, vars.default_model),
            base_url: or_default(vars.base_url, vars.default_base_url),
            min_interval_ms: parse_u64(vars.min_interval, vars.default_min_interval_ms)?,
        });
    }

    let engine_timeout_secs = parse_u64("GEOBENCH_ENGINE_TIMEOUT_SECS", "180")?;
    at_least_one("GEOBENCH_ENGINE_TIMEOUT_SECS", engine_timeout_secs)?;
    let per_engine_concurrency = parse_usize("GEOBENCH_PER_ENGINE_CONCURRENCY", "3")?;
    at_least_one("GEOBENCH_PER_ENGINE_CONCURRENCY", per_engine_concurrency as u64)?;
    let max_concurrency = parse_usize("GEOBENCH_MAX_CONCURRENCY", "9")?;
    at_least_one("GEOBENCH_MAX_CONCURRENCY", max_concurrency as u64)?;

    let retry_max_attempts = parse_u32("GEOBENCH_RETRY_MAX_ATTEMPTS", "3")?;
    at_least_one("GEOBENCH_RETRY_MAX_ATTEMPTS", u64::from(retry_max_attempts))?;
    let retry_base_delay_ms = parse_u64("GEOBENCH_RETRY_BASE_DELAY_MS", "2000")?;
    let retry_max_delay_ms = parse_u64("GEOBENCH_RETRY_MAX_DELAY_MS", "60000")?;

    let schedule_cron = or_default("GEOBENCH_SCHEDULE_CRON", "0 0 6 * * *");

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        brands_path,
        queries_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        engines,
        engine_timeout_secs,
        per_engine_concurrency,
        max_concurrency,
        retry_max_attempts,
        retry_base_delay_ms,
        retry_max_delay_ms,
        schedule_cron,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "GEOBENCH_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
