//! Answer-engine clients for the benchmark, plus the pacing and retry policy
//! wrapped around every outbound call.

pub mod claude;
pub mod client;
pub mod error;
pub mod grok;
pub mod openai;
pub mod rate_limit;
pub mod retry;
pub mod types;

pub use claude::ClaudeClient;
pub use client::{build_client, EngineClient, PARAMETRIC_SYSTEM_PROMPT, SEARCH_SYSTEM_PROMPT};
pub use error::EngineError;
pub use grok::GrokClient;
pub use openai::OpenAiClient;
pub use rate_limit::RateLimiter;
pub use retry::{retry_with_backoff, RetryError, RetryPolicy};
pub use types::{EngineCitation, RawAnswer};
