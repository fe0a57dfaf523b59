use geobench_core::FailureClass;
use reqwest::StatusCode;
use thiserror::Error;

/// Errors returned by an engine client, already classified for the retry policy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// HTTP 401/403: the credential was rejected.
    #[error("authentication failed (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    /// HTTP 429.
    #[error("rate limited: {message}")]
    RateLimit { message: String },

    /// Transport failure or timeout before a response arrived.
    #[error("connection error: {0}")]
    Connection(String),

    /// HTTP 5xx.
    #[error("server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    /// Undecodable body, missing answer text, or any other non-success status.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The client could not be constructed.
    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl EngineError {
    /// Classifies a non-success HTTP status and its body.
    #[must_use]
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = truncate(body, 300);
        match status.as_u16() {
            401 | 403 => EngineError::Auth {
                status: status.as_u16(),
                message,
            },
            429 => EngineError::RateLimit { message },
            s if status.is_server_error() => EngineError::ServerError { status: s, message },
            s => EngineError::Malformed(format!("unexpected HTTP {s}: {message}")),
        }
    }

    /// Classifies a `reqwest` failure raised before a status could be read.
    #[must_use]
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_status(status, &err.to_string());
        }
        if err.is_decode() {
            return EngineError::Malformed(err.to_string());
        }
        EngineError::Connection(err.to_string())
    }

    /// Failure class stored on the work item.
    #[must_use]
    pub fn class(&self) -> FailureClass {
        match self {
            EngineError::Auth { .. } => FailureClass::Auth,
            EngineError::RateLimit { .. } => FailureClass::RateLimit,
            EngineError::Connection(_) => FailureClass::Connection,
            EngineError::ServerError { .. } => FailureClass::ServerError,
            EngineError::Malformed(_) | EngineError::Config(_) => FailureClass::Malformed,
        }
    }

    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, EngineError::Auth { .. })
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    let trimmed = s.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
