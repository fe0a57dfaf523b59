use thiserror::Error;

/// Why a raw response produced no structured output.
///
/// The raw text is still stored; the message lands in
/// `raw_responses.parse_error`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("response text is empty")]
    EmptyResponse,

    #[error("structured payload could not be decoded: {0}")]
    MalformedPayload(String),
}

/// Errors raised while compiling the parser from brand configuration.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid pattern for brand '{brand}': {source}")]
    Pattern {
        brand: String,
        #[source]
        source: regex::Error,
    },

    #[error("brand '{brand}' has no usable aliases")]
    NoAliases { brand: String },
}
