use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// The answer-generation engines a benchmark run queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// xAI Grok with the `web_search` tool enabled.
    GrokWebSearch,
    /// OpenAI `ChatGPT` with the `web_search_preview` tool enabled.
    ChatgptWebSearch,
    /// Anthropic Claude answering from parametric knowledge only.
    ClaudeParametric,
}

impl EngineKind {
    pub const ALL: [EngineKind; 3] = [
        EngineKind::GrokWebSearch,
        EngineKind::ChatgptWebSearch,
        EngineKind::ClaudeParametric,
    ];

    /// Stable identifier stored in the `engine` columns.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EngineKind::GrokWebSearch => "grok_web_search",
            EngineKind::ChatgptWebSearch => "chatgpt_web_search",
            EngineKind::ClaudeParametric => "claude_parametric",
        }
    }

    /// Whether requests to this engine activate a search tool.
    #[must_use]
    pub fn uses_web_search(self) -> bool {
        !matches!(self, EngineKind::ClaudeParametric)
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "grok_web_search" | "grok" => Ok(EngineKind::GrokWebSearch),
            "chatgpt_web_search" | "openai" | "chatgpt" => Ok(EngineKind::ChatgptWebSearch),
            "claude_parametric" | "claude" => Ok(EngineKind::ClaudeParametric),
            other => Err(CoreError::UnknownEngine(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_str_round_trips_through_from_str() {
        for kind in EngineKind::ALL {
            assert_eq!(kind.as_str().parse::<EngineKind>().unwrap(), kind);
        }
    }

    #[test]
    fn short_aliases_parse() {
        assert_eq!(
            "grok".parse::<EngineKind>().unwrap(),
            EngineKind::GrokWebSearch
        );
        assert_eq!(
            "openai".parse::<EngineKind>().unwrap(),
            EngineKind::ChatgptWebSearch
        );
        assert_eq!(
            "claude".parse::<EngineKind>().unwrap(),
            EngineKind::ClaudeParametric
        );
    }

    #[test]
    fn unknown_engine_is_rejected() {
        assert_eq!(
            "gemini".parse::<EngineKind>(),
            Err(CoreError::UnknownEngine("gemini".to_string()))
        );
    }

    #[test]
    fn only_claude_is_parametric() {
        assert!(EngineKind::GrokWebSearch.uses_web_search());
        assert!(EngineKind::ChatgptWebSearch.uses_web_search());
        assert!(!EngineKind::ClaudeParametric.uses_web_search());
    }
}
