use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// One entry of the query library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    pub query_text: String,
    pub category: String,
    pub subcategory: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueriesFile {
    pub queries: Vec<QueryConfig>,
}

/// Load and validate the query library from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_queries(path: &Path) -> Result<QueriesFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let file: QueriesFile = serde_yaml::from_str(&content)?;
    validate_queries(&file)?;
    Ok(file)
}

fn validate_queries(file: &QueriesFile) -> Result<(), ConfigError> {
    if file.queries.is_empty() {
        return Err(ConfigError::Validation(
            "query library must contain at least one query".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for query in &file.queries {
        let text = query.query_text.trim();
        if text.is_empty() {
            return Err(ConfigError::Validation(
                "query_text must be non-empty".to_string(),
            ));
        }
        if query.category.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "query '{text}' has an empty category"
            )));
        }
        if !seen.insert(text.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate query_text: '{text}'"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(text: &str, category: &str) -> QueryConfig {
        QueryConfig {
            query_text: text.to_string(),
            category: category.to_string(),
            subcategory: None,
        }
    }

    #[test]
    fn accepts_distinct_queries() {
        let file = QueriesFile {
            queries: vec![
                query("Best webinar platform?", "platform_comparison"),
                query("ON24 vs Goldcast", "platform_comparison"),
            ],
        };
        assert!(validate_queries(&file).is_ok());
    }

    #[test]
    fn rejects_empty_library() {
        let file = QueriesFile { queries: vec![] };
        assert!(matches!(
            validate_queries(&file),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn rejects_case_insensitive_duplicates() {
        let file = QueriesFile {
            queries: vec![
                query("Best webinar platform?", "a"),
                query("best WEBINAR platform?", "b"),
            ],
        };
        let err = validate_queries(&file).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("duplicate")));
    }

    #[test]
    fn rejects_blank_category() {
        let file = QueriesFile {
            queries: vec![query("Best webinar platform?", "  ")],
        };
        assert!(validate_queries(&file).is_err());
    }

    #[test]
    fn shipped_query_library_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/queries.yaml");
        let file = load_queries(&path).expect("config/queries.yaml should be valid");
        assert_eq!(file.queries.len(), 32);
    }
}
