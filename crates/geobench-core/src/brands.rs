use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrandRole {
    Target,
    Competitor,
}

impl std::fmt::Display for BrandRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrandRole::Target => write!(f, "target"),
            BrandRole::Competitor => write!(f, "competitor"),
        }
    }
}

/// One tracked brand and the rules used to recognise it in engine output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandConfig {
    /// Stable lowercase key stored on mentions and metrics (e.g. `on24`).
    pub key: String,
    pub display_name: String,
    pub role: BrandRole,
    /// Case-insensitive names matched in answer text.
    pub aliases: Vec<String>,
    /// Hosts whose citations count toward the brand's primary metric.
    #[serde(default)]
    pub root_domains: Vec<String>,
    /// Hosts attributed to the brand but excluded from its primary metric.
    #[serde(default)]
    pub excluded_domains: Vec<String>,
    /// When non-empty, a mention only counts if its sentence contains one of
    /// these keywords (used for brands tracked for one product line only).
    #[serde(default)]
    pub context_keywords: Vec<String>,
    /// Product phrases that never count as a mention of this brand.
    #[serde(default)]
    pub exclude_phrases: Vec<String>,
    pub description: Option<String>,
}

impl BrandConfig {
    /// Whether attribution for this brand depends on surrounding context.
    #[must_use]
    pub fn is_context_scoped(&self) -> bool {
        !self.context_keywords.is_empty()
    }

    /// All domains (root and excluded) the brand owns.
    pub fn owned_domains(&self) -> impl Iterator<Item = &str> {
        self.root_domains
            .iter()
            .chain(self.excluded_domains.iter())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrandsFile {
    pub brands: Vec<BrandConfig>,
}

impl BrandsFile {
    /// The single brand with `role: target`.
    ///
    /// Validation guarantees exactly one exists for files loaded through
    /// [`load_brands`].
    #[must_use]
    pub fn target(&self) -> Option<&BrandConfig> {
        self.brands.iter().find(|b| b.role == BrandRole::Target)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&BrandConfig> {
        self.brands.iter().find(|b| b.key == key)
    }

    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        self.brands.iter().map(|b| b.key.as_str()).collect()
    }
}

/// Load and validate the brands configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_brands(path: &Path) -> Result<BrandsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_brands(&content)
}

/// Parse and validate a brands YAML document.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is invalid or fails validation.
pub fn parse_brands(content: &str) -> Result<BrandsFile, ConfigError> {
    let brands_file: BrandsFile = serde_yaml::from_str(content)?;
    validate_brands(&brands_file)?;
    Ok(brands_file)
}

fn validate_brands(brands_file: &BrandsFile) -> Result<(), ConfigError> {
    let mut seen_keys = HashSet::new();
    let mut seen_domains = HashSet::new();
    let mut targets = 0usize;

    for brand in &brands_file.brands {
        if brand.key.trim().is_empty() {
            return Err(ConfigError::Validation(
                "brand key must be non-empty".to_string(),
            ));
        }

        if brand.key != brand.key.to_lowercase() || brand.key.contains(char::is_whitespace) {
            return Err(ConfigError::Validation(format!(
                "brand key '{}' must be lowercase with no whitespace",
                brand.key
            )));
        }

        if !seen_keys.insert(brand.key.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate brand key: '{}'",
                brand.key
            )));
        }

        if brand.aliases.iter().all(|a| a.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "brand '{}' needs at least one non-empty alias",
                brand.key
            )));
        }

        for domain in brand.owned_domains() {
            if !seen_domains.insert(domain.to_lowercase()) {
                return Err(ConfigError::Validation(format!(
                    "domain '{domain}' is claimed by more than one brand"
                )));
            }
        }

        if brand.role == BrandRole::Target {
            targets += 1;
        }
    }

    if targets != 1 {
        return Err(ConfigError::Validation(format!(
            "exactly one brand must have role 'target', found {targets}"
        )));
    }

    Ok(())
}

#[cfg(test)]
#[path = "brands_test.rs"]
mod tests;
