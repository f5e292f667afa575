//! Ranking configuration
//!
//! Read from the `[query]` table of `musearch.toml`; a missing table (or
//! file) yields the defaults.

use crate::error::{QueryError, QueryResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Knobs of the query compiler and the search service.
///
/// # Example
///
/// ```toml
/// [query]
/// fuzzy_min_length = 5
/// default_limit = 10
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Shortest unquoted term (in characters) that gets prefix and fuzzy alternatives.
    #[serde(default = "default_fuzzy_min_length")]
    pub fuzzy_min_length: usize,
    /// Maximum edit distance of fuzzy alternatives.
    #[serde(default = "default_fuzzy_max_edits")]
    pub fuzzy_max_edits: u32,
    /// Boost of prefix/fuzzy alternatives relative to the exact field boost.
    #[serde(default = "default_wildcard_boost_reducer")]
    pub wildcard_boost_reducer: f32,
    /// Boost of the whole-query phrase bonus relative to the field boost.
    #[serde(default = "default_phrase_boost_reducer")]
    pub phrase_boost_reducer: f32,
    /// Cap on terms one prefix or fuzzy alternative expands to.
    #[serde(default = "default_max_expansions")]
    pub max_expansions: usize,
    /// Weight of non-best terms within one expansion.
    #[serde(default)]
    pub expansion_tie_breaker: f32,
    /// Page size when the caller gives none.
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

fn default_fuzzy_min_length() -> usize {
    4
}

fn default_fuzzy_max_edits() -> u32 {
    2
}

fn default_wildcard_boost_reducer() -> f32 {
    0.8
}

fn default_phrase_boost_reducer() -> f32 {
    0.2
}

fn default_max_expansions() -> usize {
    200
}

fn default_limit() -> usize {
    25
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            fuzzy_min_length: default_fuzzy_min_length(),
            fuzzy_max_edits: default_fuzzy_max_edits(),
            wildcard_boost_reducer: default_wildcard_boost_reducer(),
            phrase_boost_reducer: default_phrase_boost_reducer(),
            max_expansions: default_max_expansions(),
            expansion_tie_breaker: 0.0,
            default_limit: default_limit(),
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    query: QueryConfig,
}

impl QueryConfig {
    /// Parse the `[query]` table out of a whole config document.
    pub fn from_toml(content: &str) -> QueryResult<Self> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| QueryError::Config(e.to_string()))?;
        file.query.validate()?;
        Ok(file.query)
    }

    /// Read the `[query]` table of a config file; defaults if the file is absent.
    pub fn from_file(path: &Path) -> QueryResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            QueryError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Reject settings that would make ranking meaningless.
    pub fn validate(&self) -> QueryResult<()> {
        if !(0.0..=1.0).contains(&self.wildcard_boost_reducer) {
            return Err(QueryError::Config(
                "wildcard_boost_reducer must be within 0..=1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.phrase_boost_reducer) {
            return Err(QueryError::Config(
                "phrase_boost_reducer must be within 0..=1".to_string(),
            ));
        }
        if self.default_limit == 0 {
            return Err(QueryError::Config(
                "default_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = QueryConfig::default();
        assert_eq!(config.fuzzy_min_length, 4);
        assert_eq!(config.fuzzy_max_edits, 2);
        assert_eq!(config.max_expansions, 200);
        assert_eq!(config.default_limit, 25);
        assert!((config.wildcard_boost_reducer - 0.8).abs() < f32::EPSILON);
        assert!((config.phrase_boost_reducer - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn test_missing_table_is_default() {
        let config = QueryConfig::from_toml("chunk_size = 10\n").unwrap();
        assert_eq!(config, QueryConfig::default());
    }

    #[test]
    fn test_partial_table() {
        let config = QueryConfig::from_toml("[query]\nfuzzy_min_length = 6\n").unwrap();
        assert_eq!(config.fuzzy_min_length, 6);
        assert_eq!(config.default_limit, 25);
    }

    #[test]
    fn test_invalid_reducer() {
        let err = QueryConfig::from_toml("[query]\nphrase_boost_reducer = 3.0\n").unwrap_err();
        assert!(matches!(err, QueryError::Config(_)));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = QueryConfig::from_file(&dir.path().join("musearch.toml")).unwrap();
        assert_eq!(config, QueryConfig::default());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("musearch.toml");
        std::fs::write(&path, "indexes_dir = \"data\"\n\n[query]\ndefault_limit = 10\n").unwrap();
        assert_eq!(QueryConfig::from_file(&path).unwrap().default_limit, 10);
    }
}
