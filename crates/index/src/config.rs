//! Build configuration via `musearch.toml`
//!
//! Every setting has a default, so an empty file (or no file) is a valid
//! configuration. CLI flags override the file field by field.

use musearch_core::{Error, IndexKind, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file name looked up next to the indexes.
pub const CONFIG_FILE_NAME: &str = "musearch.toml";

/// Configuration of index builds and updates.
///
/// # Example
///
/// ```toml
/// indexes_dir = "data"
/// chunk_size = 50000
/// indexes = ["artist", "label"]
/// test_mode = true
/// test_index_size = 1000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Directory holding one `<name>_index` folder per index.
    #[serde(default = "default_indexes_dir")]
    pub indexes_dir: PathBuf,
    /// Ids per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,
    /// Document-building threads; defaults to the available parallelism.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    /// Documents buffered between the builders and the writer.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    /// Indexes to build; empty means all.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<IndexKind>,
    /// Cap every index at `test_index_size` ids.
    #[serde(default)]
    pub test_mode: bool,
    /// Highest id built in test mode.
    #[serde(default = "default_test_index_size")]
    pub test_index_size: u32,
    /// Threads running background merges.
    #[serde(default = "default_finalize_threads")]
    pub finalize_threads: usize,
    /// Open-file limit the process should have before building.
    #[serde(default = "default_min_open_files")]
    pub min_open_files: u64,
}

fn default_indexes_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_chunk_size() -> u32 {
    50_000
}

fn default_queue_depth() -> usize {
    1_000
}

fn default_test_index_size() -> u32 {
    100_000
}

fn default_finalize_threads() -> usize {
    1
}

fn default_min_open_files() -> u64 {
    4_096
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            indexes_dir: default_indexes_dir(),
            chunk_size: default_chunk_size(),
            workers: None,
            queue_depth: default_queue_depth(),
            indexes: Vec::new(),
            test_mode: false,
            test_index_size: default_test_index_size(),
            finalize_threads: default_finalize_threads(),
            min_open_files: default_min_open_files(),
        }
    }
}

impl BuildConfig {
    /// Document-building threads to use.
    pub fn worker_count(&self) -> usize {
        self.workers
            .filter(|w| *w > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
    }

    /// Indexes selected for this run, in build order.
    pub fn selected_indexes(&self) -> Vec<IndexKind> {
        IndexKind::ALL
            .into_iter()
            .filter(|k| self.indexes.is_empty() || self.indexes.contains(k))
            .collect()
    }

    /// Reject settings no build can run with.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be at least 1".to_string()));
        }
        if self.queue_depth == 0 {
            return Err(Error::Config("queue_depth must be at least 1".to_string()));
        }
        if self.finalize_threads == 0 {
            return Err(Error::Config(
                "finalize_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# musearch build configuration
#
# Directory holding one <name>_index folder per index.
indexes_dir = "data"

# Ids read from the database per chunk. Side tables (tags, aliases,
# relations, credits) are loaded once per chunk, so this bounds memory.
chunk_size = 50000

# Document-building threads (default: available parallelism).
# workers = 8

# Documents buffered between the builders and the single index writer.
queue_depth = 1000

# Indexes to build (default: all), e.g. ["artist", "label"].
# indexes = []

# Test mode caps every index at test_index_size ids.
test_mode = false
test_index_size = 100000

# Threads running the final merge of each index in the background.
finalize_threads = 1

# Open-file limit checked by `musearch check-file-limit`.
min_open_files = 4096
"#
    }

    /// Read and parse config from a file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: BuildConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Serialization(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_toml_parses_to_defaults() {
        let config: BuildConfig = toml::from_str(BuildConfig::default_toml()).unwrap();
        assert_eq!(config, BuildConfig::default());
    }

    #[test]
    fn empty_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "").unwrap();
        let config = BuildConfig::from_file(&path).unwrap();
        assert_eq!(config.chunk_size, 50_000);
        assert_eq!(config.finalize_threads, 1);
        assert!(!config.test_mode);
    }

    #[test]
    fn write_default_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "chunk_size = 10\n").unwrap();
        BuildConfig::write_default_if_missing(&path).unwrap();
        assert_eq!(BuildConfig::from_file(&path).unwrap().chunk_size, 10);
    }

    #[test]
    fn write_to_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = BuildConfig {
            workers: Some(3),
            indexes: vec![IndexKind::Label, IndexKind::Artist],
            test_mode: true,
            test_index_size: 500,
            ..Default::default()
        };
        config.write_to_file(&path).unwrap();
        assert_eq!(BuildConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "chunk_size = 0\n").unwrap();
        assert!(matches!(
            BuildConfig::from_file(&path),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn unknown_index_name_rejected() {
        assert!(toml::from_str::<BuildConfig>("indexes = [\"freedb\"]").is_err());
    }

    #[test]
    fn selected_indexes_keep_build_order() {
        let config = BuildConfig {
            indexes: vec![IndexKind::Label, IndexKind::Recording],
            ..Default::default()
        };
        assert_eq!(
            config.selected_indexes(),
            vec![IndexKind::Recording, IndexKind::Label]
        );
        assert_eq!(BuildConfig::default().selected_indexes().len(), 7);
    }

    #[test]
    fn worker_count_defaults_to_parallelism() {
        assert!(BuildConfig::default().worker_count() >= 1);
        let config = BuildConfig {
            workers: Some(2),
            ..Default::default()
        };
        assert_eq!(config.worker_count(), 2);
    }
}
