use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Flush/sync strategy for the journal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// `fsync` after every record (safest, highest latency).
    #[default]
    EveryWrite,
    /// Rely on OS page-cache buffering (fastest, least durable).
    OsDefault,
}

/// Configuration of a [`FileObjectStore`](crate::FileObjectStore).
///
/// Loaded from TOML, for example:
/// ```toml
/// path = "/var/lib/chaps/database.journal"
/// sync-mode = "every-write"
/// compact-threshold = 64
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct StoreConfig {
    /// Path of the journal file. Parent directories are created on open.
    pub path: PathBuf,
    /// Sync strategy for appended records.
    pub sync_mode: SyncMode,
    /// Number of superseded journal records that triggers compaction.
    /// `0` disables automatic compaction.
    pub compact_threshold: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("database.journal"),
            sync_mode: SyncMode::default(),
            compact_threshold: 64,
        }
    }
}

impl StoreConfig {
    /// Default configuration for a journal at `path`.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(s: &str) -> StoreResult<Self> {
        toml::from_str(s).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: &Path) -> StoreResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = StoreConfig::default();
        assert_eq!(c.path, PathBuf::from("database.journal"));
        assert_eq!(c.sync_mode, SyncMode::EveryWrite);
        assert_eq!(c.compact_threshold, 64);
    }

    #[test]
    fn parse_full_toml() {
        let c = StoreConfig::from_toml_str(
            r#"
            path = "/tmp/token/db.journal"
            sync-mode = "os-default"
            compact-threshold = 0
            "#,
        )
        .unwrap();
        assert_eq!(c.path, PathBuf::from("/tmp/token/db.journal"));
        assert_eq!(c.sync_mode, SyncMode::OsDefault);
        assert_eq!(c.compact_threshold, 0);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let c = StoreConfig::from_toml_str(r#"path = "x.journal""#).unwrap();
        assert_eq!(c.path, PathBuf::from("x.journal"));
        assert_eq!(c.sync_mode, SyncMode::EveryWrite);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = StoreConfig::from_toml_str(r#"colour = "blue""#).unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.toml");
        std::fs::write(&path, "compact-threshold = 5\n").unwrap();
        let c = StoreConfig::load(&path).unwrap();
        assert_eq!(c.compact_threshold, 5);
    }
}
