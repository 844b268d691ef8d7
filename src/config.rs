//! Configuration file
//!
//! ```json
//! {
//!   "data_dir": "/var/lib/coursebase",
//!   "snapshot_file": "coursebase.snapshot.json",
//!   "media_root": "media",
//!   "schema_dir": "schemas",
//!   "sync_on_write": true
//! }
//! ```
//!
//! Only `data_dir` is required. Relative paths resolve against `data_dir`.

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cli::{CliError, CliResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Data directory (required)
    pub data_dir: String,

    /// Snapshot file name inside the data directory
    #[serde(default = "default_snapshot_file")]
    pub snapshot_file: String,

    /// Root for uploaded images; `upload_to` directories live below it
    #[serde(default = "default_media_root")]
    pub media_root: String,

    /// Directory holding one JSON file per table definition
    #[serde(default = "default_schema_dir")]
    pub schema_dir: String,

    /// Persist the snapshot after every successful write request
    #[serde(default = "default_sync_on_write")]
    pub sync_on_write: bool,
}

fn default_snapshot_file() -> String {
    "coursebase.snapshot.json".to_string()
}
fn default_media_root() -> String {
    "media".to_string()
}
fn default_schema_dir() -> String {
    "schemas".to_string()
}
fn default_sync_on_write() -> bool {
    true
}

impl Config {
    /// Creates a configuration with defaults for everything but `data_dir`.
    pub fn new(data_dir: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            snapshot_file: default_snapshot_file(),
            media_root: default_media_root(),
            schema_dir: default_schema_dir(),
            sync_on_write: default_sync_on_write(),
        }
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> CliResult<()> {
        if self.data_dir.trim().is_empty() {
            return Err(CliError::config_error("data_dir must not be empty"));
        }

        if !is_plain_file_name(&self.snapshot_file) {
            return Err(CliError::config_error(format!(
                "Invalid snapshot_file: '{}'. Must be a file name without directories.",
                self.snapshot_file
            )));
        }

        if self.media_root.trim().is_empty() {
            return Err(CliError::config_error("media_root must not be empty"));
        }

        if self.schema_dir.trim().is_empty() {
            return Err(CliError::config_error("schema_dir must not be empty"));
        }

        Ok(())
    }

    pub fn data_path(&self) -> &Path {
        Path::new(&self.data_dir)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_path().join(&self.snapshot_file)
    }

    pub fn schema_path(&self) -> PathBuf {
        self.data_path().join(&self.schema_dir)
    }

    pub fn media_path(&self) -> PathBuf {
        self.data_path().join(&self.media_root)
    }
}

fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, value: serde_json::Value) -> PathBuf {
        let path = dir.path().join("coursebase.json");
        fs::write(&path, value.to_string()).unwrap();
        path
    }

    #[test]
    fn test_config_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(&temp_dir, json!({"data_dir": "/srv/courses"}));

        let config = Config::load(&path).unwrap();
        assert_eq!(config.snapshot_file, "coursebase.snapshot.json");
        assert_eq!(config.media_root, "media");
        assert_eq!(config.schema_dir, "schemas");
        assert!(config.sync_on_write);
        assert_eq!(
            config.snapshot_path(),
            PathBuf::from("/srv/courses/coursebase.snapshot.json")
        );
        assert_eq!(config.schema_path(), PathBuf::from("/srv/courses/schemas"));
    }

    #[test]
    fn test_config_requires_data_dir() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(&temp_dir, json!({"sync_on_write": false}));
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_config_rejects_unknown_keys() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(&temp_dir, json!({"data_dir": "/x", "wal_sync_mode": "fsync"}));
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_snapshot_file_must_be_plain_name() {
        let mut config = Config::new("/x");
        config.snapshot_file = "../escape.json".to_string();
        assert!(config.validate().is_err());

        config.snapshot_file = "nested/db.json".to_string();
        assert!(config.validate().is_err());

        config.snapshot_file = "db.json".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = Config::load(&temp_dir.path().join("absent.json")).unwrap_err();
        assert!(err.message().contains("Failed to read config"));
    }
}
