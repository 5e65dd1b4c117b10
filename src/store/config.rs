//! Store configuration
//!
//! Loaded from a JSON file. Only `path` is required; everything else has
//! a default.
//!
//! ```json
//! { "path": "./data", "sync_writes": true, "log_level": "warn" }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::EngineOptions;
use crate::observability::{log_event_with_fields, Event, Severity};

use super::errors::{StoreError, StoreResult};

/// Backend name of [`super::LocalStore`]
pub const LOCAL_BACKEND: &str = "local";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Registered backend name (default "local")
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Base directory; one subdirectory per collection (required)
    pub path: PathBuf,

    /// fsync the commit log on every commit (default true)
    #[serde(default = "default_sync_writes")]
    pub sync_writes: bool,

    /// Keep collections in memory only (default false)
    #[serde(default)]
    pub in_memory: bool,

    /// Entries buffered per cursor refill (default 10)
    #[serde(default = "default_prefetch_size")]
    pub prefetch_size: usize,

    /// Minimum log severity (default "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_backend() -> String {
    LOCAL_BACKEND.to_string()
}
fn default_sync_writes() -> bool {
    true
}
fn default_prefetch_size() -> usize {
    10
}
fn default_log_level() -> String {
    "info".to_string()
}

impl StoreConfig {
    /// Config with defaults for everything but the base path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: default_backend(),
            path: path.into(),
            sync_writes: default_sync_writes(),
            in_memory: false,
            prefetch_size: default_prefetch_size(),
            log_level: default_log_level(),
        }
    }

    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> StoreResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| StoreError::config(format!("failed to read config: {}", e)))?;

        let config: StoreConfig = serde_json::from_str(&content)
            .map_err(|e| StoreError::config(format!("invalid config JSON: {}", e)))?;

        config.validate()?;

        let path_str = path.display().to_string();
        log_event_with_fields(
            Event::ConfigLoaded,
            &[
                ("backend", config.backend.as_str()),
                ("config", path_str.as_str()),
            ],
        );

        Ok(config)
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.backend.trim().is_empty() {
            return Err(StoreError::config("backend must not be empty"));
        }

        if self.path.as_os_str().is_empty() {
            return Err(StoreError::config("path must not be empty"));
        }

        if self.prefetch_size == 0 {
            return Err(StoreError::config("prefetch_size must be > 0"));
        }

        self.severity()?;
        Ok(())
    }

    /// Parsed `log_level`.
    pub fn severity(&self) -> StoreResult<Severity> {
        self.log_level.parse().map_err(|_| {
            StoreError::config(format!(
                "invalid log_level: '{}'. Must be one of trace, info, warn, error, fatal.",
                self.log_level
            ))
        })
    }

    /// Engine options for every collection opened under this config.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            in_memory: self.in_memory,
            sync_writes: self.sync_writes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_applied() {
        let config: StoreConfig = serde_json::from_str(r#"{"path": "/tmp/x"}"#).unwrap();
        assert_eq!(config, StoreConfig::new("/tmp/x"));
        assert_eq!(config.backend, "local");
        assert!(config.sync_writes);
        assert!(!config.in_memory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_path_required() {
        let err = serde_json::from_str::<StoreConfig>("{}").unwrap_err();
        assert!(err.to_string().contains("path"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = StoreConfig::new("/tmp/x");
        config.prefetch_size = 0;
        assert!(config.validate().is_err());

        let mut config = StoreConfig::new("/tmp/x");
        config.log_level = "loud".into();
        assert_eq!(config.validate().unwrap_err().code(), "AERO_STORE_CONFIG_ERROR");

        let config = StoreConfig::new("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("aerostore.json");
        fs::write(&path, r#"{"path": "data", "sync_writes": false}"#).unwrap();

        let config = StoreConfig::load(&path).unwrap();
        assert_eq!(config.path, PathBuf::from("data"));
        assert!(!config.engine_options().sync_writes);
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = StoreConfig::load(&temp_dir.path().join("nope.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }
}
